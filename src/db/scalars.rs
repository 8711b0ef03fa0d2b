use turso::{Connection, Value};

use crate::{db::key::Key, prelude::*};

/// Key-value table for the database's own bookkeeping.
#[must_use]
pub struct Scalars<'c>(pub &'c Connection);

impl Scalars<'_> {
    /// Create the table if it is missing: migrations depend on it.
    pub async fn ensure_table(&self) -> Result {
        // language=sqlite
        const SQL: &str = r"
            CREATE TABLE IF NOT EXISTS scalars (key TEXT PRIMARY KEY, value INTEGER NOT NULL)
        ";
        self.0.execute(SQL, ()).await.context("failed to create the scalars table")?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = key.as_str()))]
    pub async fn get_integer(&self, key: Key) -> Result<Option<i64>> {
        // language=sqlite
        const SQL: &str = "SELECT value FROM scalars WHERE key = ?1";
        let row = match self.0.prepare_cached(SQL).await?.query_row((key.as_str(),)).await {
            Ok(row) => row,
            Err(turso::Error::QueryReturnedNoRows) => return Ok(None),
            Err(error) => return Err(anyhow::format_err!(error)),
        };
        match row.get_value(0)? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(value)),
            _ => bail!("`{key:?}` is not an integer"),
        }
    }

    #[instrument(skip_all, fields(key = key.as_str(), value = value))]
    pub async fn upsert(&self, key: Key, value: i64) -> Result {
        // language=sqlite
        const SQL: &str = r"
            INSERT INTO scalars (key, value) VALUES (?1, ?2)
            ON CONFLICT DO UPDATE SET value = ?2
        ";
        self.0.prepare_cached(SQL).await?.execute((key.as_str(), value)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::db::Db;

    #[tokio::test]
    async fn scalars_ok() -> Result {
        let db = Db::connect(Path::new(":memory:")).await?;
        let scalars = db.scalars();
        assert_eq!(scalars.get_integer(Key::Test).await?, None);
        scalars.upsert(Key::Test, 42).await?;
        assert_eq!(scalars.get_integer(Key::Test).await?, Some(42));
        scalars.upsert(Key::Test, 43).await?;
        assert_eq!(scalars.get_integer(Key::Test).await?, Some(43));
        Ok(())
    }
}
