use crate::{
    db::{Db, key::Key},
    prelude::*,
};

/// Schema migrations, applied in order. Never edit the applied ones, append new ones instead.
const MIGRATIONS: &[&str] = &[
    // language=sqlite
    r"
        CREATE TABLE IF NOT EXISTS series_records (
            id INTEGER PRIMARY KEY,
            created_at_millis INTEGER NOT NULL,
            series_key TEXT NOT NULL,
            value REAL NOT NULL
        )
    ",
    // language=sqlite
    r"
        CREATE INDEX IF NOT EXISTS series_records_key_created_at
        ON series_records (series_key, created_at_millis)
    ",
];

#[instrument(skip_all)]
pub async fn apply(db: &Db) -> Result {
    let scalars = db.scalars();
    scalars.ensure_table().await?;
    let applied = usize::try_from(scalars.get_integer(Key::SchemaVersion).await?.unwrap_or(0))?;
    ensure!(
        applied <= MIGRATIONS.len(),
        "the database schema version {applied} is newer than this build supports",
    );
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
        let version = index + 1;
        info!(version, "applying the migration…");
        db.connection
            .execute(sql, ())
            .await
            .with_context(|| format!("failed to apply migration #{version}"))?;
        scalars.upsert(Key::SchemaVersion, i64::try_from(version)?).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[tokio::test]
    async fn reapplying_is_noop() -> Result {
        let db = Db::connect(Path::new(":memory:")).await?;
        apply(&db).await?;
        let version = db.scalars().get_integer(Key::SchemaVersion).await?;
        assert_eq!(version, Some(i64::try_from(MIGRATIONS.len())?));
        Ok(())
    }
}
