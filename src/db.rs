mod key;
mod migrations;
pub mod record;
mod scalars;
pub mod series;

use std::{path::Path, sync::Arc};

use turso::{Builder, Connection, Database};

use crate::{
    db::{scalars::Scalars, series::SeriesStore},
    prelude::*,
};

/// Shared handle to the embedded database.
///
/// Cloning is cheap: all the clones use the same connection.
#[must_use]
#[derive(Clone)]
pub struct Db {
    connection: Arc<Connection>,
    _database: Arc<Database>,
}

impl Db {
    /// Open the database file and bring its schema up to date.
    ///
    /// Use `:memory:` for a throwaway in-memory database.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn connect(path: &Path) -> Result<Self> {
        let path = path.to_str().context("the database path is not valid UTF-8")?;
        info!("opening the database…");
        let database = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("failed to open `{path}`"))?;
        let connection = database.connect().context("failed to connect to the database")?;
        let this = Self { connection: Arc::new(connection), _database: Arc::new(database) };
        migrations::apply(&this).await?;
        Ok(this)
    }

    pub fn series(&self) -> SeriesStore<'_> {
        SeriesStore(&self.connection)
    }

    fn scalars(&self) -> Scalars<'_> {
        Scalars(&self.connection)
    }
}
