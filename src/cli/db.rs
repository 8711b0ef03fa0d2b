use std::path::PathBuf;

use clap::Parser;

use crate::{db::Db, prelude::*};

#[derive(Parser)]
pub struct DbArgs {
    /// SQLite database file.
    #[clap(long = "db-path", env = "DB_PATH", default_value = "kestrel.sqlite")]
    path: PathBuf,
}

impl DbArgs {
    pub async fn connect(&self) -> Result<Db> {
        Db::connect(&self.path).await
    }
}
