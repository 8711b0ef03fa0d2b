use chrono::Utc;
use clap::Parser;

use crate::{cli::db::DbArgs, core::retention::retention_cutoff, prelude::*};

#[derive(Parser)]
pub struct CleanupArgs {
    /// Keep the records for this many days, non-positive means the default of 30 days.
    #[clap(
        long = "days-to-keep",
        env = "DAYS_TO_KEEP",
        default_value = "30",
        allow_negative_numbers = true
    )]
    days_to_keep: i64,

    #[clap(flatten)]
    db: DbArgs,
}

impl CleanupArgs {
    #[instrument(skip_all, fields(days_to_keep = self.days_to_keep))]
    pub async fn run(self) -> Result {
        let cutoff = retention_cutoff(Utc::now(), self.days_to_keep)
            .context("the retention period is out of range")?;
        let n_deleted = self.db.connect().await?.series().delete_before(cutoff).await?;
        println!("Deleted {n_deleted} records created before {cutoff}");
        Ok(())
    }
}
