use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;

use crate::{cli::db::DbArgs, db::record::keep_latest, prelude::*, tables::build_records_table};

#[derive(Parser)]
pub struct RecordsArgs {
    /// Series key, for example, the site name.
    #[clap(long = "key", env = "SERIES_KEY")]
    series_key: String,

    /// Look-back period.
    #[clap(long, env = "RECORDS_PERIOD", default_value = "1day")]
    period: humantime::Duration,

    /// Print only the most recent records.
    #[clap(long)]
    limit: Option<usize>,

    #[clap(flatten)]
    db: DbArgs,
}

impl RecordsArgs {
    #[instrument(skip_all, fields(series_key = %self.series_key))]
    pub async fn run(self) -> Result {
        let now = Utc::now();
        let since = look_back(now, self.period.into())?;
        let db = self.db.connect().await?;
        let records = db.series().query_range(&self.series_key, since..=now).await?;
        let records = keep_latest(records, self.limit);
        info!(n_records = records.len(), "fetched");
        println!("{}", build_records_table(&records));
        Ok(())
    }
}

fn look_back(now: DateTime<Utc>, period: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(period)
        .ok()
        .and_then(|period| now.checked_sub_signed(period))
        .context("the period is out of range")
}
