use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use turso::Connection;

use crate::{db::record::SeriesRecord, prelude::*};

/// Append-only store of timestamped series points.
///
/// Store errors are passed through as is, nothing is retried here.
#[must_use]
pub struct SeriesStore<'c>(pub &'c Connection);

impl SeriesStore<'_> {
    /// Persist the value stamped with the current time.
    pub async fn write(&self, series_key: &str, value: f64) -> Result {
        self.insert(Utc::now(), series_key, value).await
    }

    #[instrument(skip_all, fields(series_key = series_key, value = value))]
    async fn insert(&self, created_at: DateTime<Utc>, series_key: &str, value: f64) -> Result {
        // language=sqlite
        const SQL: &str = r"
            INSERT INTO series_records (created_at_millis, series_key, value) VALUES (?1, ?2, ?3)
        ";

        debug!("inserting the record…");
        self.0
            .prepare_cached(SQL)
            .await?
            .execute((created_at.timestamp_millis(), series_key, value))
            .await
            .with_context(|| format!("failed to insert a record into `{series_key}`"))?;
        Ok(())
    }

    /// Records of the series created within the inclusive range, oldest first.
    #[instrument(skip_all, fields(series_key = series_key, interval = ?interval))]
    pub async fn query_range(
        &self,
        series_key: &str,
        interval: RangeInclusive<DateTime<Utc>>,
    ) -> Result<Vec<SeriesRecord>> {
        let sql = format!(
            // language=sqlite
            r"
                SELECT {} FROM series_records
                WHERE series_key = ?1 AND created_at_millis BETWEEN ?2 AND ?3
                ORDER BY created_at_millis, id
            ",
            SeriesRecord::COLUMNS,
        );
        let mut statement = self.0.prepare_cached(&sql).await?;
        let mut rows = statement
            .query((
                series_key,
                interval.start().timestamp_millis(),
                interval.end().timestamp_millis(),
            ))
            .await
            .with_context(|| format!("failed to query `{series_key}`"))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(SeriesRecord::from_row(&row)?);
        }
        debug!(n_records = records.len(), "fetched");
        Ok(records)
    }

    /// The most recent record of the series, `None` when the series is empty.
    #[instrument(skip_all, fields(series_key = series_key))]
    pub async fn query_latest(&self, series_key: &str) -> Result<Option<SeriesRecord>> {
        let sql = format!(
            // language=sqlite
            r"
                SELECT {} FROM series_records
                WHERE series_key = ?1
                ORDER BY created_at_millis DESC, id DESC
                LIMIT 1
            ",
            SeriesRecord::COLUMNS,
        );
        match self.0.prepare_cached(&sql).await?.query_row((series_key,)).await {
            Ok(row) => Ok(Some(SeriesRecord::from_row(&row)?)),
            Err(turso::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => {
                Err(anyhow::format_err!(error).context(format!("failed to query `{series_key}`")))
            }
        }
    }

    /// Delete the records of all the series created before the cutoff.
    ///
    /// Returns the number of the deleted records.
    #[instrument(skip_all, fields(cutoff = %cutoff))]
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        // `execute` would count the index changes as well.
        // language=sqlite
        const SQL: &str = "DELETE FROM series_records WHERE created_at_millis < ?1 RETURNING id";

        let mut statement = self.0.prepare_cached(SQL).await?;
        let mut rows = statement
            .query((cutoff.timestamp_millis(),))
            .await
            .context("failed to delete the old records")?;
        let mut n_deleted = 0;
        while rows.next().await?.is_some() {
            n_deleted += 1;
        }
        info!(n_deleted, "deleted the old records");
        Ok(n_deleted)
    }
}
