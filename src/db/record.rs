use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turso::{Row, Value};

use crate::prelude::*;

/// Persisted series point.
///
/// `created_at` is the persistence time, which may lag behind the moment the value was observed.
#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub id: i64,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "seriesKey")]
    pub series_key: String,

    pub value: f64,
}

impl SeriesRecord {
    /// Columns in the order [`SeriesRecord::from_row`] expects them.
    pub const COLUMNS: &'static str = "id, created_at_millis, series_key, value";

    pub fn from_row(row: &Row) -> Result<Self> {
        let Value::Integer(id) = row.get_value(0)? else {
            bail!("`id` is not an integer");
        };
        let Value::Integer(created_at_millis) = row.get_value(1)? else {
            bail!("`created_at_millis` is not an integer");
        };
        let Value::Text(series_key) = row.get_value(2)? else {
            bail!("`series_key` is not a text");
        };
        #[allow(clippy::cast_precision_loss)]
        let value = match row.get_value(3)? {
            Value::Real(value) => value,
            Value::Integer(value) => value as f64,
            _ => bail!("`value` is not a number"),
        };
        Ok(Self {
            id,
            created_at: DateTime::from_timestamp_millis(created_at_millis)
                .with_context(|| format!("`{created_at_millis}` is out of range"))?,
            series_key,
            value,
        })
    }
}

/// Keep the most recent `limit` records of the chronologically sorted ones.
///
/// Zero or no limit keeps everything.
pub fn keep_latest<T>(mut records: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) if limit != 0 && limit < records.len() => {
            records.split_off(records.len() - limit)
        }
        _ => records,
    }
}
