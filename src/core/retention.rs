use chrono::{DateTime, TimeDelta, Utc};

pub const DEFAULT_DAYS_TO_KEEP: i64 = 30;

/// Records created before the returned moment are subject to deletion.
///
/// Non-positive `days_to_keep` falls back to [`DEFAULT_DAYS_TO_KEEP`].
/// Returns `None` when the cutoff is out of the representable range.
#[must_use]
pub fn retention_cutoff(now: DateTime<Utc>, days_to_keep: i64) -> Option<DateTime<Utc>> {
    let days_to_keep = if days_to_keep > 0 { days_to_keep } else { DEFAULT_DAYS_TO_KEEP };
    now.checked_sub_signed(TimeDelta::try_days(days_to_keep)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_cutoff_ok() {
        let now = Utc::now();
        assert_eq!(retention_cutoff(now, 7), Some(now - TimeDelta::days(7)));
    }

    #[test]
    fn non_positive_falls_back_to_default() {
        let now = Utc::now();
        assert_eq!(retention_cutoff(now, 0), Some(now - TimeDelta::days(30)));
        assert_eq!(retention_cutoff(now, -5), Some(now - TimeDelta::days(30)));
    }

    #[test]
    fn out_of_range_is_none() {
        assert_eq!(retention_cutoff(Utc::now(), i64::MAX), None);
    }
}
