use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quantity::rate::KilowattHourRate;

/// Energy rate valid from its start until the next slot's start.
///
/// The last slot of a timeline stays valid indefinitely.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSlot {
    pub start: DateTime<Utc>,
    pub value: KilowattHourRate,
}

impl RateSlot {
    pub const fn new(start: DateTime<Utc>, value: KilowattHourRate) -> Self {
        Self { start, value }
    }
}

/// Find the slot that covers the specified moment.
///
/// The timeline is expected to be sorted by the slot start, it is never sorted here.
pub fn rate_at(rates: &[RateSlot], at: DateTime<Utc>) -> Option<&RateSlot> {
    rates.iter().enumerate().find_map(|(index, slot)| {
        let is_before_next = rates.get(index + 1).is_none_or(|next| at < next.start);
        (slot.start <= at && is_before_next).then_some(slot)
    })
}
