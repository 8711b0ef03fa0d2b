//! Energy cost gate: is the rate condition met right now, and if not, when will it be?

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    core::rate::{RateSlot, rate_at},
    quantity::rate::KilowattHourRate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum, Serialize, Deserialize)]
pub enum Direction {
    /// The condition is met when the rate is at or below the threshold.
    #[serde(rename = "below")]
    Below,

    /// The condition is met when the rate is at or above the threshold.
    #[serde(rename = "above")]
    Above,
}

impl Direction {
    #[must_use]
    pub fn is_met(self, rate: KilowattHourRate, threshold: KilowattHourRate) -> bool {
        match self {
            Self::Below => rate <= threshold,
            Self::Above => rate >= threshold,
        }
    }
}

#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the rate covering the current moment meets the threshold.
    #[serde(rename = "isActive")]
    pub is_active: bool,

    /// Start of the first upcoming slot that meets the threshold.
    ///
    /// Always `None` while the gate is active.
    #[serde(rename = "nextStart")]
    pub next_start: Option<DateTime<Utc>>,
}

/// Stateless evaluation of a rate timeline against an optional threshold.
///
/// Missing data never fails the evaluation: an absent threshold, an empty timeline,
/// or a moment that no slot covers all make the gate inactive.
#[derive(Builder)]
pub struct CostGate<'a> {
    /// No threshold means that the condition can never be met.
    threshold: Option<KilowattHourRate>,

    /// Timeline sorted by the slot start.
    rates: &'a [RateSlot],

    direction: Direction,

    #[builder(default = Utc::now())]
    now: DateTime<Utc>,
}

impl CostGate<'_> {
    pub fn evaluate(&self) -> Decision {
        let is_active = self.is_active();
        let next_start = if is_active { None } else { self.next_start() };
        Decision { is_active, next_start }
    }

    fn is_active(&self) -> bool {
        let Some(threshold) = self.threshold else {
            return false;
        };
        rate_at(self.rates, self.now)
            .is_some_and(|slot| self.direction.is_met(slot.value, threshold))
    }

    /// First match in the timeline order, not the best rate.
    fn next_start(&self) -> Option<DateTime<Utc>> {
        let threshold = self.threshold?;
        self.rates
            .iter()
            .find(|slot| slot.start > self.now && self.direction.is_met(slot.value, threshold))
            .map(|slot| slot.start)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    /// `(t0, 0.10), (t1, 0.30), (t2, 0.05)` with hourly slots.
    fn timeline(t0: DateTime<Utc>) -> Vec<RateSlot> {
        vec![
            RateSlot::new(t0, KilowattHourRate(0.10)),
            RateSlot::new(t0 + TimeDelta::hours(1), KilowattHourRate(0.30)),
            RateSlot::new(t0 + TimeDelta::hours(2), KilowattHourRate(0.05)),
        ]
    }

    fn evaluate(
        threshold: Option<f64>,
        rates: &[RateSlot],
        direction: Direction,
        now: DateTime<Utc>,
    ) -> Decision {
        CostGate::builder()
            .maybe_threshold(threshold.map(KilowattHourRate))
            .rates(rates)
            .direction(direction)
            .now(now)
            .build()
            .evaluate()
    }

    #[test]
    fn active_in_cheap_slot() {
        let t0 = Utc::now();
        let decision =
            evaluate(Some(0.20), &timeline(t0), Direction::Below, t0 + TimeDelta::minutes(30));
        assert_eq!(decision, Decision { is_active: true, next_start: None });
    }

    #[test]
    fn predicts_next_cheap_slot() {
        let t0 = Utc::now();
        let decision =
            evaluate(Some(0.20), &timeline(t0), Direction::Below, t0 + TimeDelta::minutes(90));
        assert!(!decision.is_active);
        assert_eq!(decision.next_start, Some(t0 + TimeDelta::hours(2)));
    }

    #[test]
    fn above_direction() {
        let t0 = Utc::now();
        let rates = timeline(t0);

        let decision = evaluate(Some(0.25), &rates, Direction::Above, t0 + TimeDelta::minutes(90));
        assert_eq!(decision, Decision { is_active: true, next_start: None });

        let decision = evaluate(Some(0.25), &rates, Direction::Above, t0 + TimeDelta::minutes(10));
        assert_eq!(decision.next_start, Some(t0 + TimeDelta::hours(1)));
    }

    #[test]
    fn threshold_is_inclusive() {
        let t0 = Utc::now();
        let rates = timeline(t0);
        assert!(evaluate(Some(0.30), &rates, Direction::Below, t0 + TimeDelta::hours(1)).is_active);
        assert!(evaluate(Some(0.30), &rates, Direction::Above, t0 + TimeDelta::hours(1)).is_active);
    }

    #[test]
    fn first_match_wins_over_best_match() {
        let t0 = Utc::now();
        let rates = vec![
            RateSlot::new(t0, KilowattHourRate(0.40)),
            RateSlot::new(t0 + TimeDelta::hours(1), KilowattHourRate(0.15)),
            RateSlot::new(t0 + TimeDelta::hours(2), KilowattHourRate(0.01)),
        ];
        let decision = evaluate(Some(0.20), &rates, Direction::Below, t0);
        assert_eq!(decision.next_start, Some(t0 + TimeDelta::hours(1)));
    }

    #[test]
    fn slot_starting_now_is_not_upcoming() {
        let t0 = Utc::now();
        let rates = vec![
            RateSlot::new(t0 - TimeDelta::hours(1), KilowattHourRate(0.40)),
            RateSlot::new(t0, KilowattHourRate(0.40)),
        ];
        assert_eq!(
            evaluate(Some(0.20), &rates, Direction::Below, t0),
            Decision { is_active: false, next_start: None },
        );
    }

    #[test]
    fn uncovered_now_still_predicts() {
        let t0 = Utc::now();
        let decision =
            evaluate(Some(0.20), &timeline(t0), Direction::Below, t0 - TimeDelta::hours(1));
        assert!(!decision.is_active);
        assert_eq!(decision.next_start, Some(t0));
    }

    #[test]
    fn no_threshold_is_never_active() {
        let t0 = Utc::now();
        assert_eq!(
            evaluate(None, &timeline(t0), Direction::Below, t0),
            Decision { is_active: false, next_start: None },
        );
    }

    #[test]
    fn empty_timeline_is_never_active() {
        assert_eq!(
            evaluate(Some(1.0), &[], Direction::Below, Utc::now()),
            Decision { is_active: false, next_start: None },
        );
    }

    #[test]
    fn active_implies_covering_slot_meets_threshold() {
        let t0 = Utc::now();
        let rates = timeline(t0);
        for minutes in (-30..=180).step_by(15) {
            let now = t0 + TimeDelta::minutes(minutes);
            for direction in [Direction::Below, Direction::Above] {
                let decision = evaluate(Some(0.10), &rates, direction, now);
                if decision.is_active {
                    let slot = rate_at(&rates, now).expect("active gate must have a covering slot");
                    assert!(direction.is_met(slot.value, KilowattHourRate(0.10)));
                    assert_eq!(decision.next_start, None);
                }
            }
        }
    }
}
