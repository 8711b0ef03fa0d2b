use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::{
    core::{
        gate::{CostGate, Direction},
        rate::RateSlot,
    },
    prelude::*,
    quantity::rate::KilowattHourRate,
    tables::build_rates_table,
};

#[derive(Parser)]
pub struct GateArgs {
    /// JSON file with the rate timeline sorted by start: `[{"start": "…", "value": 0.25}, …]`.
    #[clap(long = "rates-path", env = "RATES_PATH")]
    rates_path: PathBuf,

    /// Rate threshold, without it the gate never opens.
    #[clap(long, env = "THRESHOLD")]
    threshold: Option<KilowattHourRate>,

    #[clap(long, env = "DIRECTION", value_enum, default_value = "below")]
    direction: Direction,

    /// Evaluate at this moment instead of now.
    #[clap(long)]
    now: Option<DateTime<Utc>>,
}

impl GateArgs {
    #[instrument(skip_all, fields(direction = ?self.direction))]
    pub fn run(self) -> Result {
        let rates = read_rates(&self.rates_path)?;
        let now = self.now.unwrap_or_else(Utc::now);
        let decision = CostGate::builder()
            .maybe_threshold(self.threshold)
            .rates(&rates)
            .direction(self.direction)
            .now(now)
            .build()
            .evaluate();
        info!(decision.is_active, next_start = ?decision.next_start, "evaluated");

        println!("{}", build_rates_table(&rates, now, self.threshold, self.direction));
        if decision.is_active {
            println!("Active now");
        } else if let Some(next_start) = decision.next_start {
            println!("Inactive, next start at {next_start}");
        } else {
            println!("Inactive, no upcoming slot meets the threshold");
        }
        Ok(())
    }
}

fn read_rates(path: &Path) -> Result<Vec<RateSlot>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))?;
    let rates = parse_rates(&contents)
        .with_context(|| format!("failed to parse the rates from `{}`", path.display()))?;
    if !rates.is_sorted_by_key(|slot| slot.start) {
        warn!("the rates are not sorted by start, the prediction follows the file order");
    }
    info!(n_rates = rates.len(), "read the rates");
    Ok(rates)
}

fn parse_rates(contents: &str) -> Result<Vec<RateSlot>> {
    Ok(serde_json::from_str(contents)?)
}
