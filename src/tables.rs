use chrono::{DateTime, Utc};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        gate::Direction,
        rate::{RateSlot, rate_at},
    },
    db::record::SeriesRecord,
    quantity::rate::KilowattHourRate,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

/// Rates meeting the threshold are green, the slot covering `now` is bold.
pub fn build_rates_table(
    rates: &[RateSlot],
    now: DateTime<Utc>,
    threshold: Option<KilowattHourRate>,
    direction: Direction,
) -> Table {
    let current = rate_at(rates, now);
    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "Rate"]);
    for slot in rates {
        let is_met = threshold.is_some_and(|threshold| direction.is_met(slot.value, threshold));
        let mut rate = Cell::new(slot.value)
            .set_alignment(CellAlignment::Right)
            .fg(if is_met { Color::Green } else { Color::Red });
        if current.is_some_and(|current| std::ptr::eq(current, slot)) {
            rate = rate.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![
            Cell::new(slot.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(slot.start.format("%H:%M")),
            rate,
        ]);
    }
    table
}

pub fn build_records_table(records: &[SeriesRecord]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["ID", "Created at", "Series", "Value"]);
    for record in records {
        table.add_row(vec![
            Cell::new(record.id).add_attribute(Attribute::Dim),
            Cell::new(record.created_at.format("%b %d %H:%M:%S")),
            Cell::new(&record.series_key),
            Cell::new(format!("{:.3}", record.value)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
