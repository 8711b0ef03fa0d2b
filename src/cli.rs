mod cleanup;
mod db;
mod gate;
mod records;
mod serve;

use clap::{Parser, Subcommand};

use crate::{
    cli::{cleanup::CleanupArgs, gate::GateArgs, records::RecordsArgs, serve::ServeArgs},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: log the site power and serve the administrative API.
    #[clap(name = "serve")]
    Serve(Box<ServeArgs>),

    /// Check whether the energy rate meets the threshold, and when it will next.
    #[clap(name = "gate")]
    Gate(Box<GateArgs>),

    /// Print the recorded series.
    #[clap(name = "records")]
    Records(Box<RecordsArgs>),

    /// Delete the old records.
    #[clap(name = "cleanup")]
    Cleanup(Box<CleanupArgs>),
}

/// Parse a human-readable duration, refusing zero which no timer accepts.
fn parse_non_zero_duration(value: &str) -> Result<humantime::Duration> {
    let duration: humantime::Duration = value.parse()?;
    ensure!(!duration.is_zero(), "the duration must be non-zero");
    Ok(duration)
}
