#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod db;
mod prelude;
mod quantity;
mod scheduler;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();

    match args.command {
        Command::Serve(args) => {
            args.run().await?;
        }
        Command::Gate(args) => {
            args.run()?;
        }
        Command::Records(args) => {
            args.run().await?;
        }
        Command::Cleanup(args) => {
            args.run().await?;
        }
    }

    info!("done!");
    Ok(())
}
