use std::{sync::Arc, time::Duration};

use clap::Parser;
use reqwest::Url;
use tokio::{
    net::TcpListener,
    time::{MissedTickBehavior, interval},
};

use crate::{
    api::{
        homewizard::P1Meter,
        server::{self, AppState},
    },
    cli::{db::DbArgs, parse_non_zero_duration},
    prelude::*,
    quantity::power::Kilowatts,
    scheduler::SnapshotScheduler,
};

#[derive(Parser)]
pub struct ServeArgs {
    #[clap(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:7070")]
    bind_address: String,

    /// Series key to log the site power under, for example, the site name.
    #[clap(long = "site", env = "SITE")]
    site: String,

    /// HomeWizard P1 meter data endpoint, for example, `http://p1meter/api/v1/data`.
    #[clap(long, env = "METER_URL")]
    meter_url: Url,

    #[clap(
        long,
        env = "METER_POLLING_INTERVAL",
        default_value = "10s",
        value_parser = parse_non_zero_duration
    )]
    meter_polling_interval: humantime::Duration,

    /// Persist the latest measurement this often.
    #[clap(
        long,
        env = "SNAPSHOT_INTERVAL",
        default_value = "1min",
        value_parser = parse_non_zero_duration
    )]
    snapshot_interval: humantime::Duration,

    #[clap(
        long,
        env = "METER_TIMEOUT",
        default_value = "10s",
        value_parser = parse_non_zero_duration
    )]
    meter_timeout: humantime::Duration,

    #[clap(flatten)]
    db: DbArgs,
}

impl ServeArgs {
    pub async fn run(self) -> Result {
        let db = self.db.connect().await?;
        let meter =
            P1Meter::builder().data_url(self.meter_url).timeout(self.meter_timeout.into()).build()?;
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .with_context(|| format!("failed to bind to `{}`", self.bind_address))?;

        let scheduler = SnapshotScheduler::new(db.clone(), self.snapshot_interval.into())?;
        let scheduler = Arc::new(scheduler);
        scheduler.start();
        let poller = tokio::spawn(poll_meter(
            meter,
            Arc::clone(&scheduler),
            self.site,
            self.meter_polling_interval.into(),
        ));

        let state = Arc::new(AppState { db, scheduler: Arc::clone(&scheduler) });
        let result = server::serve(listener, state, shutdown_signal()).await;

        poller.abort();
        scheduler.stop().await;
        result
    }
}

/// Push the meter's active power into the scheduler until aborted.
#[instrument(skip_all, fields(site = %site))]
async fn poll_meter(
    meter: P1Meter,
    scheduler: Arc<SnapshotScheduler>,
    site: String,
    polling_interval: Duration,
) {
    let mut interval = interval(polling_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match meter.active_power().await {
            Ok(active_power) => {
                scheduler.update_measurement(&site, Kilowatts::from(active_power).0);
            }
            Err(error) => {
                warn!("failed to read the meter: {error:#}");
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {error:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!("failed to install the SIGTERM handler: {error:#}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutting down…");
}
