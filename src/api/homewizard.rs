use std::time::Duration;

use bon::bon;
use reqwest::Url;
use serde::Deserialize;

use crate::{prelude::*, quantity::power::Watts};

/// HomeWizard P1 meter, polled over its local data API.
pub struct P1Meter {
    client: reqwest::Client,
    data_url: Url,
}

#[bon]
impl P1Meter {
    /// The data URL is the meter's `/api/v1/data` endpoint.
    #[builder]
    pub fn new(
        data_url: Url,
        #[builder(default = Duration::from_secs(10))] timeout: Duration,
    ) -> Result<Self> {
        ensure!(!timeout.is_zero(), "the meter timeout must be non-zero");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build the meter client")?;
        Ok(Self { client, data_url })
    }
}

impl P1Meter {
    /// Net active power of the site: positive while importing from the grid.
    #[instrument(skip_all, fields(data_url = %self.data_url))]
    pub async fn active_power(&self) -> Result<Watts> {
        let response = self
            .client
            .get(self.data_url.clone())
            .send()
            .await
            .with_context(|| format!("failed to poll `{}`", self.data_url))?
            .error_for_status()
            .with_context(|| format!("`{}` has refused the request", self.data_url))?;
        let data: MeterData = response.json().await.context("unexpected meter response")?;
        debug!(active_power = ?data.active_power);
        Ok(data.active_power)
    }
}

/// Fields of the data endpoint response that the site power logging needs.
#[derive(Deserialize)]
struct MeterData {
    #[serde(rename = "active_power_w")]
    active_power: Watts,
}
