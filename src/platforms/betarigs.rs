//! Betarigs rig marketplace integration.
//!
//! Only the two calls the engine needs are modelled: paged listing of
//! available rigs and rental creation.
//!
//! Base URL: https://www.betarigs.com/api/v1
//! Auth: not required for listing; `X-Api-Key: {key}` for rentals.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::RigMarketplace;
use crate::config::MarketplaceConfig;
use crate::types::{Algorithm, Measure, PoolConfig, RentalDuration, RentalRecord, RigOffer};

const PLATFORM_NAME: &str = "betarigs";

// ---------------------------------------------------------------------------
// API types (Betarigs JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RigsPage {
    #[serde(default)]
    items: Vec<ApiRig>,
}

#[derive(Debug, Deserialize)]
struct ApiRig {
    id: u64,
    #[serde(default)]
    name: String,
    declared_speed: ApiMeasure,
    price: ApiPrice,
    #[serde(default)]
    rental_durations: Vec<ApiDuration>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiMeasure {
    value: Decimal,
    unit: String,
}

#[derive(Debug, Deserialize)]
struct ApiPrice {
    per_speed_unit: ApiMeasure,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiDuration {
    value: u32,
    unit: String,
}

#[derive(Debug, Serialize)]
struct RentalRequest<'a> {
    rig: RigRef,
    duration: ApiDuration,
    pool: ApiPool<'a>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RigRef {
    id: u64,
}

#[derive(Debug, Serialize)]
struct ApiPool<'a> {
    url: &'a str,
    worker_name: &'a str,
    worker_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RentalResponse {
    id: u64,
    rig: RigRef,
    payment: ApiPayment,
}

#[derive(Debug, Deserialize)]
struct ApiPayment {
    bitcoin: ApiBitcoinPayment,
}

#[derive(Debug, Deserialize)]
struct ApiBitcoinPayment {
    price: ApiMeasure,
    payment_address: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Betarigs marketplace client.
pub struct BetarigsClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl BetarigsClient {
    pub fn new(api_key: SecretString, config: &MarketplaceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("AUTORENT/0.1.0")
            .build()
            .context("Failed to build HTTP client for Betarigs")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn to_offer(rig: ApiRig) -> RigOffer {
        RigOffer {
            id: rig.id,
            name: rig.name,
            declared_speed: Measure {
                value: rig.declared_speed.value,
                unit: rig.declared_speed.unit,
            },
            price: Measure {
                value: rig.price.per_speed_unit.value,
                unit: rig.price.per_speed_unit.unit,
            },
            rental_durations: rig
                .rental_durations
                .into_iter()
                .map(|d| RentalDuration {
                    value: d.value,
                    unit: d.unit,
                })
                .collect(),
        }
    }

    fn to_rental(resp: RentalResponse) -> RentalRecord {
        RentalRecord {
            id: resp.id,
            rig_id: resp.rig.id,
            amount: resp.payment.bitcoin.price.value,
            payment_address: resp.payment.bitcoin.payment_address,
        }
    }
}

// ---------------------------------------------------------------------------
// RigMarketplace trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RigMarketplace for BetarigsClient {
    async fn list_available(&self, algorithm: Algorithm, page: u32) -> Result<Vec<RigOffer>> {
        let url = format!(
            "{}/rigs.json?algorithm={}&status=available&page={}",
            self.base_url,
            algorithm.code(),
            page,
        );

        debug!(url = %url, "Fetching Betarigs listing page");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Betarigs listing request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Betarigs listing error {status}: {body}");
        }

        let page_body: RigsPage = resp
            .json()
            .await
            .context("Failed to parse Betarigs rigs response")?;

        Ok(page_body.items.into_iter().map(Self::to_offer).collect())
    }

    async fn reserve(
        &self,
        rig_id: u64,
        duration_hours: u32,
        pool: &PoolConfig,
    ) -> Result<RentalRecord> {
        let body = RentalRequest {
            rig: RigRef { id: rig_id },
            duration: ApiDuration {
                value: duration_hours,
                unit: "hour".to_string(),
            },
            pool: ApiPool {
                url: &pool.url,
                worker_name: &pool.worker_name,
                worker_password: &pool.worker_password,
            },
        };

        let resp = self
            .http
            .post(format!("{}/rental.json", self.base_url))
            .header("X-Api-Key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Betarigs rental request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Betarigs rental failed {status}: {body}");
        }

        let rental: RentalResponse = resp
            .json()
            .await
            .context("Failed to parse Betarigs rental response")?;

        info!(rental_id = rental.id, rig_id, "Betarigs rental created");

        Ok(Self::to_rental(rental))
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
