//! Coinbase wallet integration.
//!
//! Covers the three calls settlement needs: primary account balance,
//! send money, and transaction lookup.
//!
//! Base URL: https://coinbase.com/api/v1
//! Auth: every request carries `ACCESS_KEY`, `ACCESS_NONCE` and
//! `ACCESS_SIGNATURE = hex(HMAC-SHA256(secret, nonce + url + body))`.
//! Nonces must strictly increase per key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::PaymentProvider;
use crate::config::PaymentsConfig;
use crate::types::{RentError, SendMoneyRequest, SendMoneyResponse, TransactionDetails};

type HmacSha256 = Hmac<Sha256>;

const PLATFORM_NAME: &str = "coinbase";

// ---------------------------------------------------------------------------
// API types (Coinbase JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    amount: String,
    #[serde(default)]
    currency: String,
}

#[derive(Debug, Serialize)]
struct SendMoneyBody<'a> {
    transaction: &'a SendMoneyRequest,
}

#[derive(Debug, Deserialize)]
struct ApiSendMoneyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    transaction: Option<ApiTransactionRef>,
}

#[derive(Debug, Deserialize)]
struct ApiTransactionRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    transaction: ApiTransaction,
}

#[derive(Debug, Deserialize)]
struct ApiTransaction {
    id: String,
    /// Blockchain hash; absent until the transaction is broadcast.
    #[serde(default)]
    hsh: Option<String>,
}

impl From<ApiSendMoneyResponse> for SendMoneyResponse {
    fn from(r: ApiSendMoneyResponse) -> Self {
        SendMoneyResponse {
            success: r.success,
            errors: r.errors,
            transaction_id: r.transaction.map(|t| t.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Coinbase wallet client.
pub struct CoinbaseClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    api_secret: SecretString,
    nonce: AtomicU64,
}

impl CoinbaseClient {
    pub fn new(
        api_key: SecretString,
        api_secret: SecretString,
        config: &PaymentsConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("AUTORENT/0.1.0")
            .build()
            .context("Failed to build HTTP client for Coinbase")?;

        let seed = chrono::Utc::now().timestamp_micros().max(0) as u64;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            nonce: AtomicU64::new(seed),
        })
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Hex HMAC-SHA256 of `nonce + url + body`.
    fn sign(secret: &str, nonce: u64, url: &str, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .context("Invalid Coinbase API secret")?;
        mac.update(nonce.to_string().as_bytes());
        mac.update(url.as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Send a signed request and return status + raw body.
    async fn signed(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{}", self.base_url, path);
        let body = body.unwrap_or_default();
        let nonce = self.next_nonce();
        let signature = Self::sign(self.api_secret.expose_secret(), nonce, &url, &body)?;

        debug!(url = %url, nonce, "Coinbase request");

        let mut req = self
            .http
            .request(method, &url)
            .header("ACCESS_KEY", self.api_key.expose_secret())
            .header("ACCESS_NONCE", nonce.to_string())
            .header("ACCESS_SIGNATURE", signature);
        if !body.is_empty() {
            req = req
                .header("Content-Type", "application/json")
                .body(body);
        }

        let resp = req.send().await.context("Coinbase request failed")?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("Failed to read Coinbase response body")?;
        Ok((status, text))
    }

    fn parse_balance(body: &str) -> Result<Decimal> {
        let balance: BalanceResponse =
            serde_json::from_str(body).context("Failed to parse Coinbase balance response")?;
        if !balance.currency.is_empty() && balance.currency != "BTC" {
            return Err(RentError::Platform {
                platform: PLATFORM_NAME.to_string(),
                message: format!("primary account is in {}, expected BTC", balance.currency),
            }
            .into());
        }
        Decimal::from_str(balance.amount.trim())
            .with_context(|| format!("Invalid Coinbase balance amount: {}", balance.amount))
    }

    /// Rejections (including rate limiting) come back as a readable
    /// `{success: false, errors: [...]}` body, sometimes with a non-2xx
    /// status. Those are returned as `Ok`. A non-2xx reply carrying no
    /// error messages is a transport-level failure.
    fn parse_send_money(status: StatusCode, body: &str) -> Result<SendMoneyResponse> {
        match serde_json::from_str::<ApiSendMoneyResponse>(body) {
            Ok(parsed) if status.is_success() || !parsed.errors.is_empty() => Ok(parsed.into()),
            Ok(_) => anyhow::bail!("Coinbase send_money failed {status}: {body}"),
            Err(e) if status.is_success() => Err(anyhow::Error::new(e)
                .context("Failed to parse Coinbase send_money response")),
            Err(_) => anyhow::bail!("Coinbase send_money failed {status}: {body}"),
        }
    }
}

// ---------------------------------------------------------------------------
// PaymentProvider trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PaymentProvider for CoinbaseClient {
    async fn primary_balance(&self) -> Result<Decimal> {
        let (status, body) = self.signed(Method::GET, "/account/balance", None).await?;
        if !status.is_success() {
            anyhow::bail!("Coinbase balance check failed {status}: {body}");
        }
        Self::parse_balance(&body)
    }

    async fn send_money(&self, request: &SendMoneyRequest) -> Result<SendMoneyResponse> {
        let payload = serde_json::to_string(&SendMoneyBody { transaction: request })
            .context("Failed to serialise send_money body")?;

        let (status, body) = self
            .signed(Method::POST, "/transactions/send_money", Some(payload))
            .await?;

        Self::parse_send_money(status, &body)
    }

    async fn transaction_details(&self, transaction_id: &str) -> Result<TransactionDetails> {
        let path = format!("/transactions/{}", urlencoding::encode(transaction_id));
        let (status, body) = self.signed(Method::GET, &path, None).await?;
        if !status.is_success() {
            anyhow::bail!("Coinbase transaction lookup failed {status}: {body}");
        }

        let parsed: TransactionResponse = serde_json::from_str(&body)
            .context("Failed to parse Coinbase transaction response")?;
        let hash = parsed
            .transaction
            .hsh
            .context("Transaction has no blockchain hash yet")?;

        Ok(TransactionDetails {
            id: parsed.transaction.id,
            hash,
        })
    }

    fn name(&self) -> &str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
