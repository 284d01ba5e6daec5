//! Platform integrations.
//!
//! Defines the two collaborator traits the engine consumes and provides
//! HTTP implementations for:
//! - Betarigs — rig marketplace (listing, reservation)
//! - Coinbase — bitcoin wallet (balance, send money, transaction lookup)
//!
//! Both clients are stateless per call and safe to share across the
//! concurrent reservation tasks.

pub mod betarigs;
pub mod coinbase;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{
    Algorithm, PoolConfig, RentalRecord, RigOffer, SendMoneyRequest, SendMoneyResponse,
    TransactionDetails,
};

/// Abstraction over a rig rental marketplace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RigMarketplace: Send + Sync {
    /// Fetch one page (1-based) of rigs currently available for `algorithm`.
    /// An empty page means the listing is exhausted.
    async fn list_available(&self, algorithm: Algorithm, page: u32) -> Result<Vec<RigOffer>>;

    /// Reserve a rig for `duration_hours`, pointed at `pool`.
    async fn reserve(
        &self,
        rig_id: u64,
        duration_hours: u32,
        pool: &PoolConfig,
    ) -> Result<RentalRecord>;

    /// Marketplace name for logging.
    fn name(&self) -> &str;
}

/// Abstraction over a bitcoin payment provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// BTC balance of the primary account.
    async fn primary_balance(&self) -> Result<Decimal>;

    /// Submit a transfer.
    ///
    /// A provider-side rejection that comes back with a readable body
    /// (e.g. rate limiting) is returned as `Ok` with `success == false`
    /// so the caller can inspect `errors`. Transport failures are `Err`.
    async fn send_money(&self, request: &SendMoneyRequest) -> Result<SendMoneyResponse>;

    /// Look up a transaction by provider id.
    async fn transaction_details(&self, transaction_id: &str) -> Result<TransactionDetails>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
