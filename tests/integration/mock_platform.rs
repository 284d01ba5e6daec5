//! Mock platforms for integration testing.
//!
//! Deterministic `RigMarketplace` and `PaymentProvider` implementations
//! that serve scripted listings and payment responses, and record every
//! call. Everything stays in memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use autorent::platforms::{PaymentProvider, RigMarketplace};
use autorent::types::*;

pub const TOO_FAST: &str =
    "You are sending too fast.  Please wait for some transactions to confirm before sending more.";

/// Build a rig priced in BTC/Mh/day, rentable for 3 or 6 hours.
pub fn rig(id: u64, speed_mhs: Decimal, price: Decimal) -> RigOffer {
    RigOffer {
        id,
        name: format!("MOCK-RIG-{id}"),
        declared_speed: Measure::new(speed_mhs, "Mh/s"),
        price: Measure::new(price, "BTC/Mh/day"),
        rental_durations: vec![RentalDuration::hours(3), RentalDuration::hours(6)],
    }
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

/// A mock rig marketplace.
///
/// Listing pages are fixed at construction; reservations succeed unless
/// the rig id was marked as failing.
pub struct MockMarketplace {
    pages: Vec<Vec<RigOffer>>,
    failing_rigs: Vec<u64>,
    pages_requested: Arc<Mutex<Vec<u32>>>,
    reservations: Arc<Mutex<Vec<u64>>>,
}

impl MockMarketplace {
    pub fn with_pages(pages: Vec<Vec<RigOffer>>) -> Self {
        Self {
            pages,
            failing_rigs: Vec::new(),
            pages_requested: Arc::new(Mutex::new(Vec::new())),
            reservations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make reservations of `rig_id` fail.
    pub fn fail_rig(mut self, rig_id: u64) -> Self {
        self.failing_rigs.push(rig_id);
        self
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.pages_requested.lock().unwrap().clone()
    }

    /// Rig ids for which a reservation call was made.
    pub fn reservations(&self) -> Vec<u64> {
        self.reservations.lock().unwrap().clone()
    }
}

#[async_trait]
impl RigMarketplace for MockMarketplace {
    async fn list_available(&self, _algorithm: Algorithm, page: u32) -> Result<Vec<RigOffer>> {
        self.pages_requested.lock().unwrap().push(page);
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }

    async fn reserve(
        &self,
        rig_id: u64,
        _duration_hours: u32,
        _pool: &PoolConfig,
    ) -> Result<RentalRecord> {
        self.reservations.lock().unwrap().push(rig_id);
        if self.failing_rigs.contains(&rig_id) {
            return Err(anyhow!("rig {rig_id} is already rented"));
        }
        Ok(RentalRecord {
            id: 90_000 + rig_id,
            rig_id,
            amount: Decimal::new(1, 3), // 0.001
            payment_address: format!("mock-addr-{rig_id}"),
        })
    }

    fn name(&self) -> &str {
        "mock-market"
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A mock bitcoin wallet.
///
/// `send_money` replies are taken from a script in order; once the script
/// is exhausted every transfer succeeds.
pub struct MockWallet {
    balance: Decimal,
    script: Mutex<VecDeque<SendMoneyResponse>>,
    sent: Arc<Mutex<Vec<SendMoneyRequest>>>,
    balance_checks: Arc<Mutex<u32>>,
}

impl MockWallet {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance,
            script: Mutex::new(VecDeque::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            balance_checks: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue `n` rate-limit rejections.
    pub fn rate_limited(self, n: usize) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for _ in 0..n {
                script.push_back(SendMoneyResponse {
                    success: false,
                    errors: vec![TOO_FAST.to_string()],
                    transaction_id: None,
                });
            }
        }
        self
    }

    pub fn sent(&self) -> Vec<SendMoneyRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn balance_checks(&self) -> u32 {
        *self.balance_checks.lock().unwrap()
    }
}

#[async_trait]
impl PaymentProvider for MockWallet {
    async fn primary_balance(&self) -> Result<Decimal> {
        *self.balance_checks.lock().unwrap() += 1;
        Ok(self.balance)
    }

    async fn send_money(&self, request: &SendMoneyRequest) -> Result<SendMoneyResponse> {
        self.sent.lock().unwrap().push(request.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| SendMoneyResponse {
            success: true,
            errors: Vec::new(),
            transaction_id: Some(format!("tx-{}", request.idem)),
        }))
    }

    async fn transaction_details(&self, transaction_id: &str) -> Result<TransactionDetails> {
        Ok(TransactionDetails {
            id: transaction_id.to_string(),
            hash: format!("hash-{transaction_id}"),
        })
    }

    fn name(&self) -> &str {
        "mock-wallet"
    }
}
