//! Payment settler.
//!
//! Pays each confirmed rental, one at a time, inside a single deadline
//! that covers the whole batch. The provider throttles rapid transfers
//! with a "sending too fast" rejection; those attempts are retried with
//! exponential backoff. Any other rejection fails that rental and moves
//! on to the next one.
//!
//! Per-rental state machine:
//!
//! ```text
//! Pending ──send──▶ Paid
//!    │  ├──────────▶ Failed            (any other error)
//!    │  └─rate-limit▶ Retrying(wait) ──sleep──▶ Pending
//!    └──────────────▶ Deferred         (deadline passed, checked on
//!                                       entering Pending or Retrying)
//! ```
//!
//! Once one rental is Deferred, settlement stops and every rental not yet
//! attempted is deferred with it. Deferred rentals are reported back to
//! the user for manual payment; nothing is persisted.

use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::SettlementConfig;
use crate::platforms::PaymentProvider;
use crate::types::{RentalRecord, SendMoneyRequest, SendMoneyResponse};

/// Leading text of the provider's throttling rejection.
pub const RATE_LIMIT_PREFIX: &str = "You are sending too fast.";

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Doubling retry interval with a ceiling: 2s, 4s, 8s, ... 60s, 60s.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let wait = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(wait)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PaidRental {
    pub rental: RentalRecord,
    pub transaction_id: Option<String>,
    /// Block explorer link, when the transaction lookup succeeded.
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FailedPayment {
    pub rental: RentalRecord,
    pub reason: String,
}

/// Outcome of settling a batch of rentals.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    pub paid: Vec<PaidRental>,
    pub failed: Vec<FailedPayment>,
    /// Rentals still owed payment when the deadline passed, in order.
    pub deferred: Vec<RentalRecord>,
}

impl SettlementReport {
    pub fn total_paid(&self) -> Decimal {
        self.paid.iter().map(|p| p.rental.amount).sum()
    }
}

#[derive(Debug)]
enum PaymentState {
    Pending,
    Retrying(Duration),
    Done(Settled),
}

/// Terminal payment states.
#[derive(Debug)]
enum Settled {
    Paid { transaction_id: Option<String> },
    Failed(String),
    Deferred,
}

// ---------------------------------------------------------------------------
// Settler
// ---------------------------------------------------------------------------

pub struct Settler<'a> {
    payments: &'a dyn PaymentProvider,
    config: SettlementConfig,
}

impl<'a> Settler<'a> {
    pub fn new(payments: &'a dyn PaymentProvider, config: SettlementConfig) -> Self {
        Self { payments, config }
    }

    /// Pay `rentals` sequentially, in order.
    pub async fn settle_all(&self, rentals: &[RentalRecord]) -> SettlementReport {
        let mut report = SettlementReport::default();
        if rentals.is_empty() {
            return report;
        }

        let started = Instant::now();
        info!(
            count = rentals.len(),
            deadline_secs = self.config.deadline().as_secs(),
            "Starting settlement"
        );

        for (idx, rental) in rentals.iter().enumerate() {
            match self.settle_one(rental, started).await {
                Settled::Paid { transaction_id } => {
                    let confirmation_url = match &transaction_id {
                        Some(id) => self.confirm(rental, id).await,
                        None => None,
                    };
                    report.paid.push(PaidRental {
                        rental: rental.clone(),
                        transaction_id,
                        confirmation_url,
                    });
                }
                Settled::Failed(reason) => {
                    warn!(
                        rental_id = rental.id,
                        amount = %rental.amount,
                        error = %reason,
                        "Unable to send payment"
                    );
                    report.failed.push(FailedPayment {
                        rental: rental.clone(),
                        reason,
                    });
                }
                Settled::Deferred => {
                    // Stops the whole batch, not just this rental.
                    report.deferred.extend(rentals[idx..].iter().cloned());
                    warn!(
                        deferred = report.deferred.len(),
                        "Settlement deadline exceeded, remaining rentals left unpaid"
                    );
                    break;
                }
            }
        }

        report
    }

    /// Drive one rental to a terminal state.
    async fn settle_one(&self, rental: &RentalRecord, started: Instant) -> Settled {
        let request = self.payment_request(rental);
        let mut backoff = Backoff::new(self.config.initial_backoff(), self.config.max_backoff());
        let mut state = PaymentState::Pending;

        loop {
            state = match state {
                PaymentState::Pending => {
                    if self.deadline_passed(started) {
                        PaymentState::Done(Settled::Deferred)
                    } else {
                        self.attempt(&request, &mut backoff).await
                    }
                }
                PaymentState::Retrying(wait) => {
                    if self.deadline_passed(started) {
                        PaymentState::Done(Settled::Deferred)
                    } else {
                        warn!(
                            rental_id = rental.id,
                            wait_secs = wait.as_secs(),
                            "Sending too fast, backing off"
                        );
                        sleep(wait).await;
                        PaymentState::Pending
                    }
                }
                PaymentState::Done(settled) => return settled,
            };
        }
    }

    async fn attempt(&self, request: &SendMoneyRequest, backoff: &mut Backoff) -> PaymentState {
        match self.payments.send_money(request).await {
            Ok(resp) if resp.success => {
                info!(
                    rental_id = %request.idem,
                    amount = %request.amount,
                    to = %request.to,
                    "BTC paid"
                );
                PaymentState::Done(Settled::Paid {
                    transaction_id: resp.transaction_id,
                })
            }
            Ok(resp) if is_rate_limited(&resp) => {
                PaymentState::Retrying(backoff.next().unwrap_or(self.config.max_backoff()))
            }
            Ok(resp) => PaymentState::Done(Settled::Failed(rejection_reason(&resp))),
            Err(e) => PaymentState::Done(Settled::Failed(format!("{e:#}"))),
        }
    }

    /// Best-effort lookup of the on-chain hash for a paid rental.
    async fn confirm(&self, rental: &RentalRecord, transaction_id: &str) -> Option<String> {
        sleep(self.config.settle_delay()).await;
        match self.payments.transaction_details(transaction_id).await {
            Ok(details) => {
                let url = format!("{}{}", self.config.explorer_url, details.hash);
                info!(rental_id = rental.id, url = %url, "Check transaction processing");
                Some(url)
            }
            Err(e) => {
                debug!(rental_id = rental.id, error = %e, "Transaction lookup failed");
                None
            }
        }
    }

    fn payment_request(&self, rental: &RentalRecord) -> SendMoneyRequest {
        SendMoneyRequest {
            amount: rental.amount.normalize().to_string(),
            to: rental.payment_address.clone(),
            user_fee: self.config.user_fee.normalize().to_string(),
            idem: rental.id.to_string(),
        }
    }

    fn deadline_passed(&self, started: Instant) -> bool {
        started.elapsed() > self.config.deadline()
    }
}

/// Whether the provider rejected the transfer for sending too fast.
pub fn is_rate_limited(resp: &SendMoneyResponse) -> bool {
    !resp.success
        && resp
            .errors
            .first()
            .is_some_and(|e| e.starts_with(RATE_LIMIT_PREFIX))
}

fn rejection_reason(resp: &SendMoneyResponse) -> String {
    if resp.errors.is_empty() {
        "payment rejected without an error message".to_string()
    } else {
        resp.errors.join("; ")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
