//! Run controller — search → affordability check → reserve → pay.
//!
//! One call to [`run`] is one complete batch. Collaborators are passed in
//! through [`RunContext`]; nothing here touches global state.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::config::SettlementConfig;
use crate::engine::matcher::RigMatcher;
use crate::engine::reserver::{ReservationTally, Reserver};
use crate::engine::settler::{SettlementReport, Settler};
use crate::platforms::{PaymentProvider, RigMarketplace};
use crate::types::{PoolConfig, RentError, SearchCriteria, SelectionResult};

/// Everything a run needs from the outside world, built once at startup.
#[derive(Clone)]
pub struct RunContext {
    pub marketplace: Arc<dyn RigMarketplace>,
    pub payments: Arc<dyn PaymentProvider>,
    pub settlement: SettlementConfig,
}

/// User input for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub criteria: SearchCriteria,
    pub pool: PoolConfig,
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// No rig matched; nothing was reserved or paid.
    NothingFound,
    Completed(RunReport),
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub selection: SelectionResult,
    /// Total rent plus the per-transaction fee budget.
    pub required_funds: Decimal,
    pub balance: Decimal,
    pub reservations: ReservationTally,
    pub settlement: SettlementReport,
}

impl RunRequest {
    /// Reject inputs that cannot produce a meaningful search.
    pub fn validate(&self) -> Result<(), RentError> {
        let c = &self.criteria;
        if c.speed_mhs <= Decimal::ZERO {
            return Err(RentError::Config("--mhs must be greater than 0".into()));
        }
        if c.max_price <= Decimal::ZERO {
            return Err(RentError::Config("--maxprice must be greater than 0".into()));
        }
        if c.duration_hours == 0 {
            return Err(RentError::Config("--duration must be at least 1 hour".into()));
        }
        if self.pool.url.trim().is_empty() {
            return Err(RentError::Config("--poolurl must not be empty".into()));
        }
        if self.pool.worker_name.trim().is_empty() {
            return Err(RentError::Config("--wname must not be empty".into()));
        }
        Ok(())
    }
}

/// Rent budget plus one fee estimate per transaction.
pub fn required_funds(selection: &SelectionResult, tx_fee_estimate: Decimal) -> Decimal {
    selection.total_price + tx_fee_estimate * Decimal::from(selection.len())
}

/// Execute one complete run.
pub async fn run(ctx: &RunContext, request: &RunRequest) -> Result<RunOutcome> {
    request.validate()?;
    let criteria = &request.criteria;

    if request.dry_run {
        info!("Running in dry run mode");
    }

    // 1. Search
    let selection = RigMatcher::new(ctx.marketplace.as_ref())
        .select(criteria)
        .await
        .context("while searching matching rigs")?;

    if selection.is_empty() {
        info!("Sorry, found nothing :(");
        return Ok(RunOutcome::NothingFound);
    }

    info!(
        total_speed = %selection.total_speed.normalize(),
        hours = criteria.duration_hours,
        total_price = %selection.total_price.round_dp(8).normalize(),
        avg_price = %selection.average_price(criteria.duration_hours).round_dp(8).normalize(),
        rigs = selection.len(),
        "Found matching rigs (avg price in BTC/Mh/day)"
    );

    // 2. Affordability
    let balance = ctx
        .payments
        .primary_balance()
        .await
        .context("Fail to get your current account balance")?;

    let needed = required_funds(&selection, ctx.settlement.tx_fee_estimate);
    if balance < needed {
        return Err(RentError::InsufficientBalance {
            needed,
            available: balance,
        }
        .into());
    }

    // 3. Reserve, all at once
    let outcomes = Reserver::new(ctx.marketplace.as_ref())
        .reserve_all(&selection, criteria.duration_hours, &request.pool, request.dry_run)
        .await;
    let reservations = ReservationTally::from_outcomes(outcomes);

    info!(
        rented = reservations.rentals.len(),
        simulated = reservations.simulated,
        failures = reservations.failures.len(),
        "All reservations are done"
    );

    // 4. Pay, one by one
    let settlement = Settler::new(ctx.payments.as_ref(), ctx.settlement.clone())
        .settle_all(&reservations.rentals)
        .await;

    info!(
        paid = settlement.paid.len(),
        failed = settlement.failed.len(),
        deferred = settlement.deferred.len(),
        total_paid = %settlement.total_paid(),
        "All my jobs are done"
    );

    Ok(RunOutcome::Completed(RunReport {
        selection,
        required_funds: needed,
        balance,
        reservations,
        settlement,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
