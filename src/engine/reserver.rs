//! Reservation orchestrator.
//!
//! Reserves every selected rig at once: one request per rig, all in
//! flight together, outcomes collected in whatever order they complete.
//! Exactly one outcome is produced per rig.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::platforms::RigMarketplace;
use crate::types::{PoolConfig, RentalRecord, ReservationOutcome, RigOffer, SelectionResult};

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Reservation outcomes grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct ReservationTally {
    /// Confirmed rentals, in the order they were collected.
    pub rentals: Vec<RentalRecord>,
    pub failures: Vec<FailedReservation>,
    pub simulated: usize,
}

#[derive(Debug, Clone)]
pub struct FailedReservation {
    pub rig_id: u64,
    pub reason: String,
}

impl ReservationTally {
    pub fn from_outcomes(outcomes: Vec<ReservationOutcome>) -> Self {
        let mut tally = Self::default();
        for outcome in outcomes {
            match outcome {
                ReservationOutcome::Success(rental) => tally.rentals.push(rental),
                ReservationOutcome::Failure { rig_id, error } => {
                    tally.failures.push(FailedReservation { rig_id, reason: error })
                }
                ReservationOutcome::Simulated { .. } => tally.simulated += 1,
            }
        }
        tally
    }

    /// Successful reservations, counting simulated ones.
    pub fn successes(&self) -> usize {
        self.rentals.len() + self.simulated
    }

    pub fn total(&self) -> usize {
        self.rentals.len() + self.failures.len() + self.simulated
    }
}

// ---------------------------------------------------------------------------
// Reserver
// ---------------------------------------------------------------------------

pub struct Reserver<'a> {
    marketplace: &'a dyn RigMarketplace,
}

impl<'a> Reserver<'a> {
    pub fn new(marketplace: &'a dyn RigMarketplace) -> Self {
        Self { marketplace }
    }

    /// Reserve every rig in `selection` concurrently.
    ///
    /// Outcomes are returned in completion order, not selection order.
    pub async fn reserve_all(
        &self,
        selection: &SelectionResult,
        duration_hours: u32,
        pool: &PoolConfig,
        dry_run: bool,
    ) -> Vec<ReservationOutcome> {
        let total = selection.len();
        let mut pending: FuturesUnordered<_> = selection
            .rigs
            .iter()
            .map(|rig| self.reserve_one(rig, duration_hours, pool, dry_run))
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = pending.next().await {
            let progress = format!("{}/{}", outcomes.len() + 1, total);
            match &outcome {
                ReservationOutcome::Success(rental) => info!(
                    progress = %progress,
                    rig_id = rental.rig_id,
                    rental_id = rental.id,
                    "Reservation done"
                ),
                ReservationOutcome::Failure { rig_id, error } => warn!(
                    progress = %progress,
                    rig_id,
                    error = %error,
                    "Reservation failed"
                ),
                ReservationOutcome::Simulated { rig_id } => info!(
                    progress = %progress,
                    rig_id,
                    "[DRY RUN] Reservation simulated"
                ),
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn reserve_one(
        &self,
        rig: &RigOffer,
        duration_hours: u32,
        pool: &PoolConfig,
        dry_run: bool,
    ) -> ReservationOutcome {
        if dry_run {
            info!(rig_id = rig.id, "[DRY RUN] Would rent rig");
            return ReservationOutcome::Simulated { rig_id: rig.id };
        }

        match self.marketplace.reserve(rig.id, duration_hours, pool).await {
            Ok(rental) => ReservationOutcome::Success(rental),
            Err(e) => ReservationOutcome::Failure {
                rig_id: rig.id,
                error: format!("unable to rent rig {}: {e:#}", rig.id),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
