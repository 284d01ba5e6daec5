//! Rig matcher.
//!
//! Pages through the marketplace listing and greedily picks rigs until
//! the requested speed is covered as closely as possible without going
//! over it, and without paying more than the price ceiling.
//!
//! Precondition: the listing is sorted by price ascending, within and
//! across pages. The first rig above the ceiling therefore ends the whole
//! search, even if a later page happens to contain a cheaper one.
//!
//! The listing is live, so a rig can slide across a page boundary and be
//! listed twice. Each rig id is selected at most once.

use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::engine::units::{price_in_btc_mh_day, speed_in_mhs};
use crate::platforms::RigMarketplace;
use crate::types::{RentError, SearchCriteria, SelectionResult};

const HOURS_PER_DAY: Decimal = rust_decimal_macros::dec!(24);

pub struct RigMatcher<'a> {
    marketplace: &'a dyn RigMarketplace,
}

impl<'a> RigMatcher<'a> {
    pub fn new(marketplace: &'a dyn RigMarketplace) -> Self {
        Self { marketplace }
    }

    /// Select rigs matching `criteria`.
    ///
    /// A listing error stops paging but keeps what was selected so far.
    /// An unrecognised speed or price unit, or figures too large to total,
    /// abort with an error.
    pub async fn select(&self, criteria: &SearchCriteria) -> Result<SelectionResult, RentError> {
        let mut selection = SelectionResult::default();
        let hours = Decimal::from(criteria.duration_hours);
        let mut page = 0u32;
        let mut selected_ids = HashSet::new();

        'pages: loop {
            page += 1;

            let rigs = match self.marketplace.list_available(criteria.algorithm, page).await {
                Ok(rigs) => rigs,
                Err(e) => {
                    warn!(page, error = %e, "Listing request failed, keeping partial selection");
                    break 'pages;
                }
            };

            if rigs.is_empty() {
                debug!(page, "Listing exhausted");
                break 'pages;
            }

            debug!(page, count = rigs.len(), "Listing page fetched");

            for rig in rigs {
                if selected_ids.contains(&rig.id) {
                    debug!(rig_id = rig.id, "Rig listed again on a later page");
                    continue;
                }
                if !rig.offers_hours(criteria.duration_hours) {
                    continue;
                }

                let price = price_in_btc_mh_day(&rig.price)?;
                if price > criteria.max_price {
                    debug!(rig_id = rig.id, price = %price, "Price ceiling reached, stopping search");
                    break 'pages;
                }

                let speed = speed_in_mhs(&rig.declared_speed)?;
                let total_speed = selection
                    .total_speed
                    .checked_add(speed)
                    .ok_or_else(|| out_of_range(rig.id, "total speed"))?;
                if total_speed > criteria.speed_mhs {
                    debug!(rig_id = rig.id, speed = %speed, "Rig would overshoot requested speed");
                    continue;
                }

                let total_price = price
                    .checked_mul(speed)
                    .and_then(|p| p.checked_mul(hours))
                    .and_then(|p| p.checked_div(HOURS_PER_DAY))
                    .and_then(|p| selection.total_price.checked_add(p))
                    .ok_or_else(|| out_of_range(rig.id, "total price"))?;

                selection.total_speed = total_speed;
                selection.total_price = total_price;
                selected_ids.insert(rig.id);
                selection.rigs.push(rig);
            }
        }

        info!(
            rigs = selection.len(),
            total_speed = %selection.total_speed,
            total_price = %selection.total_price,
            pages = page,
            "Rig selection complete"
        );

        Ok(selection)
    }
}

fn out_of_range(rig_id: u64, what: &str) -> RentError {
    RentError::OutOfRange(format!("{what} after rig {rig_id}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
