//! Unit normalisation.
//!
//! The marketplace reports speed and price in whatever unit the rig owner
//! chose. Everything downstream works in Mh/s and BTC/Mh/day. An unknown
//! unit means the API changed under us, so it is an error rather than a
//! skipped rig.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Measure, RentError};

const THOUSAND: Decimal = dec!(1000);

/// Convert a declared speed to Mh/s.
pub fn speed_in_mhs(speed: &Measure) -> Result<Decimal, RentError> {
    match speed.unit.as_str() {
        "Kh/s" => Ok(speed.value / THOUSAND),
        "Mh/s" => Ok(speed.value),
        "Th/s" => speed
            .value
            .checked_mul(THOUSAND)
            .ok_or_else(|| RentError::OutOfRange(format!("hashing speed {speed}"))),
        other => Err(RentError::UnknownSpeedUnit(other.to_string())),
    }
}

/// Convert a per-speed-unit daily price to BTC/Mh/day.
pub fn price_in_btc_mh_day(price: &Measure) -> Result<Decimal, RentError> {
    match price.unit.as_str() {
        "BTC/Mh/day" => Ok(price.value),
        "BTC/Th/day" => Ok(price.value / THOUSAND),
        other => Err(RentError::UnknownPriceUnit(other.to_string())),
    }
}
