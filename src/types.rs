//! Shared types for the AUTORENT agent.
//!
//! These types form the data model used across all modules. Platform
//! adapters translate wire responses into them, and the engine only ever
//! sees these shapes.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Algorithm
// ---------------------------------------------------------------------------

/// Hashing algorithm a rig is rented for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Scrypt,
    Keccak,
    ScryptN,
    Sha256,
    X11,
    Blake256,
    X13,
    X15,
}

impl Algorithm {
    /// All supported algorithms (useful for help text and iteration).
    pub const ALL: &'static [Algorithm] = &[
        Algorithm::Scrypt,
        Algorithm::Keccak,
        Algorithm::ScryptN,
        Algorithm::Sha256,
        Algorithm::X11,
        Algorithm::Blake256,
        Algorithm::X13,
        Algorithm::X15,
    ];

    /// Numeric identifier used by the marketplace listing endpoint.
    pub fn code(&self) -> u32 {
        match self {
            Algorithm::Scrypt => 1,
            Algorithm::Keccak => 2,
            Algorithm::ScryptN => 3,
            Algorithm::Sha256 => 4,
            Algorithm::X11 => 5,
            Algorithm::Blake256 => 6,
            Algorithm::X13 => 7,
            Algorithm::X15 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Scrypt => "scrypt",
            Algorithm::Keccak => "keccak",
            Algorithm::ScryptN => "scrypt-n",
            Algorithm::Sha256 => "sha256",
            Algorithm::X11 => "x11",
            Algorithm::Blake256 => "blake256",
            Algorithm::X13 => "x13",
            Algorithm::X15 => "x15",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse an algorithm name (case-insensitive).
impl std::str::FromStr for Algorithm {
    type Err = RentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Algorithm::ALL
            .iter()
            .copied()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| RentError::UnknownAlgorithm(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Rig offers
// ---------------------------------------------------------------------------

/// A raw `(value, unit)` pair exactly as the marketplace reported it.
///
/// Units stay as strings so that an unexpected unit can still be
/// represented and rejected by the unit converter.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub value: Decimal,
    pub unit: String,
}

impl Measure {
    pub fn new(value: Decimal, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// A rental length a rig accepts, e.g. `3 hour`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalDuration {
    pub value: u32,
    pub unit: String,
}

impl RentalDuration {
    pub fn hours(value: u32) -> Self {
        Self {
            value,
            unit: "hour".to_string(),
        }
    }
}

/// A rentable rig as returned by the listing endpoint. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RigOffer {
    pub id: u64,
    pub name: String,
    pub declared_speed: Measure,
    /// Price per speed unit per day.
    pub price: Measure,
    pub rental_durations: Vec<RentalDuration>,
}

impl fmt::Display for RigOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rig #{} \"{}\" ({} @ {})",
            self.id, self.name, self.declared_speed, self.price,
        )
    }
}

impl RigOffer {
    /// Whether the rig can be rented for exactly `hours` hours.
    pub fn offers_hours(&self, hours: u32) -> bool {
        self.rental_durations
            .iter()
            .any(|d| d.unit == "hour" && d.value == hours)
    }
}

// ---------------------------------------------------------------------------
// Search & selection
// ---------------------------------------------------------------------------

/// What the user asked for. Supplied once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub algorithm: Algorithm,
    /// Requested total speed in Mh/s.
    pub speed_mhs: Decimal,
    pub duration_hours: u32,
    /// Price ceiling in BTC/Mh/day (inclusive).
    pub max_price: Decimal,
}

/// Rigs chosen by the matcher, in listing order, with running totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionResult {
    pub rigs: Vec<RigOffer>,
    /// Total speed in Mh/s.
    pub total_speed: Decimal,
    /// Total rental price in BTC for the whole duration.
    pub total_price: Decimal,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    /// Average price in BTC/Mh/day over the selection.
    /// Returns zero for an empty selection.
    pub fn average_price(&self, duration_hours: u32) -> Decimal {
        if self.total_speed.is_zero() || duration_hours == 0 {
            return Decimal::ZERO;
        }
        self.total_price * Decimal::from(24) / self.total_speed / Decimal::from(duration_hours)
    }
}

impl fmt::Display for SelectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rigs, {} Mh/s, {} BTC",
            self.rigs.len(),
            self.total_speed.normalize(),
            self.total_price.normalize(),
        )
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// Where reserved rigs should point their hashing power.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// `host:port` of the stratum endpoint.
    pub url: String,
    pub worker_name: String,
    pub worker_password: String,
}

/// A confirmed rental awaiting payment. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RentalRecord {
    pub id: u64,
    pub rig_id: u64,
    /// Amount owed in BTC.
    pub amount: Decimal,
    /// Bitcoin address the payment must go to.
    pub payment_address: String,
}

impl fmt::Display for RentalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rental #{} (rig #{}): {} BTC to {}",
            self.id, self.rig_id, self.amount, self.payment_address,
        )
    }
}

/// Result of one reservation attempt. Exactly one per selected rig.
#[derive(Debug, Clone)]
pub enum ReservationOutcome {
    Success(RentalRecord),
    Failure { rig_id: u64, error: String },
    Simulated { rig_id: u64 },
}

impl ReservationOutcome {
    /// The rig this outcome belongs to. Outcomes arrive in completion
    /// order, so callers must identify them by this, not by position.
    pub fn rig_id(&self) -> u64 {
        match self {
            ReservationOutcome::Success(rental) => rental.rig_id,
            ReservationOutcome::Failure { rig_id, .. } => *rig_id,
            ReservationOutcome::Simulated { rig_id } => *rig_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// A money transfer submitted to the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMoneyRequest {
    /// Decimal string, e.g. `"0.00123"`.
    pub amount: String,
    pub to: String,
    pub user_fee: String,
    /// Idempotency token; the rental id.
    pub idem: String,
}

/// Provider response to a send-money request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMoneyResponse {
    pub success: bool,
    pub errors: Vec<String>,
    pub transaction_id: Option<String>,
}

/// Details of a settled transaction, used for user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub id: String,
    /// On-chain transaction hash.
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for AUTORENT.
#[derive(Debug, thiserror::Error)]
pub enum RentError {
    #[error("Unexpected unit value for hashing speed unit: {0}")]
    UnknownSpeedUnit(String),

    #[error("Unexpected unit value for hashing price unit: {0}")]
    UnknownPriceUnit(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("{0} is not a valid algorithm")]
    UnknownAlgorithm(String),

    #[error("Unable to load {secret} from {path}")]
    MissingCredential { secret: String, path: String },

    #[error("Insufficient balance: need {needed} BTC (rent + tx fees), have {available} BTC")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Platform error ({platform}): {message}")]
    Platform { platform: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
