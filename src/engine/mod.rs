//! Core engine — the search → reserve → pay batch.

pub mod units;
pub mod matcher;
pub mod reserver;
pub mod settler;
pub mod controller;
