//! End-to-end runs of the search → reserve → pay batch against
//! in-memory platforms.

mod mock_platform;
mod scenarios;
