//! Response Harvester — pull submitted survey responses from the forms
//! API, normalize them, and persist raw/processed/summary tables.
//!
//! The harvester never mutates submissions; its job is projection and
//! storage. A failed fetch aborts the run with the upstream status and
//! message surfaced to the operator — partial or corrupt tables are never
//! written, because every table rebuild happens inside one transaction.

pub mod client;
pub mod ops;
pub mod records;
pub mod store;

use thiserror::Error;

/// Everything that can go wrong on the harvester side.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The forms API answered with a non-success status.
    #[error("forms API returned {status}: {message}")]
    Api { status: u16, message: String },
    /// Transport-level failure (DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The API answered with a body we could not decode.
    #[error("malformed API response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Local table storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// An operator action was invoked before its prerequisites exist.
    #[error("{0}")]
    Precondition(String),
}
