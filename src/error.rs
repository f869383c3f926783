//! Library error type surfaced to the driver.
//!
//! Configuration and I/O problems are the only recoverable failures; both
//! occur before or between ticks, never inside one. Numeric and traversal
//! invariant violations panic instead.

use crate::schema::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
