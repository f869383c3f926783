//! Schema module - configuration, scalar type names and field seeding.

mod config;
mod seed;
mod types;

pub use config::*;
pub use seed::*;
pub use types::*;
