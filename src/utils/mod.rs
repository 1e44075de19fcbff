//! Utility functions shared across the crate.
//!
//! - [`app_data`] - app data directory, default index location, config loading
//! - [`encoding`] - little-endian field access and length-prefixed records
//! - [`progress`] - progress bars (no-op without the `progress` feature)

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
pub use progress::Progress;
