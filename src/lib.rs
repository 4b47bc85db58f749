//! Proxy Score - Proxy Quality and Risk Checker
//!
//! Checks proxy credentials by geolocating each proxy through itself and
//! scoring its public IP with a fraud service, concurrently. Results can be
//! filtered, sorted and exported as CSV or templated text.

pub mod config;
pub mod export;
pub mod proxy;
pub mod tui;

pub use config::AppConfig;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
