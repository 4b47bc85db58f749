//! Proxy module for parsing and scoring proxies
//!
//! This module provides functionality for:
//! - Parsing `host:port:username:password` credential lines
//! - Geolocating each proxy through itself and fraud scoring its public IP
//! - Checking many proxies concurrently into one result aggregate

pub mod aggregate;
pub mod checker;
pub mod fraud;
pub mod geo;
pub mod models;
pub mod parser;

pub use aggregate::{ResultAggregate, Summary};
pub use checker::{BatchProgress, CheckerConfig, ProxyChecker};
pub use geo::GeoLocation;
pub use models::{
    FailureReason, Flag, ProbeError, ProbeFailure, ProbeOutcome, ProxyCredential, ProxyRow,
    ProxyType, RiskLevel,
};
pub use parser::{ParseError, ProxyParser};
