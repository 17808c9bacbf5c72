//! Error types for configuration, startup, and service connection.
//!
//! None of these are ever raised via `panic!`: they flow back to the
//! caller as `Result`s. `cerver_utils::safe_panic!` is reserved for
//! internal invariant violations that should never be reachable from
//! configuration or network input (see `selector.rs`).

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no services configured; at least one is required")]
    NoServices,
    #[error("configured {configured} services but the registry capacity is {capacity}")]
    TooManyServices { configured: usize, capacity: usize },
    #[error("invalid service address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("registry not fully populated: have {have}, want {want}")]
    RegistryNotFull { have: usize, want: usize },
    #[error("no configured service reached WORKING status")]
    NoServiceReachable,
    #[error("failed to bind listening socket: {0}")]
    ListenFailed(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to open TCP connection: {0}")]
    Connect(#[source] io::Error),
    #[error("service did not reply to the health check")]
    HealthCheckFailed,
    #[error("I/O error during health check: {0}")]
    HealthCheckIo(#[source] io::Error),
}
