//! Balancer and per-service configuration.
//!
//! This module holds plain data produced once, by the CLI layer in
//! `cerverd` or directly by a caller embedding the balancer as a
//! library, and consumed once by [`crate::balancer::Balancer::new`].

use std::time::Duration;

use crate::error::ConfigError;

/// Balancing policy tag. `RoundRobin` is the only implemented policy;
/// the enum exists so the CLI and config surface can name a policy
/// without hard-coding the assumption into every call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    RoundRobin,
}

/// Governs how many configured services must reach `WORKING` before
/// `Balancer::start` succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// At least one service must be `WORKING`. The reference policy.
    #[default]
    RequireAny,
    /// Every configured service must be `WORKING`.
    RequireAll,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub address: String,
    pub port: u16,
    pub name: Option<String>,
    pub reconnect_wait: Duration,
}

impl ServiceConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self { address: address.into(), port, name: None, reconnect_wait: Duration::from_secs(20) }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_reconnect_wait(mut self, wait: Duration) -> Self {
        self.reconnect_wait = wait;
        self
    }
}

#[derive(Clone, Debug)]
pub struct BalancerConfig {
    pub name: String,
    pub policy: Policy,
    pub port: u16,
    pub backlog: i32,
    pub services: Vec<ServiceConfig>,
    pub start_policy: StartPolicy,
    /// Optional CPU core pins, one per spawned worker thread, consumed
    /// in spawn order. Left empty, no thread is pinned.
    pub core_pins: Vec<usize>,
}

impl BalancerConfig {
    pub fn new(name: impl Into<String>, port: u16, backlog: i32) -> Self {
        Self {
            name: name.into(),
            policy: Policy::RoundRobin,
            port,
            backlog,
            services: Vec::new(),
            start_policy: StartPolicy::RequireAny,
            core_pins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn with_start_policy(mut self, policy: StartPolicy) -> Self {
        self.start_policy = policy;
        self
    }

    /// Number of services this configuration registers; also the
    /// registry's fixed capacity once passed to `Balancer::new`.
    pub fn n_services(&self) -> usize {
        self.services.len()
    }

    /// Validates the configuration without constructing a `Balancer`.
    /// `Balancer::new` calls this; exposed separately so a CLI layer can
    /// report a configuration error before attempting to bind sockets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        for service in &self.services {
            if service.address.trim().is_empty() {
                return Err(ConfigError::InvalidAddress(service.address.clone()));
            }
        }
        Ok(())
    }
}
