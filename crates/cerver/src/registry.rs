//! Fixed-capacity service registry.

use std::sync::Arc;

use crate::{
    config::ServiceConfig,
    error::StartError,
    service::Service,
};

pub struct ServiceRegistry {
    capacity: usize,
    services: Vec<Arc<Service>>,
}

impl ServiceRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, services: Vec::with_capacity(capacity) }
    }

    /// Appends a new service built from `config` in registration order.
    /// Fails closed once the registry has reached capacity; there is no
    /// deletion.
    pub fn register(&mut self, config: &ServiceConfig) -> bool {
        if self.services.len() >= self.capacity {
            return false;
        }
        let index = self.services.len();
        let name = config.name.clone().unwrap_or_else(|| format!("service-{index}"));
        self.services.push(Arc::new(Service::new(
            index,
            config.address.clone(),
            config.port,
            name,
            config.reconnect_wait,
        )));
        true
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.services.len() == self.capacity
    }

    pub fn as_slice(&self) -> &[Arc<Service>] {
        &self.services
    }

    /// Checked before `Balancer::start` runs: the registry must be fully
    /// populated, with no partial state.
    pub fn ensure_full(&self) -> Result<(), StartError> {
        if self.services.len() != self.capacity {
            return Err(StartError::RegistryNotFull { have: self.services.len(), want: self.capacity });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn cfg(addr: &str) -> ServiceConfig {
        ServiceConfig::new(addr, 9000).with_reconnect_wait(Duration::from_secs(20))
    }

    #[test]
    fn register_fails_once_capacity_is_reached() {
        let mut registry = ServiceRegistry::with_capacity(1);
        assert!(registry.register(&cfg("127.0.0.1")));
        assert!(!registry.register(&cfg("127.0.0.1")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ensure_full_fails_when_registry_is_partial() {
        let mut registry = ServiceRegistry::with_capacity(2);
        registry.register(&cfg("127.0.0.1"));
        assert!(registry.ensure_full().is_err());
        registry.register(&cfg("127.0.0.1"));
        assert!(registry.ensure_full().is_ok());
    }

    #[test]
    fn registered_services_keep_registration_order_as_index() {
        let mut registry = ServiceRegistry::with_capacity(2);
        registry.register(&cfg("10.0.0.1"));
        registry.register(&cfg("10.0.0.2"));
        let services = registry.as_slice();
        assert_eq!(services[0].address, "10.0.0.1");
        assert_eq!(services[1].address, "10.0.0.2");
        assert_eq!(services[0].index, 0);
        assert_eq!(services[1].index, 1);
    }
}
