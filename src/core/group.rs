//! # Ordered group of services.
//!
//! [`ServiceGroup`] applies lifecycle calls to several services in priority
//! order: descending priority on start (infrastructure first), ascending on
//! stop (dependents first). Equal priorities keep registration order on start
//! and reverse it on stop.

use std::cmp::Reverse;

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::service::Service;

/// Services started and stopped together.
pub struct ServiceGroup {
    services: Vec<Service>,
    bus: Bus,
}

impl ServiceGroup {
    /// Creates an empty group.
    pub fn new(bus: Bus) -> Self {
        Self {
            services: Vec::new(),
            bus,
        }
    }

    /// Adds a service; names must be unique.
    pub fn push(&mut self, service: Service) -> Result<(), RuntimeError> {
        if self.services.iter().any(|s| s.name() == service.name()) {
            return Err(RuntimeError::DuplicateService {
                name: service.name().to_string(),
            });
        }
        self.services.push(service);
        Ok(())
    }

    /// Members in start order.
    pub fn start_order(&self) -> Vec<Service> {
        let mut v = self.services.clone();
        v.sort_by_key(|s| Reverse(s.priority()));
        v
    }

    /// Members in stop order.
    pub fn stop_order(&self) -> Vec<Service> {
        let mut v = self.services.clone();
        v.reverse();
        v.sort_by_key(|s| s.priority());
        v
    }

    /// Starts every member in start order.
    ///
    /// On the first failure, members already started are stopped again.
    pub async fn start_all(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::GroupStarting));
        let mut started: Vec<Service> = Vec::new();
        for svc in self.start_order() {
            if let Err(e) = svc.start().await {
                tracing::error!(service = svc.name(), error = %e, "group start failed; rolling back");
                for s in started.iter().rev() {
                    s.stop().await;
                }
                return Err(e);
            }
            started.push(svc);
        }
        Ok(())
    }

    /// Stops every member in stop order.
    pub async fn stop_all(&self) {
        self.bus.publish(Event::new(EventKind::GroupStopping));
        for svc in self.stop_order() {
            svc.stop().await;
        }
    }
}
