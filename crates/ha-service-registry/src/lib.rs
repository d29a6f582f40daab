//! Service registry
//!
//! Services are named handlers (`domain.service`). A call is an event: the
//! caller fires `call_service`, the registry's own listener picks it up,
//! validates the data and runs the handler on the job pool, then fires
//! `service_executed` so a blocking caller can return.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use ha_core::{
    events, CallServiceData, Event, ServiceCall, ServiceExecutedData, ServiceRegisteredData,
};
use ha_event_bus::EventBus;
use ha_job_pool::{Job, JobPriority, PoolError};
use jsonschema::JSONSchema;
use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// How long a blocking call waits for `service_executed`
pub const SERVICE_CALL_LIMIT: Duration = Duration::from_secs(10);

/// Service handler; runs on a pool worker
pub type ServiceHandler = Arc<dyn Fn(&ServiceCall) -> Result<(), ServiceError> + Send + Sync>;

/// Errors that can occur when working with services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid schema for {service}: {reason}")]
    InvalidSchema { service: String, reason: String },

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("could not schedule service call: {0}")]
    Pool(#[from] PoolError),
}

/// What a call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Non-blocking call; the request is on the bus
    Dispatched,
    /// Blocking call; the handler finished successfully
    Executed,
    /// Blocking call; no `service_executed` arrived in time
    TimedOut,
}

/// Information about a registered service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    pub schema: Option<Value>,
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
    validator: Option<Arc<JSONSchema>>,
}

/// The service registry
pub struct ServiceRegistry {
    services: DashMap<String, RegisteredService>,
    bus: Arc<EventBus>,
    call_timeout: Duration,
    call_id_prefix: String,
    call_counter: AtomicU64,
}

impl ServiceRegistry {
    /// Create a registry listening for `call_service` on `bus`
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_timeout(bus, SERVICE_CALL_LIMIT)
    }

    /// Same as [`ServiceRegistry::new`] with a custom blocking-call timeout
    pub fn with_timeout(bus: Arc<EventBus>, call_timeout: Duration) -> Arc<Self> {
        Arc::new_cyclic(|registry: &Weak<Self>| {
            let weak = registry.clone();
            bus.listen(events::CALL_SERVICE, move |event| {
                if let Some(registry) = weak.upgrade() {
                    registry.dispatch(event);
                }
            });

            Self {
                services: DashMap::new(),
                bus,
                call_timeout,
                call_id_prefix: ulid::Ulid::new().to_string(),
                call_counter: AtomicU64::new(1),
            }
        })
    }

    /// Register a handler for `domain.service`
    ///
    /// A JSON schema, when given, must compile; call data that does not match
    /// it is dropped before the handler runs. Re-registering replaces the
    /// previous handler. Nothing is registered once the bus has stopped.
    #[instrument(skip(self, domain, service, handler, schema))]
    pub fn register<F>(
        &self,
        domain: &str,
        service: &str,
        handler: F,
        schema: Option<Value>,
    ) -> Result<(), ServiceError>
    where
        F: Fn(&ServiceCall) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        let domain = domain.to_lowercase();
        let service = service.to_lowercase();
        let key = service_key(&domain, &service);

        let validator = match &schema {
            Some(schema) => Some(Arc::new(JSONSchema::compile(schema).map_err(|err| {
                ServiceError::InvalidSchema {
                    service: key.clone(),
                    reason: err.to_string(),
                }
            })?)),
            None => None,
        };

        if !self.bus.is_running() {
            return Err(PoolError::NotRunning.into());
        }

        debug!(%domain, %service, "Registering service");

        self.services.insert(
            key,
            RegisteredService {
                handler: Arc::new(handler),
                description: ServiceDescription {
                    domain: domain.clone(),
                    service: service.clone(),
                    schema,
                },
                validator,
            },
        );

        if let Err(err) = self.bus.fire(
            events::SERVICE_REGISTERED,
            ServiceRegisteredData { domain, service },
        ) {
            warn!(%err, "Service registered but service_registered not fired");
        }
        Ok(())
    }

    /// Request a service call
    ///
    /// With `blocking` set this waits until the handler has finished or the
    /// call timeout passes. Calling a service nobody registered is not an
    /// error: the request is logged and dropped, and a blocking caller times
    /// out.
    #[instrument(skip(self, data))]
    pub fn call(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        blocking: bool,
    ) -> Result<CallOutcome, ServiceError> {
        let service_data = match data {
            Value::Null => Value::Object(Default::default()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(ServiceError::InvalidData(format!(
                    "service data must be an object, got {other}"
                )))
            }
        };

        let call_id = self.next_call_id();
        let request = CallServiceData {
            domain: domain.to_lowercase(),
            service: service.to_lowercase(),
            service_data,
            service_call_id: Some(call_id.clone()),
        };

        if !blocking {
            self.bus.fire(events::CALL_SERVICE, request)?;
            return Ok(CallOutcome::Dispatched);
        }

        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let listener_signal = Arc::clone(&signal);
        let expected = call_id.clone();
        let listener = self.bus.listen(events::SERVICE_EXECUTED, move |event| {
            let matches = ServiceExecutedData::from_event_data(&event.data)
                .is_some_and(|executed| executed.service_call_id == expected);
            if matches {
                let (done, condvar) = &*listener_signal;
                *done.lock() = true;
                condvar.notify_all();
            }
        });

        if let Err(err) = self.bus.fire(events::CALL_SERVICE, request) {
            self.bus.remove_listener(events::SERVICE_EXECUTED, listener);
            return Err(err.into());
        }

        let executed = {
            let (done, condvar) = &*signal;
            let deadline = Instant::now() + self.call_timeout;
            let mut done = done.lock();
            while !*done {
                if condvar.wait_until(&mut done, deadline).timed_out() {
                    break;
                }
            }
            *done
        };

        self.bus.remove_listener(events::SERVICE_EXECUTED, listener);

        if executed {
            Ok(CallOutcome::Executed)
        } else {
            warn!(%domain, %service, %call_id, "Timed out waiting for service call");
            Ok(CallOutcome::TimedOut)
        }
    }

    // Runs as the `call_service` listener.
    fn dispatch(&self, event: &Event) {
        let Some(request) = CallServiceData::from_event_data(&event.data) else {
            warn!("Ignoring call_service event without domain and service");
            return;
        };

        let call = ServiceCall::from(request);
        let key = call.service_id();

        let Some((handler, validator)) = self
            .services
            .get(&key)
            .map(|registered| (registered.handler.clone(), registered.validator.clone()))
        else {
            warn!(service = %key, "Service not registered");
            return;
        };

        if let Some(validator) = validator {
            if let Err(errors) = validator.validate(&call.data) {
                let reason = errors
                    .map(|err| err.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(service = %key, %reason, "Invalid service data");
                return;
            }
        }

        let bus = Arc::clone(&self.bus);
        let description = format!("service {key}");
        let job = Job::new(description, move || run_handler(&bus, handler, call));

        if let Err(err) = self.bus.pool().add_job(JobPriority::EventService, job) {
            error!(service = %key, error = %err, "Could not schedule service handler");
        }
    }

    /// Whether `domain.service` is registered
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services
            .contains_key(&service_key(&domain.to_lowercase(), &service.to_lowercase()))
    }

    pub fn get_service(&self, domain: &str, service: &str) -> Option<ServiceDescription> {
        self.services
            .get(&service_key(&domain.to_lowercase(), &service.to_lowercase()))
            .map(|registered| registered.description.clone())
    }

    /// Registered services: domain to sorted service names
    pub fn services(&self) -> BTreeMap<String, Vec<String>> {
        let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.services.iter() {
            result
                .entry(entry.description.domain.clone())
                .or_default()
                .push(entry.description.service.clone());
        }
        for names in result.values_mut() {
            names.sort();
        }
        result
    }

    /// Remove a service; returns whether it was registered
    #[instrument(skip(self))]
    pub fn unregister(&self, domain: &str, service: &str) -> bool {
        let removed = self
            .services
            .remove(&service_key(&domain.to_lowercase(), &service.to_lowercase()))
            .is_some();

        if removed {
            debug!("Unregistered service");
        }
        removed
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn next_call_id(&self) -> String {
        let n = self.call_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.call_id_prefix, n)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services())
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn run_handler(bus: &EventBus, handler: ServiceHandler, call: ServiceCall) {
    let service = call.service_id();

    match handler(&call) {
        Ok(()) => {
            let Some(service_call_id) = call.call_id else {
                return;
            };
            if let Err(err) = bus.fire(
                events::SERVICE_EXECUTED,
                ServiceExecutedData { service_call_id },
            ) {
                error!(%service, error = %err, "Could not fire service_executed");
            }
        }
        Err(err) => {
            error!(%service, error = %err, "Service handler failed");
        }
    }
}

fn service_key(domain: &str, service: &str) -> String {
    format!("{domain}.{service}")
}
