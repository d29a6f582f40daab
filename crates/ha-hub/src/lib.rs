//! The hub context
//!
//! [`HomeAssistant`] owns one job pool, event bus, state store and service
//! registry and drives them through start and stop. Nothing here is global;
//! integrations receive the hub (or the parts they need) explicitly.

mod signal;
mod timer;
pub mod track;

use std::sync::Arc;

use chrono::Utc;
use ha_config::{ConfigError, CoreConfig};
use ha_core::{events, EventData};
use ha_event_bus::EventBus;
use ha_job_pool::{BusyCallback, JobPool, PoolError, RunningJob};
use ha_service_registry::{ServiceError, ServiceRegistry};
use ha_state_store::StateStore;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, instrument, warn};

use signal::Signal;
use timer::Timer;

pub use track::{TimeMatch, TimePattern, Tracker};

/// Domain of the hub's own services
pub const DOMAIN: &str = "homeassistant";

/// Service that asks the hub to shut down
pub const SERVICE_STOP: &str = "stop";

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to start timer thread: {0}")]
    Timer(#[source] std::io::Error),
}

/// Root object of a running hub
pub struct HomeAssistant {
    config: CoreConfig,
    pool: Arc<JobPool>,
    bus: Arc<EventBus>,
    states: Arc<StateStore>,
    services: Arc<ServiceRegistry>,
    stop_requested: Arc<Signal>,
    timer: Mutex<Option<Timer>>,
}

impl HomeAssistant {
    /// Build the core components; nothing runs on a clock until [`start`](Self::start)
    pub fn new(config: CoreConfig) -> Result<Arc<Self>, HubError> {
        config.validate()?;

        let pool = Arc::new(JobPool::with_busy_callback(
            config.worker_count,
            Arc::new(log_busy_pool) as BusyCallback,
        )?);
        let bus = Arc::new(EventBus::new(Arc::clone(&pool)));
        let states = Arc::new(StateStore::new(Arc::clone(&bus)));
        let services = ServiceRegistry::with_timeout(Arc::clone(&bus), config.service_call_timeout());

        let stop_requested = Arc::new(Signal::default());
        {
            let stop_requested = Arc::clone(&stop_requested);
            services.register(
                DOMAIN,
                SERVICE_STOP,
                move |_call| {
                    info!("Stop requested");
                    stop_requested.set();
                    Ok(())
                },
                None,
            )?;
        }

        Ok(Arc::new(Self {
            config,
            pool,
            bus,
            states,
            services,
            stop_requested,
            timer: Mutex::new(None),
        }))
    }

    /// Start the clock and announce `homeassistant_start`
    #[instrument(skip(self), fields(name = %self.config.name))]
    pub fn start(&self) -> Result<(), HubError> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            warn!("Hub already started");
            return Ok(());
        }

        *timer = Some(
            Timer::start(Arc::clone(&self.bus), self.config.timer_interval()).map_err(HubError::Timer)?,
        );
        drop(timer);

        info!("Starting hub");
        self.bus.fire(events::HOMEASSISTANT_START, EventData::empty())?;
        Ok(())
    }

    /// Block the calling thread until a stop is requested
    ///
    /// Returns on `homeassistant.stop` or once [`stop`](Self::stop) ran.
    pub fn block_till_stopped(&self) {
        self.stop_requested.wait();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.is_set()
    }

    /// Announce `homeassistant_stop`, let listeners finish, then shut down
    ///
    /// Must not be called from a pool worker.
    #[instrument(skip(self), fields(name = %self.config.name))]
    pub fn stop(&self) {
        if !self.pool.is_running() {
            self.stop_requested.set();
            return;
        }

        info!("Stopping hub");
        if let Err(err) = self.bus.fire(events::HOMEASSISTANT_STOP, EventData::empty()) {
            warn!(%err, "Could not announce stop");
        }
        self.pool.block_till_done();

        if let Some(timer) = self.timer.lock().take() {
            timer.stop();
        }
        self.pool.stop();
        self.stop_requested.set();
    }

    /// Wait for every queued job, including jobs queued along the way
    pub fn block_till_done(&self) {
        self.pool.block_till_done();
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<JobPool> {
        &self.pool
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn states(&self) -> &Arc<StateStore> {
        &self.states
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }
}

impl Drop for HomeAssistant {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.stop();
        }
    }
}

impl std::fmt::Debug for HomeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistant")
            .field("name", &self.config.name)
            .field("pool", &self.pool)
            .field("entities", &self.states.entity_count())
            .field("services", &self.services.service_count())
            .finish_non_exhaustive()
    }
}

fn log_busy_pool(workers: usize, running: &[RunningJob], pending: usize) {
    warn!(workers, pending, "All workers are busy");
    let now = Utc::now();
    for job in running {
        warn!(
            job = %job.description,
            running_ms = (now - job.started).num_milliseconds(),
            "Worker busy"
        );
    }
}
