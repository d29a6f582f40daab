//! Jobs and their priorities

use chrono::{DateTime, Utc};
use ha_core::events;

/// A unit of work run once on a pool worker
pub struct Job {
    description: String,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    /// Wrap a closure; the description shows up in busy warnings and panic logs
    pub fn new<F>(description: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            description: description.into(),
            run: Box::new(f),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn FnOnce() + Send + 'static>) {
        (self.description, self.run)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Priority tiers for bus-driven work; lower runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum JobPriority {
    /// Releases a blocked caller (`service_executed`)
    EventCallback = 0,
    /// Service dispatch (`call_service` and handler jobs)
    EventService = 1,
    /// `state_changed` listeners
    EventState = 2,
    /// `time_changed` listeners
    EventTime = 3,
    /// Every other event type
    EventDefault = 4,
}

impl JobPriority {
    /// Pick the tier for listeners of `event_type`
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            events::SERVICE_EXECUTED => JobPriority::EventCallback,
            events::CALL_SERVICE => JobPriority::EventService,
            events::STATE_CHANGED => JobPriority::EventState,
            events::TIME_CHANGED => JobPriority::EventTime,
            _ => JobPriority::EventDefault,
        }
    }

    pub fn value(self) -> u32 {
        self as u32
    }
}

impl From<JobPriority> for u32 {
    fn from(priority: JobPriority) -> Self {
        priority.value()
    }
}

/// A job currently executing on a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningJob {
    pub started: DateTime<Utc>,
    pub description: String,
}
