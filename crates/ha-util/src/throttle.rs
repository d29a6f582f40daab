//! Call-rate limiting

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

/// Runs a closure at most once per `min_time`
///
/// A call that arrives while another call is executing returns `None`
/// immediately instead of waiting. The cooldown starts when a call finishes,
/// not when it starts.
#[derive(Debug)]
pub struct Throttle {
    min_time: Duration,
    last_call: Mutex<Option<Instant>>,
    /// Applies to every execution, forced ones included
    limit: Option<Box<Throttle>>,
}

impl Throttle {
    pub fn new(min_time: Duration) -> Self {
        Self {
            min_time,
            last_call: Mutex::new(None),
            limit: None,
        }
    }

    /// A throttle whose forced calls are still held to `limit_no_throttle`
    pub fn with_limit_no_throttle(min_time: Duration, limit_no_throttle: Duration) -> Self {
        Self {
            limit: Some(Box::new(Throttle::new(limit_no_throttle))),
            ..Self::new(min_time)
        }
    }

    pub fn min_time(&self) -> Duration {
        self.min_time
    }

    /// When the last execution finished
    pub fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock()
    }

    /// Run `f` unless it ran less than `min_time` ago or is running now
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.run(false, f)
    }

    /// Run `f` regardless of `min_time`, unless it is running now or the
    /// no-throttle limit says otherwise
    pub fn call_no_throttle<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.run(true, f)
    }

    fn run<T>(&self, force: bool, f: impl FnOnce() -> T) -> Option<T> {
        let Some(mut last_call) = self.last_call.try_lock() else {
            trace!("Throttled call already running");
            return None;
        };

        let due = match *last_call {
            None => true,
            Some(_) if force => true,
            Some(last) => last.elapsed() > self.min_time,
        };
        if !due {
            return None;
        }

        // a call the limit suppresses still counts as this throttle's call
        let result = match &self.limit {
            Some(limit) => limit.run(false, f),
            None => Some(f()),
        };
        *last_call = Some(Instant::now());
        result
    }
}
