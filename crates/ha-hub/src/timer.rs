//! Clock thread firing `time_changed`

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use ha_core::{events, TimeChangedData};
use ha_event_bus::EventBus;
use tracing::{debug, error};

use crate::signal::Signal;

/// Handle to the running timer thread
pub(crate) struct Timer {
    handle: JoinHandle<()>,
    stop: Arc<Signal>,
}

impl Timer {
    /// Fire `time_changed` on every second divisible by `interval`
    pub(crate) fn start(bus: Arc<EventBus>, interval: Duration) -> io::Result<Self> {
        let stop = Arc::new(Signal::default());
        let interval = u32::try_from(interval.as_secs()).unwrap_or(1).clamp(1, 60);

        let handle = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("hub-timer".to_string())
                .spawn(move || run(&bus, interval, &stop))?
        };

        Ok(Self { handle, stop })
    }

    pub(crate) fn stop(self) {
        self.stop.set();
        if self.handle.join().is_err() {
            error!("Timer thread panicked");
        }
    }
}

fn run(bus: &EventBus, interval: u32, stop: &Signal) {
    debug!(interval, "Timer started");
    let mut last_fired_on_second = None;

    while !stop.is_set() {
        let mut now = Utc::now();

        if now.second() % interval != 0 || last_fired_on_second == Some(now.second()) {
            if stop.wait_timeout(until_next_tick(now, interval)) {
                break;
            }
            now = Utc::now();
        }

        last_fired_on_second = Some(now.second());

        if let Err(err) = bus.fire(events::TIME_CHANGED, TimeChangedData { now }) {
            debug!(%err, "Bus refused time_changed");
            break;
        }
    }

    debug!("Timer stopped");
}

/// Time until halfway through the next second matching `interval`
fn until_next_tick(now: DateTime<Utc>, interval: u32) -> Duration {
    let seconds = interval - now.second() % interval;
    // nanosecond() exceeds 1e9 during a leap second
    let elapsed = Duration::from_nanos(u64::from(now.nanosecond().min(999_999_999)));
    (Duration::from_secs(u64::from(seconds)) + Duration::from_millis(500)).saturating_sub(elapsed)
}
