//! # Timer Module
//!
//! Time keeping driver: schedules one-shot timeouts and repeating
//! intervals, each tagged with a caller-supplied value, and publishes
//! [`TimerEvent`]s over a broadcast channel. Subscribers only see events
//! fired after they subscribed, so subscribe before scheduling.
//!
//! Closing the driver cancels every outstanding schedule; already-delivered
//! events stay in subscriber buffers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use chassis_core::{
    CapabilityType, Driver, DriverError, ModuleDescriptor, TimerApi, TimerEvent,
    DEFAULT_CHANNEL_CAPACITY,
};

/// Name under which the timer module registers.
pub const MODULE_NAME: &str = "sys/timer";

/// Broadcast-backed timer driver.
pub struct TimerDriver {
    events: broadcast::Sender<TimerEvent>,
    schedules: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerDriver {
    /// Create a driver with the default event capacity.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            events,
            schedules: Mutex::new(Vec::new()),
        }
    }

    /// Number of live event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for TimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerApi for TimerDriver {
    fn new_timeout(&self, duration: Duration, tag: u64) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(TimerEvent {
                tag,
                fired_at: std::time::Instant::now(),
            });
        });
        self.schedules.lock().push(handle);
        debug!(tag, duration_ms = duration.as_millis() as u64, "Timeout scheduled");
    }

    fn new_interval(&self, period: Duration, tag: u64, immediately: bool) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let start = if immediately {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + period
            };
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                let _ = events.send(TimerEvent {
                    tag,
                    fired_at: std::time::Instant::now(),
                });
            }
        });
        self.schedules.lock().push(handle);
        debug!(tag, period_ms = period.as_millis() as u64, immediately, "Interval scheduled");
    }

    fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }
}

impl Driver for TimerDriver {
    fn close(&self) -> Result<(), DriverError> {
        let schedules = std::mem::take(&mut *self.schedules.lock());
        debug!(schedules = schedules.len(), "Cancelling timer schedules");
        for handle in schedules {
            handle.abort();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_timer(&self) -> Option<&dyn TimerApi> {
        Some(self)
    }
}

/// The timer module descriptor.
#[must_use]
pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_NAME, CapabilityType::Timer)
        .with_construct(|_| Ok(Arc::new(TimerDriver::new()) as Arc<dyn Driver>))
}
