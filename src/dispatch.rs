// src/dispatch.rs
//! Rate-limited delivery to a notification sink.

use anyhow::Result;
use metrics::counter;
use std::time::Duration;

use crate::notify::{Notifier, Story};
use crate::shutdown::Shutdown;

/// Used when the configured broadcast interval is missing or zero.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    interval: Duration,
}

impl Dispatcher {
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_BROADCAST_INTERVAL
        } else {
            interval
        };
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deliver one story. The caller throttles after every attempt, success or not.
    pub async fn dispatch(&self, notifier: &dyn Notifier, story: &Story) -> Result<()> {
        let sink = notifier.name().to_string();
        match notifier.send(story).await {
            Ok(()) => {
                counter!("feed_dispatch_total", "sink" => sink).increment(1);
                Ok(())
            }
            Err(e) => {
                counter!("feed_dispatch_errors_total", "sink" => sink).increment(1);
                Err(e)
            }
        }
    }

    /// Inter-message pause. Returns true if shutdown cut it short.
    pub async fn throttle(&self, shutdown: &mut Shutdown) -> bool {
        shutdown.sleep(self.interval).await
    }
}
