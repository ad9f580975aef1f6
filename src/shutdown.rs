// src/shutdown.rs
//! Cooperative shutdown signal shared by the application loops.

use std::time::Duration;
use tokio::sync::watch;

/// Sending half; dropping it also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

/// Receiving half, cloned into every task.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left is fine: nothing to stop.
        let _ = self.0.send(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is requested.
    pub async fn wait(&mut self) {
        // Err means the trigger was dropped.
        let _ = self.0.wait_for(|stop| *stop).await;
    }

    /// Sleep for `d` unless shutdown arrives first. Returns true on shutdown.
    pub async fn sleep(&mut self, d: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let woke_by_signal = tokio::select! {
            _ = tokio::time::sleep(d) => false,
            _ = self.wait() => true,
        };
        woke_by_signal || self.is_triggered()
    }
}
