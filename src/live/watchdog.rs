//! Liveness watchdog.
//!
//! A fixed one-second ticker compares the time since the last received
//! message against the configured threshold and forces a `NoTraffic`
//! reconnection once the feed has gone silent for too long. The watchdog is
//! armed on every successful connect and disarmed on stop, dispose, and at
//! the start of every connect attempt.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

use crate::live::client::ClientInner;
use crate::live::events::ReconnectionCause;

/// Periodic liveness check for one client.
pub(crate) struct Watchdog {
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub(crate) fn new() -> Self {
        Self {
            ticker: Mutex::new(None),
        }
    }

    /// Arms the watchdog for the current connection.
    ///
    /// Self-disables when reconnection is off or no threshold is
    /// configured.
    pub(crate) fn arm(&self, inner: &Arc<ClientInner>) {
        self.disarm();

        if !inner.config.reconnect_enabled || inner.config.no_traffic_timeout().is_none() {
            return;
        }

        let inner = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tick.tick().await;

                let Some(threshold) = inner.config.no_traffic_timeout() else {
                    return;
                };
                if !inner.config.reconnect_enabled {
                    return;
                }

                let silence = inner.silence();
                if silence > threshold {
                    debug!(
                        client = %inner.config.name,
                        silence_ms = silence.as_millis() as u64,
                        threshold_ms = threshold.as_millis() as u64,
                        "no traffic within threshold, forcing reconnect"
                    );

                    let generation = inner.current_generation();
                    let trigger = Arc::clone(&inner);
                    // The reconnection must run on its own task: it disarms
                    // the watchdog, which aborts this one.
                    tokio::spawn(async move {
                        let _ = trigger
                            .reconnect_synchronized(
                                ReconnectionCause::NoTraffic,
                                false,
                                None,
                                generation,
                            )
                            .await;
                    });
                    return;
                }
            }
        });

        *self.ticker.lock() = Some(handle);
    }

    /// Disarms the watchdog.
    pub(crate) fn disarm(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}
