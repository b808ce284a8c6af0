//! Supervision of background memory synthesis.
//!
//! At most one synthesis runs at a time. A trigger that arrives while one is
//! in flight is dropped, not queued: the next trigger sees a newer window
//! anyway. Each run is a spawned task whose `JoinHandle` is awaited by an
//! observer task, which logs the outcome (including panics and
//! cancellation), publishes it on the event bus, and releases the guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use mnemo_core::event::{DomainEvent, EventBus};
use mnemo_core::message::RollingMessage;
use mnemo_memory::MemoryStore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::synthesizer::MemorySynthesizer;

/// Launches and observes synthesis cycles.
pub struct SynthesisSupervisor {
    synthesizer: Arc<MemorySynthesizer>,
    store: MemoryStore,
    events: Arc<EventBus>,
    in_flight: Arc<AtomicBool>,
}

impl SynthesisSupervisor {
    pub fn new(
        synthesizer: Arc<MemorySynthesizer>,
        store: MemoryStore,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            synthesizer,
            store,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a synthesis cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a cycle over `window` unless one is already running.
    ///
    /// Returns the observer's handle, or `None` when the trigger was dropped.
    /// Callers never need to await the handle.
    pub fn try_launch(
        &self,
        window: Vec<RollingMessage>,
        agent_id: impl Into<String>,
    ) -> Option<JoinHandle<()>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Memory synthesis already running, dropping trigger");
            return None;
        }

        let agent_id = agent_id.into();
        let synthesizer = self.synthesizer.clone();
        let store = self.store.clone();
        let messages = window.len();
        info!(messages, "Launching memory synthesis");

        let started = Instant::now();
        let worker = tokio::spawn(async move {
            synthesizer
                .background_update(&store, window, &agent_id)
                .await
        });

        let events = self.events.clone();
        let in_flight = self.in_flight.clone();
        let observer = tokio::spawn(async move {
            let result = worker.await;
            let duration_ms = started.elapsed().as_millis() as u64;
            let failure = match result {
                Ok(Ok(bank)) => {
                    info!(users = bank.users.len(), duration_ms, "Memory synthesis finished");
                    events.publish(DomainEvent::MemorySynthesized {
                        users: bank.users.len(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    None
                }
                Ok(Err(e)) => {
                    error!(error = %e, details = ?e, "Memory synthesis failed");
                    Some(e.to_string())
                }
                Err(e) if e.is_cancelled() => {
                    error!("Memory synthesis was cancelled");
                    Some("cancelled".to_string())
                }
                Err(e) => {
                    error!(error = %e, "Memory synthesis panicked");
                    Some(format!("panicked: {e}"))
                }
            };

            if let Some(error_message) = failure {
                events.publish(DomainEvent::MemorySynthesisFailed {
                    error_message,
                    timestamp: Utc::now(),
                });
            }
            in_flight.store(false, Ordering::Release);
        });

        Some(observer)
    }
}
