//! Data gate
//!
//! A counter shared by legacy loaders and checkpoint saves:
//! `-1` while a save runs, `0` when idle, `N` while `N` loaders run.
//! Loaders may overlap each other; only load-versus-save is exclusive.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::GateError;

const SAVING: i32 = -1;
const IDLE: i32 = 0;

/// Retry budget for gate acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            attempts: 60,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct DataGate {
    state: Mutex<i32>,
    changed: Condvar,
    config: GateConfig,
}

impl DataGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            state: Mutex::new(IDLE),
            changed: Condvar::new(),
            config,
        }
    }

    pub fn config(&self) -> GateConfig {
        self.config
    }

    /// Current counter value
    pub fn state(&self) -> i32 {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, i32> {
        // The counter stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, from: i32) {
        let mut state = self.lock();
        *state = if from == SAVING { IDLE } else { (*state - 1).max(IDLE) };
        self.changed.notify_all();
    }

    /// Join the loaders, waiting out a running save. Blocks the thread.
    pub fn acquire_load(self: &Arc<Self>) -> Result<LoadPermit, GateError> {
        let mut state = self.lock();
        for attempt in 1..=self.config.attempts {
            if *state >= IDLE {
                *state += 1;
                debug!("Load permit acquired ({} loaders)", *state);
                return Ok(LoadPermit {
                    gate: Arc::clone(self),
                });
            }
            debug!("Data gate busy saving, load attempt {}", attempt);
            state = self
                .changed
                .wait_timeout(state, self.config.backoff)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }

        warn!(
            "Gave up waiting for data gate after {} attempts (state {})",
            self.config.attempts, *state
        );
        Err(GateError::Timeout {
            attempts: self.config.attempts,
            state: *state,
        })
    }

    /// Start a save if nothing else holds the gate.
    pub fn try_acquire_save(self: &Arc<Self>) -> Option<SavePermit> {
        let mut state = self.lock();
        if *state != IDLE {
            return None;
        }
        *state = SAVING;
        Some(SavePermit {
            gate: Arc::clone(self),
        })
    }

    /// Start a save, waiting for loaders to drain. Blocks the thread.
    pub fn acquire_save(self: &Arc<Self>) -> Result<SavePermit, GateError> {
        let mut state = self.lock();
        for attempt in 1..=self.config.attempts {
            if *state == IDLE {
                *state = SAVING;
                return Ok(SavePermit {
                    gate: Arc::clone(self),
                });
            }
            debug!("Data gate busy (state {}), save attempt {}", *state, attempt);
            state = self
                .changed
                .wait_timeout(state, self.config.backoff)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        Err(GateError::Timeout {
            attempts: self.config.attempts,
            state: *state,
        })
    }

    /// Async form of [`acquire_save`](Self::acquire_save) that sleeps on the
    /// runtime instead of blocking the thread.
    pub async fn wait_save(self: &Arc<Self>) -> Result<SavePermit, GateError> {
        for attempt in 1..=self.config.attempts {
            if let Some(permit) = self.try_acquire_save() {
                return Ok(permit);
            }
            debug!("Data gate busy (state {}), save attempt {}", self.state(), attempt);
            tokio::time::sleep(self.config.backoff).await;
        }
        Err(GateError::Timeout {
            attempts: self.config.attempts,
            state: self.state(),
        })
    }
}

/// Held by a running loader. Dropping it leaves the gate.
#[derive(Debug)]
pub struct LoadPermit {
    gate: Arc<DataGate>,
}

impl Drop for LoadPermit {
    fn drop(&mut self) {
        self.gate.release(1);
    }
}

/// Held by a running save. Dropping it reopens the gate.
#[derive(Debug)]
pub struct SavePermit {
    gate: Arc<DataGate>,
}

impl Drop for SavePermit {
    fn drop(&mut self) {
        self.gate.release(SAVING);
    }
}
