//! Onboarding step tracker — optimistic in-memory step with debounced
//! persistence.
//!
//! The tracker holds one proposal's current step. `update_step` applies a
//! change immediately and schedules a save after a quiet period; rapid
//! updates collapse into a single save of the latest value. `force_save`
//! skips the wait (e.g. before navigating away). On creation the tracker
//! restores the stored step in the background; restore failures fall back to
//! the initial step and are only logged.
//!
//! Saves are never rolled back on failure: the local step stays
//! authoritative for the caller and the failure is exposed through
//! [`TrackerSnapshot::error`] until the next successful save or update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::ProgressStore;
use super::step::OnboardingStep;
use crate::config::TrackerConfig;
use crate::error::ProgressError;

/// Caller-visible tracker state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    /// Latest known step (optimistically updated on local writes).
    pub current_step: OnboardingStep,
    /// True while the initial restore is running.
    pub loading: bool,
    /// True while a persistence call is in flight.
    pub is_saving: bool,
    /// Last persistence failure, cleared by a successful save or a new update.
    pub error: Option<String>,
}

struct Shared {
    proposal_id: String,
    store: Arc<dyn ProgressStore>,
    config: TrackerConfig,
    runtime: Handle,
    state: watch::Sender<TrackerSnapshot>,
    /// Pending debounce timer; replaced on every update.
    debounce: Mutex<Option<JoinHandle<()>>>,
    /// Sequence number of the newest persistence attempt.
    save_seq: AtomicU64,
    /// Number of local updates applied; a restore never overrides them.
    local_writes: AtomicU64,
}

/// Tracks one proposal's onboarding step.
///
/// Dropping the tracker cancels a pending debounced save; saves already in
/// flight run to completion.
pub struct StepTracker {
    shared: Arc<Shared>,
}

impl StepTracker {
    /// Create a tracker at `initial_step` and start restoring the stored step.
    ///
    /// Needs a Tokio runtime to run the restore and later saves on; called
    /// from outside one it returns [`ProgressError::NoRuntime`]. Later
    /// operations may be called from any thread.
    pub fn initialize(
        proposal_id: impl Into<String>,
        initial_step: OnboardingStep,
        store: Arc<dyn ProgressStore>,
        config: TrackerConfig,
    ) -> Result<Self, ProgressError> {
        let runtime =
            Handle::try_current().map_err(|e| ProgressError::NoRuntime(e.to_string()))?;
        let (state, _rx) = watch::channel(TrackerSnapshot {
            current_step: initial_step,
            loading: true,
            is_saving: false,
            error: None,
        });
        let shared = Arc::new(Shared {
            proposal_id: proposal_id.into(),
            store,
            config,
            runtime,
            state,
            debounce: Mutex::new(None),
            save_seq: AtomicU64::new(0),
            local_writes: AtomicU64::new(0),
        });

        shared.runtime.spawn(Arc::clone(&shared).restore());

        Ok(Self { shared })
    }

    pub fn proposal_id(&self) -> &str {
        &self.shared.proposal_id
    }

    pub fn current_step(&self) -> OnboardingStep {
        self.shared.state.borrow().current_step
    }

    /// Copy of the full caller-visible state.
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Watch state changes (loading / saving / error transitions).
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.shared.state.subscribe()
    }

    /// Resolve once the initial restore has finished, successfully or not.
    pub async fn wait_until_loaded(&self) -> TrackerSnapshot {
        let mut rx = self.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here.
        let _ = rx.wait_for(|s| !s.loading).await;
        self.snapshot()
    }

    /// Whether a debounced save is scheduled but has not fired yet.
    pub fn has_pending_save(&self) -> bool {
        self.shared
            .lock_debounce()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Set the step and schedule a debounced save.
    ///
    /// Values outside `[0, 6]` are ignored (logged at warn). Returns whether
    /// the step was applied.
    pub fn update_step(&self, step: i64) -> bool {
        match OnboardingStep::try_from(step) {
            Ok(step) => {
                self.apply(step);
                true
            }
            Err(e) => {
                warn!(proposal_id = %self.shared.proposal_id, "Invalid onboarding step: {e}");
                false
            }
        }
    }

    /// Like [`update_step`](Self::update_step) for loosely typed input
    /// (e.g. a value lifted from a JSON form). Fractions and non-numbers are
    /// ignored.
    pub fn update_step_value(&self, value: &serde_json::Value) -> bool {
        match OnboardingStep::from_json(value) {
            Ok(step) => {
                self.apply(step);
                true
            }
            Err(e) => {
                warn!(proposal_id = %self.shared.proposal_id, "Invalid onboarding step: {e}");
                false
            }
        }
    }

    /// Cancel any pending debounced save and persist the current step now.
    ///
    /// The outcome is also recorded in the snapshot's `error` field.
    pub async fn force_save(&self) -> Result<(), ProgressError> {
        self.shared.cancel_pending();
        let step = self.current_step();
        Arc::clone(&self.shared).persist(step).await
    }

    fn apply(&self, step: OnboardingStep) {
        let shared = &self.shared;
        shared.local_writes.fetch_add(1, Ordering::SeqCst);
        shared.state.send_modify(|s| {
            s.current_step = step;
            s.error = None;
        });

        let mut slot = shared.lock_debounce();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let delay = shared.config.debounce;
        let timer_shared = Arc::clone(shared);
        *slot = Some(shared.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so a later abort of this timer cannot cancel the request.
            let runtime = timer_shared.runtime.clone();
            runtime.spawn(async move {
                let _ = timer_shared.persist(step).await;
            });
        }));
        debug!(proposal_id = %shared.proposal_id, step = step.index(), "Onboarding step updated");
    }
}

impl Shared {
    fn lock_debounce(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.debounce.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_pending(&self) {
        if let Some(handle) = self.lock_debounce().take() {
            handle.abort();
        }
    }

    async fn restore(self: Arc<Self>) {
        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(timeout, self.store.fetch_step(&self.proposal_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProgressError::Timeout { timeout }),
        };

        match result {
            Ok(step) => {
                let mut applied = false;
                self.state.send_modify(|s| {
                    // A local update made while loading is newer than the stored value.
                    if self.local_writes.load(Ordering::SeqCst) == 0 {
                        s.current_step = step;
                        applied = true;
                    }
                    s.loading = false;
                });
                if applied {
                    info!(proposal_id = %self.proposal_id, step = step.index(), "Onboarding step restored");
                } else {
                    debug!(
                        proposal_id = %self.proposal_id,
                        stored = step.index(),
                        "Restored step superseded by local update"
                    );
                }
            }
            Err(e) => {
                warn!(proposal_id = %self.proposal_id, "Failed to fetch initial onboarding step: {e}");
                self.state.send_modify(|s| s.loading = false);
            }
        }
    }

    async fn persist(self: Arc<Self>, step: OnboardingStep) -> Result<(), ProgressError> {
        if !self.config.auto_save {
            debug!(proposal_id = %self.proposal_id, "Auto-save disabled, skipping persist");
            return Ok(());
        }

        let seq = self.save_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| s.is_saving = true);

        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.store.update_step(&self.proposal_id, step),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProgressError::Timeout { timeout }),
        };

        match &result {
            Ok(()) => {
                debug!(proposal_id = %self.proposal_id, step = step.index(), seq, "Onboarding step saved")
            }
            Err(e) => {
                warn!(proposal_id = %self.proposal_id, step = step.index(), seq, "Error saving onboarding step: {e}")
            }
        }

        let mut stale = false;
        self.state.send_modify(|s| {
            if self.save_seq.load(Ordering::SeqCst) != seq {
                stale = true;
                return;
            }
            s.is_saving = false;
            s.error = result.as_ref().err().map(ToString::to_string);
        });
        if stale {
            debug!(proposal_id = %self.proposal_id, seq, "Discarding stale save completion");
        }

        result
    }
}

impl Drop for StepTracker {
    fn drop(&mut self) {
        self.shared.cancel_pending();
    }
}
