//! Transfer progress state machine.
//!
//! A run moves strictly forward through `Step::ALL`, one step at a time.
//! Success parks on the final step with the transaction hash; failure resets
//! to step 0. Snapshots are published on a `watch` channel.

use serde::{Deserialize, Serialize};
use smoothsend_types::Hex;
use thiserror::Error;
use tokio::sync::watch;

/// Error recorded when a run is dropped before reaching a terminal state.
pub const ABANDONED: &str = "Transfer was interrupted. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Validate,
    Quote,
    BuildTransaction,
    Sign,
    Serialize,
    Submit,
    Confirm,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Validate,
        Step::Quote,
        Step::BuildTransaction,
        Step::Sign,
        Step::Serialize,
        Step::Submit,
        Step::Confirm,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Validate => "Validating transfer",
            Step::Quote => "Getting fee quote",
            Step::BuildTransaction => "Building transaction",
            Step::Sign => "Waiting for wallet signature",
            Step::Serialize => "Serializing transaction",
            Step::Submit => "Submitting to relayer",
            Step::Confirm => "Confirming",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub step: usize,
    pub status: RunStatus,
    pub tx_hash: Option<Hex>,
    /// User-facing message of the last failure.
    pub error: Option<String>,
}

impl ProgressState {
    pub fn current_step(&self) -> Step {
        Step::ALL[self.step.min(Step::ALL.len() - 1)]
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("a transfer is already in progress")]
    Busy,
    #[error("no transfer is running")]
    NotRunning,
    #[error("cannot move from step {from} to {to:?}")]
    OutOfOrder { from: usize, to: Step },
}

/// Single-run progress tracker. Every transition is an atomic check-and-set.
#[derive(Debug)]
pub struct ProgressTracker {
    state: watch::Sender<ProgressState>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ProgressState::default());
        Self { state }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.borrow().clone()
    }

    /// Start a run at step 0. Rejected while another run is active.
    pub fn begin(&self) -> Result<(), ProgressError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            if s.is_running() {
                result = Err(ProgressError::Busy);
                return false;
            }
            *s = ProgressState {
                step: 0,
                status: RunStatus::Running,
                tx_hash: None,
                error: None,
            };
            true
        });
        result
    }

    /// `begin`, returning a guard that fails the run if it is dropped armed.
    pub fn begin_guarded(&self) -> Result<RunGuard<'_>, ProgressError> {
        self.begin()?;
        Ok(RunGuard {
            tracker: self,
            armed: true,
        })
    }

    /// Move to `to`, which must be exactly one step past the current one.
    pub fn advance(&self, to: Step) -> Result<(), ProgressError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            if !s.is_running() {
                result = Err(ProgressError::NotRunning);
                return false;
            }
            if to.index() != s.step + 1 {
                result = Err(ProgressError::OutOfOrder { from: s.step, to });
                return false;
            }
            s.step = to.index();
            true
        });
        result
    }

    /// Finish on the final step with the confirmed hash.
    pub fn succeed(&self, tx_hash: &str) -> Result<(), ProgressError> {
        let mut result = Ok(());
        self.state.send_if_modified(|s| {
            if !s.is_running() {
                result = Err(ProgressError::NotRunning);
                return false;
            }
            if s.step != Step::Confirm.index() {
                result = Err(ProgressError::OutOfOrder {
                    from: s.step,
                    to: Step::Confirm,
                });
                return false;
            }
            s.status = RunStatus::Succeeded;
            s.tx_hash = Some(tx_hash.to_string());
            true
        });
        result
    }

    /// Abort the run and reset to step 0.
    pub fn fail(&self, message: &str) {
        self.state.send_replace(ProgressState {
            step: 0,
            status: RunStatus::Failed,
            tx_hash: None,
            error: Some(message.to_string()),
        });
    }
}

/// Holds an active run. Dropping it armed (a cancelled or timed-out future)
/// fails the run so the tracker never stays `Running`.
#[derive(Debug)]
pub struct RunGuard<'a> {
    tracker: &'a ProgressTracker,
    armed: bool,
}

impl RunGuard<'_> {
    /// The run reached a terminal state on its own.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.tracker.snapshot().is_running() {
            self.tracker.fail(ABANDONED);
        }
    }
}
