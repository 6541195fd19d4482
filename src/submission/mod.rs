//! Score submission
//!
//! Two ways to get a score on chain:
//! - [`smart_account`]: a sponsored user operation through a bundler, so the
//!   player pays no gas
//! - [`eoa`]: a plain transaction from the connected wallet
//!
//! The [`orchestrator`] tries the first and falls back to the second.

pub mod eoa;
pub mod orchestrator;
pub mod smart_account;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use eoa::EoaSubmitter;
pub use orchestrator::SubmissionOrchestrator;
pub use smart_account::{SmartAccount, SmartAccountSubmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPath {
    SmartAccount,
    Eoa,
}

impl fmt::Display for SubmissionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionPath::SmartAccount => write!(f, "smart account"),
            SubmissionPath::Eoa => write!(f, "EOA"),
        }
    }
}

/// A confirmed (or broadcast, for EOA) submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub transaction_hash: B256,
    pub path_used: SubmissionPath,
    pub used_fallback: bool,
}

/// A user operation accepted by the bundler but without a receipt in time.
/// It may still be included later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub operation_hash: B256,
    pub path_used: SubmissionPath,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success(SubmissionResult),
    PendingUnconfirmed(PendingSubmission),
}

impl SubmissionOutcome {
    /// Transaction hash, or the operation hash while unconfirmed
    pub fn transaction_hash(&self) -> B256 {
        match self {
            SubmissionOutcome::Success(result) => result.transaction_hash,
            SubmissionOutcome::PendingUnconfirmed(pending) => pending.operation_hash,
        }
    }

    pub fn path_used(&self) -> SubmissionPath {
        match self {
            SubmissionOutcome::Success(result) => result.path_used,
            SubmissionOutcome::PendingUnconfirmed(pending) => pending.path_used,
        }
    }

    pub fn used_fallback(&self) -> bool {
        match self {
            SubmissionOutcome::Success(result) => result.used_fallback,
            SubmissionOutcome::PendingUnconfirmed(pending) => pending.used_fallback,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Success(_))
    }

    /// Mark as produced by the fallback path
    pub fn into_fallback(self) -> Self {
        match self {
            SubmissionOutcome::Success(result) => SubmissionOutcome::Success(SubmissionResult {
                used_fallback: true,
                ..result
            }),
            SubmissionOutcome::PendingUnconfirmed(pending) => {
                SubmissionOutcome::PendingUnconfirmed(PendingSubmission {
                    used_fallback: true,
                    ..pending
                })
            }
        }
    }
}

// ============================================================================
// Progress reporting
// ============================================================================

/// Informational progress update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub seconds_elapsed: u64,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Emits progress events relative to the start of a submission
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
    detached: Option<Arc<AtomicBool>>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            started: Instant::now(),
            detached: None,
        }
    }

    /// Child reporter for work that may outlive its caller.
    ///
    /// Once the returned [`ScopeGuard`] is dropped the child goes quiet and
    /// [`ProgressReporter::is_detached`] turns true.
    pub fn scoped(&self) -> (ProgressReporter, ScopeGuard) {
        let flag = Arc::new(AtomicBool::new(false));
        let child = ProgressReporter {
            callback: self.callback.clone(),
            started: self.started,
            detached: Some(flag.clone()),
        };
        (child, ScopeGuard { flag })
    }

    /// Whether the scope this reporter was created for has ended
    pub fn is_detached(&self) -> bool {
        self.detached
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Emit `stage` stamped with the elapsed time
    pub fn emit(&self, stage: impl Into<String>) {
        self.emit_at(stage, self.elapsed_secs());
    }

    pub fn emit_at(&self, stage: impl Into<String>, seconds_elapsed: u64) {
        if self.is_detached() {
            return;
        }
        if let Some(callback) = &self.callback {
            callback(&ProgressEvent {
                stage: stage.into(),
                seconds_elapsed,
            });
        }
    }

    /// Emit `label(elapsed)` every `period` until the guard is dropped
    pub fn start_ticker<F>(&self, period: Duration, label: F) -> TickerGuard
    where
        F: Fn(u64) -> String + Send + 'static,
    {
        if self.callback.is_none() {
            return TickerGuard { handle: None };
        }

        let reporter = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let elapsed = reporter.elapsed_secs();
                reporter.emit_at(label(elapsed), elapsed);
            }
        });

        TickerGuard {
            handle: Some(handle),
        }
    }
}

/// Ends a [`ProgressReporter::scoped`] child when dropped
pub struct ScopeGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Stops the progress ticker when dropped
pub struct TickerGuard {
    handle: Option<JoinHandle<()>>,
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
