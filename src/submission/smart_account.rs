//! Gasless submission through a smart account
//!
//! The smart account signs a user operation calling `saveScore`, the bundler
//! submits it, and the receipt is polled until it shows up or the wait runs
//! out. The whole attempt is bounded by the smart-account timeout; on expiry
//! the operation may still be included later, but the abandoned attempt
//! reports no more progress and stops polling.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    PendingSubmission, ProgressReporter, SubmissionOutcome, SubmissionPath, SubmissionResult,
};
use crate::bundler::{Bundler, UserOperation, UserOperationReceipt};
use crate::config::SubmitConfig;
use crate::contract::ContractCall;
use crate::error::{reclassify, ErrorEnvelope, SubmissionError};
use crate::timeout::with_timeout;

/// Contract account able to sign user operations for its owner
#[async_trait]
pub trait SmartAccount: Send + Sync {
    fn address(&self) -> Address;

    /// Build and sign one user operation executing `calls` in order
    async fn prepare_user_operation(
        &self,
        calls: &[ContractCall],
    ) -> Result<UserOperation, ErrorEnvelope>;
}

pub struct SmartAccountSubmitter {
    bundler: Option<Arc<dyn Bundler>>,
    contract: Address,
    config: SubmitConfig,
}

impl SmartAccountSubmitter {
    pub fn new(bundler: Option<Arc<dyn Bundler>>, contract: Address, config: SubmitConfig) -> Self {
        Self {
            bundler,
            contract,
            config,
        }
    }

    pub fn has_bundler(&self) -> bool {
        self.bundler.is_some()
    }

    /// Whether a gasless attempt can be made with `account`
    pub fn is_available(&self, account: Option<&Arc<dyn SmartAccount>>) -> bool {
        account.is_some() && self.bundler.is_some()
    }

    pub async fn submit(
        &self,
        account: Option<Arc<dyn SmartAccount>>,
        score: u64,
        progress: &ProgressReporter,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let account =
            account.ok_or_else(|| SubmissionError::NotConfigured("smart account".to_string()))?;
        let bundler = self
            .bundler
            .clone()
            .ok_or_else(|| SubmissionError::NotConfigured("bundler".to_string()))?;
        let account_address = account.address();

        progress.emit_at("Preparing gasless transaction...", 0);
        let ticker = progress.start_ticker(self.config.progress_tick(), |secs| {
            format!("Processing gasless transaction... ({}s)", secs)
        });

        let (attempt_progress, scope) = progress.scoped();
        let attempt = send_and_confirm(
            account,
            bundler,
            ContractCall::save_score(self.contract, score),
            self.config.clone(),
            attempt_progress,
        );
        let result = with_timeout(
            attempt,
            self.config.smart_account_timeout(),
            "Smart account transaction timeout",
        )
        .await
        .and_then(|inner| inner);

        drop(scope);
        drop(ticker);

        match result {
            Ok(outcome) => {
                progress.emit(format!("Success! ({}s)", progress.elapsed_secs()));
                Ok(outcome)
            }
            Err(e) => Err(reclassify(e, account_address)),
        }
    }
}

async fn send_and_confirm(
    account: Arc<dyn SmartAccount>,
    bundler: Arc<dyn Bundler>,
    call: ContractCall,
    config: SubmitConfig,
    progress: ProgressReporter,
) -> Result<SubmissionOutcome, SubmissionError> {
    let op = account
        .prepare_user_operation(std::slice::from_ref(&call))
        .await
        .map_err(SubmissionError::Unknown)?;

    progress.emit("Submitting to bundler...");
    let op_hash = bundler
        .send_user_operation(&op)
        .await
        .map_err(|e| SubmissionError::Unknown(e.into()))?;
    info!("User operation {} sent from {}", op_hash, account.address());

    let pending = SubmissionOutcome::PendingUnconfirmed(PendingSubmission {
        operation_hash: op_hash,
        path_used: SubmissionPath::SmartAccount,
        used_fallback: false,
    });
    if progress.is_detached() {
        debug!("Caller gave up before {} was sent, not polling", op_hash);
        return Ok(pending);
    }

    progress.emit("Waiting for confirmation...");
    let receipt = wait_for_receipt(
        bundler.as_ref(),
        op_hash,
        config.receipt_poll_interval(),
        config.receipt_max_wait(),
        &progress,
    )
    .await;

    Ok(match receipt {
        Some(receipt) => {
            let transaction_hash = receipt.transaction_hash().unwrap_or(op_hash);
            if !receipt.success {
                warn!("User operation {} included but reverted", op_hash);
            }
            SubmissionOutcome::Success(SubmissionResult {
                transaction_hash,
                path_used: SubmissionPath::SmartAccount,
                used_fallback: false,
            })
        }
        None if progress.is_detached() => pending,
        None => {
            warn!(
                "No receipt for user operation {} after {:?}",
                op_hash,
                config.receipt_max_wait()
            );
            pending
        }
    })
}

/// Poll for a receipt every `interval` while less than `max_wait` has
/// passed, so a 60 s wait at 2 s polls 30 times (t = 0 to 58).
///
/// A missing receipt is expected while the operation is pending; lookup
/// errors are logged and polling continues. Stops early once `progress` is
/// detached.
pub async fn wait_for_receipt(
    bundler: &dyn Bundler,
    op_hash: B256,
    interval: Duration,
    max_wait: Duration,
    progress: &ProgressReporter,
) -> Option<UserOperationReceipt> {
    let deadline = Instant::now() + max_wait;

    while Instant::now() < deadline {
        if progress.is_detached() {
            debug!("Stopped polling for {}, caller gave up", op_hash);
            return None;
        }

        match bundler.get_user_operation_receipt(op_hash).await {
            Ok(Some(receipt)) => return Some(receipt),
            Ok(None) => debug!("User operation {} not yet included", op_hash),
            Err(e) => warn!("Receipt lookup for {} failed: {}", op_hash, e),
        }

        tokio::time::sleep(interval).await;
    }

    None
}
