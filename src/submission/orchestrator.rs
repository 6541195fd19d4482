//! Path selection and fallback
//!
//! | smart-account failure        | action                         |
//! |------------------------------|--------------------------------|
//! | user rejected                | stop, no EOA attempt           |
//! | insufficient funds           | stop, no EOA attempt           |
//! | anything else                | retry once from the EOA wallet |
//!
//! A smart-account attempt that timed out may still land on chain, so a
//! fallback can record the score twice. The contract keeps the best score,
//! which makes a duplicate harmless for ranking.

use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    EoaSubmitter, ProgressCallback, ProgressReporter, SmartAccountSubmitter, SubmissionOutcome,
};
use crate::error::{reclassify, SubmissionError};
use crate::session::{TransactionSigner, WalletSession};

pub struct SubmissionOrchestrator {
    session: Arc<WalletSession>,
    contract: Address,
    smart_account: SmartAccountSubmitter,
    eoa: EoaSubmitter,
}

impl SubmissionOrchestrator {
    pub fn new(
        session: Arc<WalletSession>,
        contract: Address,
        smart_account: SmartAccountSubmitter,
        eoa: EoaSubmitter,
    ) -> Self {
        Self {
            session,
            contract,
            smart_account,
            eoa,
        }
    }

    pub fn eoa(&self) -> &EoaSubmitter {
        &self.eoa
    }

    /// Record `score` for the connected player.
    ///
    /// Tries the gasless path when a smart account and bundler are available
    /// and falls back to the EOA wallet on recoverable failures.
    pub async fn submit_score(
        &self,
        score: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        if self.contract == Address::ZERO {
            return Err(SubmissionError::NotConfigured("contract".to_string()));
        }

        let state = self.session.snapshot();
        let (address, signer) = match (state.address, state.signer.clone()) {
            (Some(address), Some(signer)) => (address, signer),
            _ => return Err(SubmissionError::NotConnected),
        };

        let progress = ProgressReporter::new(on_progress);

        if !self.smart_account.is_available(state.smart_account.as_ref()) {
            progress.emit_at("Using EOA wallet for transaction...", 0);
            return self.submit_eoa(signer, address, score, &progress).await;
        }

        let sa_error = match self
            .smart_account
            .submit(state.smart_account.clone(), score, &progress)
            .await
        {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => e,
        };

        warn!("Smart account submission failed, falling back to EOA: {}", sa_error);
        progress.emit_at("Attempting with EOA wallet...", 0);

        match self.submit_eoa(signer, address, score, &progress).await {
            Ok(outcome) => {
                info!("Score {} submitted via EOA fallback", score);
                Ok(outcome.into_fallback())
            }
            Err(e) if e.is_terminal() => Err(e),
            Err(eoa_error) => Err(SubmissionError::BothPathsFailed {
                smart_account: sa_error.to_string(),
                eoa: eoa_error.to_string(),
            }),
        }
    }

    async fn submit_eoa(
        &self,
        signer: Arc<dyn TransactionSigner>,
        address: Address,
        score: u64,
        progress: &ProgressReporter,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        self.eoa
            .submit(signer, score, progress)
            .await
            .map_err(|e| reclassify(e, address))
    }
}
