//! Direct submission from the connected wallet
//!
//! The player pays gas, so the balance is checked first: an empty wallet is
//! reported as insufficient funds without asking the wallet to sign.

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProgressReporter, SubmissionOutcome, SubmissionPath, SubmissionResult};
use crate::contract::save_score_calldata;
use crate::error::SubmissionError;
use crate::rpc::ChainReader;
use crate::session::{TransactionRequest, TransactionSigner};
use crate::timeout::with_timeout;

pub struct EoaSubmitter {
    chain: Arc<dyn ChainReader>,
    contract: Address,
    balance_timeout: Duration,
}

impl EoaSubmitter {
    pub fn new(chain: Arc<dyn ChainReader>, contract: Address, balance_timeout: Duration) -> Self {
        Self {
            chain,
            contract,
            balance_timeout,
        }
    }

    /// Native balance of `address`.
    ///
    /// A lookup that fails or takes longer than the balance timeout counts
    /// as zero.
    pub async fn balance_of(&self, address: Address) -> U256 {
        let chain = self.chain.clone();
        let lookup = async move { chain.get_balance(address).await };

        let result = with_timeout(lookup, self.balance_timeout, "Balance check timeout")
            .await
            .and_then(|inner| inner.map_err(|e| SubmissionError::Unknown(e.into())));

        match result {
            Ok(balance) => balance,
            Err(e) => {
                warn!("Balance check for {} failed, assuming zero: {}", address, e);
                U256::ZERO
            }
        }
    }

    /// Send `saveScore(score)` from the signer's account.
    ///
    /// Send failures come back unclassified as [`SubmissionError::Unknown`].
    pub async fn submit(
        &self,
        signer: Arc<dyn TransactionSigner>,
        score: u64,
        progress: &ProgressReporter,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let from = signer.address();

        let balance = self.balance_of(from).await;
        debug!("EOA {} balance: {}", from, balance);
        if balance.is_zero() {
            return Err(SubmissionError::InsufficientFunds { address: from });
        }

        progress.emit("Sending transaction from EOA wallet...");
        let tx = TransactionRequest {
            from,
            to: self.contract,
            data: save_score_calldata(score),
            value: U256::ZERO,
        };
        let transaction_hash = signer
            .send_transaction(&tx)
            .await
            .map_err(SubmissionError::Unknown)?;

        info!("Score {} sent from EOA {} in {}", score, from, transaction_hash);

        Ok(SubmissionOutcome::Success(SubmissionResult {
            transaction_hash,
            path_used: SubmissionPath::Eoa,
            used_fallback: false,
        }))
    }
}
