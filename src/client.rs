//! Score client
//!
//! Entry point for applications: connects the wallet, submits scores and
//! reads the leaderboard. Built once from a [`RelayConfig`]; the wallet
//! session inside is shared with the submitters.

use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::info;

use crate::bundler::{Bundler, BundlerClient};
use crate::config::RelayConfig;
use crate::contract::{decode_score_word, get_score_calldata};
use crate::error::SubmissionError;
use crate::leaderboard::{LeaderboardEntry, LogAggregator};
use crate::rpc::{RpcClient, RpcError, DEFAULT_RPC_TIMEOUT};
use crate::session::{SmartAccountFactory, WalletProvider, WalletSession};
use crate::submission::{
    EoaSubmitter, ProgressCallback, SmartAccountSubmitter, SubmissionOrchestrator,
    SubmissionOutcome,
};

pub struct ScoreClient {
    config: RelayConfig,
    node: Arc<RpcClient>,
    session: Arc<WalletSession>,
    orchestrator: SubmissionOrchestrator,
    aggregator: LogAggregator,
    smart_accounts: Option<Arc<dyn SmartAccountFactory>>,
}

impl ScoreClient {
    pub fn new(config: RelayConfig) -> Result<Self, RpcError> {
        let node = Arc::new(RpcClient::new(config.chain.rpc_url(), DEFAULT_RPC_TIMEOUT)?);

        let bundler: Option<Arc<dyn Bundler>> = match config.bundler.endpoint(config.chain.id) {
            Some(url) => {
                info!("Bundler endpoint configured: {}", url);
                let rpc = RpcClient::new(url, config.bundler.timeout())?;
                Some(Arc::new(BundlerClient::new(rpc, config.bundler.entry_point)))
            }
            None => None,
        };

        let contract = config.contract.address;
        let session = Arc::new(WalletSession::new());

        let orchestrator = SubmissionOrchestrator::new(
            session.clone(),
            contract,
            SmartAccountSubmitter::new(bundler, contract, config.submit.clone()),
            EoaSubmitter::new(node.clone(), contract, config.submit.balance_timeout()),
        );
        let aggregator = LogAggregator::new(node.clone(), contract, config.scan.clone());

        Ok(Self {
            config,
            node,
            session,
            orchestrator,
            aggregator,
            smart_accounts: None,
        })
    }

    /// Provision a smart account on every connect
    pub fn with_smart_account_factory(mut self, factory: Arc<dyn SmartAccountFactory>) -> Self {
        self.smart_accounts = Some(factory);
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Connect through `provider` and switch it to the configured chain
    pub async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Address, SubmissionError> {
        self.session
            .connect(provider, &self.config.chain, self.smart_accounts.as_deref())
            .await
    }

    /// Connect through the wallet endpoint from the configuration
    pub async fn connect_configured_wallet(&self) -> Result<Address, SubmissionError> {
        let url = self
            .config
            .wallet
            .url
            .clone()
            .ok_or_else(|| SubmissionError::NotConfigured("wallet url".to_string()))?;
        let provider = RpcClient::new(url, DEFAULT_RPC_TIMEOUT)
            .map_err(|e| SubmissionError::Network(e.to_string()))?;
        self.connect(Arc::new(provider)).await
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub async fn submit_score(
        &self,
        score: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        self.orchestrator.submit_score(score, on_progress).await
    }

    /// Top players, empty when the scan fails
    pub async fn get_leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.aggregator.aggregate_scores().await
    }

    pub fn aggregator(&self) -> &LogAggregator {
        &self.aggregator
    }

    /// Best score the contract holds for `player`
    pub async fn get_player_score(&self, player: Address) -> Result<u64, RpcError> {
        let raw = self
            .node
            .call(self.config.contract.address, get_score_calldata(player))
            .await?;
        decode_score_word(&raw).ok_or_else(|| RpcError::MalformedResult {
            method: "eth_call".to_string(),
            reason: format!("getScore returned {} bytes", raw.len()),
        })
    }

    /// Native balance, zero when the lookup fails
    pub async fn eoa_balance(&self, address: Address) -> U256 {
        self.orchestrator.eoa().balance_of(address).await
    }

    pub fn explorer_link(&self, tx_hash: &str) -> String {
        self.config.chain.explorer_link(tx_hash)
    }

    pub fn eoa_address(&self) -> Option<Address> {
        self.session.address()
    }

    pub fn smart_account_address(&self) -> Option<Address> {
        self.session.snapshot().smart_account_address()
    }
}
