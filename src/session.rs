//! Wallet session
//!
//! Holds the connected account for the lifetime of the client. The session
//! has a single writer ([`WalletSession::connect`] / [`WalletSession::disconnect`])
//! and any number of readers: submitters take an [`Arc`] snapshot of the
//! state at the start of a submission and never observe a half-updated
//! session.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ChainConfig;
use crate::error::{classify, ErrorEnvelope, SubmissionError, UNRECOGNIZED_CHAIN_CODE};
use crate::rpc::{RpcClient, RpcError};
use crate::submission::smart_account::SmartAccount;

/// EIP-1193 style request interface of a wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[async_trait]
impl WalletProvider for RpcClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        RpcClient::request(self, method, params).await
    }
}

/// Plain transaction sent from the connected account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Signs and broadcasts transactions for one account
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ErrorEnvelope>;
}

/// Signer that delegates to the wallet through `eth_sendTransaction`
pub struct ProviderSigner {
    provider: Arc<dyn WalletProvider>,
    address: Address,
}

impl ProviderSigner {
    pub fn new(provider: Arc<dyn WalletProvider>, address: Address) -> Self {
        Self { provider, address }
    }
}

#[async_trait]
impl TransactionSigner for ProviderSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ErrorEnvelope> {
        let raw = self
            .provider
            .request("eth_sendTransaction", json!([tx]))
            .await?;
        serde_json::from_value(raw.clone()).map_err(|e| {
            ErrorEnvelope::new(format!("Invalid transaction hash from wallet: {}", raw))
                .with_cause(e.to_string())
        })
    }
}

/// Creates the smart account owned by a freshly connected wallet
#[async_trait]
pub trait SmartAccountFactory: Send + Sync {
    async fn provision(
        &self,
        owner: Address,
        provider: Arc<dyn WalletProvider>,
    ) -> Result<Arc<dyn SmartAccount>, ErrorEnvelope>;
}

/// Snapshot of the connected account
#[derive(Clone, Default)]
pub struct SessionState {
    pub address: Option<Address>,
    pub signer: Option<Arc<dyn TransactionSigner>>,
    pub smart_account: Option<Arc<dyn SmartAccount>>,
}

impl SessionState {
    pub fn smart_account_address(&self) -> Option<Address> {
        self.smart_account.as_ref().map(|sa| sa.address())
    }
}

/// Connected wallet, shared between the client and its submitters
#[derive(Default)]
pub struct WalletSession {
    state: RwLock<SessionState>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn address(&self) -> Option<Address> {
        self.state.read().address
    }

    pub fn smart_account(&self) -> Option<Arc<dyn SmartAccount>> {
        self.state.read().smart_account.clone()
    }

    pub fn is_connected(&self) -> bool {
        let state = self.state.read();
        state.address.is_some() && state.signer.is_some()
    }

    /// Replace the whole session at once
    pub fn bind(&self, state: SessionState) {
        *self.state.write() = state;
    }

    pub fn disconnect(&self) {
        self.bind(SessionState::default());
    }

    /// Connect through a wallet provider.
    ///
    /// Requests accounts, makes sure the wallet is on `chain` (adding it when
    /// the wallet does not know it), binds a [`ProviderSigner`] and, when a
    /// factory is given, provisions a smart account. Smart account failures
    /// leave an EOA-only session.
    pub async fn connect(
        &self,
        provider: Arc<dyn WalletProvider>,
        chain: &ChainConfig,
        factory: Option<&dyn SmartAccountFactory>,
    ) -> Result<Address, SubmissionError> {
        let accounts = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| classify(&ErrorEnvelope::from(e), Address::ZERO))?;

        let accounts: Vec<Address> = serde_json::from_value(accounts).map_err(|e| {
            SubmissionError::Unknown(ErrorEnvelope::new(format!(
                "Invalid account list from wallet: {}",
                e
            )))
        })?;
        let address = accounts
            .first()
            .copied()
            .ok_or(SubmissionError::NotConnected)?;

        ensure_chain(provider.as_ref(), chain).await;

        let signer: Arc<dyn TransactionSigner> =
            Arc::new(ProviderSigner::new(provider.clone(), address));

        let smart_account = match factory {
            Some(factory) => match factory.provision(address, provider.clone()).await {
                Ok(account) => {
                    info!(
                        "Smart account {} ready for owner {}",
                        account.address(),
                        address
                    );
                    Some(account)
                }
                Err(e) => {
                    warn!("Smart account setup failed, continuing with EOA only: {}", e);
                    None
                }
            },
            None => None,
        };

        self.bind(SessionState {
            address: Some(address),
            signer: Some(signer),
            smart_account,
        });

        info!("Wallet connected: {}", address);
        Ok(address)
    }
}

/// Switch the wallet to `chain`, adding it on EIP-3085 code 4902.
/// Failures are logged only; a wrong network shows up at submission time.
async fn ensure_chain(provider: &dyn WalletProvider, chain: &ChainConfig) {
    let switch = provider
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain.hex_id() }]),
        )
        .await;

    match switch {
        Ok(_) => {}
        Err(e) if e.code() == Some(UNRECOGNIZED_CHAIN_CODE) => {
            let params = json!([{
                "chainId": chain.hex_id(),
                "chainName": chain.name,
                "nativeCurrency": {
                    "name": chain.currency.name,
                    "symbol": chain.currency.symbol,
                    "decimals": chain.currency.decimals,
                },
                "rpcUrls": [chain.rpc_url()],
                "blockExplorerUrls": [chain.explorer_url],
            }]);
            if let Err(e) = provider.request("wallet_addEthereumChain", params).await {
                warn!("Failed to add chain {} to wallet: {}", chain.id, e);
            }
        }
        Err(e) => warn!("Failed to switch wallet to chain {}: {}", chain.id, e),
    }
}
