//! Relay Configuration
//!
//! Defines the configuration for the score relay including:
//! - Chain metadata (id, RPC endpoints, block explorer)
//! - The deployed ScoreStore contract address
//! - Bundler / sponsor endpoint for gasless submissions
//! - Log scan pagination and retry limits
//! - Submission timeouts and receipt polling cadence
//!
//! Every section has a `Default`; [`RelayConfig::from_env`] layers
//! environment variables on top and [`RelayConfig::load`] reads a TOML file.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::fetcher::RetryPolicy;

/// ERC-4337 v0.7 entry point, same address on every chain
pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

const DEFAULT_CONTRACT: Address = address!("0877c473BCe3aAEa4705AB5C3e24d7b0f630C956");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub chain: ChainConfig,
    pub contract: ContractConfig,
    pub bundler: BundlerConfig,
    pub wallet: WalletConfig,
    pub scan: ScanConfig,
    pub submit: SubmitConfig,
}

impl RelayConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&raw)?.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env_string("SCORE_RELAY_RPC_URL") {
            self.chain.rpc_urls = vec![url];
        }
        if let Some(id) = env_parse("SCORE_RELAY_CHAIN_ID") {
            self.chain.id = id;
        }
        if let Some(url) = env_string("SCORE_RELAY_EXPLORER_URL") {
            self.chain.explorer_url = url;
        }
        if let Some(address) = env_parse("SCORE_RELAY_CONTRACT") {
            self.contract.address = address;
        }
        if let Some(url) = env_string("SCORE_RELAY_BUNDLER_URL") {
            self.bundler.url = Some(url);
        }
        if let Some(project) = env_string("SCORE_RELAY_ZERODEV_PROJECT_ID") {
            self.bundler.zerodev_project_id = Some(project);
        }
        if let Some(url) = env_string("SCORE_RELAY_WALLET_URL") {
            self.wallet.url = Some(url);
        }
        if let Some(size) = env_parse("SCORE_RELAY_CHUNK_SIZE") {
            self.scan.chunk_size = size;
        }
        if let Some(bound) = env_parse("SCORE_RELAY_SCAN_CONCURRENCY") {
            self.scan.max_concurrency = bound;
        }
        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Native currency metadata, used when asking a wallet to add the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Chain metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub id: u64,
    pub name: String,
    pub currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: 10143,
            name: "Monad Testnet".to_string(),
            currency: NativeCurrency {
                name: "MON".to_string(),
                symbol: "MON".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.ankr.com/monad_testnet".to_string()],
            explorer_url: "https://testnet.monadexplorer.com".to_string(),
        }
    }
}

impl ChainConfig {
    /// Primary RPC endpoint
    pub fn rpc_url(&self) -> &str {
        self.rpc_urls
            .first()
            .map(String::as_str)
            .unwrap_or("https://rpc.ankr.com/monad_testnet")
    }

    /// `0x`-prefixed chain id as wallets expect it
    pub fn hex_id(&self) -> String {
        format!("0x{:x}", self.id)
    }

    /// Block explorer page for a transaction
    pub fn explorer_link(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub address: Address,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_CONTRACT,
        }
    }
}

impl ContractConfig {
    /// The zero address means the contract was never deployed
    pub fn is_deployed(&self) -> bool {
        self.address != Address::ZERO
    }
}

/// Bundler / sponsor endpoint.
///
/// An endpoint alone does not enable gasless submissions: the application
/// must also install a [`SmartAccountFactory`] through
/// [`ScoreClient::with_smart_account_factory`] so that connecting yields a
/// smart account. Without one every score is sent from the EOA.
///
/// [`SmartAccountFactory`]: crate::session::SmartAccountFactory
/// [`ScoreClient::with_smart_account_factory`]: crate::client::ScoreClient::with_smart_account_factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Explicit bundler URL, takes precedence over the project id
    pub url: Option<String>,
    /// ZeroDev project id, expanded into a self-funded bundler URL
    pub zerodev_project_id: Option<String>,
    pub entry_point: Address,
    pub timeout_secs: u64,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            url: None,
            zerodev_project_id: None,
            entry_point: ENTRY_POINT_V07,
            timeout_secs: 90,
        }
    }
}

impl BundlerConfig {
    /// Resolved endpoint, `None` when gasless submission is not configured
    pub fn endpoint(&self, chain_id: u64) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        self.zerodev_project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|project| {
                format!(
                    "https://rpc.zerodev.app/api/v3/{}/chain/{}?selfFunded=true",
                    project, chain_id
                )
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Wallet provider endpoint (EIP-1193 bridge or a node holding the account)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub url: Option<String>,
}

/// Log scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Blocks per `eth_getLogs` request
    pub chunk_size: u64,
    /// Chunks in flight at once; 1 keeps the scan strictly sequential
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    /// Leaderboard length
    pub top_n: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_concurrency: 1,
            max_attempts: 3,
            base_backoff_ms: 1000,
            top_n: 10,
        }
    }
}

impl ScanConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_backoff_ms),
        }
    }
}

/// Submission timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    /// Overall bound on the smart-account submit + receipt wait
    pub smart_account_timeout_secs: u64,
    pub receipt_poll_interval_secs: u64,
    pub receipt_max_wait_secs: u64,
    pub balance_timeout_secs: u64,
    pub progress_tick_secs: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            smart_account_timeout_secs: 90,
            receipt_poll_interval_secs: 2,
            receipt_max_wait_secs: 60,
            balance_timeout_secs: 5,
            progress_tick_secs: 1,
        }
    }
}

impl SubmitConfig {
    pub fn smart_account_timeout(&self) -> Duration {
        Duration::from_secs(self.smart_account_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_secs(self.receipt_poll_interval_secs.max(1))
    }

    pub fn receipt_max_wait(&self) -> Duration {
        Duration::from_secs(self.receipt_max_wait_secs)
    }

    pub fn balance_timeout(&self) -> Duration {
        Duration::from_secs(self.balance_timeout_secs)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_secs(self.progress_tick_secs.max(1))
    }
}
