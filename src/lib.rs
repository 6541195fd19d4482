//! Score Relay
//!
//! Records game scores in an on-chain ScoreStore contract and rebuilds the
//! leaderboard from its event logs.
//!
//! ## Module Structure
//!
//! - `rpc`: JSON-RPC transport and log filter types
//! - `fetcher`: `eth_getLogs` with bounded exponential backoff
//! - `leaderboard`: chunked log scan and ranking
//! - `contract`: ScoreStore ABI and calldata helpers
//! - `config`: chain, bundler, scan and submission settings
//! - `session`: wallet connection state
//! - `bundler`: ERC-4337 user operation client
//! - `submission/`: smart-account and EOA paths plus the fallback policy
//! - `client`: application facade

// ============================================================================
// TRANSPORT AND CHAIN DATA
// ============================================================================

/// JSON-RPC client
pub mod rpc;

/// Retrying log fetcher
pub mod fetcher;

/// Leaderboard aggregation
pub mod leaderboard;

/// ScoreStore contract interface
pub mod contract;

/// ERC-4337 bundler client
pub mod bundler;

// ============================================================================
// SUBMISSION
// ============================================================================

/// Error taxonomy and classification
pub mod error;

/// Deadline wrapper
pub mod timeout;

/// Wallet session and connect flow
pub mod session;

/// Smart-account / EOA submission
pub mod submission;

// ============================================================================
// CONFIGURATION AND FACADE
// ============================================================================

pub mod config;

pub mod client;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use bundler::{Bundler, BundlerClient, UserOperation, UserOperationReceipt};
pub use client::ScoreClient;
pub use config::{
    BundlerConfig, ChainConfig, ConfigError, ContractConfig, RelayConfig, ScanConfig,
    SubmitConfig, WalletConfig,
};
pub use contract::{score_saved_topic, ContractCall, ScoreStore};
pub use error::{classify, ErrorEnvelope, SubmissionError};
pub use fetcher::{fetch_with_retry, FetchOutcome, LogSource, RetryPolicy};
pub use leaderboard::{
    chunk_ranges, decode_score_log, LeaderboardEntry, LogAggregator, PlayerScores, ScanReport,
};
pub use rpc::{BlockRange, ChainReader, LogFilter, RawLog, RpcClient, RpcError};
pub use session::{
    ProviderSigner, SmartAccountFactory, TransactionRequest, TransactionSigner, WalletProvider,
    WalletSession,
};
pub use submission::{
    PendingSubmission, ProgressCallback, ProgressEvent, SmartAccount, SubmissionOrchestrator,
    SubmissionOutcome, SubmissionPath, SubmissionResult,
};
pub use timeout::with_timeout;
