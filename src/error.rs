//! Submission error taxonomy
//!
//! Failures from the wallet, the node and the bundler arrive in whatever
//! shape those services choose. They are first normalised into an
//! [`ErrorEnvelope`] (code, message, cause chain) and then mapped onto the
//! small [`SubmissionError`] taxonomy by [`classify`], which is the only
//! place in the crate that looks at message text.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::rpc::RpcError;

/// EIP-1193 code for a request the user rejected in the wallet
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-3085 code for "chain not added to the wallet"
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

const USER_REJECTED_MARKERS: &[&str] = &["user rejected", "user denied"];

// "didn't pay prefund" is the ERC-4337 entry point's AA21 rejection
const INSUFFICIENT_FUNDS_MARKERS: &[&str] =
    &["insufficient", "exceeds balance", "didn't pay prefund"];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out"];

/// Normalised upstream failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// JSON-RPC / EIP-1193 error code, when the upstream provided one
    pub code: Option<i64>,
    pub message: String,
    /// Messages of underlying causes, outermost first
    #[serde(default)]
    pub causes: Vec<String>,
    /// Failure happened below the JSON-RPC layer (connection, HTTP status)
    #[serde(default)]
    pub transport: bool,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transport: true,
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    fn mentions(&self, markers: &[&str]) -> bool {
        std::iter::once(&self.message)
            .chain(self.causes.iter())
            .map(|text| text.to_lowercase())
            .any(|text| markers.iter().any(|marker| text.contains(marker)))
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

impl From<RpcError> for ErrorEnvelope {
    fn from(err: RpcError) -> Self {
        let transport = err.is_transport();
        let code = err.code();
        let mut envelope = ErrorEnvelope {
            code,
            message: err.to_string(),
            causes: Vec::new(),
            transport,
        };
        if let RpcError::Rpc {
            data: Some(data), ..
        } = &err
        {
            envelope.causes.push(data.to_string());
        }
        envelope
    }
}

#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    #[error("Transaction rejected by user")]
    UserRejected,
    #[error("INSUFFICIENT_FUNDS:{address}")]
    InsufficientFunds { address: Address },
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("Wallet not connected")]
    NotConnected,
    #[error("Network error: {0}")]
    Network(String),
    #[error("{0}")]
    Unknown(ErrorEnvelope),
    #[error("Both Smart Account and EOA failed. {eoa}")]
    BothPathsFailed { smart_account: String, eoa: String },
}

impl SubmissionError {
    /// Failures that must never trigger a fallback to another path
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionError::UserRejected | SubmissionError::InsufficientFunds { .. }
        )
    }

    /// Message suitable for showing to the player
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::UserRejected => {
                "You rejected the transaction. Please try again.".to_string()
            }
            SubmissionError::InsufficientFunds { address } => format!(
                "Your wallet {} doesn't have enough funds to pay gas fees. Please fund it and try again.",
                address
            ),
            SubmissionError::Timeout(_) => {
                "Transaction timed out - this may be due to network congestion. Please try again."
                    .to_string()
            }
            SubmissionError::NotConfigured(what) => {
                format!("Score submission is not configured: {}.", what)
            }
            SubmissionError::NotConnected => {
                "Wallet not connected. Please connect your wallet first.".to_string()
            }
            SubmissionError::Network(_) => {
                "Network error while submitting your score. Please check your connection and try again."
                    .to_string()
            }
            SubmissionError::Unknown(envelope) => envelope.message.clone(),
            SubmissionError::BothPathsFailed { .. } => {
                "Unable to submit your score to the blockchain. Please check your network connection and try again."
                    .to_string()
            }
        }
    }
}

/// Map a normalised upstream failure onto the taxonomy.
///
/// `account` is the address reported when the failure is a lack of funds.
pub fn classify(envelope: &ErrorEnvelope, account: Address) -> SubmissionError {
    if envelope.code == Some(USER_REJECTED_CODE) || envelope.mentions(USER_REJECTED_MARKERS) {
        return SubmissionError::UserRejected;
    }
    if envelope.mentions(INSUFFICIENT_FUNDS_MARKERS) {
        return SubmissionError::InsufficientFunds { address: account };
    }
    if envelope.mentions(TIMEOUT_MARKERS) {
        return SubmissionError::Timeout(envelope.message.clone());
    }
    if envelope.transport {
        return SubmissionError::Network(envelope.to_string());
    }
    SubmissionError::Unknown(envelope.clone())
}

/// Run still-unclassified errors through [`classify`]; typed errors pass as-is.
pub fn reclassify(err: SubmissionError, account: Address) -> SubmissionError {
    match err {
        SubmissionError::Unknown(envelope) => classify(&envelope, account),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Address {
        Address::repeat_byte(0x42)
    }

    #[test]
    fn test_user_rejected_by_code() {
        let envelope = ErrorEnvelope::new("request failed").with_code(USER_REJECTED_CODE);
        assert!(matches!(
            classify(&envelope, account()),
            SubmissionError::UserRejected
        ));
    }

    #[test]
    fn test_user_rejected_by_message() {
        let envelope =
            ErrorEnvelope::new("MetaMask Tx Signature: User denied transaction signature.");
        assert!(matches!(
            classify(&envelope, account()),
            SubmissionError::UserRejected
        ));
    }

    #[test]
    fn test_insufficient_funds_variants() {
        for message in [
            "INSUFFICIENT_FUNDS",
            "insufficient funds for gas * price + value",
            "transfer amount exceeds balance",
            "AA21 didn't pay prefund",
        ] {
            match classify(&ErrorEnvelope::new(message), account()) {
                SubmissionError::InsufficientFunds { address } => assert_eq!(address, account()),
                other => panic!("{} classified as {:?}", message, other),
            }
        }
    }

    #[test]
    fn test_marker_in_cause_chain() {
        let envelope = ErrorEnvelope::new("UserOperation reverted during simulation")
            .with_cause("sender balance insufficient");
        assert!(matches!(
            classify(&envelope, account()),
            SubmissionError::InsufficientFunds { .. }
        ));
    }

    #[test]
    fn test_timeout_and_network() {
        assert!(matches!(
            classify(&ErrorEnvelope::new("request timed out"), account()),
            SubmissionError::Timeout(_)
        ));
        assert!(matches!(
            classify(&ErrorEnvelope::transport("connection refused"), account()),
            SubmissionError::Network(_)
        ));
    }

    #[test]
    fn test_unknown_passthrough() {
        let envelope = ErrorEnvelope::new("execution reverted").with_code(3);
        match classify(&envelope, account()) {
            SubmissionError::Unknown(inner) => assert_eq!(inner, envelope),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rpc_error_conversion() {
        let envelope: ErrorEnvelope = RpcError::Http(503).into();
        assert!(envelope.transport);

        let envelope: ErrorEnvelope = RpcError::Rpc {
            code: -32000,
            message: "insufficient funds".to_string(),
            data: None,
        }
        .into();
        assert_eq!(envelope.code, Some(-32000));
        assert!(!envelope.transport);
    }

    #[test]
    fn test_reclassify_keeps_typed_errors() {
        let err = reclassify(SubmissionError::Timeout("slow".to_string()), account());
        assert!(matches!(err, SubmissionError::Timeout(_)));

        let err = reclassify(
            SubmissionError::Unknown(ErrorEnvelope::new("User rejected the request.")),
            account(),
        );
        assert!(matches!(err, SubmissionError::UserRejected));
    }

    #[test]
    fn test_terminal_errors() {
        assert!(SubmissionError::UserRejected.is_terminal());
        assert!(SubmissionError::InsufficientFunds { address: account() }.is_terminal());
        assert!(!SubmissionError::Timeout("x".to_string()).is_terminal());
        assert!(!SubmissionError::Network("x".to_string()).is_terminal());
    }

    #[test]
    fn test_combined_error_messages() {
        let err = SubmissionError::BothPathsFailed {
            smart_account: "bundler unavailable".to_string(),
            eoa: "nonce too low".to_string(),
        };
        assert_eq!(err.to_string(), "Both Smart Account and EOA failed. nonce too low");
        assert!(err.user_message().starts_with("Unable to submit your score"));
    }
}
