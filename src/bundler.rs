//! ERC-4337 bundler client
//!
//! Sends signed user operations to a bundler / sponsor endpoint and looks
//! up their receipts. Uses the entry point v0.7 packed field layout.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::rpc::{RpcClient, RpcError};

/// Signed user operation, entry point v0.7 wire form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    pub signature: Bytes,
}

/// Inner transaction receipt of a bundled operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTransactionReceipt {
    pub transaction_hash: B256,
}

/// `eth_getUserOperationReceipt` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: B256,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub receipt: Option<BundleTransactionReceipt>,
}

impl UserOperationReceipt {
    /// Hash of the transaction that included the operation, if reported
    pub fn transaction_hash(&self) -> Option<B256> {
        self.receipt.as_ref().map(|r| r.transaction_hash)
    }
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Submit an operation, returning its hash
    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, RpcError>;

    /// `Ok(None)` while the operation is not yet included
    async fn get_user_operation_receipt(
        &self,
        op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError>;
}

/// JSON-RPC bundler bound to one entry point
pub struct BundlerClient {
    rpc: RpcClient,
    entry_point: Address,
}

impl BundlerClient {
    pub fn new(rpc: RpcClient, entry_point: Address) -> Self {
        Self { rpc, entry_point }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

#[async_trait]
impl Bundler for BundlerClient {
    async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, RpcError> {
        self.rpc
            .request("eth_sendUserOperation", json!([op, self.entry_point]))
            .await
    }

    async fn get_user_operation_receipt(
        &self,
        op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        self.rpc
            .request("eth_getUserOperationReceipt", json!([op_hash]))
            .await
    }
}
