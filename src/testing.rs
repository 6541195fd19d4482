//! In-memory collaborators for unit tests

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::bundler::{BundleTransactionReceipt, Bundler, UserOperation, UserOperationReceipt};
use crate::contract::ContractCall;
use crate::error::ErrorEnvelope;
use crate::rpc::{ChainReader, RpcError};
use crate::session::{TransactionRequest, TransactionSigner, WalletProvider};
use crate::submission::SmartAccount;

pub const OP_HASH: B256 = B256::repeat_byte(0x0f);
pub const BUNDLE_TX_HASH: B256 = B256::repeat_byte(0xb7);
pub const EOA_TX_HASH: B256 = B256::repeat_byte(0xe0);

/// Wallet provider answering from a per-method table
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<HashMap<String, Result<Value, RpcError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, result: Result<Value, RpcError>) {
        self.responses.lock().insert(method.to_string(), result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Params of the last call to `method`
    pub fn params(&self, method: &str) -> Value {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.calls.lock().push((method.to_string(), params));
        self.responses
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| {
                Err(RpcError::Rpc {
                    code: -32601,
                    message: format!("method {} not supported", method),
                    data: None,
                })
            })
    }
}

pub struct MockSmartAccount {
    address: Address,
    prepare_error: Option<ErrorEnvelope>,
    pub prepared: AtomicUsize,
}

impl MockSmartAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            prepare_error: None,
            prepared: AtomicUsize::new(0),
        }
    }

    pub fn failing(address: Address, error: ErrorEnvelope) -> Self {
        Self {
            prepare_error: Some(error),
            ..Self::new(address)
        }
    }
}

#[async_trait]
impl SmartAccount for MockSmartAccount {
    fn address(&self) -> Address {
        self.address
    }

    async fn prepare_user_operation(
        &self,
        calls: &[ContractCall],
    ) -> Result<UserOperation, ErrorEnvelope> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.prepare_error {
            return Err(error.clone());
        }
        Ok(UserOperation {
            sender: self.address,
            call_data: calls.first().map(|c| c.data.clone()).unwrap_or_default(),
            ..Default::default()
        })
    }
}

/// Bundler with a scripted send result and receipt availability
pub struct MockBundler {
    send_result: Result<B256, RpcError>,
    send_delay: Option<Duration>,
    /// Receipt appears on this poll (1-based); `None` never confirms
    receipt_on_poll: Option<usize>,
    with_inner_receipt: bool,
    pub sent: AtomicUsize,
    pub polls: AtomicUsize,
}

impl MockBundler {
    /// Accepts and confirms on the first poll
    pub fn new() -> Self {
        Self {
            send_result: Ok(OP_HASH),
            send_delay: None,
            receipt_on_poll: Some(1),
            with_inner_receipt: true,
            sent: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(error: RpcError) -> Self {
        Self {
            send_result: Err(error),
            ..Self::new()
        }
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn with_receipt_on_poll(mut self, poll: Option<usize>) -> Self {
        self.receipt_on_poll = poll;
        self
    }

    pub fn without_inner_receipt(mut self) -> Self {
        self.with_inner_receipt = false;
        self
    }
}

#[async_trait]
impl Bundler for MockBundler {
    async fn send_user_operation(&self, _op: &UserOperation) -> Result<B256, RpcError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.send_result.clone()
    }

    async fn get_user_operation_receipt(
        &self,
        op_hash: B256,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.receipt_on_poll {
            Some(ready) if poll >= ready => Ok(Some(UserOperationReceipt {
                user_op_hash: op_hash,
                success: true,
                receipt: self.with_inner_receipt.then(|| BundleTransactionReceipt {
                    transaction_hash: BUNDLE_TX_HASH,
                }),
            })),
            _ => Ok(None),
        }
    }
}

/// Signer that counts sends
pub struct MockSigner {
    address: Address,
    result: Result<B256, ErrorEnvelope>,
    pub sent: Mutex<Vec<TransactionRequest>>,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            result: Ok(EOA_TX_HASH),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(address: Address, error: ErrorEnvelope) -> Self {
        Self {
            result: Err(error),
            ..Self::new(address)
        }
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256, ErrorEnvelope> {
        self.sent.lock().push(tx.clone());
        self.result.clone()
    }
}

/// Chain reader with a fixed balance
pub struct MockChain {
    balance: Result<U256, RpcError>,
    balance_delay: Option<Duration>,
    pub balance_calls: AtomicUsize,
}

impl MockChain {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance: Ok(U256::from(balance)),
            balance_delay: None,
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: RpcError) -> Self {
        Self {
            balance: Err(error),
            ..Self::with_balance(0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.balance_delay = Some(delay);
        self
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_balance(&self, _address: Address) -> Result<U256, RpcError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.balance_delay {
            tokio::time::sleep(delay).await;
        }
        self.balance.clone()
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, RpcError> {
        Ok(Bytes::new())
    }
}
