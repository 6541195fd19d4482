//! ScoreStore contract interface
//!
//! ABI of the deployed leaderboard contract plus helpers to build calldata
//! and read raw event words.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};
use serde::{Deserialize, Serialize};

sol! {
    /// On-chain score store. Keeps the best score per player and emits
    /// `ScoreSaved` on every submission.
    contract ScoreStore {
        function saveScore(uint256 _score) external;
        function getScore(address _player) external view returns (uint256);
        function scores(address) external view returns (uint256);

        event ScoreSaved(address indexed player, uint256 score, bool isNewHighScore);
    }
}

/// Topic hash identifying `ScoreSaved` logs
pub fn score_saved_topic() -> B256 {
    ScoreStore::ScoreSaved::SIGNATURE_HASH
}

/// Calldata for `saveScore(score)`
pub fn save_score_calldata(score: u64) -> Bytes {
    ScoreStore::saveScoreCall {
        _score: U256::from(score),
    }
    .abi_encode()
    .into()
}

/// Calldata for `getScore(player)`
pub fn get_score_calldata(player: Address) -> Bytes {
    ScoreStore::getScoreCall { _player: player }
        .abi_encode()
        .into()
}

/// Read the first 32-byte ABI word of `data` as a big-endian integer.
///
/// Payloads shorter than a word are read whole. Returns `None` for an empty
/// payload or a value that does not fit in a `u64`.
pub fn decode_score_word(data: &[u8]) -> Option<u64> {
    if data.is_empty() {
        return None;
    }
    let word = &data[..data.len().min(32)];
    u64::try_from(U256::from_be_slice(word)).ok()
}

/// A single contract invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl ContractCall {
    pub fn save_score(contract: Address, score: u64) -> Self {
        Self {
            to: contract,
            data: save_score_calldata(score),
            value: U256::ZERO,
        }
    }
}
