//! Leaderboard aggregation from on-chain events
//!
//! The contract keeps no enumerable list of players, so the leaderboard is
//! rebuilt from `ScoreSaved` logs on every request:
//! - resolve the chain head and tile `[0, head]` into fixed-size chunks
//! - fetch each chunk through [`fetch_with_retry`]
//! - decode records, keeping the latest score per player by block height
//! - rank by score and keep the top entries
//!
//! Aggregation never fails outward. Any error collapses to an empty board
//! and is logged.

use alloy_primitives::{Address, B256};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ScanConfig;
use crate::contract::{decode_score_word, score_saved_topic};
use crate::fetcher::{fetch_with_retry, LogSource};
use crate::rpc::{parse_hex_u64, BlockRange, LogFilter, RawLog, RpcError};

/// One ranked leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: u32,
    pub player: Address,
    pub score: u64,
    /// Unix seconds at aggregation time, not the event's block time
    pub timestamp: i64,
    /// Height of the event the score was taken from
    pub block_number: u64,
}

/// Decoded `ScoreSaved` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub player: Address,
    pub score: u64,
    pub block_number: u64,
}

/// Split `[0, head]` into inclusive ranges of `chunk_size` blocks.
///
/// Ranges are contiguous, non-overlapping and cover every block exactly
/// once; the last range is truncated at `head`. A `chunk_size` of zero is
/// treated as one.
pub fn chunk_ranges(head: u64, chunk_size: u64) -> impl Iterator<Item = BlockRange> {
    let size = chunk_size.max(1);
    let mut next = Some(0u64);

    std::iter::from_fn(move || {
        let from = next?;
        let to = from.saturating_add(size - 1).min(head);
        next = if to >= head { None } else { Some(to + 1) };
        Some(BlockRange { from, to })
    })
}

/// Decode one raw log, `None` when any field is missing or malformed
pub fn decode_score_log(log: &RawLog) -> Option<ScoreEvent> {
    let topics = log.topics.as_ref()?;
    if topics.len() < 2 {
        return None;
    }

    let data = log.data.as_deref()?;
    let data = hex::decode(strip_hex_prefix(data)).ok()?;
    if data.is_empty() {
        return None;
    }

    let player_topic: B256 = topics[1].parse().ok()?;
    let player = Address::from_word(player_topic);
    let score = decode_score_word(&data)?;
    let block_number = parse_hex_u64(log.block_number.as_deref()?)?;

    Some(ScoreEvent {
        player,
        score,
        block_number,
    })
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

/// Latest known score for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScoreRecord {
    pub score: u64,
    pub block_number: u64,
}

/// Per-player scores in first-seen order
#[derive(Debug, Clone, Default)]
pub struct PlayerScores {
    records: IndexMap<Address, PlayerScoreRecord>,
}

impl PlayerScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Overwrites only when the event is strictly newer.
    pub fn observe(&mut self, event: ScoreEvent) {
        let record = PlayerScoreRecord {
            score: event.score,
            block_number: event.block_number,
        };
        match self.records.get_mut(&event.player) {
            Some(existing) if event.block_number > existing.block_number => *existing = record,
            Some(_) => {}
            None => {
                self.records.insert(event.player, record);
            }
        }
    }

    pub fn get(&self, player: &Address) -> Option<&PlayerScoreRecord> {
        self.records.get(player)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top `top_n` players by score. Ties keep first-seen order.
    pub fn rank(&self, top_n: usize, timestamp: i64) -> Vec<LeaderboardEntry> {
        let mut ordered: Vec<(&Address, &PlayerScoreRecord)> = self.records.iter().collect();
        // stable: equal scores stay in insertion order
        ordered.sort_by(|a, b| b.1.score.cmp(&a.1.score));

        ordered
            .into_iter()
            .take(top_n)
            .enumerate()
            .map(|(i, (player, record))| LeaderboardEntry {
                rank: i as u32 + 1,
                player: *player,
                score: record.score,
                timestamp,
                block_number: record.block_number,
            })
            .collect()
    }
}

/// Counters from one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub head: u64,
    pub chunks_scanned: usize,
    /// Chunks whose logs could not be fetched; their events are missing
    pub exhausted_chunks: usize,
    pub records_decoded: usize,
    pub records_skipped: usize,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.exhausted_chunks == 0
    }
}

/// Rebuilds the leaderboard from contract logs
pub struct LogAggregator {
    source: Arc<dyn LogSource>,
    contract: Address,
    scan: ScanConfig,
}

impl LogAggregator {
    pub fn new(source: Arc<dyn LogSource>, contract: Address, scan: ScanConfig) -> Self {
        Self {
            source,
            contract,
            scan,
        }
    }

    /// Current top players; empty on any failure
    pub async fn aggregate_scores(&self) -> Vec<LeaderboardEntry> {
        match self.aggregate_with_report().await {
            Ok((entries, report)) => {
                if !report.is_complete() {
                    warn!(
                        "Leaderboard built with {} of {} chunks missing",
                        report.exhausted_chunks, report.chunks_scanned
                    );
                }
                entries
            }
            Err(e) => {
                error!("Error fetching leaderboard: {}", e);
                Vec::new()
            }
        }
    }

    /// Aggregate and return scan counters alongside the entries.
    ///
    /// Fails only when the chain head cannot be resolved.
    pub async fn aggregate_with_report(
        &self,
    ) -> Result<(Vec<LeaderboardEntry>, ScanReport), RpcError> {
        let mut report = ScanReport::default();

        if self.contract == Address::ZERO {
            warn!("Score contract address not configured, returning empty leaderboard");
            return Ok((Vec::new(), report));
        }

        let head = self.source.head_block().await?;
        report.head = head;

        let topic = score_saved_topic();
        let policy = self.scan.retry_policy();
        let concurrency = self.scan.max_concurrency.max(1);

        debug!(
            "Scanning blocks 0 - {} in chunks of {} ({} in flight)",
            head, self.scan.chunk_size, concurrency
        );

        let source = self.source.as_ref();
        let contract = self.contract;
        // buffered() yields pages in chunk order even with several in flight
        let pages = stream::iter(chunk_ranges(head, self.scan.chunk_size))
            .map(|range| {
                let filter = LogFilter::new(contract, topic, range);
                async move { fetch_with_retry(source, &filter, &policy).await }
            })
            .buffered(concurrency);
        tokio::pin!(pages);

        let mut scores = PlayerScores::new();
        while let Some(outcome) = pages.next().await {
            report.chunks_scanned += 1;
            if outcome.is_exhausted() {
                report.exhausted_chunks += 1;
            }
            for log in outcome.into_logs() {
                match decode_score_log(&log) {
                    Some(event) => {
                        report.records_decoded += 1;
                        scores.observe(event);
                    }
                    None => {
                        report.records_skipped += 1;
                        debug!("Skipping malformed score log: {:?}", log);
                    }
                }
            }
        }

        let entries = scores.rank(self.scan.top_n, chrono::Utc::now().timestamp());

        info!(
            "Leaderboard: {} players, {} records from {} chunks up to block {}",
            scores.len(),
            report.records_decoded,
            report.chunks_scanned,
            head
        );

        Ok((entries, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::to_hex_string;
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn player(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn event(player: Address, score: u64, block_number: u64) -> ScoreEvent {
        ScoreEvent {
            player,
            score,
            block_number,
        }
    }

    fn raw_log(player: Address, score: u64, block: u64) -> RawLog {
        let mut data = U256::from(score).to_be_bytes::<32>().to_vec();
        data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());
        RawLog {
            topics: Some(vec![
                to_hex_string(score_saved_topic().as_slice()),
                to_hex_string(player.into_word().as_slice()),
            ]),
            data: Some(format!("0x{}", hex::encode(data))),
            block_number: Some(format!("0x{:x}", block)),
        }
    }

    /// Serves logs from memory, filtered by the requested block range
    struct MemorySource {
        head: Result<u64, RpcError>,
        logs: Vec<(u64, RawLog)>,
        failing_ranges: Vec<BlockRange>,
        requested: Mutex<Vec<BlockRange>>,
    }

    impl MemorySource {
        fn new(head: u64, events: &[(Address, u64, u64)]) -> Self {
            Self {
                head: Ok(head),
                logs: events
                    .iter()
                    .map(|&(p, s, b)| (b, raw_log(p, s, b)))
                    .collect(),
                failing_ranges: Vec::new(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LogSource for MemorySource {
        async fn head_block(&self) -> Result<u64, RpcError> {
            self.head.clone()
        }

        async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
            self.requested.lock().push(filter.range);
            if self.failing_ranges.contains(&filter.range) {
                return Err(RpcError::Transport("connection reset".to_string()));
            }
            Ok(self
                .logs
                .iter()
                .filter(|(b, _)| *b >= filter.range.from && *b <= filter.range.to)
                .map(|(_, log)| log.clone())
                .collect())
        }
    }

    fn aggregator(source: Arc<MemorySource>, scan: ScanConfig) -> LogAggregator {
        LogAggregator::new(source, player(0xcc), scan)
    }

    #[test]
    fn test_chunk_ranges_tile_exactly() {
        for chunk_size in [1u64, 7, 100, 1000] {
            for head in [0u64, 1, 99, 100, 101, 250, 999, 1234] {
                let ranges: Vec<_> = chunk_ranges(head, chunk_size).collect();
                assert_eq!(ranges[0].from, 0);
                assert_eq!(ranges.last().unwrap().to, head);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[1].from, pair[0].to + 1);
                }
                for range in &ranges {
                    assert!(range.block_count() <= chunk_size);
                }
                let total: u64 = ranges.iter().map(|r| r.block_count()).sum();
                assert_eq!(total, head + 1);
                assert_eq!(ranges.len() as u64, head / chunk_size + 1);
            }
        }
    }

    #[test]
    fn test_chunk_ranges_example() {
        let ranges: Vec<_> = chunk_ranges(250, 100).collect();
        assert_eq!(
            ranges,
            vec![
                BlockRange { from: 0, to: 99 },
                BlockRange { from: 100, to: 199 },
                BlockRange { from: 200, to: 250 },
            ]
        );
    }

    #[test]
    fn test_decode_score_log() {
        let event = decode_score_log(&raw_log(player(0x0a), 420, 77)).unwrap();
        assert_eq!(event.player, player(0x0a));
        assert_eq!(event.score, 420);
        assert_eq!(event.block_number, 77);
    }

    #[test]
    fn test_decode_rejects_malformed_records() {
        let valid = raw_log(player(0x0a), 1, 1);

        let mut one_topic = valid.clone();
        one_topic.topics = Some(vec![to_hex_string(score_saved_topic().as_slice())]);
        assert_eq!(decode_score_log(&one_topic), None);

        let mut empty_data = valid.clone();
        empty_data.data = Some("0x".to_string());
        assert_eq!(decode_score_log(&empty_data), None);

        let mut no_data = valid.clone();
        no_data.data = None;
        assert_eq!(decode_score_log(&no_data), None);

        let mut bad_block = valid.clone();
        bad_block.block_number = Some("pending".to_string());
        assert_eq!(decode_score_log(&bad_block), None);

        let mut huge = valid.clone();
        huge.data = Some(format!("0x{}", "ff".repeat(32)));
        assert_eq!(decode_score_log(&huge), None);
    }

    #[test]
    fn test_last_write_wins_regardless_of_order() {
        let events = [
            event(player(1), 10, 5),
            event(player(1), 3, 9),
            event(player(1), 50, 7),
        ];

        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let mut scores = PlayerScores::new();
            for i in order {
                scores.observe(events[i]);
            }
            assert_eq!(
                scores.get(&player(1)),
                Some(&PlayerScoreRecord {
                    score: 3,
                    block_number: 9,
                })
            );
        }
    }

    #[test]
    fn test_same_block_does_not_overwrite() {
        let mut scores = PlayerScores::new();
        scores.observe(event(player(1), 10, 5));
        scores.observe(event(player(1), 99, 5));
        assert_eq!(scores.get(&player(1)).unwrap().score, 10);
    }

    #[test]
    fn test_rank_limits_and_numbers_entries() {
        let mut scores = PlayerScores::new();
        for i in 1..=15u8 {
            scores.observe(event(player(i), i as u64 * 10, 1));
        }

        let entries = scores.rank(10, 1_700_000_000);
        assert_eq!(entries.len(), 10);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.rank, i as u32 + 1);
            assert_eq!(entry.timestamp, 1_700_000_000);
        }
        assert_eq!(entries[0].player, player(15));
        assert_eq!(entries[0].score, 150);
        assert_eq!(entries[9].score, 60);
    }

    #[test]
    fn test_rank_ties_keep_first_seen_order() {
        let mut scores = PlayerScores::new();
        scores.observe(event(player(3), 5, 1));
        scores.observe(event(player(1), 9, 2));
        scores.observe(event(player(2), 5, 3));

        let ranked: Vec<Address> = scores.rank(10, 0).into_iter().map(|e| e.player).collect();
        assert_eq!(ranked, vec![player(1), player(3), player(2)]);
    }

    #[tokio::test]
    async fn test_aggregate_scans_every_chunk() {
        let source = Arc::new(MemorySource::new(
            250,
            &[
                (player(1), 100, 10),
                (player(2), 300, 120),
                (player(1), 40, 240),
                (player(3), 200, 250),
            ],
        ));

        let (entries, report) = aggregator(source.clone(), ScanConfig::default())
            .aggregate_with_report()
            .await
            .unwrap();

        assert_eq!(
            *source.requested.lock(),
            vec![
                BlockRange { from: 0, to: 99 },
                BlockRange { from: 100, to: 199 },
                BlockRange { from: 200, to: 250 },
            ]
        );
        assert_eq!(report.head, 250);
        assert_eq!(report.chunks_scanned, 3);
        assert_eq!(report.records_decoded, 4);
        assert!(report.is_complete());

        let summary: Vec<(u32, Address, u64)> =
            entries.iter().map(|e| (e.rank, e.player, e.score)).collect();
        assert_eq!(
            summary,
            vec![(1, player(2), 300), (2, player(3), 200), (3, player(1), 40)]
        );
        assert_eq!(entries[2].block_number, 240);
    }

    #[tokio::test]
    async fn test_aggregate_concurrent_matches_sequential() {
        let events: Vec<(Address, u64, u64)> = (0..40u64)
            .map(|i| (player((i % 7) as u8 + 1), i * 3 % 17, i * 25))
            .collect();

        let sequential = aggregator(
            Arc::new(MemorySource::new(1000, &events)),
            ScanConfig::default(),
        )
        .aggregate_with_report()
        .await
        .unwrap()
        .0;

        let scan = ScanConfig {
            max_concurrency: 4,
            ..Default::default()
        };
        let concurrent = aggregator(Arc::new(MemorySource::new(1000, &events)), scan)
            .aggregate_with_report()
            .await
            .unwrap()
            .0;

        let strip = |entries: Vec<LeaderboardEntry>| {
            entries
                .into_iter()
                .map(|e| (e.rank, e.player, e.score, e.block_number))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(sequential), strip(concurrent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chunk_is_skipped_and_counted() {
        let mut source = MemorySource::new(199, &[(player(1), 10, 50), (player(2), 20, 150)]);
        source.failing_ranges = vec![BlockRange { from: 0, to: 99 }];
        let source = Arc::new(source);

        let (entries, report) = aggregator(source.clone(), ScanConfig::default())
            .aggregate_with_report()
            .await
            .unwrap();

        assert_eq!(report.exhausted_chunks, 1);
        assert!(!report.is_complete());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].player, player(2));
        // 3 attempts on the failing chunk, 1 on the healthy one
        assert_eq!(source.requested.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_head_failure_yields_empty_board() {
        let mut source = MemorySource::new(0, &[(player(1), 10, 0)]);
        source.head = Err(RpcError::Http(502));
        let source = Arc::new(source);

        let entries = aggregator(source.clone(), ScanConfig::default())
            .aggregate_scores()
            .await;
        assert!(entries.is_empty());
        assert!(source.requested.lock().is_empty());
    }

    #[tokio::test]
    async fn test_zero_contract_yields_empty_board() {
        let source = Arc::new(MemorySource::new(10, &[(player(1), 10, 0)]));
        let aggregator = LogAggregator::new(source.clone(), Address::ZERO, ScanConfig::default());

        assert!(aggregator.aggregate_scores().await.is_empty());
        assert!(source.requested.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let mut source = MemorySource::new(10, &[(player(1), 10, 1)]);
        source.logs.push((
            2,
            RawLog {
                topics: Some(vec![to_hex_string(score_saved_topic().as_slice())]),
                data: Some("0x01".to_string()),
                block_number: Some("0x2".to_string()),
            },
        ));

        let (entries, report) = aggregator(Arc::new(source), ScanConfig::default())
            .aggregate_with_report()
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(report.records_decoded, 1);
        assert_eq!(report.records_skipped, 1);
    }
}
