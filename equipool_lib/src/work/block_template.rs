// Copyright (C) 2024, 2025 Equipool Developers (see AUTHORS)
//
// This file is part of Equipool
//
// Equipool is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Equipool is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// Equipool. If not, see <https://www.gnu.org/licenses/>.

use super::coinbase::{CoinbaseParams, Recipient, RewardSchedule, build_coinbase_transaction};
use super::difficulty::{difficulty_for_target, parse_target};
use super::error::WorkError;
use super::gbt::DaemonTemplate;
use super::merkle::{HashByteOrder, merkle_root, parse_hash};
use bitcoin::consensus::encode::{VarInt, serialize};
use bitcoin::hashes::Hash;
use dashmap::DashSet;
use primitive_types::U256;
use serde::Serialize;
use tracing::debug;

/// Size of a serialized Equihash block header, without the solution
pub const HEADER_SIZE: usize = 140;

/// Payout configuration applied to every generation transaction.
#[derive(Debug, Clone, Default)]
pub struct PayoutSettings {
    pub pool_address: String,
    pub recipients: Vec<Recipient>,
    pub rewards: RewardSchedule,
    pub coinbase_tag: Vec<u8>,
}

/// Parameters broadcast to miners for a job, in mining.notify order.
///
/// Serializes as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobParams(
    /// Job id
    pub String,
    /// Version, little endian hex
    pub String,
    /// Previous block hash, internal order hex
    pub String,
    /// Merkle root, internal order hex
    pub String,
    /// Reserved hash field, always zero
    pub String,
    /// Template time, little endian hex
    pub String,
    /// Compact target, reversed hex
    pub String,
    /// Clean jobs
    pub bool,
);

/// Key of the per job duplicate ledger. Hex fields are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmitKey {
    pub extra_nonce1: String,
    pub extra_nonce2: String,
    pub n_time: String,
    pub nonce: String,
}

impl SubmitKey {
    pub fn new(extra_nonce1: &str, extra_nonce2: &str, n_time: &str, nonce: &str) -> Self {
        Self {
            extra_nonce1: extra_nonce1.to_ascii_lowercase(),
            extra_nonce2: extra_nonce2.to_ascii_lowercase(),
            n_time: n_time.to_ascii_lowercase(),
            nonce: nonce.to_ascii_lowercase(),
        }
    }
}

/// A job built from one daemon template.
///
/// Everything that goes into the header is fixed at construction. Only the
/// duplicate submission ledger changes afterwards.
#[derive(Debug)]
pub struct BlockTemplate {
    pub job_id: String,
    pub rpc_data: DaemonTemplate,
    pub target: U256,
    /// Network difficulty of the block
    pub difficulty: f64,
    /// Serialized generation transaction
    pub gen_tx: Vec<u8>,
    /// Generation transaction hash, internal order
    pub gen_tx_hash: [u8; 32],
    /// Merkle root, internal order
    pub merkle_root: [u8; 32],
    /// Previous block hash, internal order
    pub prev_hash_reversed: [u8; 32],
    pub bits_reversed: [u8; 4],
    /// Number of transactions including the coinbase
    pub tx_count: usize,
    /// Subsidy in zatoshis
    pub block_reward: u64,
    /// Fees collected from the template's transactions
    pub reward_fees: u64,
    transactions: Vec<Vec<u8>>,
    submits: DashSet<SubmitKey>,
    job_params: JobParams,
}

impl BlockTemplate {
    /// Build a job from a daemon template.
    ///
    /// Fails on malformed template fields or when the payout configuration
    /// cannot produce a valid generation transaction.
    pub fn new(
        job_id: String,
        rpc_data: DaemonTemplate,
        payout: &PayoutSettings,
        diff1: f64,
    ) -> Result<Self, WorkError> {
        let target = parse_target(&rpc_data.target)?;
        let difficulty = difficulty_for_target(diff1, target);

        let prev_hash_reversed = parse_hash(&rpc_data.previousblockhash, HashByteOrder::Display)?;
        let mut bits_reversed: [u8; 4] = hex::decode(&rpc_data.bits)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| WorkError::InvalidTemplate(format!("Invalid bits {}", rpc_data.bits)))?;
        bits_reversed.reverse();

        let block_reward = rpc_data.block_reward();
        let reward_fees = rpc_data.total_fees();
        let coinbase = build_coinbase_transaction(&CoinbaseParams {
            height: rpc_data.height,
            subsidy: block_reward,
            fees: reward_fees,
            recipients: &payout.recipients,
            pool_address: &payout.pool_address,
            rewards: &payout.rewards,
            tag: &payout.coinbase_tag,
        })?;
        let gen_tx = serialize(&coinbase);
        let gen_tx_hash = coinbase.compute_txid().to_raw_hash().to_byte_array();

        let mut tx_hashes = Vec::with_capacity(rpc_data.transactions.len());
        let mut transactions = Vec::with_capacity(rpc_data.transactions.len());
        for tx in &rpc_data.transactions {
            tx_hashes.push(parse_hash(&tx.hash, HashByteOrder::Display)?);
            transactions.push(hex::decode(&tx.data).map_err(|e| {
                WorkError::InvalidTemplate(format!("Invalid transaction data for {}: {e}", tx.hash))
            })?);
        }
        let merkle_root = merkle_root(gen_tx_hash, &tx_hashes);

        let job_params = JobParams(
            job_id.clone(),
            hex::encode(rpc_data.version.to_le_bytes()),
            hex::encode(prev_hash_reversed),
            hex::encode(merkle_root),
            hex::encode([0u8; 32]),
            hex::encode(rpc_data.curtime.to_le_bytes()),
            hex::encode(bits_reversed),
            true,
        );

        debug!(
            "Built job {} at height {} with {} transactions",
            job_id,
            rpc_data.height,
            transactions.len() + 1
        );

        Ok(Self {
            job_id,
            target,
            difficulty,
            gen_tx,
            gen_tx_hash,
            merkle_root,
            prev_hash_reversed,
            bits_reversed,
            tx_count: transactions.len() + 1,
            block_reward,
            reward_fees,
            transactions,
            submits: DashSet::new(),
            job_params,
            rpc_data,
        })
    }

    pub fn height(&self) -> u32 {
        self.rpc_data.height
    }

    /// Generation transaction hex
    pub fn gen_tx_hex(&self) -> String {
        hex::encode(&self.gen_tx)
    }

    /// Merkle root in display order
    pub fn merkle_root_hex(&self) -> String {
        let mut root = self.merkle_root;
        root.reverse();
        hex::encode(root)
    }

    /// Serialize the 140 byte header for a submitted time and nonce.
    ///
    /// `n_time` is written as the miner sent it.
    pub fn serialize_header(&self, n_time: &[u8; 4], nonce: &[u8; 32]) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&self.rpc_data.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_hash_reversed);
        header[36..68].copy_from_slice(&self.merkle_root);
        // 68..100 is the reserved hash, left zeroed
        header[100..104].copy_from_slice(n_time);
        header[104..108].copy_from_slice(&self.bits_reversed);
        header[108..140].copy_from_slice(nonce);
        header
    }

    /// Serialize the full block: header, solution with its length prefix,
    /// transaction count, coinbase, then template transactions in order.
    pub fn serialize_block(&self, header: &[u8], solution: &[u8]) -> Vec<u8> {
        let tx_count = serialize(&VarInt(self.tx_count as u64));
        let body_len: usize = self.transactions.iter().map(Vec::len).sum();
        let mut block = Vec::with_capacity(
            header.len() + solution.len() + tx_count.len() + self.gen_tx.len() + body_len,
        );
        block.extend_from_slice(header);
        block.extend_from_slice(solution);
        block.extend_from_slice(&tx_count);
        block.extend_from_slice(&self.gen_tx);
        for tx in &self.transactions {
            block.extend_from_slice(tx);
        }
        block
    }

    /// Record a submission. Returns false if the same tuple was seen before.
    pub fn register_submit(
        &self,
        extra_nonce1: &str,
        extra_nonce2: &str,
        n_time: &str,
        nonce: &str,
    ) -> bool {
        self.submits
            .insert(SubmitKey::new(extra_nonce1, extra_nonce2, n_time, nonce))
    }

    /// Number of distinct submissions recorded against this job
    pub fn submit_count(&self) -> usize {
        self.submits.len()
    }

    pub fn job_params(&self) -> &JobParams {
        &self.job_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{payout_settings, sample_template, test_diff1};
    use bitcoin::hashes::sha256d;

    fn build_job() -> BlockTemplate {
        BlockTemplate::new(
            "cccd".to_string(),
            sample_template(),
            &payout_settings(),
            test_diff1(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_from_template() {
        let job = build_job();
        let template = sample_template();

        assert_eq!(job.job_id, "cccd");
        assert_eq!(job.height(), 500123);
        assert_eq!(job.tx_count, 4);
        assert_eq!(job.block_reward, 1_250_000_000);
        assert_eq!(job.reward_fees, 6000);
        assert_eq!(job.target, parse_target(&template.target).unwrap());
        assert_eq!(job.bits_reversed, [0xfd, 0x68, 0x01, 0x1c]);
        assert_eq!(job.prev_hash_reversed[0], 0x12);
        assert_eq!(job.prev_hash_reversed[31], 0x00);
        assert_eq!(
            job.gen_tx_hash,
            sha256d::Hash::hash(&job.gen_tx).to_byte_array()
        );
        assert!(job.difficulty > 0.0);
    }

    #[test]
    fn test_merkle_root_covers_template_transactions() {
        let job = build_job();
        let template = sample_template();
        let hashes: Vec<[u8; 32]> = template
            .transactions
            .iter()
            .map(|tx| parse_hash(&tx.hash, HashByteOrder::Display).unwrap())
            .collect();
        assert_eq!(job.merkle_root, merkle_root(job.gen_tx_hash, &hashes));

        let mut display = job.merkle_root;
        display.reverse();
        assert_eq!(job.merkle_root_hex(), hex::encode(display));
    }

    #[test]
    fn test_job_params() {
        let job = build_job();
        let params = job.job_params();

        assert_eq!(params.0, "cccd");
        assert_eq!(params.1, "04000000");
        assert_eq!(params.2, hex::encode(job.prev_hash_reversed));
        assert_eq!(params.3, hex::encode(job.merkle_root));
        assert_eq!(params.4, "0".repeat(64));
        assert_eq!(params.5, hex::encode(1_700_000_000u32.to_le_bytes()));
        assert_eq!(params.6, "fd68011c");
        assert!(params.7);

        // Computed once, every call hands back the same value
        assert!(std::ptr::eq(job.job_params(), job.job_params()));

        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 8);
        assert_eq!(json[7], serde_json::json!(true));
    }

    #[test]
    fn test_serialize_header_layout() {
        let job = build_job();
        let n_time = [0x01, 0x02, 0x03, 0x04];
        let nonce = [0xab; 32];

        let header = job.serialize_header(&n_time, &nonce);

        assert_eq!(header.len(), HEADER_SIZE);
        assert_eq!(&header[0..4], &[0x04, 0x00, 0x00, 0x00]);
        assert_eq!(&header[4..36], &job.prev_hash_reversed);
        assert_eq!(&header[36..68], &job.merkle_root);
        assert_eq!(&header[68..100], &[0u8; 32]);
        assert_eq!(&header[100..104], &n_time);
        assert_eq!(&header[104..108], &[0xfd, 0x68, 0x01, 0x1c]);
        assert_eq!(&header[108..140], &nonce);
    }

    #[test]
    fn test_serialize_block() {
        let job = build_job();
        let header = job.serialize_header(&[0; 4], &[0; 32]);
        let solution = vec![0x42u8; 1347];

        let block = job.serialize_block(&header, &solution);

        let tx_bytes: usize = sample_template()
            .transactions
            .iter()
            .map(|tx| tx.data.len() / 2)
            .sum();
        assert_eq!(
            block.len(),
            HEADER_SIZE + solution.len() + 1 + job.gen_tx.len() + tx_bytes
        );
        assert_eq!(&block[..HEADER_SIZE], &header);
        assert_eq!(block[HEADER_SIZE + solution.len()], 0x04);
        let coinbase_start = HEADER_SIZE + solution.len() + 1;
        assert_eq!(
            &block[coinbase_start..coinbase_start + job.gen_tx.len()],
            job.gen_tx.as_slice()
        );
    }

    /// Job whose template carries `count` copies of the fixture's first
    /// transaction, each with its own hash.
    fn build_job_with_transactions(count: usize) -> BlockTemplate {
        let mut template = sample_template();
        let tx = template.transactions[0].clone();
        template.transactions = (0..count)
            .map(|i| {
                let mut tx = tx.clone();
                tx.hash = format!("{:064x}", i + 1);
                tx.depends = vec![];
                tx
            })
            .collect();
        BlockTemplate::new(
            "cccd".to_string(),
            template,
            &payout_settings(),
            test_diff1(),
        )
        .unwrap()
    }

    #[test]
    fn test_serialize_block_with_many_transactions() {
        let job = build_job_with_transactions(299);
        assert_eq!(job.tx_count, 300);
        let header = job.serialize_header(&[0; 4], &[0; 32]);
        let solution = vec![0x42u8; 1347];

        let block = job.serialize_block(&header, &solution);

        let count_at = HEADER_SIZE + solution.len();
        assert_eq!(&block[count_at..count_at + 3], &[0xfd, 0x2c, 0x01]);
        let tx_bytes: usize = job.rpc_data.transactions.iter().map(|tx| tx.data.len() / 2).sum();
        assert_eq!(block.len(), count_at + 3 + job.gen_tx.len() + tx_bytes);
        assert_eq!(
            &block[count_at + 3..count_at + 3 + job.gen_tx.len()],
            job.gen_tx.as_slice()
        );
    }

    #[test]
    fn test_transaction_count_compact_size_boundary() {
        let solution = vec![0x42u8; 1347];
        let count_at = HEADER_SIZE + solution.len();

        // 252 transactions in total still fit one byte
        let job = build_job_with_transactions(251);
        let block = job.serialize_block(&job.serialize_header(&[0; 4], &[0; 32]), &solution);
        assert_eq!(block[count_at], 0xfc);
        assert_eq!(&block[count_at + 1..count_at + 1 + 4], &job.gen_tx[..4]);

        // 253 needs the 0xfd marker and a u16
        let job = build_job_with_transactions(252);
        let block = job.serialize_block(&job.serialize_header(&[0; 4], &[0; 32]), &solution);
        assert_eq!(&block[count_at..count_at + 3], &[0xfd, 0xfd, 0x00]);

        // Counts from 0x80 take a single byte too
        let job = build_job_with_transactions(127);
        let block = job.serialize_block(&job.serialize_header(&[0; 4], &[0; 32]), &solution);
        assert_eq!(block[count_at], 0x80);
    }

    #[test]
    fn test_register_submit() {
        let job = build_job();
        assert!(job.register_submit("08000000", "00000001", "00f15365", "aa"));
        assert!(!job.register_submit("08000000", "00000001", "00f15365", "aa"));
        // Case does not make a different submission
        assert!(!job.register_submit("08000000", "00000001", "00F15365", "AA"));
        assert!(job.register_submit("08000000", "00000002", "00f15365", "aa"));
        assert_eq!(job.submit_count(), 2);
    }

    #[test]
    fn test_invalid_template_fields() {
        let payout = payout_settings();

        let mut template = sample_template();
        template.previousblockhash = "1234".into();
        assert!(matches!(
            BlockTemplate::new("1".into(), template, &payout, test_diff1()),
            Err(WorkError::InvalidTemplate(_))
        ));

        let mut template = sample_template();
        template.bits = "1c01".into();
        assert!(BlockTemplate::new("1".into(), template, &payout, test_diff1()).is_err());

        let mut template = sample_template();
        template.transactions[0].data = "zz".into();
        assert!(BlockTemplate::new("1".into(), template, &payout, test_diff1()).is_err());
    }

    #[test]
    fn test_invalid_pool_address_aborts_construction() {
        let mut payout = payout_settings();
        payout.pool_address = "invalid".into();
        assert!(matches!(
            BlockTemplate::new("1".into(), sample_template(), &payout, test_diff1()),
            Err(WorkError::InvalidAddress { .. })
        ));
    }
}
