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

//! Fixtures shared by unit tests and, with the `test-utils` feature, by
//! downstream crates.

use crate::work::block_template::{BlockTemplate, PayoutSettings};
use crate::work::coinbase::{Recipient, RewardSchedule};
use crate::work::difficulty::validate::ShareSubmission;
use crate::work::difficulty::{DEFAULT_DIFF1_HEX, parse_target, u256_to_f64};
use crate::work::gbt::DaemonTemplate;
use crate::work::pow::{EquihashParams, ProofOfWork};
use bitcoin::consensus::encode::{VarInt, serialize};

/// Version prefix of transparent pay to pubkey hash addresses (t1)
pub const P2PKH_PREFIX: [u8; 2] = [0x1c, 0xb8];

/// Version prefix of transparent pay to script hash addresses (t3)
pub const P2SH_PREFIX: [u8; 2] = [0x1c, 0xbd];

/// Extranonce1 used by [`submission_for`]
pub const TEST_EXTRA_NONCE1: &str = "08000000";

/// Assigned difficulty low enough that any header hash meets it
pub const ACCEPT_ANY_DIFFICULTY: f64 = 1e-6;

/// Proof of work verifier with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct FixedProofOfWork(pub bool);

impl ProofOfWork for FixedProofOfWork {
    fn verify(&self, _header: &[u8], _solution: &[u8]) -> bool {
        self.0
    }
}

fn encode_address(prefix: [u8; 2], seed: u8) -> String {
    let mut payload = prefix.to_vec();
    payload.extend_from_slice(&[seed; 20]);
    bitcoin::base58::encode_check(&payload)
}

/// A t1 address whose hash is `seed` repeated
pub fn p2pkh_address(seed: u8) -> String {
    encode_address(P2PKH_PREFIX, seed)
}

/// A t3 address whose hash is `seed` repeated
pub fn p2sh_address(seed: u8) -> String {
    encode_address(P2SH_PREFIX, seed)
}

pub fn test_diff1() -> f64 {
    u256_to_f64(parse_target(DEFAULT_DIFF1_HEX).unwrap())
}

/// Template with three transactions at height 500123
pub fn sample_template() -> DaemonTemplate {
    let json = include_str!("../tests/test_data/gbt/template-with-transactions.json");
    serde_json::from_str(json).unwrap()
}

/// Template whose target every header hash meets
pub fn easy_template() -> DaemonTemplate {
    let mut template = sample_template();
    template.target = "f".repeat(64);
    template
}

/// Same chain tip as `template`, one block further on
pub fn next_block_template(template: &DaemonTemplate, prev_hash_seed: u8) -> DaemonTemplate {
    let mut next = template.clone();
    next.previousblockhash = hex::encode([prev_hash_seed; 32]);
    next.height += 1;
    next.curtime += 150;
    next
}

pub fn payout_settings() -> PayoutSettings {
    PayoutSettings {
        pool_address: p2pkh_address(1),
        recipients: vec![Recipient {
            address: p2pkh_address(2),
            percent: 1.0,
        }],
        rewards: RewardSchedule::default(),
        coinbase_tag: b"/equipool/".to_vec(),
    }
}

pub fn build_job(job_id: &str, template: DaemonTemplate) -> BlockTemplate {
    BlockTemplate::new(
        job_id.to_string(),
        template,
        &payout_settings(),
        test_diff1(),
    )
    .unwrap()
}

/// Solution hex of the right length for `params`, with its length prefix.
pub fn solution_hex(params: &EquihashParams, fill: u8) -> String {
    let mut solution = serialize(&VarInt(params.solution_size() as u64));
    solution.extend(std::iter::repeat_n(fill, params.solution_size()));
    hex::encode(solution)
}

/// A well formed submission against `job` at the template's time.
pub fn submission_for(job: &BlockTemplate, extra_nonce2: &str) -> ShareSubmission {
    ShareSubmission {
        job_id: job.job_id.clone(),
        previous_difficulty: None,
        difficulty: 1.0,
        extra_nonce1: TEST_EXTRA_NONCE1.to_string(),
        extra_nonce2: extra_nonce2.to_string(),
        n_time: hex::encode(job.rpc_data.curtime.to_le_bytes()),
        nonce: format!("{TEST_EXTRA_NONCE1}{}", "00".repeat(28)),
        solution: solution_hex(&EquihashParams::default(), 0x5a),
        ip: "127.0.0.1".to_string(),
        port: 3333,
        worker: "t1worker.rig1".to_string(),
    }
}
