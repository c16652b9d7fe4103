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

use super::{hash_to_u256, share_difficulty};
use crate::work::block_template::BlockTemplate;
use crate::work::error::ShareError;
use crate::work::pow::{EquihashParams, ProofOfWork};
use bitcoin::hashes::{Hash, sha256d};
use tracing::{debug, info};

/// Hex length of the submitted nTime
pub const NTIME_HEX_LEN: usize = 8;

/// Hex length of the submitted nonce
pub const NONCE_HEX_LEN: usize = 64;

/// How far into the future a submitted nTime may be
pub const MAX_NTIME_FUTURE_SECS: u64 = 7200;

/// Shares below this fraction of the assigned difficulty are rejected
const MIN_DIFFICULTY_RATIO: f64 = 0.99;

/// A share as submitted by a miner, with the stratum session's view of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareSubmission {
    pub job_id: String,
    /// Difficulty before the latest retarget, if one happened recently
    pub previous_difficulty: Option<f64>,
    pub difficulty: f64,
    pub extra_nonce1: String,
    pub extra_nonce2: String,
    pub n_time: String,
    /// Header nonce, 64 hex characters. Must start with extranonce1 followed
    /// by extranonce2: the duplicate ledger keys on the extranonces, the
    /// header hash only on the nonce.
    pub nonce: String,
    pub solution: String,
    pub ip: String,
    pub port: u16,
    pub worker: String,
}

/// Coin and clock inputs to share validation
pub struct ValidationContext<'a> {
    pub diff1: f64,
    pub multiplier: f64,
    pub equihash: EquihashParams,
    /// Current time in seconds since the epoch
    pub now: u64,
    pub emit_invalid_block_hashes: bool,
    pub pow: &'a dyn ProofOfWork,
}

/// A block found by a share
#[derive(Debug, Clone, PartialEq)]
pub struct FoundBlock {
    /// Serialized block, ready for submitblock
    pub hex: String,
    /// Block hash in display order
    pub hash: String,
}

/// Outcome of a share that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// sha256d of header and solution, internal order
    pub header_hash: [u8; 32],
    pub share_difficulty: f64,
    /// Difficulty the share is credited at
    pub difficulty: f64,
    pub block: Option<FoundBlock>,
    /// Display order hash of a share that is not a block, when reporting is enabled
    pub block_hash_invalid: Option<String>,
}

/// Decode the submitted nTime. The hex holds the header bytes, little endian.
pub fn parse_ntime(n_time: &str) -> Result<([u8; 4], u32), ShareError> {
    if n_time.len() != NTIME_HEX_LEN {
        return Err(ShareError::MalformedNtime);
    }
    let bytes: [u8; 4] = hex::decode(n_time)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ShareError::MalformedNtime)?;
    Ok((bytes, u32::from_le_bytes(bytes)))
}

fn parse_nonce(nonce: &str) -> Result<[u8; 32], ShareError> {
    if nonce.len() != NONCE_HEX_LEN {
        return Err(ShareError::MalformedNonce);
    }
    hex::decode(nonce)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ShareError::MalformedNonce)
}

fn parse_solution(solution: &str, params: &EquihashParams) -> Result<Vec<u8>, ShareError> {
    if solution.len() != params.solution_hex_len() {
        return Err(ShareError::MalformedSolution);
    }
    hex::decode(solution).map_err(|_| ShareError::MalformedSolution)
}

fn display_hash(hash: &[u8; 32]) -> String {
    let mut display = *hash;
    display.reverse();
    hex::encode(display)
}

/// Validate a share against its job.
///
/// Checks run in a fixed order and stop at the first failure. The submission
/// is recorded in the job's duplicate ledger before its difficulty is checked,
/// so a low difficulty share cannot be replayed either.
pub fn validate_submission(
    job: &BlockTemplate,
    submission: &ShareSubmission,
    ctx: &ValidationContext<'_>,
) -> Result<ValidationResult, ShareError> {
    let (n_time_bytes, n_time) = parse_ntime(&submission.n_time)?;
    if n_time < job.rpc_data.curtime || n_time as u64 > ctx.now + MAX_NTIME_FUTURE_SECS {
        return Err(ShareError::NtimeOutOfRange);
    }

    let nonce = parse_nonce(&submission.nonce)?;
    let solution = parse_solution(&submission.solution, &ctx.equihash)?;

    if !job.register_submit(
        &submission.extra_nonce1,
        &submission.extra_nonce2,
        &submission.n_time,
        &submission.nonce,
    ) {
        return Err(ShareError::DuplicateShare);
    }

    let header = job.serialize_header(&n_time_bytes, &nonce);
    let mut header_and_solution = Vec::with_capacity(header.len() + solution.len());
    header_and_solution.extend_from_slice(&header);
    header_and_solution.extend_from_slice(&solution);
    let header_hash = sha256d::Hash::hash(&header_and_solution).to_byte_array();
    let header_value = hash_to_u256(&header_hash);

    let share_diff = share_difficulty(ctx.diff1, header_value, ctx.multiplier);

    let prefix_len = ctx.equihash.solution_prefix_len();
    if header_value <= job.target && ctx.pow.verify(&header, &solution[prefix_len..]) {
        let block_hash = display_hash(&header_hash);
        info!(
            "Block candidate {} found on job {} at height {}",
            block_hash,
            job.job_id,
            job.height()
        );
        return Ok(ValidationResult {
            header_hash,
            share_difficulty: share_diff,
            difficulty: submission.difficulty,
            block: Some(FoundBlock {
                hex: hex::encode(job.serialize_block(&header, &solution)),
                hash: block_hash,
            }),
            block_hash_invalid: None,
        });
    }

    let mut difficulty = submission.difficulty;
    if share_diff / difficulty < MIN_DIFFICULTY_RATIO {
        match submission.previous_difficulty {
            Some(previous) if previous > 0.0 && share_diff >= previous => {
                debug!(
                    "Share on job {} credited at previous difficulty {}",
                    job.job_id, previous
                );
                difficulty = previous;
            }
            _ => return Err(ShareError::LowDifficultyShare(share_diff)),
        }
    }

    Ok(ValidationResult {
        header_hash,
        share_difficulty: share_diff,
        difficulty,
        block: None,
        block_hash_invalid: ctx
            .emit_invalid_block_hashes
            .then(|| display_hash(&header_hash)),
    })
}
