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

//! Target and difficulty arithmetic.
//!
//! Targets and header hashes are 256 bit unsigned integers. Difficulties are
//! floating point ratios against the coin's difficulty 1 target.

use super::error::WorkError;
use primitive_types::U256;

pub mod validate;

/// Difficulty 1 target used by Equihash coins
pub const DEFAULT_DIFF1_HEX: &str =
    "0007ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Parse a big endian hex target as sent by the daemon
pub fn parse_target(target_hex: &str) -> Result<U256, WorkError> {
    if target_hex.is_empty() || target_hex.len() > 64 {
        return Err(WorkError::InvalidTemplate(format!(
            "Target has invalid length: {}",
            target_hex.len()
        )));
    }
    let target = U256::from_str_radix(target_hex, 16)
        .map_err(|e| WorkError::InvalidTemplate(format!("Invalid target {target_hex}: {e:?}")))?;
    if target.is_zero() {
        return Err(WorkError::InvalidTemplate("Target is zero".into()));
    }
    Ok(target)
}

/// Interpret a hash as a little endian 256 bit integer
pub fn hash_to_u256(hash: &[u8; 32]) -> U256 {
    U256::from_little_endian(hash)
}

/// Lossy conversion to f64, combining the high and low 128 bit halves.
pub fn u256_to_f64(value: U256) -> f64 {
    let high = (value >> 128).low_u128() as f64;
    let low = value.low_u128() as f64;
    high * 2.0f64.powi(128) + low
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Difficulty of a network target, rounded to 9 decimal places.
pub fn difficulty_for_target(diff1: f64, target: U256) -> f64 {
    round_to(diff1 / u256_to_f64(target), 9)
}

/// Difficulty achieved by a header hash, scaled by the algorithm's share multiplier.
pub fn share_difficulty(diff1: f64, header_value: U256, multiplier: f64) -> f64 {
    diff1 / u256_to_f64(header_value) * multiplier
}
