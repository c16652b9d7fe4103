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

use bitcoin::consensus::encode::{VarInt, serialize};
use serde::Deserialize;

#[cfg(test)]
use mockall::automock;

/// Proof of work verifier for a coin's algorithm.
///
/// Supplied by the caller when building the [`crate::JobManager`], one
/// implementation per supported Equihash variant. `header` is the 140 byte
/// serialized header, `solution` is the solution with its length prefix
/// removed.
#[cfg_attr(test, automock)]
pub trait ProofOfWork: Send + Sync {
    fn verify(&self, header: &[u8], solution: &[u8]) -> bool;
}

/// Equihash (n, k) parameters of a coin
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct EquihashParams {
    pub n: u32,
    pub k: u32,
}

impl Default for EquihashParams {
    /// Zcash mainnet parameters
    fn default() -> Self {
        Self { n: 200, k: 9 }
    }
}

impl EquihashParams {
    /// Size in bytes of a minimal encoded solution, without the length prefix.
    pub fn solution_size(&self) -> usize {
        let indices = 1usize << self.k;
        let bits_per_index = (self.n / (self.k + 1) + 1) as usize;
        indices * bits_per_index / 8
    }

    /// Size of the CompactSize length prefix in front of the solution
    pub fn solution_prefix_len(&self) -> usize {
        serialize(&VarInt(self.solution_size() as u64)).len()
    }

    /// Expected length of a submitted solution in hex characters, prefix included.
    pub fn solution_hex_len(&self) -> usize {
        2 * (self.solution_prefix_len() + self.solution_size())
    }
}
