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

use serde::{Deserialize, Serialize};

/// Zatoshis per coin
pub const COIN: f64 = 100_000_000.0;

/// Transaction data in the block template
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TemplateTransaction {
    /// Raw transaction hex
    pub data: String,
    /// Transaction id in display (RPC) byte order
    pub hash: String,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub depends: Vec<u32>,
    #[serde(default)]
    pub sigops: u32,
}

/// Struct representing the getblocktemplate response from a zcashd style daemon
///
/// Only the fields the job manager consumes are modelled, anything else in
/// the response is ignored.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DaemonTemplate {
    pub version: u32,
    pub previousblockhash: String,
    #[serde(default)]
    pub transactions: Vec<TemplateTransaction>,
    /// Full 256 bit network target, big endian hex
    pub target: String,
    pub curtime: u32,
    /// Compact target, big endian hex
    pub bits: String,
    pub height: u32,
    /// Miner subsidy in coins
    #[serde(default)]
    pub miner: f64,
    /// Founders subsidy in coins
    #[serde(default)]
    pub founders: f64,
}

impl DaemonTemplate {
    /// Total block subsidy in zatoshis, miner and founders parts together.
    pub fn block_reward(&self) -> u64 {
        ((self.miner + self.founders) * COIN).round() as u64
    }

    /// Sum of fees paid by the template's transactions
    pub fn total_fees(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.fee).sum()
    }
}
