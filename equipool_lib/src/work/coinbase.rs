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

use super::error::WorkError;
use bitcoin::absolute::LockTime;
use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::hashes::Hash;
use bitcoin::transaction::{OutPoint, Sequence, Transaction, TxIn, TxOut, Version};
use bitcoin::{Amount, PubkeyHash, ScriptHash, Witness};
use serde::Deserialize;
use tracing::debug;

/// Consensus limit on the coinbase input script
const MAX_COINBASE_SCRIPT_LEN: usize = 100;

/// A fee recipient taking a percentage of the block subsidy and fees
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Recipient {
    pub address: String,
    pub percent: f64,
}

/// Founders reward paid for a bounded range of heights.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FoundersReward {
    pub percent: f64,
    /// Last height paying the founders reward
    pub max_height: u32,
    pub address_change_interval: u32,
    pub addresses: Vec<String>,
}

/// Treasury reward paid from a start height, rotating over its addresses.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TreasuryReward {
    pub percent: f64,
    pub start_height: u32,
    pub address_change_interval: u32,
    pub addresses: Vec<String>,
}

/// Protocol mandated reward outputs.
///
/// Which sections are present selects the coinbase layout: none, founders
/// only, or founders followed by a treasury from `treasury.start_height`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RewardSchedule {
    #[serde(default)]
    pub founders: Option<FoundersReward>,
    #[serde(default)]
    pub treasury: Option<TreasuryReward>,
}

/// The reward output chosen for a height
#[derive(Debug, Clone, PartialEq)]
pub struct RewardSelection<'a> {
    pub percent: f64,
    pub address: &'a str,
}

impl RewardSchedule {
    /// Pick the reward percentage and address for `height`, if any reward is due.
    pub fn select(&self, height: u32) -> Result<Option<RewardSelection<'_>>, WorkError> {
        if let Some(treasury) = self
            .treasury
            .as_ref()
            .filter(|treasury| height >= treasury.start_height)
        {
            if treasury.address_change_interval == 0 || treasury.addresses.is_empty() {
                return Err(WorkError::InvalidRewardSchedule(
                    "treasury needs addresses and a non zero address change interval".into(),
                ));
            }
            let rotation = (height - treasury.start_height) / treasury.address_change_interval;
            let index = rotation as usize % treasury.addresses.len();
            return Ok(Some(RewardSelection {
                percent: treasury.percent,
                address: &treasury.addresses[index],
            }));
        }

        match self
            .founders
            .as_ref()
            .filter(|founders| height <= founders.max_height)
        {
            Some(founders) => {
                if founders.address_change_interval == 0 {
                    return Err(WorkError::InvalidRewardSchedule(
                        "founders address change interval is zero".into(),
                    ));
                }
                let index = (height / founders.address_change_interval) as usize;
                let address = founders
                    .addresses
                    .get(index)
                    .ok_or(WorkError::MissingRewardAddress { height, index })?;
                Ok(Some(RewardSelection {
                    percent: founders.percent,
                    address,
                }))
            }
            None => Ok(None),
        }
    }
}

/// Everything needed to build the generation transaction for one template.
#[derive(Debug, Clone)]
pub struct CoinbaseParams<'a> {
    pub height: u32,
    /// Block subsidy in zatoshis
    pub subsidy: u64,
    /// Fees collected from the template's transactions
    pub fees: u64,
    pub recipients: &'a [Recipient],
    pub pool_address: &'a str,
    pub rewards: &'a RewardSchedule,
    /// Extra bytes appended to the input script after the height
    pub tag: &'a [u8],
}

/// Encode the block height for the coinbase input script.
///
/// The push length counts a sign bit, so heights whose top byte has the high
/// bit set announce one more byte than they carry and the trailing zero
/// completes the push. Otherwise the trailing zero is an OP_0.
pub fn serialize_height(height: u32) -> Vec<u8> {
    let shifted = (height as u64) << 1;
    let bit_len = (64 - shifted.leading_zeros()).max(1);
    let push_len = bit_len.div_ceil(8) as u8;

    let mut height_bytes: Vec<u8> = height.to_le_bytes().to_vec();
    while height_bytes.len() > 1 && height_bytes.last() == Some(&0) {
        height_bytes.pop();
    }

    let mut serialized = Vec::with_capacity(height_bytes.len() + 2);
    serialized.push(push_len);
    serialized.extend(height_bytes);
    serialized.push(0x00);
    serialized
}

/// Decode a base58check transparent address into its 20 byte hash.
///
/// Zcash style addresses carry a two byte version prefix, bitcoin style a
/// single byte. Both are accepted.
pub fn decode_address_hash(address: &str) -> Result<[u8; 20], WorkError> {
    let payload =
        bitcoin::base58::decode_check(address).map_err(|e| WorkError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
    if payload.len() != 21 && payload.len() != 22 {
        return Err(WorkError::InvalidAddress {
            address: address.to_string(),
            reason: format!("unexpected payload length {}", payload.len()),
        });
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[payload.len() - 20..]);
    Ok(hash)
}

/// Pay to pubkey hash locking script for an address
pub fn p2pkh_script(address: &str) -> Result<ScriptBuf, WorkError> {
    let hash = decode_address_hash(address)?;
    Ok(ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(hash)))
}

/// Pay to script hash locking script for an address
pub fn p2sh_script(address: &str) -> Result<ScriptBuf, WorkError> {
    let hash = decode_address_hash(address)?;
    Ok(ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)))
}

/// Each output is rounded on its own, the outputs may not sum to subsidy + fees.
fn round_amount(value: f64) -> Amount {
    Amount::from_sat(value.round() as u64)
}

/// Build the generation transaction paying the pool, the fee recipients and
/// any founders or treasury reward due at this height.
pub fn build_coinbase_transaction(params: &CoinbaseParams<'_>) -> Result<Transaction, WorkError> {
    let mut script_bytes = serialize_height(params.height);
    script_bytes.extend_from_slice(params.tag);
    if script_bytes.len() > MAX_COINBASE_SCRIPT_LEN {
        return Err(WorkError::InvalidTemplate(format!(
            "Coinbase script is {} bytes, limit is {}",
            script_bytes.len(),
            MAX_COINBASE_SCRIPT_LEN
        )));
    }

    let fee_percent: f64 = params.recipients.iter().map(|r| r.percent).sum();
    let selection = params.rewards.select(params.height)?;
    let reward_percent = selection.as_ref().map_or(0.0, |s| s.percent);
    if fee_percent + reward_percent > 100.0 || fee_percent < 0.0 || reward_percent < 0.0 {
        return Err(WorkError::InvalidRewardSchedule(format!(
            "recipient {fee_percent}% and reward {reward_percent}% do not fit in the subsidy"
        )));
    }

    let subsidy = params.subsidy as f64;
    let fees = params.fees as f64;
    let pool_fees = round_amount(fees * (1.0 - fee_percent / 100.0));

    let mut outputs = Vec::with_capacity(params.recipients.len() + 2);
    match selection {
        Some(selection) => {
            outputs.push(TxOut {
                value: round_amount(subsidy * (1.0 - (selection.percent + fee_percent) / 100.0))
                    + pool_fees,
                script_pubkey: p2pkh_script(params.pool_address)?,
            });
            outputs.push(TxOut {
                value: round_amount(subsidy * (selection.percent / 100.0)),
                script_pubkey: p2sh_script(selection.address)?,
            });
        }
        None => {
            outputs.push(TxOut {
                value: round_amount(subsidy * (1.0 - fee_percent / 100.0)) + pool_fees,
                script_pubkey: p2pkh_script(params.pool_address)?,
            });
        }
    }

    for recipient in params.recipients {
        outputs.push(TxOut {
            value: round_amount(subsidy * (recipient.percent / 100.0))
                + round_amount(fees * (recipient.percent / 100.0)),
            script_pubkey: p2pkh_script(&recipient.address)?,
        });
    }

    debug!(
        "Coinbase for height {} has {} outputs",
        params.height,
        outputs.len()
    );

    Ok(Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(script_bytes),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs,
    })
}
