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

//! Merkle root of a block's transactions.
//!
//! Hashes travel in two byte orders. RPC responses and explorers show the
//! display order, while headers and the merkle tree itself use the internal
//! order, the raw sha256d output. Every hash entering this module states its
//! order.

use super::error::WorkError;
use bitcoin::hashes::{Hash, sha256d};

/// Byte order of a 32 byte hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashByteOrder {
    /// Raw sha256d output, as used inside headers
    Internal,
    /// Reversed, as shown by RPC and block explorers
    Display,
}

/// Parse a 64 character hex hash in the given order into internal order.
pub fn parse_hash(hash_hex: &str, order: HashByteOrder) -> Result<[u8; 32], WorkError> {
    let bytes = hex::decode(hash_hex)
        .map_err(|e| WorkError::InvalidTemplate(format!("Invalid hash {hash_hex}: {e}")))?;
    let mut hash: [u8; 32] = bytes.try_into().map_err(|_| {
        WorkError::InvalidTemplate(format!("Hash {hash_hex} is not 32 bytes"))
    })?;
    if order == HashByteOrder::Display {
        hash.reverse();
    }
    Ok(hash)
}

/// Convert an internal order hash to the requested order
pub fn to_order(hash: &[u8; 32], order: HashByteOrder) -> [u8; 32] {
    let mut out = *hash;
    if order == HashByteOrder::Display {
        out.reverse();
    }
    out
}

/// Compute the merkle root over the coinbase hash followed by the template's
/// transaction hashes, all in internal order. The root is in internal order.
///
/// An odd node at any level is paired with itself.
pub fn merkle_root(coinbase_hash: [u8; 32], tx_hashes: &[[u8; 32]]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = Vec::with_capacity(tx_hashes.len() + 1);
    level.push(coinbase_hash);
    level.extend_from_slice(tx_hashes);

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut concat = [0u8; 64];
                concat[..32].copy_from_slice(&left);
                concat[32..].copy_from_slice(&right);
                sha256d::Hash::hash(&concat).to_byte_array()
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;

    // Block 170, the first block with a transaction other than the coinbase
    const BLOCK_170_COINBASE: &str =
        "b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082";
    const BLOCK_170_TX: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";
    const BLOCK_170_MERKLE_ROOT: &str =
        "7dac2c5666815c17a3b36427de37bb9d2e2c5ccec3f8633eb91a4205cb4c10ff";

    fn hash_of(seed: u8) -> [u8; 32] {
        sha256d::Hash::hash(&[seed]).to_byte_array()
    }

    fn library_root(hashes: &[[u8; 32]]) -> [u8; 32] {
        let txids = hashes
            .iter()
            .map(|h| Txid::from_raw_hash(sha256d::Hash::from_byte_array(*h)));
        bitcoin::merkle_tree::calculate_root(txids)
            .unwrap()
            .to_raw_hash()
            .to_byte_array()
    }

    #[test]
    fn test_parse_hash_orders() {
        let display = parse_hash(BLOCK_170_TX, HashByteOrder::Display).unwrap();
        let internal = parse_hash(BLOCK_170_TX, HashByteOrder::Internal).unwrap();
        assert_eq!(display[0], 0x16);
        assert_eq!(internal[0], 0xf4);
        assert_eq!(to_order(&display, HashByteOrder::Display), internal);
        assert_eq!(to_order(&display, HashByteOrder::Internal), display);
    }

    #[test]
    fn test_parse_hash_rejects_bad_input() {
        assert!(parse_hash("abcd", HashByteOrder::Display).is_err());
        assert!(parse_hash(&"zz".repeat(32), HashByteOrder::Display).is_err());
    }

    #[test]
    fn test_merkle_root_of_mainnet_block_170() {
        let coinbase = parse_hash(BLOCK_170_COINBASE, HashByteOrder::Display).unwrap();
        let tx = parse_hash(BLOCK_170_TX, HashByteOrder::Display).unwrap();

        let root = merkle_root(coinbase, &[tx]);

        assert_eq!(
            hex::encode(to_order(&root, HashByteOrder::Display)),
            BLOCK_170_MERKLE_ROOT
        );
    }

    #[test]
    fn test_merkle_root_without_transactions_is_coinbase_hash() {
        let coinbase = hash_of(1);
        assert_eq!(merkle_root(coinbase, &[]), coinbase);
    }

    #[test]
    fn test_merkle_root_matches_pairwise_reduction() {
        let coinbase = hash_of(0);
        let txs: Vec<[u8; 32]> = (1..=5).map(hash_of).collect();

        for count in [2usize, 3, 5] {
            let others = &txs[..count];
            let mut all = vec![coinbase];
            all.extend_from_slice(others);
            assert_eq!(
                merkle_root(coinbase, others),
                library_root(&all),
                "mismatch with {count} transactions"
            );
        }
    }

    #[test]
    fn test_merkle_root_duplicates_odd_node() {
        let a = hash_of(1);
        let b = hash_of(2);
        let c = hash_of(3);

        let pair = |l: [u8; 32], r: [u8; 32]| {
            let mut concat = l.to_vec();
            concat.extend_from_slice(&r);
            sha256d::Hash::hash(&concat).to_byte_array()
        };
        let expected = pair(pair(a, b), pair(c, c));
        assert_eq!(merkle_root(a, &[b, c]), expected);
    }
}
