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

use bitcoin::secp256k1::rand;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Bits reserved below the instance id in an extranonce
const INSTANCE_SHIFT: u32 = 27;

/// First job id handed out is one past this
const JOB_COUNTER_SEED: u64 = 0x0000cccc;

/// Job ids restart at 1 when the counter hits a multiple of this
const JOB_COUNTER_MODULUS: u64 = 0xffffffffff;

/// Issues the extranonce1 assigned to each miner connection.
///
/// The instance id occupies the high bits so several pool processes sharing
/// a daemon hand out disjoint ranges.
#[derive(Debug)]
pub struct ExtraNonceCounter {
    counter: AtomicI64,
}

impl ExtraNonceCounter {
    /// Size in bytes of an issued extranonce1
    pub const SIZE: usize = 4;

    /// Create a counter for `instance_id`, or a random instance when none is configured.
    pub fn new(instance_id: Option<u32>) -> Self {
        let seed = instance_id.unwrap_or_else(rand::random::<u32>);
        // The shifted seed is read as a signed 32 bit value
        let start = (seed << INSTANCE_SHIFT) as i32;
        Self {
            counter: AtomicI64::new(start as i64),
        }
    }

    /// Next extranonce1 as 8 lowercase hex characters, big endian.
    ///
    /// Values past 32 bits wrap.
    pub fn next(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::SeqCst);
        let packed = value.unsigned_abs() & 0xffff_ffff;
        format!("{packed:08x}")
    }
}

/// Issues job ids, one per block template.
#[derive(Debug)]
pub struct JobCounter {
    counter: AtomicU64,
}

impl Default for JobCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobCounter {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(JOB_COUNTER_SEED),
        }
    }

    /// Advance the counter and return the new job id
    pub fn next(&self) -> String {
        let advance = |current: u64| {
            let next = current.wrapping_add(1);
            Some(if next % JOB_COUNTER_MODULUS == 0 {
                1
            } else {
                next
            })
        };
        // The closure never returns None, so the update always succeeds
        let previous = match self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, advance)
        {
            Ok(previous) | Err(previous) => previous,
        };
        let current = advance(previous).unwrap_or(1);
        format!("{current:x}")
    }

    /// Current job id without advancing
    pub fn cur(&self) -> String {
        format!("{:x}", self.counter.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_extra_nonce_with_instance_id() {
        let counter = ExtraNonceCounter::new(Some(1));
        assert_eq!(counter.next(), "08000000");
        assert_eq!(counter.next(), "08000001");
        assert_eq!(counter.next().len(), ExtraNonceCounter::SIZE * 2);
    }

    #[test]
    fn test_extra_nonce_negative_seed_uses_absolute_value() {
        // 16 << 27 sets the sign bit of a 32 bit value
        let counter = ExtraNonceCounter::new(Some(16));
        assert_eq!(counter.next(), "80000000");
        assert_eq!(counter.next(), "7fffffff");
    }

    #[test]
    fn test_extra_nonce_wraps_past_32_bits() {
        let counter = ExtraNonceCounter {
            counter: AtomicI64::new(0xffff_ffff),
        };
        assert_eq!(counter.next(), "ffffffff");
        assert_eq!(counter.next(), "00000000");
        assert_eq!(counter.next(), "00000001");
    }

    #[test]
    fn test_extra_nonce_instance_namespaces_differ() {
        let a = ExtraNonceCounter::new(Some(2));
        let b = ExtraNonceCounter::new(Some(3));
        assert_ne!(a.next(), b.next());
    }

    #[test]
    fn test_extra_nonce_random_seed_is_well_formed() {
        let counter = ExtraNonceCounter::new(None);
        let value = counter.next();
        assert_eq!(value.len(), 8);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(value, value.to_lowercase());
    }

    #[test]
    fn test_extra_nonce_unique_across_threads() {
        let counter = Arc::new(ExtraNonceCounter::new(Some(5)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || (0..250).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value));
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_job_counter_sequence() {
        let counter = JobCounter::new();
        assert_eq!(counter.cur(), "cccc");
        assert_eq!(counter.next(), "cccd");
        assert_eq!(counter.cur(), "cccd");
        assert_eq!(counter.cur(), "cccd");
        assert_eq!(counter.next(), "ccce");
    }

    #[test]
    fn test_job_counter_resets_at_modulus() {
        let counter = JobCounter {
            counter: AtomicU64::new(JOB_COUNTER_MODULUS - 1),
        };
        assert_eq!(counter.next(), "1");
        assert_eq!(counter.next(), "2");
    }
}
