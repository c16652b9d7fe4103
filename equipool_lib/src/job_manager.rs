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

use crate::config::Config;
use crate::emission::{
    EventReceiver, EventSender, JobEvent, RejectedShare, ShareRecord, event_channel,
};
use crate::utils::time_provider::{SystemTimeProvider, TimeProvider};
use crate::work::block_template::{BlockTemplate, PayoutSettings};
use crate::work::coinbase::decode_address_hash;
use crate::work::difficulty::validate::{ShareSubmission, ValidationContext, validate_submission};
use crate::work::error::{ShareError, WorkError};
use crate::work::gbt::DaemonTemplate;
use crate::work::pow::{EquihashParams, ProofOfWork};
use crate::work::tracker::{ExtraNonceCounter, JobCounter};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info};

/// Settings the job manager needs from the pool and coin configuration.
#[derive(Debug, Clone)]
pub struct JobManagerOptions {
    pub payout: PayoutSettings,
    pub instance_id: Option<u32>,
    pub diff1: f64,
    pub multiplier: f64,
    pub equihash: EquihashParams,
    pub emit_invalid_block_hashes: bool,
}

impl JobManagerOptions {
    /// Build options from configuration. Fails on the first payout address
    /// that does not decode.
    pub fn from_config(config: &Config) -> Result<Self, WorkError> {
        let rewards = &config.coin.rewards;
        let reward_addresses = rewards
            .founders
            .iter()
            .flat_map(|founders| founders.addresses.iter())
            .chain(
                rewards
                    .treasury
                    .iter()
                    .flat_map(|treasury| treasury.addresses.iter()),
            );
        std::iter::once(&config.pool.address)
            .chain(config.pool.recipients.iter().map(|r| &r.address))
            .chain(reward_addresses)
            .try_for_each(|address| decode_address_hash(address).map(|_| ()))?;

        Ok(Self {
            payout: PayoutSettings {
                pool_address: config.pool.address.clone(),
                recipients: config.pool.recipients.clone(),
                rewards: rewards.clone(),
                coinbase_tag: config
                    .pool
                    .coinbase_tag
                    .as_deref()
                    .map(|tag| tag.as_bytes().to_vec())
                    .unwrap_or_default(),
            },
            instance_id: config.pool.instance_id,
            diff1: config.coin.diff1()?,
            multiplier: config.coin.multiplier,
            equihash: config.coin.equihash,
            emit_invalid_block_hashes: config.pool.emit_invalid_block_hashes,
        })
    }
}

/// A share that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedShare {
    pub job_id: String,
    /// Difficulty the share is credited at
    pub difficulty: f64,
    pub share_difficulty: f64,
    /// Display order hash when the share solved a block
    pub block_hash: Option<String>,
    /// Serialized block to submit to the daemon
    pub block_hex: Option<String>,
}

/// Response to a mining.submit, as sent back to the miner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShareResponse {
    Accepted {
        result: bool,
        error: Option<(i32, String)>,
        #[serde(rename = "blockHash")]
        block_hash: Option<String>,
    },
    Rejected {
        result: Option<bool>,
        error: (i32, String),
    },
}

impl From<&Result<AcceptedShare, ShareError>> for ShareResponse {
    fn from(outcome: &Result<AcceptedShare, ShareError>) -> Self {
        match outcome {
            Ok(accepted) => ShareResponse::Accepted {
                result: true,
                error: None,
                block_hash: accepted.block_hash.clone(),
            },
            Err(e) => ShareResponse::Rejected {
                result: None,
                error: (e.code(), e.to_string()),
            },
        }
    }
}

/// Tracks the current job and every job miners may still submit against,
/// and validates submitted shares.
///
/// Template changes are serialized by the current job lock. Shares against
/// the same job race only on that job's duplicate ledger, which is a
/// concurrent set.
pub struct JobManager {
    options: JobManagerOptions,
    job_counter: JobCounter,
    extra_nonce_counter: ExtraNonceCounter,
    current_job: RwLock<Option<Arc<BlockTemplate>>>,
    valid_jobs: DashMap<String, Arc<BlockTemplate>>,
    pow: Arc<dyn ProofOfWork>,
    time_provider: Arc<dyn TimeProvider>,
    events: EventSender,
}

impl JobManager {
    /// Create a job manager using the system clock. Events are delivered on
    /// the returned receiver.
    pub fn new(options: JobManagerOptions, pow: Arc<dyn ProofOfWork>) -> (Self, EventReceiver) {
        Self::with_time_provider(options, pow, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(
        options: JobManagerOptions,
        pow: Arc<dyn ProofOfWork>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = event_channel();
        let manager = Self {
            extra_nonce_counter: ExtraNonceCounter::new(options.instance_id),
            job_counter: JobCounter::new(),
            current_job: RwLock::new(None),
            valid_jobs: DashMap::new(),
            options,
            pow,
            time_provider,
            events,
        };
        (manager, receiver)
    }

    fn emit(&self, event: JobEvent) {
        if self.events.send(event).is_err() {
            debug!("Job event receiver dropped, event discarded");
        }
    }

    fn build_job(&self, rpc_data: DaemonTemplate) -> Result<Arc<BlockTemplate>, WorkError> {
        let height = rpc_data.height;
        BlockTemplate::new(
            self.job_counter.next(),
            rpc_data,
            &self.options.payout,
            self.options.diff1,
        )
        .map(Arc::new)
        .inspect_err(|e| error!("Failed to build job for height {height}: {e}"))
    }

    /// Take a template from the daemon. Returns true when it starts a new
    /// block, in which case all earlier jobs are dropped.
    ///
    /// A template for a lower height than the current job is stale and is
    /// ignored, as is one on the same previous block.
    pub fn process_template(&self, rpc_data: DaemonTemplate) -> Result<bool, WorkError> {
        let mut current = self
            .current_job
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(job) = current.as_ref() {
            if job.rpc_data.previousblockhash == rpc_data.previousblockhash {
                return Ok(false);
            }
            if rpc_data.height < job.height() {
                debug!(
                    "Ignoring stale template at height {}, current job is at {}",
                    rpc_data.height,
                    job.height()
                );
                return Ok(false);
            }
        }

        let job = self.build_job(rpc_data)?;
        *current = Some(job.clone());
        self.valid_jobs.clear();
        self.valid_jobs.insert(job.job_id.clone(), job.clone());

        debug!("Coinbase for job {}: {}", job.job_id, job.gen_tx_hex());
        info!(
            "New block at height {} on {}, job {}",
            job.height(),
            job.rpc_data.previousblockhash,
            job.job_id
        );
        self.emit(JobEvent::NewBlock(job));
        Ok(true)
    }

    /// Replace the current job with one built from a refreshed template on
    /// the same block. Earlier jobs stay valid.
    pub fn update_current_job(
        &self,
        rpc_data: DaemonTemplate,
    ) -> Result<Arc<BlockTemplate>, WorkError> {
        let mut current = self
            .current_job
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let job = self.build_job(rpc_data)?;
        *current = Some(job.clone());
        self.valid_jobs.insert(job.job_id.clone(), job.clone());

        info!(
            "Updated job {} at height {} with {} transactions",
            job.job_id,
            job.height(),
            job.tx_count
        );
        self.emit(JobEvent::UpdatedBlock(job.clone()));
        Ok(job)
    }

    fn reject(
        &self,
        submission: &ShareSubmission,
        error: ShareError,
    ) -> Result<AcceptedShare, ShareError> {
        debug!(
            "Rejected share from {} on job {}: {}",
            submission.worker, submission.job_id, error
        );
        self.emit(JobEvent::InvalidShare(RejectedShare {
            job: submission.job_id.clone(),
            ip: submission.ip.clone(),
            port: submission.port,
            worker: submission.worker.clone(),
            difficulty: submission.difficulty,
            error: error.clone(),
        }));
        Err(error)
    }

    /// Validate a share submitted by a miner.
    ///
    /// Accepted shares and found blocks are reported on the event channel
    /// as well as returned, rejected shares likewise.
    pub fn process_share(
        &self,
        submission: &ShareSubmission,
    ) -> Result<AcceptedShare, ShareError> {
        let Some(job) = self.get_job(&submission.job_id) else {
            return self.reject(submission, ShareError::JobNotFound);
        };

        let ctx = ValidationContext {
            diff1: self.options.diff1,
            multiplier: self.options.multiplier,
            equihash: self.options.equihash,
            now: self.time_provider.seconds_since_epoch(),
            emit_invalid_block_hashes: self.options.emit_invalid_block_hashes,
            pow: self.pow.as_ref(),
        };

        let result = match validate_submission(&job, submission, &ctx) {
            Ok(result) => result,
            Err(e) => return self.reject(submission, e),
        };

        let (block_hash, block_hex) = match result.block {
            Some(block) => (Some(block.hash), Some(block.hex)),
            None => (None, None),
        };

        self.emit(JobEvent::Share(ShareRecord {
            job: job.job_id.clone(),
            ip: submission.ip.clone(),
            port: submission.port,
            worker: submission.worker.clone(),
            height: job.height(),
            block_reward: job.block_reward,
            difficulty: result.difficulty,
            share_diff: result.share_difficulty,
            block_diff: job.difficulty * self.options.multiplier,
            block_diff_actual: job.difficulty,
            block_hash: block_hash.clone(),
            block_hash_invalid: result.block_hash_invalid,
            block_hex: block_hex.clone(),
        }));

        Ok(AcceptedShare {
            job_id: job.job_id.clone(),
            difficulty: result.difficulty,
            share_difficulty: result.share_difficulty,
            block_hash,
            block_hex,
        })
    }

    /// The most recently issued job
    pub fn current_job(&self) -> Option<Arc<BlockTemplate>> {
        self.current_job
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_job(&self, job_id: &str) -> Option<Arc<BlockTemplate>> {
        self.valid_jobs.get(job_id).map(|job| job.clone())
    }

    pub fn valid_job_count(&self) -> usize {
        self.valid_jobs.len()
    }

    /// Extranonce1 for a new miner connection
    pub fn next_extra_nonce(&self) -> String {
        self.extra_nonce_counter.next()
    }

    pub fn extra_nonce_size(&self) -> usize {
        ExtraNonceCounter::SIZE
    }
}
