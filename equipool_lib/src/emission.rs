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

use crate::work::block_template::BlockTemplate;
use crate::work::error::ShareError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An accepted share, with everything payout accounting needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRecord {
    pub job: String,
    pub ip: String,
    pub port: u16,
    pub worker: String,
    pub height: u32,
    /// Block subsidy in zatoshis
    pub block_reward: u64,
    /// Difficulty the share is credited at
    pub difficulty: f64,
    pub share_diff: f64,
    /// Network difficulty scaled by the share multiplier
    pub block_diff: f64,
    pub block_diff_actual: f64,
    /// Set when the share solved a block
    pub block_hash: Option<String>,
    pub block_hash_invalid: Option<String>,
    #[serde(skip)]
    pub block_hex: Option<String>,
}

/// A rejected share
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedShare {
    pub job: String,
    pub ip: String,
    pub port: u16,
    pub worker: String,
    pub difficulty: f64,
    pub error: ShareError,
}

/// Events published by the job manager to the stratum and accounting layers.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The chain tip moved, miners must drop their current work
    NewBlock(Arc<BlockTemplate>),
    /// Same tip, new transactions. Older jobs stay valid
    UpdatedBlock(Arc<BlockTemplate>),
    Share(ShareRecord),
    InvalidShare(RejectedShare),
}

pub type EventSender = mpsc::UnboundedSender<JobEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<JobEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
