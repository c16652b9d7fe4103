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

/// Errors raised while turning a daemon template into a job.
///
/// These point at a misconfigured pool or a broken daemon and stop job
/// issuance. They are never returned to miners.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("No reward address at index {index} for height {height}")]
    MissingRewardAddress { height: u32, index: usize },
    #[error("Invalid reward schedule: {0}")]
    InvalidRewardSchedule(String),
    #[error("Invalid block template: {0}")]
    InvalidTemplate(String),
}

/// Reasons a submitted share is rejected.
///
/// Each kind maps to the numeric code sent back over stratum.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShareError {
    #[error("job not found")]
    JobNotFound,
    #[error("incorrect size of ntime")]
    MalformedNtime,
    #[error("ntime out of range")]
    NtimeOutOfRange,
    #[error("incorrect size of nonce")]
    MalformedNonce,
    #[error("incorrect size of solution")]
    MalformedSolution,
    #[error("duplicate share")]
    DuplicateShare,
    #[error("low difficulty share of {0}")]
    LowDifficultyShare(f64),
}

impl ShareError {
    /// Stratum error code for this rejection
    pub fn code(&self) -> i32 {
        match self {
            Self::JobNotFound => 21,
            Self::MalformedNtime
            | Self::NtimeOutOfRange
            | Self::MalformedNonce
            | Self::MalformedSolution => 20,
            Self::DuplicateShare => 22,
            Self::LowDifficultyShare(_) => 23,
        }
    }

    /// Short machine friendly name, used in logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobNotFound => "job-not-found",
            Self::MalformedNtime => "malformed-ntime",
            Self::NtimeOutOfRange => "ntime-out-of-range",
            Self::MalformedNonce => "malformed-nonce",
            Self::MalformedSolution => "malformed-solution",
            Self::DuplicateShare => "duplicate-share",
            Self::LowDifficultyShare(_) => "low-difficulty-share",
        }
    }
}
