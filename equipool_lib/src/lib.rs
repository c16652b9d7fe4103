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

pub mod config;
pub mod emission;
pub mod job_manager;
pub mod logging;
pub mod utils;
pub mod work;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use job_manager::{AcceptedShare, JobManager, JobManagerOptions, ShareResponse};
