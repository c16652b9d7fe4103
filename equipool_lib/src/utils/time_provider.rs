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

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait to get current system time, allowing for mocking in tests
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> SystemTime;

    fn seconds_since_epoch(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Default implementation that uses actual system time
#[derive(Clone, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock time provider for testing. Clones share the same clock.
#[derive(Clone, Debug)]
pub struct TestTimeProvider {
    time: Arc<Mutex<SystemTime>>,
}

impl TestTimeProvider {
    pub fn new(time: SystemTime) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    pub fn set_since_epoch(&self, seconds: u64) {
        if let Ok(mut time) = self.time.lock() {
            *time = UNIX_EPOCH + Duration::from_secs(seconds);
        }
    }
}

impl TimeProvider for TestTimeProvider {
    fn now(&self) -> SystemTime {
        match self.time.lock() {
            Ok(time) => *time,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
