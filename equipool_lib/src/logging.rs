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

use crate::config::LoggingConfig;
use std::error::Error;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILE_NAME: &str = "equipool.log";

/// Daily rolling appender for `file_path`, creating its directory if needed.
fn rolling_appender(file_path: &str) -> Result<RollingFileAppender, Box<dyn Error>> {
    let path = Path::new(file_path);
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_FILE_NAME);

    Ok(RollingFileAppender::new(Rotation::DAILY, directory, filename))
}

/// Install the global subscriber described by the logging configuration.
///
/// RUST_LOG takes precedence over the configured level. The returned guard
/// flushes the file writer when dropped and must be held for the life of the
/// process. Fails if a global subscriber is already installed.
pub fn setup_logging(
    logging_config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging_config.level));

    let console_layer = logging_config.console.unwrap_or(true).then(fmt::layer);

    let (file_layer, guard) = match &logging_config.file {
        Some(file_path) => {
            let (writer, guard) = non_blocking(rolling_appender(file_path)?);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        "Logging initialised at level {}, file: {}",
        logging_config.level,
        logging_config.file.as_deref().unwrap_or("none")
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("logs").join("pool.log");

        let appender = rolling_appender(log_path.to_str().unwrap());

        assert!(appender.is_ok());
        assert!(dir.path().join("logs").is_dir());
    }
}
