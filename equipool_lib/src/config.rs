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

use crate::work::coinbase::{Recipient, RewardSchedule};
use crate::work::difficulty::{DEFAULT_DIFF1_HEX, parse_target, u256_to_f64};
use crate::work::error::WorkError;
use crate::work::pow::EquihashParams;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// Pool payout address, receives whatever recipients and rewards leave
    pub address: String,
    /// Namespace for extranonces, random when not set
    pub instance_id: Option<u32>,
    /// Report the hash of shares that did not solve a block
    #[serde(default)]
    pub emit_invalid_block_hashes: bool,
    /// Appended to the coinbase input script
    pub coinbase_tag: Option<String>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoinConfig {
    pub name: String,
    #[serde(default)]
    pub equihash: EquihashParams,
    /// Difficulty 1 target as big endian hex
    pub diff1: Option<String>,
    /// Algorithm specific factor applied to share difficulty
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub rewards: RewardSchedule,
}

fn default_multiplier() -> f64 {
    1.0
}

impl CoinConfig {
    /// Difficulty 1 target as a float, the default when none is configured.
    pub fn diff1(&self) -> Result<f64, WorkError> {
        let target = parse_target(self.diff1.as_deref().unwrap_or(DEFAULT_DIFF1_HEX))?;
        Ok(u256_to_f64(target))
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    /// Log to file if specified
    pub file: Option<String>,
    /// Log level (defaults to "info")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log to the console, on unless disabled
    pub console: Option<bool>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pool: PoolConfig,
    pub coin: CoinConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file, then apply `EQUIPOOL_` environment overrides.
    ///
    /// Nested keys are separated by a double underscore, so
    /// `EQUIPOOL_POOL__INSTANCE_ID` sets `pool.instance_id`.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("EQUIPOOL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn with_pool_address(mut self, address: String) -> Self {
        self.pool.address = address;
        self
    }

    pub fn with_instance_id(mut self, instance_id: Option<u32>) -> Self {
        self.pool.instance_id = instance_id;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.pool.recipients = recipients;
        self
    }

    pub fn with_emit_invalid_block_hashes(mut self, emit: bool) -> Self {
        self.pool.emit_invalid_block_hashes = emit;
        self
    }

    pub fn with_coinbase_tag(mut self, tag: Option<String>) -> Self {
        self.pool.coinbase_tag = tag;
        self
    }

    pub fn with_equihash(mut self, equihash: EquihashParams) -> Self {
        self.coin.equihash = equihash;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.coin.multiplier = multiplier;
        self
    }

    pub fn with_rewards(mut self, rewards: RewardSchedule) -> Self {
        self.coin.rewards = rewards;
        self
    }

    pub fn with_log_level(mut self, level: String) -> Self {
        self.logging.level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_env::with_var;

    const CONFIG_PATH: &str = "../config.toml";

    #[test]
    fn test_load_sample_config() {
        let config = Config::load(CONFIG_PATH).unwrap();

        assert_eq!(config.pool.address, "t1KRqwQhktLV4BjbNLiuH6pb3AMoszZKcQB");
        assert_eq!(config.pool.instance_id, Some(3));
        assert!(!config.pool.emit_invalid_block_hashes);
        assert_eq!(config.pool.coinbase_tag.as_deref(), Some("/equipool/"));
        assert_eq!(config.pool.recipients.len(), 2);
        assert_eq!(config.pool.recipients[1].percent, 0.5);

        assert_eq!(config.coin.name, "zcash");
        assert_eq!(config.coin.equihash, EquihashParams { n: 200, k: 9 });
        assert_eq!(config.coin.multiplier, 1.0);

        let founders = config.coin.rewards.founders.as_ref().unwrap();
        assert_eq!(founders.percent, 20.0);
        assert_eq!(founders.addresses.len(), 2);
        let treasury = config.coin.rewards.treasury.as_ref().unwrap();
        assert_eq!(treasury.start_height, 1046400);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.console, Some(true));
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_diff1_default_and_override() {
        let mut config = Config::load(CONFIG_PATH).unwrap().coin;
        let configured = config.diff1().unwrap();

        config.diff1 = None;
        assert_eq!(config.diff1().unwrap(), configured);

        config.diff1 = Some("ff".to_string());
        assert_eq!(config.diff1().unwrap(), 255.0);

        config.diff1 = Some("not hex".to_string());
        assert!(config.diff1().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::load(CONFIG_PATH)
            .unwrap()
            .with_pool_address("t1Lz5sUzNoMBWmq8qk1zS4q5A54RgF5e4Ua".to_string())
            .with_instance_id(None)
            .with_recipients(vec![])
            .with_emit_invalid_block_hashes(true)
            .with_coinbase_tag(None)
            .with_equihash(EquihashParams { n: 144, k: 5 })
            .with_multiplier(2.0)
            .with_rewards(RewardSchedule::default())
            .with_log_level("debug".to_string());

        assert_eq!(config.pool.address, "t1Lz5sUzNoMBWmq8qk1zS4q5A54RgF5e4Ua");
        assert_eq!(config.pool.instance_id, None);
        assert!(config.pool.recipients.is_empty());
        assert!(config.pool.emit_invalid_block_hashes);
        assert!(config.pool.coinbase_tag.is_none());
        assert_eq!(config.coin.equihash.n, 144);
        assert_eq!(config.coin.multiplier, 2.0);
        assert!(config.coin.rewards.founders.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_from_env_vars() {
        with_var(
            "EQUIPOOL_POOL__ADDRESS",
            Some("t1NYKoZGziMsyMvgK9K5b2qZGym3UQsw3Tz"),
            || {
                let config = Config::load(CONFIG_PATH).unwrap();
                assert_eq!(config.pool.address, "t1NYKoZGziMsyMvgK9K5b2qZGym3UQsw3Tz");
            },
        );
    }

    #[test]
    fn test_nested_env_var_with_underscore_in_key() {
        with_var("EQUIPOOL_POOL__INSTANCE_ID", Some("9"), || {
            let config = Config::load(CONFIG_PATH).unwrap();
            assert_eq!(config.pool.instance_id, Some(9));
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load("does-not-exist.toml").is_err());
    }
}
