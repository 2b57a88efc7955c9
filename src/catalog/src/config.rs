// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use common_config::Configurable;
use common_telemetry::logging::LoggingOptions;
use common_telemetry::warn;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{LoadOptionsSnafu, Result};
use crate::placeholder::PlaceholderMode;

/// Default number of table shares the cache keeps.
pub const DEFAULT_TABLE_DEFINITION_CACHE_SIZE: usize = 128;
/// Default bound on waiting for a placeholder.
pub const DEFAULT_LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(50);
/// Prefix of environment variables overriding [TableCacheOptions].
pub const ENV_PREFIX: &str = "TABLE_CACHE";

/// What a lookup does when it finds a placeholder of another session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Wait until the placeholder is resolved, bounded by the lock wait timeout.
    Block,
    /// Fail with `NameLockedByDdl` at once.
    Fail,
}

/// Configuration of the table definition cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCacheConfig {
    /// Number of table shares kept before unused ones are evicted.
    pub table_definition_cache_size: usize,
    /// Bound on waiting for another session to open a table.
    #[serde(with = "humantime_serde")]
    pub lock_wait_timeout: Duration,
    pub opening_placeholder_policy: PlaceholderPolicy,
    pub exclusive_placeholder_policy: PlaceholderPolicy,
}

impl Default for TableCacheConfig {
    fn default() -> Self {
        Self {
            table_definition_cache_size: DEFAULT_TABLE_DEFINITION_CACHE_SIZE,
            lock_wait_timeout: DEFAULT_LOCK_WAIT_TIMEOUT,
            opening_placeholder_policy: PlaceholderPolicy::Block,
            exclusive_placeholder_policy: PlaceholderPolicy::Fail,
        }
    }
}

impl TableCacheConfig {
    pub(crate) fn policy(&self, mode: PlaceholderMode) -> PlaceholderPolicy {
        match mode {
            PlaceholderMode::Opening => self.opening_placeholder_policy,
            PlaceholderMode::Exclusive => self.exclusive_placeholder_policy,
        }
    }

    /// Replaces settings the cache can't work with.
    pub fn sanitize(&mut self) {
        if self.lock_wait_timeout.is_zero() {
            warn!(
                "Sanitize lock_wait_timeout 0s to {:?}",
                DEFAULT_LOCK_WAIT_TIMEOUT
            );
            self.lock_wait_timeout = DEFAULT_LOCK_WAIT_TIMEOUT;
        }
    }
}

/// Options of a process embedding the table cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCacheOptions {
    pub cache: TableCacheConfig,
    pub logging: LoggingOptions,
}

impl Configurable for TableCacheOptions {
    fn validate_sanitize(&mut self) -> common_config::error::Result<()> {
        self.cache.sanitize();
        Ok(())
    }
}

impl TableCacheOptions {
    /// Loads options from defaults, `TABLE_CACHE__*` environment variables
    /// and then `config_file`.
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        Self::load_layered_options(config_file, ENV_PREFIX).context(LoadOptionsSnafu)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use common_telemetry::logging::LogFormat;
    use common_test_util::temp_dir::create_named_temp_file;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = TableCacheConfig::default();
        assert_eq!(128, config.table_definition_cache_size);
        assert_eq!(Duration::from_secs(50), config.lock_wait_timeout);
        assert_eq!(
            PlaceholderPolicy::Block,
            config.policy(PlaceholderMode::Opening)
        );
        assert_eq!(
            PlaceholderPolicy::Fail,
            config.policy(PlaceholderMode::Exclusive)
        );
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: TableCacheConfig = toml::from_str(
            r#"
            lock_wait_timeout = "2s 500ms"
            exclusive_placeholder_policy = "block"
            "#,
        )
        .unwrap();
        assert_eq!(Duration::from_millis(2500), config.lock_wait_timeout);
        assert_eq!(PlaceholderPolicy::Block, config.exclusive_placeholder_policy);
        assert_eq!(128, config.table_definition_cache_size);
    }

    #[test]
    fn test_load_options() {
        let mut file = create_named_temp_file();
        write!(
            file,
            r#"
            [cache]
            table_definition_cache_size = 16
            lock_wait_timeout = "0s"

            [logging]
            log_format = "json"
            "#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        temp_env::with_vars(
            [(
                "TABLE_CACHE__CACHE__OPENING_PLACEHOLDER_POLICY",
                Some("fail"),
            )],
            || {
                let opts = TableCacheOptions::load(Some(&path)).unwrap();
                assert_eq!(16, opts.cache.table_definition_cache_size);
                // Zero timeout is sanitized.
                assert_eq!(DEFAULT_LOCK_WAIT_TIMEOUT, opts.cache.lock_wait_timeout);
                assert_eq!(
                    PlaceholderPolicy::Fail,
                    opts.cache.opening_placeholder_policy
                );
                assert_eq!(LogFormat::Json, opts.logging.log_format);
            },
        );
    }

    #[test]
    fn test_options_to_toml() {
        let opts = TableCacheOptions::default();
        let toml_str = opts.to_toml().unwrap();
        assert!(toml_str.contains("lock_wait_timeout = \"50s\""));
        let decoded: TableCacheOptions = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, decoded);
    }
}
