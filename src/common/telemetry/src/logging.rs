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

//! Logging setup for the table cache processes and their tests.

use std::env;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, Once};

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer as _, Registry};

/// The default logs directory.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

const DEFAULT_LOG_TARGETS: &str = "info";

/// The logging options that used to initialize the logger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// The directory to store log files. If empty, logs are only written to stdout.
    pub dir: String,

    /// Targets filter such as "info" or "debug,catalog=trace". Falls back to `RUST_LOG`.
    pub level: Option<String>,

    /// The log format that can be one of "json" or "text". Default is "text".
    #[serde(deserialize_with = "empty_string_as_default")]
    pub log_format: LogFormat,

    /// The maximum number of rotated log files to keep.
    pub max_log_files: usize,

    /// Whether to append logs to stdout. Default is true.
    pub append_stdout: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            dir: "".to_string(),
            level: None,
            log_format: LogFormat::Text,
            // Rotation hourly, 24 files per day, keeps info log files of 30 days
            max_log_files: 720,
            append_stdout: true,
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

/// Treats an empty string as the default value of `T`.
fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrValue<T> {
        String(String),
        Value(T),
    }

    match StringOrValue::<T>::deserialize(deserializer)? {
        StringOrValue::String(s) if s.is_empty() => Ok(T::default()),
        StringOrValue::String(s) => {
            T::deserialize(serde::de::value::StringDeserializer::<D::Error>::new(s))
        }
        StringOrValue::Value(v) => Ok(v),
    }
}

static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Init tracing for unittest.
/// Write logs to file `unittest`.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let Ok(mut g) = GLOBAL_UT_LOG_GUARD.as_ref().lock() else {
            return;
        };

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        crate::info!("logs dir = {}", dir);
    });
}

fn rolling_file_layer<S>(
    opts: &LoggingOptions,
    prefix: &str,
    guards: &mut Vec<WorkerGuard>,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber
        + for<'span> tracing_subscriber::registry::LookupSpan<'span>
        + Send
        + 'static,
{
    let rolling_appender = RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(opts.max_log_files)
        .build(&opts.dir)
        .unwrap_or_else(|e| {
            panic!(
                "initializing rolling file appender at {} failed: {}",
                &opts.dir, e
            )
        });
    let (writer, guard) = tracing_appender::non_blocking(rolling_appender);
    guards.push(guard);

    match opts.log_format {
        LogFormat::Json => Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
        LogFormat::Text => Layer::new().with_writer(writer).with_ansi(false).boxed(),
    }
}

/// Installs the global subscriber once per process. `app_name` prefixes the
/// rolling log files. Keep the returned guards alive to flush the writers.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        // Enable log compatible layer to convert log record to tracing span.
        LogTracer::init().expect("log tracer must be valid");

        let stdout_logging_layer = if opts.append_stdout {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);

            let layer = Layer::new()
                .with_writer(writer)
                .with_ansi(std::io::stdout().is_terminal());
            Some(match opts.log_format {
                LogFormat::Json => layer.json().boxed(),
                LogFormat::Text => layer.boxed(),
            })
        } else {
            None
        };

        let (file_logging_layer, err_file_logging_layer) = if !opts.dir.is_empty() {
            let file = rolling_file_layer(opts, app_name, &mut guards);
            let err_file = rolling_file_layer(opts, &format!("{app_name}-err"), &mut guards)
                .with_filter(LevelFilter::ERROR);
            (Some(file), Some(err_file))
        } else {
            (None, None)
        };

        // resolve log level settings from:
        // - options from command line or config files
        // - environment variable: RUST_LOG
        // - default settings
        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<Targets>()
            .expect("error parsing log level string");

        let subscriber = Registry::default()
            .with(filter)
            .with(stdout_logging_layer)
            .with(file_logging_layer)
            .with(err_file_logging_layer);

        tracing::subscriber::set_global_default(subscriber)
            .expect("error setting global tracing subscriber");
    });

    guards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_options_deserialization_default() {
        let opts: LoggingOptions = serde_json::from_str("{}").unwrap();

        assert_eq!(LogFormat::Text, opts.log_format);
        assert_eq!("", opts.dir);
        assert_eq!(None, opts.level);
        assert_eq!(720, opts.max_log_files);
        assert!(opts.append_stdout);
    }

    #[test]
    fn test_logging_options_empty_log_format() {
        let opts: LoggingOptions = serde_json::from_str(r#"{"log_format": ""}"#).unwrap();
        assert_eq!(LogFormat::Text, opts.log_format);

        let opts: LoggingOptions = serde_json::from_str(r#"{"log_format": "json"}"#).unwrap();
        assert_eq!(LogFormat::Json, opts.log_format);
    }

    #[test]
    fn test_logging_options_invalid_log_format() {
        let result = serde_json::from_str::<LoggingOptions>(r#"{"log_format": "xml"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_init_ut_logging_twice() {
        init_default_ut_logging();
        init_default_ut_logging();
        crate::debug!("logging initialized");
    }
}
