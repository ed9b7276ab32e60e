// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

mod appender;
mod error;
mod layers;

use crate::error::Result;
use layers::TracingLayers;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};
use tracing::info;
use tracing_core::dispatcher::DefaultGuard;
use tracing_subscriber::{prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt};

pub use error::Error;
pub use layers::{ReloadHandle, BAX_LOG_ENV};
pub use tracing_appender::non_blocking::WorkerGuard;

// re-exporting the tracing crate's Level as it is used in our public API
pub use tracing_core::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutputDest {
    Stderr,
    Stdout,
    /// A directory, created on initialization if missing.
    Path(PathBuf),
}

impl FromStr for LogOutputDest {
    type Err = Error;

    fn from_str(val: &str) -> Result<Self> {
        match val {
            "stdout" => Ok(LogOutputDest::Stdout),
            "stderr" => Ok(LogOutputDest::Stderr),
            "data-dir" => timestamped_data_dir().map(LogOutputDest::Path).ok_or_else(|| {
                Error::LoggingConfiguration("could not obtain data directory path".to_string())
            }),
            value => Ok(LogOutputDest::Path(PathBuf::from(value))),
        }
    }
}

impl fmt::Display for LogOutputDest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogOutputDest::Stderr => write!(f, "stderr"),
            LogOutputDest::Stdout => write!(f, "stdout"),
            LogOutputDest::Path(p) => write!(f, "{}", p.to_string_lossy()),
        }
    }
}

/// Line format of file output. Console output is always the default format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Default,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(val: &str) -> Result<Self> {
        match val {
            "default" => Ok(LogFormat::Default),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::LoggingConfiguration(format!(
                "Unknown log format {val:?}, expected \"default\" or \"json\""
            ))),
        }
    }
}

/// Size and retention of rotated log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    /// The active file is rotated once it grows past this.
    pub max_file_bytes: usize,
    /// Newest rotated files kept as plain text.
    pub uncompressed_files: usize,
    /// Compressed files kept on top of the uncompressed ones.
    pub archived_files: usize,
}

impl LogRotation {
    pub(crate) fn max_files(&self) -> usize {
        self.uncompressed_files.saturating_add(self.archived_files)
    }
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            uncompressed_files: 10,
            archived_files: 1000,
        }
    }
}

/// Installs the wallet's tracing subscriber.
///
/// ```no_run
/// use bax_logging::{Level, LogBuilder, LogOutputDest};
///
/// let mut builder = LogBuilder::new(vec![("bax_evm".to_string(), Level::INFO)]);
/// builder.output_dest(LogOutputDest::Stdout);
/// let (_reload_handle, _guard) = builder.initialize()?;
/// # Ok::<(), bax_logging::Error>(())
/// ```
pub struct LogBuilder {
    default_logging_targets: Vec<(String, Level)>,
    output_dest: LogOutputDest,
    format: LogFormat,
    rotation: LogRotation,
}

impl LogBuilder {
    /// `default_logging_targets` apply when `BAX_LOG` is not set.
    /// Logs go to stderr unless told otherwise.
    pub fn new(default_logging_targets: Vec<(String, Level)>) -> Self {
        Self {
            default_logging_targets,
            output_dest: LogOutputDest::Stderr,
            format: LogFormat::Default,
            rotation: LogRotation::default(),
        }
    }

    pub fn output_dest(&mut self, output_dest: LogOutputDest) {
        self.output_dest = output_dest;
    }

    pub fn format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn rotation(&mut self, rotation: LogRotation) {
        self.rotation = rotation;
    }

    /// Installs the global subscriber. Hold on to the returned guard for the
    /// life of the program when logging to files.
    ///
    /// A second call leaves the first subscriber in place.
    pub fn initialize(self) -> Result<(ReloadHandle, Option<WorkerGuard>)> {
        let TracingLayers {
            layers,
            log_appender_guard,
            reload_handle,
        } = TracingLayers::new(
            self.default_logging_targets,
            &self.output_dest,
            self.format,
            self.rotation,
        )?;

        if tracing_subscriber::registry().with(layers).try_init().is_err() {
            eprintln!("Tried to initialize and set global default subscriber more than once");
        }

        Ok((reload_handle, log_appender_guard))
    }

    /// Logs every wallet crate at TRACE to a fresh data dir folder for as long
    /// as the returned `DefaultGuard` lives. Meant for current thread tests.
    pub fn init_single_threaded_tokio_test(
        test_file_name: &str,
    ) -> Result<(Option<WorkerGuard>, DefaultGuard)> {
        std::env::set_var(BAX_LOG_ENV, format!("{test_file_name}=TRACE,all"));
        let output_dest = timestamped_data_dir()
            .map(LogOutputDest::Path)
            .unwrap_or(LogOutputDest::Stdout);

        let layers = TracingLayers::new(
            vec![],
            &output_dest,
            LogFormat::Default,
            LogRotation::default(),
        )?;
        let log_guard = tracing_subscriber::registry()
            .with(layers.layers)
            .set_default();

        info!("Logging test {test_file_name:?} to {output_dest}");
        Ok((layers.log_appender_guard, log_guard))
    }
}

fn timestamped_data_dir() -> Option<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    dirs_next::data_dir().map(|dir| {
        dir.join("bax-wallet")
            .join("logs")
            .join(format!("log_{timestamp}"))
    })
}
