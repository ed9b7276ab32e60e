// Copyright 2024 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use crate::{
    appender,
    error::{Error, Result},
    LogFormat, LogOutputDest, LogRotation,
};
use std::collections::BTreeMap;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::{
    filter::Targets,
    fmt::{
        self as tracing_fmt,
        format::Writer,
        time::{FormatTime, SystemTime},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::Filter,
    registry::LookupSpan,
    reload::{self, Handle},
    Layer, Registry,
};

/// Env variable holding the CSV of `target=level` pairs.
pub const BAX_LOG_ENV: &str = "BAX_LOG";

// Trace level for every crate of the wallet
const ALL_BAX_LOGS: &str = "all";
// Trace for the wallet crates, debug for the rpc plumbing
const VERBOSE_BAX_LOGS: &str = "v";
const WALLET_CRATES: [&str; 2] = ["bax_evm", "bax_logging"];
const RPC_CRATE: &str = "alloy";

type BoxedFilter = Box<dyn Filter<Registry> + Send + Sync>;
type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Changes the active log targets without reinstalling the subscriber.
pub struct ReloadHandle(pub(crate) Handle<BoxedFilter, Registry>);

impl ReloadHandle {
    /// Swaps in the targets of a `BAX_LOG` style value,
    /// e.g. `alloy=DEBUG,all,bax_evm=ERROR`.
    pub fn modify_log_level(&self, logging_value: &str) -> Result<()> {
        let filter = targets_filter(get_logging_targets(logging_value)?);
        self.0.modify(|active| *active = filter)?;
        Ok(())
    }
}

/// `[time LEVEL module/span] message fields`
#[derive(Default)]
pub(crate) struct LogFormatter;

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let module = metadata.module_path().unwrap_or("<unknown module>");

        write!(writer, "[")?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, " {} {module}", metadata.level())?;
        ctx.visit_spans(|span| write!(writer, "/{}", span.name()))?;
        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// The single fmt layer of a subscriber, plus the appender guard when it
/// writes to files.
pub(crate) struct TracingLayers {
    pub(crate) layers: Vec<BoxedLayer>,
    pub(crate) log_appender_guard: Option<WorkerGuard>,
    pub(crate) reload_handle: ReloadHandle,
}

impl TracingLayers {
    /// `BAX_LOG` wins over `default_targets` when set.
    pub(crate) fn new(
        default_targets: Vec<(String, Level)>,
        output_dest: &LogOutputDest,
        format: LogFormat,
        rotation: LogRotation,
    ) -> Result<Self> {
        let targets = match std::env::var(BAX_LOG_ENV) {
            Ok(value) => get_logging_targets(&value)?,
            Err(_) => default_targets,
        };
        let (filter, handle) = reload::Layer::new(targets_filter(targets));
        let (sink, log_appender_guard) = sink_layer(output_dest, format, rotation)?;

        Ok(Self {
            layers: vec![Box::new(sink.with_filter(filter))],
            log_appender_guard,
            reload_handle: ReloadHandle(handle),
        })
    }
}

fn targets_filter(targets: Vec<(String, Level)>) -> BoxedFilter {
    Box::new(Targets::new().with_targets(targets))
}

fn sink_layer(
    output_dest: &LogOutputDest,
    format: LogFormat,
    rotation: LogRotation,
) -> Result<(BoxedLayer, Option<WorkerGuard>)> {
    let text = || {
        tracing_fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .event_format(LogFormatter)
    };

    match output_dest {
        LogOutputDest::Stdout => Ok((text().boxed(), None)),
        LogOutputDest::Stderr => Ok((text().with_writer(std::io::stderr).boxed(), None)),
        LogOutputDest::Path(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = appender::file_rotater(dir, rotation);
            let layer = match format {
                LogFormat::Json => tracing_fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(writer)
                    .boxed(),
                LogFormat::Default => text().with_writer(writer).boxed(),
            };
            Ok((layer, Some(guard)))
        }
    }
}

/// Parses a CSV of logging targets, e.g. `alloy=DEBUG, all, bax_evm=ERROR`.
///
/// A bare target name means `TRACE`. The `all` and `v` keywords expand to the
/// wallet crates; explicit entries override whatever a keyword set.
pub(crate) fn get_logging_targets(logging_env_value: &str) -> Result<Vec<(String, Level)>> {
    let mut keyword_rpc_level = None;
    let mut explicit = BTreeMap::new();

    for entry in logging_env_value.split(',').map(str::trim) {
        match entry {
            "" => {}
            ALL_BAX_LOGS => keyword_rpc_level = Some(Level::TRACE),
            VERBOSE_BAX_LOGS => {
                keyword_rpc_level.get_or_insert(Level::DEBUG);
            }
            _ => {
                let (target, level) = entry.split_once('=').unwrap_or((entry, "trace"));
                if target.is_empty() {
                    return Err(Error::LoggingConfiguration(format!(
                        "Missing target in logging entry {entry:?}"
                    )));
                }
                explicit.insert(target.to_string(), get_log_level_from_str(level)?);
            }
        }
    }

    let mut resolved = BTreeMap::new();
    if let Some(rpc_level) = keyword_rpc_level {
        for krate in WALLET_CRATES {
            resolved.insert(krate.to_string(), Level::TRACE);
        }
        resolved.insert(RPC_CRATE.to_string(), rpc_level);
    }
    resolved.extend(explicit);
    Ok(resolved.into_iter().collect())
}

fn get_log_level_from_str(log_level: &str) -> Result<Level> {
    log_level.trim().parse().map_err(|_| {
        Error::LoggingConfiguration(format!("Log level {log_level} is not supported"))
    })
}
