//! Tracing setup: `[HH:MM:SS] [LEVEL] message` lines on stderr and, for
//! pipeline runs, in a timestamped file under the log directory.

use std::fmt;
use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use color_eyre::eyre::{Result, WrapErr};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::commands::{Cli, LogFormat};

/// One line per event: local time, level, message, then fields.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        write!(writer, "[{}] [", Local::now().format("%H:%M:%S"))?;
        if writer.has_ansi_escapes() {
            write!(writer, "\x1b[{}m{level}\x1b[0m", level_color(level))?;
        } else {
            write!(writer, "{level}")?;
        }
        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_color(level: Level) -> u8 {
    match level {
        Level::ERROR => 31,
        Level::WARN => 33,
        Level::INFO => 32,
        Level::DEBUG => 34,
        Level::TRACE => 35,
    }
}

/// `pagepitch_<YYYYmmdd_HHMMSS>.log`
pub(crate) fn log_file_name(now: DateTime<Local>) -> String {
    format!("pagepitch_{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn open_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("cannot create log directory {}", dir.display()))?;
    let path = dir.join(log_file_name(Local::now()));
    let file = File::create(&path)
        .wrap_err_with(|| format!("cannot create log file {}", path.display()))?;
    Ok((path, file))
}

/// Initialize tracing based on CLI flags. Returns the log file path when
/// the command writes one.
pub(crate) fn init_tracing(cli: &Cli) -> Result<Option<PathBuf>> {
    let filter = match cli.verbose {
        0 => "pagepitch=info",
        1 => "pagepitch=debug",
        _ => "pagepitch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let (log_path, file) = if cli.command.writes_log_file() {
        let (path, file) = open_log_file(&cli.log_dir)?;
        (Some(path), Some(file))
    } else {
        (None, None)
    };

    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match cli.log_format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(log_path)
}
