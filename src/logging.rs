//! Log sink setup.
//!
//! The sink is installed once at startup; request handling only emits
//! `tracing` events. The `plain` format writes one line per event:
//!
//! ```text
//! INFO: 2024-05-02 10:15:00,123 -  Receiver: slack
//! ```

use chrono::Local;
use clap::ValueEnum;
use std::fmt;
use strum_macros::{Display, EnumString};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

pub const DEFAULT_FILTER: &str = "mg_webhook=info,tower_http=info";

#[derive(Clone, Copy, Debug, Default, PartialEq, Display, ValueEnum, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum LogFormat {
    /// `<LEVEL>: <timestamp> -  <message>`
    #[default]
    Plain,
    /// tracing-subscriber's default format with targets and spans
    Full,
}

/// Formats events as `<LEVEL>: <timestamp> -  <message>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainFormat;

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        _ => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for PlainFormat
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
        write!(
            writer,
            "{}: {} -  ",
            level_name(event.metadata().level()),
            Local::now().format(TIMESTAMP_FORMAT)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the process-wide subscriber writing to stdout.
pub fn init(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    init_with_writer(format, std::io::stdout)
}

pub fn init_with_writer<W>(
    format: LogFormat,
    writer: W,
) -> Result<(), tracing_subscriber::util::TryInitError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(env_filter());
    match format {
        LogFormat::Plain => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .event_format(PlainFormat)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Full => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .try_init(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory log sink for assertions on emitted lines.
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        pub(crate) fn lines(&self) -> Vec<String> {
            self.contents().lines().map(str::to_string).collect()
        }

        /// A subscriber using the plain format that writes into this buffer.
        pub(crate) fn subscriber(&self) -> impl Subscriber + Send + Sync + use<> {
            let sink = self.clone();
            tracing_subscriber::fmt()
                .with_max_level(Level::INFO)
                .with_ansi(false)
                .event_format(PlainFormat)
                .with_writer(move || sink.clone())
                .finish()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn assert_plain_line(line: &str, level: &str, message: &str) {
        let prefix = format!("{}: ", level);
        assert!(line.starts_with(&prefix), "unexpected line: {}", line);
        let (timestamp, rest) = line[prefix.len()..].split_once(" -  ").unwrap();
        assert!(
            chrono::NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok(),
            "bad timestamp: {}",
            timestamp
        );
        assert_eq!(rest, message);
    }

    #[test]
    fn test_plain_format_line() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            tracing::info!("Receiver: {}", "slack");
            tracing::error!("Content too long");
            tracing::warn!("careful");
        });

        let lines = logs.lines();
        assert_eq!(lines.len(), 3);
        assert_plain_line(&lines[0], "INFO", "Receiver: slack");
        assert_plain_line(&lines[1], "ERROR", "Content too long");
        assert_plain_line(&lines[2], "WARNING", "careful");
    }

    #[test]
    fn test_plain_format_appends_fields() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            tracing::info!(alerts = 2, "Status: firing");
        });
        let contents = logs.contents();
        assert!(contents.contains("Status: firing"));
        assert!(contents.contains("alerts=2"));
    }

    #[test]
    fn test_debug_is_filtered_at_info() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            tracing::debug!("hidden");
        });
        assert!(logs.contents().is_empty());
    }

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::Plain.to_string(), "plain");
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Full);
    }
}
