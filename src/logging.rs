//! Tracing subscriber setup and the console diagnostic formatter.
//!
//! Diagnostics always go to stderr. Operation output (file listings, diffs,
//! dry-run notices) is written by the commands to their own sink and never
//! passes through here.
use std::io::IsTerminal as _;

use tracing_subscriber::EnvFilter;

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// Format one diagnostic line (without trailing newline).
fn render_line(level: tracing::Level, msg: &str, ansi: bool) -> String {
    let (label, color) = match level {
        tracing::Level::ERROR => ("error", "\x1b[31m"),
        tracing::Level::WARN => ("warn", "\x1b[33m"),
        tracing::Level::INFO => ("info", "\x1b[34m"),
        tracing::Level::DEBUG => ("debug", "\x1b[2m"),
        tracing::Level::TRACE => ("trace", "\x1b[2m"),
    };
    if ansi {
        format!("{color}{label}\x1b[0m: {msg}")
    } else {
        format!("{label}: {msg}")
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] emitting `level: message`.
struct DotfilesFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for DotfilesFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let ansi = writer.has_ansi_escapes();
        writeln!(
            writer,
            "{}",
            render_line(*event.metadata().level(), &extractor.message, ansi)
        )
    }
}

/// Filter used when `RUST_LOG` is unset; `verbose` forces `debug`.
fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialise the global [`tracing`] subscriber.
///
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

    let console_layer = fmt::layer()
        .event_format(DotfilesFormatter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(console_layer)
        .init();
}
