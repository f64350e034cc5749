use anyhow::{anyhow, Result};
use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// A tracing event formatter that colors each line by level.
///
/// Events raised by this crate are prefixed with the module that emitted
/// them, e.g. `[stats]` for merges or `[snapshot]` for agent dumps, so a
/// coordinator log can tell sampler, merge and report diagnostics apart.
/// Events from other crates print their fields only.
pub struct ColorizedFormatter;

/// Top-level module of this crate that emitted an event.
fn source_module(target: &str) -> Option<&str> {
    let rest = target.strip_prefix(concat!(env!("CARGO_CRATE_NAME"), "::"))?;
    rest.split("::").next()
}

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
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
        // Buffer the fields so the whole line gets one color.
        let mut buffer = match source_module(event.metadata().target()) {
            Some(module) => format!("[{}] ", module),
            None => String::new(),
        };
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let colored_output = match *event.metadata().level() {
            Level::INFO => buffer.white(),
            Level::WARN => buffer.yellow(),
            Level::ERROR => buffer.red(),
            Level::DEBUG => buffer.blue(),
            Level::TRACE => buffer.purple(),
        };

        writeln!(writer, "{}", colored_output)
    }
}

/// Install a global subscriber using [`ColorizedFormatter`].
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects `debug` over
/// `info`. Fails if a global subscriber is already installed.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(ColorizedFormatter)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_formatter_prints_fields_only() {
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(ColorizedFormatter)
            .with_writer(move || sink.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(gets = 7, "merged agent snapshot");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("merged agent snapshot"));
        assert!(output.contains("gets=7"));
        assert!(!output.contains("WARN"));
        assert!(output.ends_with('\n'));
    }

    fn capture(emit: impl FnOnce()) -> String {
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(ColorizedFormatter)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let output = buffer.0.lock().unwrap().clone();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_formatter_tags_crate_module() {
        let output = capture(|| {
            tracing::debug!(target: "loadgen_stats::stats", intervals = 2, "merged peer");
            tracing::info!(target: "loadgen_stats::snapshot::wire", "agent sums");
            tracing::info!(target: "other_crate::stats", "foreign event");
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[stats] "));
        assert!(lines[0].contains("merged peer"));
        assert!(lines[0].contains("intervals=2"));
        assert!(lines[1].contains("[snapshot] agent sums"));
        assert!(lines[2].contains("foreign event"));
        assert!(!lines[2].contains("[stats]"));
    }

    #[test]
    fn test_source_module() {
        assert_eq!(source_module("loadgen_stats::report"), Some("report"));
        assert_eq!(source_module("loadgen_stats::stats::merge"), Some("stats"));
        assert_eq!(source_module("loadgen_stats"), None);
        assert_eq!(source_module("tokio::net"), None);
    }

    #[test]
    fn test_init_logging_only_once() {
        let _ = init_logging(true);
        assert!(init_logging(false).is_err());
    }
}
