//! Helpers related to tracing, used by main entrypoints and tests

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::{Compact, Format};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset; reboot progress should be visible
/// in the journal without extra configuration.
const DEFAULT_DIRECTIVE: &str = "info";

// Don't include timestamps and such because they're not really useful and
// too verbose, and plus several log targets such as journald will already
// include timestamps.
fn event_format() -> Format<Compact, ()> {
    tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false)
        .compact()
}

/// Initialize tracing with the default configuration.
pub fn initialize_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    // Log to stderr by default; stdout carries job reports.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(event_format())
        .with_writer(std::io::stderr)
        .init();
}

/// Build a standalone dispatcher using the default event format, writing
/// to `writer`. It is not installed globally; callers hand it to whatever
/// component should log through it.
pub fn dispatch_with_writer<W>(max_level: LevelFilter, writer: W) -> tracing::Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .event_format(event_format())
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer)
        .finish();
    tracing::Dispatch::new(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Write for Buf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_with_writer() {
        let buf = Buf::default();
        let w = buf.clone();
        let dispatch = dispatch_with_writer(LevelFilter::INFO, move || w.clone());
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::debug!("hidden");
            tracing::warn!(step = "bogus", "Unexpected job state");
        });
        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(!out.contains("hidden"));
        assert!(out.contains("WARN"));
        assert!(out.contains("Unexpected job state"));
        assert!(out.contains("step=\"bogus\""));
    }
}
