//! Tracing initialisation for the `topicflow` binary.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.
//!
//! Logs always go to stderr; stdout carries only the run summary or plan the
//! CLI prints, so `--format json` output stays a single parseable document.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies. `json` switches to
/// newline-delimited JSON for log shipping from CI runners.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    log_subscriber(json, env_filter, std::io::stderr)
        .try_init()
        .ok();
}

fn log_subscriber<W>(json: bool, filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = if json {
        fmt::layer().with_target(false).with_writer(writer).json().boxed()
    } else {
        fmt::layer().with_target(false).with_writer(writer).boxed()
    };
    tracing_subscriber::registry().with(layer).with(filter)
}
