//! Tracing initialisation for logtriage binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `level` is the default verbosity when `RUST_LOG` is not set; `json`
/// switches to newline-delimited JSON log lines. Safe to call more than
/// once; only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let base = tracing_subscriber::registry().with(filter);
    let fmt_layer = fmt::layer().with_target(false);

    if json {
        base.with(fmt_layer.json()).try_init().ok();
    } else {
        base.with(fmt_layer).try_init().ok();
    }
}
