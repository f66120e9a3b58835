//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. `RUST_LOG` wins over the configured level;
/// `--verbose` raises the atelier crates to `debug`.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let default_directive = if verbose {
        "atelier_admin=debug,atelier_commerce=debug,atelier_cache=debug,atelier=debug".to_string()
    } else {
        config.level.clone()
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let json = config.format == LogFormat::Json;
    let json_layer = json.then(|| fmt::layer().json().flatten_event(true).with_writer(std::io::stderr));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    // A subscriber may already be installed in tests.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
