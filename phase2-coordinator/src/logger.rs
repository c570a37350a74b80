use crate::environment::Environment;

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static LOGGER: OnceCell<()> = OnceCell::new();

/// Initialize logger with custom format and verbosity.
///
/// `RUST_LOG` takes precedence over the verbosity of the environment.
/// Calling this more than once has no effect.
pub fn initialize_logger(environment: &Environment) {
    LOGGER.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(*environment.verbosity()).into())
            .from_env_lossy();

        // Events go to stderr, stdout carries the attestations and URLs.
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("A global subscriber was already installed");
        }
    });
}
