//! JSON logs on stderr. Stdout is reserved for tracklist output (`--json`).

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding an `EnvFilter` directive string, e.g. `tracksplit=debug`.
pub const LOG_ENV: &str = "TRACKSPLIT_LOG";

/// Level used when neither `TRACKSPLIT_LOG` nor a verbosity flag says otherwise.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// Map a repeated `-v` count onto a level: none is `warn`, then `info`, `debug`, `trace`.
pub fn level_for_verbosity(count: u8) -> LevelFilter {
    match count {
        0 => DEFAULT_LEVEL,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Initialize logging at [`DEFAULT_LEVEL`].
pub fn init() {
    init_with(DEFAULT_LEVEL);
}

/// Initialize logging with `default` as the fallback level. Directives in `TRACKSPLIT_LOG`
/// still take precedence. Later calls are no-ops.
pub fn init_with(default: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(default.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(level_for_verbosity(0), LevelFilter::WARN);
        assert_eq!(level_for_verbosity(1), LevelFilter::INFO);
        assert_eq!(level_for_verbosity(2), LevelFilter::DEBUG);
        assert_eq!(level_for_verbosity(7), LevelFilter::TRACE);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_with(LevelFilter::DEBUG);
        init();
        tracing::warn!("still logging after a second init");
    }
}
