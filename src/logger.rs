//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved.
//! Output goes to stderr so the console channel keeps stdout to itself.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// HTTP client crates are capped at `warn` unless `RUST_LOG` names them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Install the global subscriber.
///
/// With `from_cli` set (a `-v` flag was given) `level` wins over `RUST_LOG`.
/// Otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, from_cli: bool) -> Result<(), AppError> {
    let configured = || directives(level).and_then(|d| build_filter(&d));
    let filter = if from_cli {
        configured()?
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => configured()?,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Filter directives for a bare level: the level itself plus the quiet
/// targets, which are never raised above `warn`.
pub fn directives(level: &str) -> Result<String, AppError> {
    let base = parse_level(level)?;
    let quiet = base.min(LevelFilter::WARN);
    let mut out = base.to_string().to_lowercase();
    for target in QUIET_TARGETS {
        out.push_str(&format!(",{target}={}", quiet.to_string().to_lowercase()));
    }
    Ok(out)
}

fn build_filter(directives: &str) -> Result<EnvFilter, AppError> {
    EnvFilter::try_new(directives)
        .map_err(|e| AppError::Logger(format!("invalid filter '{directives}': {e}")))
}

fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.trim().is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}

/// `-v` warn, `-vv` info, `-vvv` debug, `-vvvv` and up trace.
pub fn level_for_verbosity(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}
