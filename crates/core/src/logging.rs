//! Verbosity override shared by the CLI and in-process modules
//!
//! `GLOG_LEVEL` uses the numeric scale of the shell helpers:
//! 0 = silent, 1 = error, 2 = warning, 3 = info, 4 = verbose, 5 = debug.

use once_cell::sync::OnceCell;
use tracing::warn;

pub const VERBOSITY_ENV: &str = "GLOG_LEVEL";

/// Level used when no override is present
pub const DEFAULT_VERBOSITY: u8 = 3;

const MAX_VERBOSITY: u8 = 5;

static OVERRIDE: OnceCell<Option<u8>> = OnceCell::new();

/// The `GLOG_LEVEL` override, read from the environment once per process
pub fn verbosity_override() -> Option<u8> {
    *OVERRIDE.get_or_init(|| {
        let raw = std::env::var(VERBOSITY_ENV).ok()?;
        let parsed = parse_verbosity(&raw);
        if parsed.is_none() {
            warn!("Invalid {} value (0-5 is allowed)", VERBOSITY_ENV);
        }
        parsed
    })
}

pub fn parse_verbosity(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|level| *level <= MAX_VERBOSITY)
}

/// Map a numeric verbosity onto a `tracing` filter directive
pub fn filter_directive(level: u8) -> &'static str {
    match level {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    }
}
