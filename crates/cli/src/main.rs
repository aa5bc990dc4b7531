use clap::Parser;
use std::io::Write;
use tracing::error;
use tracing_subscriber::EnvFilter;

use dtf_cli::Dtf;
use dtf_core::logging::{DEFAULT_VERBOSITY, VERBOSITY_ENV, filter_directive, parse_verbosity};

/// `RUST_LOG` when set, otherwise the `GLOG_LEVEL` scale
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(VERBOSITY_ENV)
            .ok()
            .and_then(|raw| parse_verbosity(&raw))
            .unwrap_or(DEFAULT_VERBOSITY);
        EnvFilter::new(filter_directive(level))
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Dtf::parse();
    let mut stdout = std::io::stdout().lock();

    let code = match cli.execute(&mut stdout) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    let _ = stdout.flush();
    std::process::exit(code);
}
