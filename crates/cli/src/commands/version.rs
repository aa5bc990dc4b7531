use anyhow::Result;
use std::io::Write;
use tracing::debug;

use dtf_core::{Layout, Properties};

pub fn print_version(full: bool, out: &mut dyn Write) -> Result<i32> {
    if !full {
        writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
        return Ok(0);
    }

    writeln!(out, "dtf Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Core Version: {}", dtf_core::VERSION)?;
    writeln!(out, "Bindings Version Date: {}", bindings_version())?;
    Ok(0)
}

fn bindings_version() -> String {
    let lookup = || -> Result<String> {
        let layout = Layout::discover()?;
        let globals = Properties::load_from_file(&layout.global_config())?;
        Ok(globals.get_prop("Bindings", "version")?.to_string())
    };

    lookup().unwrap_or_else(|e| {
        debug!("No bindings version: {:#}", e);
        "unknown".to_string()
    })
}
