use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;

use dtf_core::setup::first_run_setup;
use dtf_core::{Dispatcher, Layout, ModuleRegistry, to_exit_code};

/// Dispatch a module by name from the current directory
pub fn run_module(name: &str, args: Vec<String>, out: &mut dyn Write) -> Result<i32> {
    let layout = Layout::discover().context("Failed to determine the dtf installation layout")?;
    let registry = ModuleRegistry::with_builtins();

    if layout.is_first_run() {
        first_run_setup(&layout, &registry).context("Unable to setup dtf data directories!")?;
    }

    let launch_dir = std::env::current_dir().context("Failed to read the current directory")?;
    debug!("Dispatching '{}' from {}", name, launch_dir.display());

    let mut dispatcher = Dispatcher::new(layout, registry, launch_dir);
    Ok(to_exit_code(dispatcher.run_command(name, args, out)))
}
