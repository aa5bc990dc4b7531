//! `dtf binding`: print helper bindings from the global configuration

use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

use crate::config::Properties;
use crate::context::ExecutionContext;
use crate::module::{Module, ModuleResult, Routes};

const BINDINGS_SECTION: &str = "Bindings";
const BINDING_PREFIX: &str = "dtf_";

#[derive(Default)]
pub struct Binding;

impl Binding {
    fn execute(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
        let path = ctx
            .layout()
            .context("bindings require an installation layout")?
            .global_config();
        let props = match Properties::load_from_file(&path) {
            Ok(props) => props,
            Err(e) => {
                error!("Unable to read global configuration: {}", e);
                return Ok(-1);
            }
        };

        match args.first() {
            None => Self::print_all(ctx, &props),
            Some(key) => Self::print_one(ctx, &props, key),
        }
    }

    fn print_all(ctx: &mut ExecutionContext<'_>, props: &Properties) -> ModuleResult {
        let Ok(bindings) = props.section(BINDINGS_SECTION) else {
            error!("Unable to list bindings!");
            return Ok(-1);
        };

        for (key, value) in bindings {
            if key.starts_with(BINDING_PREFIX) {
                writeln!(ctx, "{} : {}", key, value)?;
            }
        }
        Ok(0)
    }

    fn print_one(ctx: &mut ExecutionContext<'_>, props: &Properties, key: &str) -> ModuleResult {
        match props.get_prop(BINDINGS_SECTION, key) {
            Ok(value) => {
                writeln!(ctx, "{}", expand_home(value).display())?;
                Ok(0)
            }
            Err(_) => {
                error!("Unable to find binding: {}", key);
                Ok(-1)
            }
        }
    }
}

fn expand_home(value: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if value == "~" {
            return home;
        }
        if let Some(rest) = value.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

impl Module for Binding {
    fn name(&self) -> &str {
        "binding"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn routes() -> Routes<Self> {
        Routes::execute(Self::execute)
    }
}
