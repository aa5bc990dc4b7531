//! `dtf local`: list project-local modules

use anyhow::Context;
use std::io::Write;
use walkdir::WalkDir;

use crate::classifier::{ModuleKind, classify};
use crate::config::LOCAL_MODULES_DIRECTORY;
use crate::context::ExecutionContext;
use crate::module::{Module, ModuleResult, Routes};

#[derive(Default)]
pub struct Local;

impl Local {
    fn execute(&mut self, ctx: &mut ExecutionContext<'_>, _args: Vec<String>) -> ModuleResult {
        let dir = ctx
            .project_root()
            .context("local modules require a project")?
            .join(LOCAL_MODULES_DIRECTORY);

        if !dir.is_dir() {
            writeln!(ctx, "No local modules.")?;
            return Ok(0);
        }

        let entries = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());

        writeln!(ctx, "Local Modules:")?;
        for entry in entries {
            let kind = match classify(entry.path()) {
                ModuleKind::Executable => "executable",
                ModuleKind::InProcess => "in-process",
            };
            writeln!(ctx, "  {} ({})", entry.file_name().to_string_lossy(), kind)?;
        }
        Ok(0)
    }
}

impl Module for Local {
    fn name(&self) -> &str {
        "local"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn routes() -> Routes<Self> {
        Routes::execute(Self::execute)
    }
}
