//! `dtf prop`: the project property manager

use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

use crate::config::{CONFIG_FILE_NAME, Properties};
use crate::context::ExecutionContext;
use crate::module::{Module, ModuleResult, Routes};

#[derive(Default)]
pub struct Prop;

impl Prop {
    fn config_path(ctx: &ExecutionContext<'_>) -> anyhow::Result<PathBuf> {
        let root = ctx
            .project_root()
            .context("property manager requires a project")?;
        Ok(root.join(CONFIG_FILE_NAME))
    }

    fn load(ctx: &ExecutionContext<'_>) -> anyhow::Result<(PathBuf, Properties)> {
        let path = Self::config_path(ctx)?;
        let props = Properties::load_from_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok((path, props))
    }

    fn arity(
        ctx: &mut ExecutionContext<'_>,
        args: &[String],
        usage: &str,
        count: usize,
    ) -> anyhow::Result<bool> {
        if args.len() == count {
            return Ok(true);
        }
        writeln!(ctx, "Usage: dtf prop {}", usage)?;
        Ok(false)
    }

    fn get(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
        if !Self::arity(ctx, &args, "get [section] [property]", 2)? {
            return Ok(-1);
        }
        let (_, props) = Self::load(ctx)?;

        match props.get_prop(&args[0], &args[1]) {
            Ok(value) => {
                writeln!(ctx, "{}", value)?;
                Ok(0)
            }
            Err(e) => {
                error!("{}", e);
                Ok(-1)
            }
        }
    }

    fn set(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
        if !Self::arity(ctx, &args, "set [section] [property] [value]", 3)? {
            return Ok(-1);
        }
        let (path, mut props) = Self::load(ctx)?;

        props.set_prop(&args[0], &args[1], &args[2]);
        props.save_to_file(&path)?;
        Ok(0)
    }

    fn del(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
        if !Self::arity(ctx, &args, "del [section] [property]", 2)? {
            return Ok(-1);
        }
        let (path, mut props) = Self::load(ctx)?;

        if let Err(e) = props.del_prop(&args[0], &args[1]) {
            error!("{}", e);
            return Ok(-1);
        }
        props.save_to_file(&path)?;
        Ok(0)
    }

    /// Exit code only: 0 when the property exists, 1 when it does not
    fn test(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
        if !Self::arity(ctx, &args, "test [section] [property]", 2)? {
            return Ok(-1);
        }
        let (_, props) = Self::load(ctx)?;

        Ok(if props.test_prop(&args[0], &args[1]) { 0 } else { 1 })
    }

    fn dump(&mut self, ctx: &mut ExecutionContext<'_>) -> ModuleResult {
        let (_, props) = Self::load(ctx)?;

        for (section, values) in props.sections() {
            writeln!(ctx, "[{}]", section)?;
            for (key, value) in values {
                writeln!(ctx, "{} = {}", key, value)?;
            }
            writeln!(ctx)?;
        }
        Ok(0)
    }
}

impl Module for Prop {
    fn name(&self) -> &str {
        "prop"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn routes() -> Routes<Self> {
        Routes::new()
            .sub_cmd_args("get", Self::get, "Get a property.")
            .sub_cmd_args("set", Self::set, "Set a property.")
            .sub_cmd_args("del", Self::del, "Delete a property.")
            .sub_cmd_args("test", Self::test, "Test if a property exists.")
            .sub_cmd("dump", Self::dump, "Dump all properties.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptScope;
    use crate::router::route;
    use serial_test::serial;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let mut props = Properties::new();
        props.set_prop("Info", "sdk", "23");
        props
            .save_to_file(&temp_dir.path().join(CONFIG_FILE_NAME))
            .unwrap();
        temp_dir
    }

    fn run(project: &TempDir, args: &[&str]) -> (String, i32) {
        let _scope = InterruptScope::install();
        let mut sink = Vec::new();
        let code = {
            let mut ctx = ExecutionContext::new(project.path(), &mut sink)
                .with_project_root(Some(project.path().to_path_buf()));
            route(
                &mut Prop,
                &mut ctx,
                args.iter().map(|s| s.to_string()).collect(),
            )
            .unwrap()
        };
        (String::from_utf8(sink).unwrap(), code)
    }

    #[test]
    #[serial]
    fn test_get_set_del_cycle() {
        let project = project();

        assert_eq!(run(&project, &["set", "local", "diff-data-dir", "/tmp/x"]).1, 0);
        assert_eq!(
            run(&project, &["get", "Local", "diff-data-dir"]),
            ("/tmp/x\n".to_string(), 0)
        );
        assert_eq!(run(&project, &["test", "local", "diff-data-dir"]).1, 0);

        assert_eq!(run(&project, &["del", "local", "diff-data-dir"]).1, 0);
        assert_eq!(run(&project, &["test", "local", "diff-data-dir"]).1, 1);
        assert_eq!(run(&project, &["get", "local", "diff-data-dir"]).1, -1);
        assert_eq!(run(&project, &["del", "local", "diff-data-dir"]).1, -1);
    }

    #[test]
    #[serial]
    fn test_dump_lists_sections() {
        let project = project();
        let (out, code) = run(&project, &["dump"]);

        assert_eq!(code, 0);
        assert_eq!(out, "[Info]\nsdk = 23\n\n");
    }

    #[test]
    #[serial]
    fn test_wrong_arity_prints_usage() {
        let project = project();
        let (out, code) = run(&project, &["get", "Info"]);

        assert_eq!(code, -1);
        assert_eq!(out, "Usage: dtf prop get [section] [property]\n");
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[serial]
    fn test_usage_write_failure_is_a_fault() {
        let project = project();
        let _scope = InterruptScope::install();
        let mut sink = ClosedSink;
        let mut ctx = ExecutionContext::new(project.path(), &mut sink)
            .with_project_root(Some(project.path().to_path_buf()));

        let err = route(&mut Prop, &mut ctx, vec!["get".to_string()]).unwrap_err();
        assert_eq!(err.exit_code(), -10);
    }
}
