//! The contract every in-process module implements
//!
//! A module exposes its metadata and a [`Routes`] table. The table either
//! names one catch-all entry that receives every remaining argument, or lists
//! sub-commands, each bound to a keyword, a handler and a one-line usage.
//!
//! ```
//! use dtf_core::{ExecutionContext, Module, ModuleResult, Routes};
//! use std::io::Write;
//!
//! #[derive(Default)]
//! struct Intents;
//!
//! impl Intents {
//!     fn list(&mut self, ctx: &mut ExecutionContext<'_>) -> ModuleResult {
//!         writeln!(ctx, "no intents yet")?;
//!         Ok(0)
//!     }
//!
//!     fn send(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> ModuleResult {
//!         writeln!(ctx, "sending {}", args.join(" "))?;
//!         Ok(0)
//!     }
//! }
//!
//! impl Module for Intents {
//!     fn name(&self) -> &str { "intents" }
//!     fn version(&self) -> &str { "1.0.0" }
//!
//!     fn routes() -> Routes<Self> {
//!         Routes::new()
//!             .sub_cmd("list", Self::list, "List registered intents.")
//!             .sub_cmd_args("send", Self::send, "Send an intent.")
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::router;

/// Result of module code: an exit code, or a fault
pub type ModuleResult = anyhow::Result<i32>;

pub type ExecuteFn<M> = fn(&mut M, &mut ExecutionContext<'_>, Vec<String>) -> ModuleResult;
pub type NoArgsFn<M> = fn(&mut M, &mut ExecutionContext<'_>) -> ModuleResult;

pub enum Handler<M> {
    NoArgs(NoArgsFn<M>),
    WithArgs(ExecuteFn<M>),
}

impl<M> Handler<M> {
    pub fn accepts_args(&self) -> bool {
        matches!(self, Handler::WithArgs(_))
    }
}

impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Handler<M> {}

pub struct SubCommand<M> {
    pub keyword: String,
    pub handler: Handler<M>,
    pub usage: String,
}

/// Registration table inspected by the router.
///
/// A catch-all entry takes precedence over any sub-commands. Keywords are
/// expected to be unique; when one is registered twice the later
/// registration is the one looked up and shown in usage.
pub struct Routes<M> {
    execute: Option<ExecuteFn<M>>,
    sub_commands: Vec<SubCommand<M>>,
}

impl<M> Default for Routes<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Routes<M> {
    pub fn new() -> Self {
        Self {
            execute: None,
            sub_commands: Vec::new(),
        }
    }

    /// Monolithic module: one entry receiving all remaining arguments
    pub fn execute(entry: ExecuteFn<M>) -> Self {
        Self::new().with_execute(entry)
    }

    pub fn with_execute(mut self, entry: ExecuteFn<M>) -> Self {
        self.execute = Some(entry);
        self
    }

    /// Sub-command invoked with no parameters
    pub fn sub_cmd(mut self, keyword: &str, handler: NoArgsFn<M>, usage: &str) -> Self {
        self.sub_commands.push(SubCommand {
            keyword: keyword.to_string(),
            handler: Handler::NoArgs(handler),
            usage: usage.to_string(),
        });
        self
    }

    /// Sub-command receiving the arguments after its keyword
    pub fn sub_cmd_args(mut self, keyword: &str, handler: ExecuteFn<M>, usage: &str) -> Self {
        self.sub_commands.push(SubCommand {
            keyword: keyword.to_string(),
            handler: Handler::WithArgs(handler),
            usage: usage.to_string(),
        });
        self
    }

    pub fn catch_all(&self) -> Option<ExecuteFn<M>> {
        self.execute
    }

    pub fn has_sub_commands(&self) -> bool {
        !self.sub_commands.is_empty()
    }

    pub fn sub_commands(&self) -> &[SubCommand<M>] {
        &self.sub_commands
    }

    pub fn lookup(&self, keyword: &str) -> Option<Handler<M>> {
        self.sub_commands
            .iter()
            .rev()
            .find(|sub| sub.keyword == keyword)
            .map(|sub| sub.handler)
    }

    /// `(keyword, usage)` pairs in alphabetical keyword order
    pub fn usage_entries(&self) -> Vec<(&str, &str)> {
        let mut entries = BTreeMap::new();
        for sub in &self.sub_commands {
            entries.insert(sub.keyword.as_str(), sub.usage.as_str());
        }
        entries.into_iter().collect()
    }
}

pub trait Module: Sized + 'static {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Minimum platform (SDK) version; 0 means no minimum
    fn min_sdk(&self) -> u32 {
        0
    }

    /// Programs that must be found on `PATH` before the module runs
    fn requires(&self) -> &[&str] {
        &[]
    }

    fn routes() -> Routes<Self>;
}

/// Object-safe view of a [`Module`], produced by the registry
pub trait AnyModule {
    fn module_name(&self) -> &str;
    fn module_version(&self) -> &str;
    fn module_min_sdk(&self) -> u32;
    fn module_requires(&self) -> Vec<String>;
    fn run(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> Result<i32>;
}

impl<M: Module> AnyModule for M {
    fn module_name(&self) -> &str {
        Module::name(self)
    }

    fn module_version(&self) -> &str {
        Module::version(self)
    }

    fn module_min_sdk(&self) -> u32 {
        Module::min_sdk(self)
    }

    fn module_requires(&self) -> Vec<String> {
        Module::requires(self).iter().map(|r| r.to_string()).collect()
    }

    fn run(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> Result<i32> {
        router::route(self, ctx, args)
    }
}

/// A module instantiated for exactly one invocation
pub struct ModuleInstance {
    name: String,
    launch_dir: PathBuf,
    inner: Box<dyn AnyModule>,
}

impl ModuleInstance {
    pub fn new(name: impl Into<String>, inner: Box<dyn AnyModule>) -> Self {
        Self {
            name: name.into(),
            launch_dir: PathBuf::new(),
            inner,
        }
    }

    /// Command name the instance was loaded under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the module reports for itself
    pub fn display_name(&self) -> &str {
        self.inner.module_name()
    }

    pub fn version(&self) -> &str {
        self.inner.module_version()
    }

    pub fn min_sdk(&self) -> u32 {
        self.inner.module_min_sdk()
    }

    pub fn requires(&self) -> Vec<String> {
        self.inner.module_requires()
    }

    pub fn launch_dir(&self) -> &Path {
        &self.launch_dir
    }

    pub fn set_launch_dir(&mut self, dir: impl Into<PathBuf>) {
        self.launch_dir = dir.into();
    }

    pub fn run(&mut self, ctx: &mut ExecutionContext<'_>, args: Vec<String>) -> Result<i32> {
        self.inner.run(ctx, args)
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("min_sdk", &self.min_sdk())
            .field("launch_dir", &self.launch_dir)
            .finish()
    }
}
