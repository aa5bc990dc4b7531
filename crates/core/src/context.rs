//! Per-invocation execution context
//!
//! Everything a module may observe about its surroundings travels here
//! instead of through process-global state: the directory the user launched
//! from, the directory the module should treat as current, extra environment
//! for child processes, and the output sink all console output goes to.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::interrupt;

pub struct ExecutionContext<'a> {
    launch_dir: PathBuf,
    working_dir: PathBuf,
    project_root: Option<PathBuf>,
    layout: Option<Layout>,
    env: BTreeMap<String, String>,
    verbosity: Option<u8>,
    out: &'a mut dyn Write,
}

impl<'a> ExecutionContext<'a> {
    /// Context rooted at `launch_dir`, writing to `out`
    pub fn new(launch_dir: impl Into<PathBuf>, out: &'a mut dyn Write) -> Self {
        let launch_dir = launch_dir.into();
        Self {
            working_dir: launch_dir.clone(),
            launch_dir,
            project_root: None,
            layout: None,
            env: BTreeMap::new(),
            verbosity: None,
            out,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_project_root(mut self, root: Option<PathBuf>) -> Self {
        self.project_root = root;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Option<u8>) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env(key, value);
        self
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Directory the top-level command was started from
    pub fn launch_dir(&self) -> &Path {
        &self.launch_dir
    }

    /// Directory the module runs in; the project root unless the caller opted out
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    pub fn verbosity(&self) -> Option<u8> {
        self.verbosity
    }

    /// Keys injected on top of the inherited process environment
    pub fn injected_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Full environment a child process would see
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars().collect();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Whether the user forcibly interrupted this invocation
    pub fn interrupted(&self) -> bool {
        interrupt::is_interrupted()
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }
}

impl Write for ExecutionContext<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
