//! Module resolution across the three storage tiers

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::classifier::{self, ModuleKind};
use crate::config::{LOCAL_MODULES_DIRECTORY, Layout};
use crate::error::{DispatchError, Result};

/// Storage tier a module is resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shipped with the tool installation
    Builtin,
    /// Stored under the active project's `local_modules` directory
    Local,
    /// Installed tool-wide in the data directory
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Builtin => write!(f, "builtin"),
            Scope::Local => write!(f, "local"),
            Scope::Global => write!(f, "global"),
        }
    }
}

/// A module that resolved to exactly one file
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub scope: Scope,
    pub path: PathBuf,
    pub kind: ModuleKind,
}

pub struct ModuleResolver {
    layout: Layout,
    project_root: Option<PathBuf>,
}

impl ModuleResolver {
    pub fn new(layout: Layout, project_root: Option<PathBuf>) -> Self {
        Self {
            layout,
            project_root,
        }
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Compute the location of `name` within `scope` without touching the filesystem
    pub fn module_path(&self, scope: Scope, name: &str) -> Result<PathBuf> {
        match scope {
            Scope::Builtin => Ok(self.layout.builtin_dir().join(name)),
            Scope::Local => {
                let root = self.project_root.as_ref().ok_or(DispatchError::NoProject)?;
                Ok(root.join(LOCAL_MODULES_DIRECTORY).join(name))
            }
            Scope::Global => Ok(self.layout.modules_dir().join(name)),
        }
    }

    /// Resolve `name` to an existing file. No executability check is made here.
    pub fn resolve(&self, scope: Scope, name: &str) -> Result<PathBuf> {
        let path = self.module_path(scope, name)?;
        if !path.is_file() {
            debug!("No {} module '{}' at {}", scope, name, path.display());
            return Err(DispatchError::NotFound {
                name: name.to_string(),
                path,
            });
        }
        Ok(path)
    }

    /// Resolve and classify in one step
    pub fn describe(&self, scope: Scope, name: &str) -> Result<ModuleDescriptor> {
        let path = self.resolve(scope, name)?;
        let kind = classifier::classify(&path);
        Ok(ModuleDescriptor {
            name: name.to_string(),
            scope,
            path,
            kind,
        })
    }
}
