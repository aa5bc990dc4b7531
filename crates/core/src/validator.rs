//! Prelaunch checks for in-process modules

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::classifier::which;
use crate::config::load_project_properties;
use crate::error::{DispatchError, Result};
use crate::module::ModuleInstance;

pub struct PrelaunchValidator {
    project_root: Option<PathBuf>,
    search_paths: OsString,
}

impl PrelaunchValidator {
    /// Validator searching the process `PATH` for dependencies
    pub fn new(project_root: Option<&Path>) -> Self {
        Self {
            project_root: project_root.map(Path::to_path_buf),
            search_paths: std::env::var_os("PATH").unwrap_or_default(),
        }
    }

    pub fn with_search_paths(mut self, search_paths: impl Into<OsString>) -> Self {
        self.search_paths = search_paths.into();
        self
    }

    /// Dependencies first, then the platform version. A project version
    /// that cannot be read fails before any comparison is made.
    pub fn validate(&self, instance: &ModuleInstance) -> Result<()> {
        self.check_dependencies(&instance.requires())?;

        let actual = self.project_sdk()?;
        let required = instance.min_sdk();
        if required != 0 && actual < required {
            error!("This module requires SDK {} or higher!", required);
            return Err(DispatchError::VersionTooLow { required, actual });
        }

        debug!("Prelaunch checks passed for '{}'", instance.name());
        Ok(())
    }

    pub fn check_dependencies(&self, requires: &[String]) -> Result<()> {
        for requirement in requires {
            if which(requirement, &self.search_paths).is_none() {
                error!("Unable to execute! Unmet dependency: {}", requirement);
                return Err(DispatchError::MissingDependency(requirement.clone()));
            }
        }
        Ok(())
    }

    /// Platform version recorded in the project configuration (`Info/sdk`)
    pub fn project_sdk(&self) -> Result<u32> {
        let corrupt = |reason: String| {
            error!("Unable to get SDK, is this project corrupt?");
            DispatchError::ConfigCorrupt(reason)
        };

        let root = self
            .project_root
            .as_ref()
            .ok_or_else(|| corrupt("no project configuration".to_string()))?;
        let props = load_project_properties(root).map_err(|e| corrupt(e.to_string()))?;
        let raw = props.get_prop("Info", "sdk").map_err(|e| corrupt(e.to_string()))?;

        raw.trim()
            .parse::<u32>()
            .map_err(|e| corrupt(format!("invalid sdk '{raw}': {e}")))
    }
}
