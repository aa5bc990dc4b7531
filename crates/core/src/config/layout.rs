//! Installation layout
//!
//! Owns every fixed location the dispatcher searches: the built-in command
//! directory shipped with the tool, the per-user data directory holding
//! globally installed modules and helper scripts, and the project markers.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project configuration file; its directory is the project root
pub const CONFIG_FILE_NAME: &str = ".dtf.json";

/// Subdirectory of the project root holding project-local modules
pub const LOCAL_MODULES_DIRECTORY: &str = "local_modules";

/// Built-in command directory, relative to the install root
pub const BUILTIN_COMMANDS_DIRECTORY: &str = "core/cmds";

/// Helper scripts exported to executable modules
pub const LOG_HELPER: &str = "dtf_log.sh";
pub const CORE_HELPER: &str = "dtf_core.sh";

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    install_dir: PathBuf,
    data_dir: PathBuf,
}

impl Layout {
    pub fn new(install_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Derive the layout from the environment.
    ///
    /// `DTF_INSTALL_DIR` and `DTF_DATA_DIR` take precedence; otherwise the
    /// install root is the parent of the directory holding the running
    /// executable and the data root is `~/.dtf`.
    pub fn discover() -> io::Result<Self> {
        let install_dir = match std::env::var_os("DTF_INSTALL_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let exe = std::env::current_exe()?;
                let bin_dir = exe
                    .parent()
                    .ok_or_else(|| io::Error::other("executable has no parent directory"))?;
                bin_dir.parent().unwrap_or(bin_dir).to_path_buf()
            }
        };

        let data_dir = match std::env::var_os("DTF_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or_else(|| io::Error::other("unable to determine home directory"))?
                .join(".dtf"),
        };

        debug!(
            "Layout: install={} data={}",
            install_dir.display(),
            data_dir.display()
        );
        Ok(Self::new(install_dir, data_dir))
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn builtin_dir(&self) -> PathBuf {
        self.install_dir.join(BUILTIN_COMMANDS_DIRECTORY)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.data_dir.join("modules")
    }

    pub fn included_dir(&self) -> PathBuf {
        self.data_dir.join("included")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn binaries_dir(&self) -> PathBuf {
        self.data_dir.join("binaries")
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    pub fn global_config(&self) -> PathBuf {
        self.data_dir.join("globals.json")
    }

    pub fn log_helper(&self) -> PathBuf {
        self.included_dir().join(LOG_HELPER)
    }

    pub fn core_helper(&self) -> PathBuf {
        self.included_dir().join(CORE_HELPER)
    }

    /// The helper directory only exists once first-run setup has completed
    pub fn is_first_run(&self) -> bool {
        !self.included_dir().is_dir()
    }

    pub fn create_data_dirs(&self) -> io::Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.modules_dir(),
            self.included_dir(),
            self.libraries_dir(),
            self.binaries_dir(),
            self.packages_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Search upward from `start` for the directory holding the project config
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    loop {
        if current.join(CONFIG_FILE_NAME).is_file() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}
