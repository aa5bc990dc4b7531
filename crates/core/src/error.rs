use std::io;
use std::path::PathBuf;

/// Errors that can occur while resolving, loading or running a module
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unable to find a project root! Is this a dtf project?")]
    NoProject,

    #[error("Module or command '{name}' not found at {}", path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("Unable to launch '{}': {source}", path.display())]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to find entry type '{0}' in module!")]
    EntryPointMissing(String),

    #[error("Module '{}' is not marked executable!", .0.display())]
    NotExecutable(PathBuf),

    #[error("Unable to execute! Unmet dependency: {0}")]
    MissingDependency(String),

    #[error("Unable to load module '{name}': {reason}")]
    LoadError { name: String, reason: String },

    #[error("Unhandled fault in module '{0}'")]
    UnhandledFault(String),

    #[error("Module '{0}' forcibly killed!")]
    Interrupted(String),

    #[error("This module requires SDK {required} or higher (project is {actual})!")]
    VersionTooLow { required: u32, actual: u32 },

    #[error("Unable to get SDK, is this project corrupt? ({0})")]
    ConfigCorrupt(String),

    #[error("Module '{0}' has no exec or mappings!")]
    NoMappings(String),

    #[error("Module '{module}' has no mapping for '{keyword}'!")]
    UnknownSubCommand { module: String, keyword: String },
}

impl DispatchError {
    /// Numeric sentinel reported to the caller of the dispatcher
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::NoProject => -3,
            DispatchError::NotFound { .. } => -4,
            DispatchError::SpawnFailed { .. } => -5,
            DispatchError::EntryPointMissing(_) => -6,
            DispatchError::NotExecutable(_) => -7,
            DispatchError::MissingDependency(_) => -8,
            DispatchError::LoadError { .. } => -9,
            DispatchError::UnhandledFault(_) => -10,
            DispatchError::Interrupted(_) => -11,
            DispatchError::VersionTooLow { .. } => -12,
            DispatchError::ConfigCorrupt(_) => -13,
            DispatchError::NoMappings(_) => -14,
            DispatchError::UnknownSubCommand { .. } => -15,
        }
    }
}

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Fold a dispatch result into the numeric status handed back to the shell
pub fn to_exit_code(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => e.exit_code(),
    }
}
