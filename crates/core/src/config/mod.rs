//! Configuration management for dtf

pub mod layout;
mod properties;

// Re-export main types
pub use layout::{CONFIG_FILE_NAME, LOCAL_MODULES_DIRECTORY, Layout, find_project_root};
pub use properties::{Properties, PropertyError};

use std::path::Path;

/// Load the project properties stored under `project_root`
pub fn load_project_properties(project_root: &Path) -> Result<Properties, PropertyError> {
    Properties::load_from_file(&project_root.join(CONFIG_FILE_NAME))
}
