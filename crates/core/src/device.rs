//! Device-connection collaborator
//!
//! Only the piece the dispatcher needs: which device the project targets.

use std::path::PathBuf;
use tracing::debug;

use crate::config::load_project_properties;

pub trait DeviceConnection {
    /// Serial of the device the current project is bound to
    fn mode_serial(&self) -> Option<String>;
}

/// Reads the serial recorded in the project configuration (`Info/serial`)
pub struct ProjectDevice {
    project_root: Option<PathBuf>,
}

impl ProjectDevice {
    pub fn new(project_root: Option<PathBuf>) -> Self {
        Self { project_root }
    }
}

impl DeviceConnection for ProjectDevice {
    fn mode_serial(&self) -> Option<String> {
        let root = self.project_root.as_ref()?;
        match load_project_properties(root) {
            Ok(props) => props.get_prop("Info", "serial").ok().map(str::to_string),
            Err(e) => {
                debug!("No device serial available: {}", e);
                None
            }
        }
    }
}

/// A fixed serial, for embedding the dispatcher without a project device
pub struct StaticDevice(pub Option<String>);

impl DeviceConnection for StaticDevice {
    fn mode_serial(&self) -> Option<String> {
        self.0.clone()
    }
}
