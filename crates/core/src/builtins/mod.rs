//! Commands shipped with the tool

mod binding;
mod local;
mod prop;

pub use binding::Binding;
pub use local::Local;
pub use prop::Prop;

use crate::loader::ModuleRegistry;

/// Commands resolved from the built-in command directory before any
/// project-local or globally installed module of the same name
pub const BUILT_IN_LIST: &[&str] = &["binding", "local", "prop"];

/// Built-ins that run without a project, with prelaunch checks skipped
pub const PROJECTLESS: &[&str] = &["binding"];

pub fn is_built_in(name: &str) -> bool {
    BUILT_IN_LIST.contains(&name)
}

pub fn is_projectless(name: &str) -> bool {
    PROJECTLESS.contains(&name)
}

pub fn register_builtins(registry: &mut ModuleRegistry) {
    registry
        .register::<Binding>("binding")
        .register::<Local>("local")
        .register::<Prop>("prop");
}
