//! dtf-core - Module dispatch engine for the Android device testing framework
//!
//! This crate provides functionality to:
//! - Resolve a command name to a module across the built-in, project-local
//!   and globally installed tiers
//! - Run executable modules as child processes with an augmented environment
//! - Load in-process modules, check their prerequisites and route their
//!   sub-commands
//! - Fold every failure into a distinct numeric exit code
pub mod builtins;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod context;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod interrupt;
pub mod launcher;
pub mod loader;
pub mod logging;
pub mod module;
pub mod resolver;
pub mod router;
pub mod setup;
pub mod validator;

// Re-export commonly used types and traits
pub use error::{DispatchError, Result, to_exit_code};

// Re-export main API components
pub use capture::capture_invoke;
pub use classifier::{ModuleKind, classify, is_executable_artifact};
pub use config::{Layout, Properties};
pub use context::ExecutionContext;
pub use device::{DeviceConnection, ProjectDevice, StaticDevice};
pub use dispatcher::{Dispatcher, LaunchOptions};
pub use loader::{ModuleLoader, ModuleRegistry, UnitManifest};
pub use module::{AnyModule, Handler, Module, ModuleInstance, ModuleResult, Routes};
pub use resolver::{ModuleDescriptor, ModuleResolver, Scope};
pub use validator::PrelaunchValidator;

/// Version of the dispatch engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
