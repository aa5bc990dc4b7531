pub mod help;
pub mod run;
pub mod version;

pub use help::{full_usage, short_usage};
pub use run::run_module;
pub use version::print_version;
