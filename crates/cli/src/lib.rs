pub mod cli;
pub mod commands;

// Re-export commonly used items
pub use cli::{Dtf, Invocation};
