//! dtf - Android device testing framework
//!
//! Facade over [`dtf_core`], the module dispatch engine.
pub use dtf_core::*;
