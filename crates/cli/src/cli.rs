use anyhow::Result;
use clap::Parser;
use std::io::Write;

use crate::commands::{full_usage, print_version, run_module, short_usage};

/// Aliases that print the full usage
pub const HELP_ALIASES: &[&str] = &["-h", "--help", "help"];

/// Aliases that print the version
pub const VERSION_ALIASES: &[&str] = &["-v", "--version", "version"];

/// Exit code when no command is given
pub const NO_COMMAND: i32 = -1;

/// Android Device Testing Framework
///
/// Everything after the command name is handed to the module untouched, so
/// clap's own help and version flags are disabled and handled by name.
#[derive(Parser, Debug)]
#[command(name = "dtf", bin_name = "dtf")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Dtf {
    /// Module or command to run
    #[arg(allow_hyphen_values = true)]
    pub command: Option<String>,

    /// Arguments passed through to the module
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// What a command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Usage,
    Help,
    Version { full: bool },
    Module { name: String, args: Vec<String> },
}

impl Dtf {
    pub fn invocation(self) -> Invocation {
        let Some(name) = self.command else {
            return Invocation::Usage;
        };

        if HELP_ALIASES.contains(&name.as_str()) {
            Invocation::Help
        } else if VERSION_ALIASES.contains(&name.as_str()) {
            Invocation::Version {
                full: self.args.first().is_some_and(|a| a == "--full"),
            }
        } else {
            Invocation::Module {
                name,
                args: self.args,
            }
        }
    }

    /// Execute the command line, returning the process exit code
    pub fn execute(self, out: &mut dyn Write) -> Result<i32> {
        match self.invocation() {
            Invocation::Usage => {
                short_usage(out)?;
                Ok(NO_COMMAND)
            }
            Invocation::Help => {
                full_usage(out)?;
                Ok(0)
            }
            Invocation::Version { full } => print_version(full, out),
            Invocation::Module { name, args } => run_module(&name, args, out),
        }
    }
}
