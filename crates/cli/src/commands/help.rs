use std::io::{self, Write};

const BUILT_IN_COMMANDS: &[(&str, &str)] = &[
    ("binding", "Print dtf helper bindings."),
    ("help", "Prints this help screen."),
    ("local", "Display all local modules."),
    ("prop", "The dtf property manager."),
    ("version", "Print version number (--full for verbose)."),
];

fn banner(out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "Android Device Testing Framework (dtf) v{}",
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out, "Usage: dtf [module|command] <arguments>")
}

pub fn short_usage(out: &mut dyn Write) -> io::Result<()> {
    banner(out)?;
    writeln!(out)?;
    writeln!(out, "Run with '-h' or 'help' for additional information.")
}

pub fn full_usage(out: &mut dyn Write) -> io::Result<()> {
    banner(out)?;
    writeln!(out, "   Built-in Commands:")?;
    for (name, about) in BUILT_IN_COMMANDS {
        writeln!(out, "    {:<12}{}", name, about)?;
    }
    Ok(())
}
