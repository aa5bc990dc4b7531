//! Sub-command routing for in-process modules

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::{debug, error, warn};

use crate::context::ExecutionContext;
use crate::error::{DispatchError, Result};
use crate::interrupt::{self, Interrupted};
use crate::module::{Handler, Module, ModuleResult, Routes};

/// Arguments that print the usage block instead of dispatching
pub const USAGE_TAGS: &[&str] = &["-h", "--help", "help"];

const USAGE_COLUMN: usize = 13;

/// Frames from here down belong to the dispatcher and are left out of traces
const DISPATCH_FRAME: &str = "dtf_core::router";

/// Leading frames belonging to the runtime, the error crate or the hook
const PRELUDE_FRAMES: &[&str] = &[
    "std::", "core::", "alloc::", "anyhow::", "<std::", "<core::", "<alloc::", "<anyhow::",
    "rust_begin_unwind", "__rust",
];

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Run `module` against `args`.
///
/// A catch-all entry receives every argument untouched. Otherwise the first
/// argument selects a sub-command from the module's table.
pub fn route<M: Module>(
    module: &mut M,
    ctx: &mut ExecutionContext<'_>,
    mut args: Vec<String>,
) -> Result<i32> {
    let routes = M::routes();
    let name = module.name().to_string();

    if let Some(entry) = routes.catch_all() {
        debug!("Module '{}' uses a catch-all entry", name);
        return invoke(&name, || entry(module, ctx, args));
    }

    if !routes.has_sub_commands() {
        error!("Module '{}' has no exec or mappings!", name);
        return Err(DispatchError::NoMappings(name));
    }

    if args.is_empty() {
        render_usage_to(module, &routes, ctx);
        return Err(DispatchError::NoMappings(name));
    }

    let keyword = args.remove(0);
    if USAGE_TAGS.contains(&keyword.as_str()) {
        render_usage_to(module, &routes, ctx);
        return Ok(0);
    }

    match routes.lookup(&keyword) {
        Some(Handler::WithArgs(handler)) => invoke(&name, || handler(module, ctx, args)),
        Some(Handler::NoArgs(handler)) => invoke(&name, || handler(module, ctx)),
        None => {
            render_usage_to(module, &routes, ctx);
            error!("Module '{}' has no mapping for '{}'!", name, keyword);
            Err(DispatchError::UnknownSubCommand {
                module: name,
                keyword,
            })
        }
    }
}

/// Write the usage block for a sub-command table
pub fn render_usage<M: Module>(
    module: &M,
    routes: &Routes<M>,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out, "dtf Module {} v{}", module.name(), module.version())?;
    writeln!(out)?;
    writeln!(out, "Subcommands:")?;
    for (keyword, usage) in routes.usage_entries() {
        writeln!(out, "  {:<width$}{}", keyword, usage, width = USAGE_COLUMN)?;
    }
    writeln!(out)?;
    out.flush()
}

fn render_usage_to<M: Module>(module: &M, routes: &Routes<M>, out: &mut dyn Write) {
    if let Err(e) = render_usage(module, routes, out) {
        warn!("Unable to write usage: {}", e);
    }
}

/// Run module code, converting anything that escapes it into a result.
fn invoke(name: &str, call: impl FnOnce() -> ModuleResult) -> Result<i32> {
    install_trace_hook();
    take_panic_trace();
    let outcome = panic::catch_unwind(AssertUnwindSafe(call));

    if interrupt::is_interrupted() {
        error!("Module '{}' forcibly killed!", name);
        return Err(DispatchError::Interrupted(name.to_string()));
    }

    match outcome {
        Ok(Ok(code)) => Ok(code),
        Ok(Err(e)) if is_interruption(&e) => {
            error!("Module '{}' forcibly killed!", name);
            Err(DispatchError::Interrupted(name.to_string()))
        }
        Ok(Err(e)) => {
            error!("Unhandled Exception in module!");
            for cause in e.chain() {
                error!("  {}", cause);
            }
            if e.backtrace().status() == BacktraceStatus::Captured {
                log_trace(e.backtrace());
            } else {
                debug!("Set RUST_BACKTRACE=1 to include where the error was raised");
            }
            Err(DispatchError::UnhandledFault(name.to_string()))
        }
        Err(payload) => {
            error!("Unhandled Exception in module!");
            error!("  panicked: {}", panic_message(payload.as_ref()));
            if let Some(backtrace) = take_panic_trace() {
                log_trace(&backtrace);
            }
            Err(DispatchError::UnhandledFault(name.to_string()))
        }
    }
}

fn is_interruption(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| cause.downcast_ref::<Interrupted>().is_some())
}

/// Chain a panic hook that keeps a trace of the latest panic on its thread.
/// The previous hook still runs.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture();
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn log_trace(backtrace: &Backtrace) {
    for line in trimmed_trace(backtrace) {
        error!("{}", line);
    }
}

/// Frames of `backtrace` raised by module code: the capture prelude is
/// skipped and the dispatcher's own frames are cut off.
fn trimmed_trace(backtrace: &Backtrace) -> Vec<String> {
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    trim_frames(&backtrace.to_string())
}

fn trim_frames(trace: &str) -> Vec<String> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in trace.lines().filter(|line| !line.trim().is_empty()) {
        match frames.last_mut() {
            Some(frame) if frame_symbol(line).is_none() => frame.push(line),
            _ => frames.push(vec![line]),
        }
    }

    frames
        .into_iter()
        .skip_while(|frame| is_prelude(frame[0]))
        .take_while(|frame| !frame[0].contains(DISPATCH_FRAME))
        .flatten()
        .map(str::to_string)
        .collect()
}

/// Symbol of a `  N: symbol` frame header
fn frame_symbol(line: &str) -> Option<&str> {
    let (index, symbol) = line.trim_start().split_once(": ")?;
    (!index.is_empty() && index.bytes().all(|b| b.is_ascii_digit())).then_some(symbol)
}

fn is_prelude(header: &str) -> bool {
    let symbol = frame_symbol(header).unwrap_or(header).trim();
    symbol.contains(DISPATCH_FRAME) || PRELUDE_FRAMES.iter().any(|p| symbol.starts_with(p))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
