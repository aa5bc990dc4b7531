//! Launching executable modules as child processes

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, error, info};

use crate::classifier::is_executable_artifact;
use crate::config::Layout;
use crate::context::ExecutionContext;
use crate::device::DeviceConnection;
use crate::error::{DispatchError, Result};
use crate::interrupt::{self, ChildGroup, TerminalForeground};

/// Path of the logging helper script the module can source
pub const ENV_LOG_HELPER: &str = "DTF_LOG";
/// Path of the core helper script the module can source
pub const ENV_CORE_HELPER: &str = "DTF_CORE";
/// Directory the top-level command was started from
pub const ENV_LAUNCH_DIR: &str = "LAUNCH_DIR";
/// Serial of the targeted device
pub const ENV_SERIAL: &str = "ANDROID_SERIAL";

pub struct ProcessLauncher<'a> {
    layout: &'a Layout,
    device: &'a dyn DeviceConnection,
}

impl<'a> ProcessLauncher<'a> {
    pub fn new(layout: &'a Layout, device: &'a dyn DeviceConnection) -> Self {
        Self { layout, device }
    }

    /// Add the variables executable modules rely on to the context
    pub fn inject_environment(&self, ctx: &mut ExecutionContext<'_>) {
        ctx.set_env(ENV_LOG_HELPER, self.layout.log_helper().to_string_lossy());
        ctx.set_env(ENV_CORE_HELPER, self.layout.core_helper().to_string_lossy());
        let launch_dir = ctx.launch_dir().to_string_lossy().into_owned();
        ctx.set_env(ENV_LAUNCH_DIR, launch_dir);

        match self.device.mode_serial() {
            Some(serial) => ctx.set_env(ENV_SERIAL, serial),
            None => debug!("No device serial to export"),
        }
    }

    /// Spawn `path` in the context's working directory and stream its
    /// standard output into the context line by line as it is produced.
    ///
    /// Returns the child's exit code.
    pub fn launch(
        &self,
        path: &Path,
        args: &[String],
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<i32> {
        if !is_executable_artifact(path) {
            error!("Module '{}' is not marked executable!", path.display());
            return Err(DispatchError::NotExecutable(path.to_path_buf()));
        }

        self.inject_environment(ctx);

        let mut command = Command::new(path);
        command
            .args(args)
            .current_dir(ctx.working_dir())
            .stdout(Stdio::piped());

        for (key, value) in ctx.injected_env() {
            command.env(key, value);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        info!("Running: {} {}", path.display(), args.join(" "));

        let mut child = command.spawn().map_err(|e| spawn_failed(path, e))?;
        let group = ChildGroup::register(child.id());
        let foreground = TerminalForeground::hand_to(child.id());

        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(stdout, ctx),
            None => Err(io::Error::other("child stdout was not captured")),
        };

        if let Err(e) = streamed {
            group.terminate();
            let _ = child.wait();
            return Err(spawn_failed(path, e));
        }

        let status = child.wait().map_err(|e| spawn_failed(path, e))?;
        let interactive = foreground.is_handed();
        drop(foreground);
        drop(group);

        // Ctrl-C on a terminal the child owned never reaches our handler
        if interactive && killed_by_sigint(status) {
            interrupt::request_interrupt();
        }

        if interrupt::is_interrupted() {
            error!("Executable module forcibly killed!");
            return Err(DispatchError::Interrupted(module_label(path)));
        }

        let code = exit_code(status);
        debug!("Module {} exited with {}", path.display(), code);
        Ok(code)
    }
}

fn stream_lines(stdout: impl io::Read, out: &mut dyn Write) -> io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        out.write_all(&line)?;
        out.flush()?;
    }
}

fn spawn_failed(path: &Path, source: io::Error) -> DispatchError {
    error!("Unable to launch module '{}': {}", path.display(), source);
    DispatchError::SpawnFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn module_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn killed_by_sigint(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    status.signal() == Some(libc::SIGINT)
}

#[cfg(not(unix))]
fn killed_by_sigint(_status: ExitStatus) -> bool {
    false
}
