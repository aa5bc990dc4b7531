//! Forced-interruption tracking
//!
//! While a dispatch is in flight SIGINT is intercepted: the handler records
//! the interruption and terminates the process group of the executable
//! module currently registered, if any. The previous disposition is restored
//! when the last [`InterruptScope`] is dropped.
//!
//! A child group that runs on our terminal is handed the terminal foreground
//! with [`TerminalForeground`], so it can read from it. Ctrl-C typed there
//! then reaches the child group directly instead of this process.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static ACTIVE_GROUP: AtomicI32 = AtomicI32::new(0);

struct ScopeState {
    depth: usize,
    #[cfg(unix)]
    previous: libc::sighandler_t,
}

static SCOPE: Mutex<ScopeState> = Mutex::new(ScopeState {
    depth: 0,
    #[cfg(unix)]
    previous: libc::SIG_DFL,
});

/// Marker error module code can return to report that it stopped because
/// the user interrupted it
#[derive(Debug, thiserror::Error)]
#[error("interrupted by user")]
pub struct Interrupted;

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Record an interruption as if SIGINT had been delivered
pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
    terminate_active_group();
}

fn terminate_active_group() {
    let group = ACTIVE_GROUP.load(Ordering::SeqCst);
    if group > 0 {
        kill_group(group);
    }
}

#[cfg(unix)]
fn kill_group(group: i32) {
    // kill(2) is async-signal-safe, so this is also used from the handler
    unsafe {
        libc::kill(-group, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: i32) {}

#[cfg(unix)]
extern "C" fn on_sigint(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    terminate_active_group();
}

/// Guard that keeps SIGINT intercepted for one dispatch
pub struct InterruptScope {
    _private: (),
}

impl InterruptScope {
    pub fn install() -> Self {
        let mut state = SCOPE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.depth == 0 {
            INTERRUPTED.store(false, Ordering::SeqCst);
            #[cfg(unix)]
            {
                let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
                state.previous = unsafe { libc::signal(libc::SIGINT, handler) };
            }
        }
        state.depth += 1;
        Self { _private: () }
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        let mut state = SCOPE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            #[cfg(unix)]
            unsafe {
                libc::signal(libc::SIGINT, state.previous);
            }
        }
    }
}

/// Registration of a spawned child's process group.
///
/// While registered, an interruption terminates the whole group. Dropping
/// the registration only forgets the group; it does not signal it.
pub struct ChildGroup {
    group: i32,
}

impl ChildGroup {
    pub fn register(pid: u32) -> Self {
        let group = i32::try_from(pid).unwrap_or(0);
        ACTIVE_GROUP.store(group, Ordering::SeqCst);
        if is_interrupted() {
            terminate_active_group();
        }
        Self { group }
    }

    /// Terminate every process in the group
    pub fn terminate(&self) {
        if self.group > 0 {
            kill_group(self.group);
        }
    }
}

impl Drop for ChildGroup {
    fn drop(&mut self) {
        let _ = ACTIVE_GROUP.compare_exchange(self.group, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// Terminal foreground handed to a child process group.
///
/// Only taken when standard input is a terminal whose foreground group is
/// ours. Dropping the guard gives the foreground back.
pub struct TerminalForeground {
    #[cfg(unix)]
    previous: Option<libc::pid_t>,
}

impl TerminalForeground {
    #[cfg(unix)]
    pub fn hand_to(group: u32) -> Self {
        let Ok(group) = libc::pid_t::try_from(group) else {
            return Self { previous: None };
        };

        let previous = unsafe {
            if libc::isatty(libc::STDIN_FILENO) != 1 {
                return Self { previous: None };
            }
            let foreground = libc::tcgetpgrp(libc::STDIN_FILENO);
            if foreground < 0 || foreground != libc::getpgrp() {
                return Self { previous: None };
            }
            if libc::tcsetpgrp(libc::STDIN_FILENO, group) != 0 {
                return Self { previous: None };
            }
            // A read before the hand-over stopped the child with SIGTTIN
            libc::kill(-group, libc::SIGCONT);
            foreground
        };

        Self {
            previous: Some(previous),
        }
    }

    #[cfg(not(unix))]
    pub fn hand_to(_group: u32) -> Self {
        Self {}
    }

    /// Whether the child group currently owns the terminal
    #[cfg(unix)]
    pub fn is_handed(&self) -> bool {
        self.previous.is_some()
    }

    #[cfg(not(unix))]
    pub fn is_handed(&self) -> bool {
        false
    }
}

impl Drop for TerminalForeground {
    #[cfg(unix)]
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // From the background, tcsetpgrp raises SIGTTOU unless ignored
            unsafe {
                let disposition = libc::signal(libc::SIGTTOU, libc::SIG_IGN);
                libc::tcsetpgrp(libc::STDIN_FILENO, previous);
                libc::signal(libc::SIGTTOU, disposition);
            }
        }
    }

    #[cfg(not(unix))]
    fn drop(&mut self) {}
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_sigint_is_recorded_inside_scope() {
        let scope = InterruptScope::install();
        assert!(!is_interrupted());

        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(is_interrupted());
        drop(scope);

        // A fresh scope starts clean
        let _scope = InterruptScope::install();
        assert!(!is_interrupted());
    }

    #[test]
    #[serial]
    fn test_nested_scopes_keep_handler_installed() {
        let outer = InterruptScope::install();
        let inner = InterruptScope::install();
        drop(inner);

        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(is_interrupted());
        drop(outer);
    }

    #[test]
    #[serial]
    fn test_child_group_registration_is_cleared_on_drop() {
        {
            let _group = ChildGroup::register(4_000_000);
            assert_eq!(ACTIVE_GROUP.load(Ordering::SeqCst), 4_000_000);
        }
        assert_eq!(ACTIVE_GROUP.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_foreground_is_not_taken_without_a_terminal() {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            return;
        }
        let foreground = TerminalForeground::hand_to(std::process::id());
        assert!(!foreground.is_handed());
    }
}
