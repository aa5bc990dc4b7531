//! Capturing an invocation's console output in memory

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

use crate::error::DispatchError;
use crate::router::panic_message;

/// Run `invocation` with an in-memory sink and return what it wrote
/// together with its result code.
///
/// The buffer is owned here, so whatever the invocation does the caller's
/// own stream is never touched. A panic escaping the invocation is reported
/// as an unhandled fault; text written before it is kept.
pub fn capture_invoke<F>(invocation: F) -> (String, i32)
where
    F: FnOnce(&mut dyn Write) -> i32,
{
    let mut buffer: Vec<u8> = Vec::new();

    let code = match panic::catch_unwind(AssertUnwindSafe(|| invocation(&mut buffer))) {
        Ok(code) => code,
        Err(payload) => {
            error!("Unhandled Exception in module!");
            error!("  panicked: {}", panic_message(payload.as_ref()));
            DispatchError::UnhandledFault("captured invocation".to_string()).exit_code()
        }
    };

    (String::from_utf8_lossy(&buffer).into_owned(), code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_text_and_code() {
        let (text, code) = capture_invoke(|out| {
            writeln!(out, "hello").unwrap();
            4
        });

        assert_eq!(text, "hello\n");
        assert_eq!(code, 4);
    }

    #[test]
    fn test_panic_keeps_partial_output() {
        let (text, code) = capture_invoke(|out| {
            write!(out, "partial").unwrap();
            panic!("boom");
        });

        assert_eq!(text, "partial");
        assert_eq!(code, -10);
    }
}
