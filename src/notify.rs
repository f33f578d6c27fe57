//! Best-effort side-effect hooks fired on task completion.

use crate::pool::ConversionResult;
use std::io::Write;

/// Fire-and-forget completion hook. Implementations must never fail loudly:
/// errors are swallowed and a panic is caught by the caller.
pub trait Notifier: Send + Sync {
    fn task_completed(&self, result: &ConversionResult);
}

/// Does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn task_completed(&self, _result: &ConversionResult) {}
}

/// Audible cue: writes the terminal bell to stderr after each file
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn task_completed(&self, _result: &ConversionResult) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}
