//! Reporting surface for loader execution.
//!
//! The execution cache emits human-readable status text: a `load` line per
//! caller, `[missing]`/`[stale]`/`[using stale]`/`[fresh]` prefixes from the
//! staleness check, and a success or error summary with elapsed time and
//! output size. This output is observable but not part of the correctness
//! contract; embedders supply their own implementation to redirect it.

use std::io::{Write, stderr};

/// Where loader progress and summaries go.
pub trait LoadEffects: Sync {
    /// Write a progress fragment, without a trailing newline.
    fn status(&self, text: &str);

    /// Write a completed log line.
    fn log(&self, line: &str);

    /// Write a warning line.
    fn warn(&self, line: &str);
}

/// Default effects: progress fragments and summaries on stderr, warnings
/// through the crate logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermEffects;

impl LoadEffects for TermEffects {
    fn status(&self, text: &str) {
        let mut err = stderr().lock();
        write!(err, "{text}").ok();
        err.flush().ok();
    }

    fn log(&self, line: &str) {
        let mut err = stderr().lock();
        writeln!(err, "{line}").ok();
    }

    fn warn(&self, line: &str) {
        crate::log!("loader"; "{line}");
    }
}

/// Discards all output. Useful for tests and embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentEffects;

impl LoadEffects for SilentEffects {
    fn status(&self, _text: &str) {}
    fn log(&self, _line: &str) {}
    fn warn(&self, _line: &str) {}
}
