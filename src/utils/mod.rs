//! Shared helpers for the loader subsystem.

pub mod format;
pub mod fs;
pub mod path;
