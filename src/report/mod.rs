//! Reporting: terminal summaries of a run and of single race/day selections.

pub mod format;

pub use format::*;
