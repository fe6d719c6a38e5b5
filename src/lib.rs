//! `poll-median` library crate.
//!
//! The binary (`polls`) is a thin wrapper around this library so that:
//!
//! - the aggregation core is testable without spawning processes or touching the network
//! - feeds can come from HTTP or a local directory behind one trait
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod polls;
pub mod report;
pub mod stats;
