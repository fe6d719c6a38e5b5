//! Input/output helpers.
//!
//! - race configuration CSV (`races`)
//! - feed CSV ingest + validation (`ingest`)
//! - fixed-width and JSON exports (`export`)

pub mod export;
pub mod ingest;
pub mod races;

pub use export::*;
pub use ingest::*;
pub use races::*;
