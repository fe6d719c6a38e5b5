//! Poll cleaning and day-by-day aggregation.
//!
//! Responsibilities:
//!
//! - thin repeat pollsters (`dedup`)
//! - pick the admissible polls for an as-of day (`window`)
//! - walk the season and emit one estimate per race per day (`aggregate`)

pub mod aggregate;
pub mod dedup;
pub mod window;

pub use aggregate::*;
pub use dedup::*;
pub use window::*;
