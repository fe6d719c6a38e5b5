//! Statistics: the per-day estimator and its small numeric helpers.

pub mod estimator;

pub use estimator::*;
