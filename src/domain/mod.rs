//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the normalized poll model (`PollRecord`, `Affiliation`, `Provenance`)
//! - per-race inputs (`RaceInfo`, `RaceSeries`) and outputs (`DayEstimate`)
//! - run configuration (`AggregateConfig` and the policy enums)

pub mod types;

pub use types::*;
