//! External poll data: feed sources (HTTP and local directory).

pub mod feed;

pub use feed::*;
