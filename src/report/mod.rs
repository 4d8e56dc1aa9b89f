//! Report rendering for finished aggregations.

pub mod generator;

pub use generator::*;
