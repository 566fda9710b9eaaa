//! Calculation engine.
//!
//! Pure functions from a parsed report and reference factors to the
//! result document. No I/O happens here.

pub mod aggregator;

pub use aggregator::*;
