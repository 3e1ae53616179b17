//! # ledsync testkit
//!
//! Test fixtures shared by the ledsync crates: canonical fleets that
//! already satisfy the segment geometry invariants, plus small builders for
//! assembling custom ones.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;

pub use fixtures::*;
