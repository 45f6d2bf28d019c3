//! Error and result definitions shared by all tsidx-* crates.

pub mod error;
pub mod result;

pub use result::Result;
