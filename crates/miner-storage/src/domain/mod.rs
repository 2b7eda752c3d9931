//! # Domain Layer
//!
//! Pure sampling rules and error types. No I/O.

pub mod errors;
pub mod sampling;
