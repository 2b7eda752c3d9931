//! # Content Store Adapters
//!
//! - `memory` - in-process store for tests and local runs
//! - `filesystem` - directory-backed store used by the node binary

pub mod filesystem;
pub mod memory;
