//! # Ports
//!
//! - `inbound` - API this crate offers to message handlers
//! - `outbound` - capabilities required from the content store

pub mod inbound;
pub mod outbound;
