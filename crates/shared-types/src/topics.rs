//! # Topic Namer
//!
//! Deterministic topic names. Pure functions, no failure modes.
//!
//! | Topic | Name |
//! |-------|------|
//! | Per-node inbox | `v1/internal/<node-id>` |
//! | Shared heartbeat | `v1/miner/heartbeat` |
//! | Per-node ipfc channel | `v1/ipfc/<node-id>` |
//! | Per-node inspector channel | `v1/inspector/<node-id>` |

use crate::entities::NodeId;

/// Version segment shared by every topic.
pub const TOPIC_VERSION: &str = "v1";

/// Inbox of `node`: requests addressed to it and responses for it.
#[must_use]
pub fn inbox_topic(node: &NodeId) -> String {
    format!("{}/internal/{}", TOPIC_VERSION, node)
}

/// Shared channel every miner announces itself on.
#[must_use]
pub fn heartbeat_topic() -> String {
    format!("{}/miner/heartbeat", TOPIC_VERSION)
}

#[must_use]
pub fn ipfc_topic(node: &NodeId) -> String {
    format!("{}/ipfc/{}", TOPIC_VERSION, node)
}

#[must_use]
pub fn inspector_topic(node: &NodeId) -> String {
    format!("{}/inspector/{}", TOPIC_VERSION, node)
}
