//! # Miner Storage
//!
//! Fetch-and-retain and byte sampling over an external content store.
//!
//! ## Operations
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `fetch` | Pull the object into local storage and mark it retained. Idempotent. |
//! | `sample` | Read one byte per requested offset from retained objects. Never fails as a whole. |
//!
//! ## Sampling Outcomes
//!
//! Each requested item is sampled independently and carries its own
//! [`SampleStatus`](shared_types::SampleStatus):
//!
//! - `Ok`: one byte per position, in request order
//! - `NotRetained`: the object is not held locally, no bytes
//! - `OutOfRange { position }`: bytes before `position` are kept, the rest skipped
//! - `ReadFailed`: the store failed to open or read the object
//!
//! The retention snapshot is queried afresh on every `sample` call and never
//! cached. The store may change between the presence check and the read;
//! that surfaces as `ReadFailed` for the affected item.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure sampling rules and error types
//! - `ports/` - Inbound API ([`ContentApi`]) and outbound SPI ([`ContentStore`])
//! - `service.rs` - [`ContentService`] implementing the API
//! - `adapters/` - In-memory and filesystem content stores
//!
//! ## Usage
//!
//! ```ignore
//! use miner_storage::{ContentApi, ContentService, InMemoryContentStore};
//!
//! let store = Arc::new(InMemoryContentStore::new());
//! let cid = store.insert_remote(b"payload".to_vec());
//! let service = ContentService::new(store);
//!
//! service.fetch(&cid).await?;
//! let items = service.sample(&request.items).await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::filesystem::FsContentStore;
pub use adapters::memory::InMemoryContentStore;
pub use domain::errors::{FetchError, FetchStage};
pub use ports::inbound::ContentApi;
pub use ports::outbound::{ContentRead, ContentStore, OpenedContent};
pub use service::ContentService;
