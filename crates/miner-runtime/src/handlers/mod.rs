//! # Message Handlers
//!
//! The dispatcher and the handlers registered with it.
//!
//! | Kind | Handler | Response |
//! |------|---------|----------|
//! | `FetchFile` | [`FetchFileHandler`] | `FetchFileResp` to the sender's inbox |
//! | `WindowPost` | [`WindowPostHandler`] | `WindowPostResp` to the sender's inbox |
//!
//! Any other kind is logged and dropped without a response.

pub mod fetch_file;
pub mod registry;
pub mod window_post;

#[cfg(test)]
mod test_utils;

pub use fetch_file::FetchFileHandler;
pub use registry::{DispatchOutcome, Dispatcher, HandlerError, MessageHandler};
pub use window_post::WindowPostHandler;
