//! # feed-cli
//!
//! Client side of the feed post service. Local images referenced by a
//! document are uploaded first, the document is rewritten to point at the
//! managed copies, and the result is submitted as a post.

pub mod client;
pub mod prepare;

pub use client::{FeedClient, SubmitResponse, SubmittedPost};
pub use prepare::{prepare_document, PreparedDocument};
