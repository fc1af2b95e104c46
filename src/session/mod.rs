//! Session and conversation transcript management.
//!
//! Sessions are keyed by an opaque, client-supplied id and hold the ordered
//! turns of one conversation. Each session guards its transcript with its own
//! async mutex, so requests on different sessions never wait on each other
//! while requests on the same session are serialized.
//!
//! # Architecture
//!
//! - [`Session`]: handle to one conversation
//! - [`SessionStore`]: thread-safe, create-on-first-use map of sessions
//! - [`EvictionPolicy`]: optional LRU capacity and idle TTL limits
//!
//! # Example
//!
//! ```rust
//! use chat_relay::llm::Turn;
//! use chat_relay::session::SessionStore;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = SessionStore::new();
//! let session = store.get_or_create("s1");
//! session.lock().await.push(Turn::user("Hello!"));
//!
//! assert_eq!(session.turns().await.len(), 1);
//! # });
//! ```

mod eviction;
mod store;

pub use eviction::EvictionPolicy;
pub use store::{Session, SessionStore, Transcript, TranscriptGuard};
