//! # StackKV Sync Client
//!
//! Purpose: Provide a thin, synchronous facade over a Redis Stack server:
//! plain keys, RediSearch indexes over hash records, and RedisJSON documents.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StackClient` hides connection lifecycle and reply
//!    decoding behind a handful of typed calls.
//! 2. **Lazy Connection**: nothing touches the network until the first command.
//! 3. **Thin Errors**: native `redis` errors pass through untouched; only
//!    `ping` and index drops recover from failures.
//! 4. **Protocol Reuse**: the wire protocol is the `redis` crate's, never ours.

mod client;
mod error;
pub mod fixtures;
mod reply;
mod schema;

pub use client::{connection_info, DropOutcome, ScopedClient, StackClient};
pub use error::{StoreError, StoreResult};
pub use reply::{ModuleInfo, SearchDocument, SearchResults, ServerInfo};
pub use schema::{FieldKind, FieldValue, SchemaField, SearchQuery};
pub use stackkv_common::{ConfigError, ConnectionSettings, SettingsOverrides};
