// stackkv-common - Shared connection settings for StackKV
//
// This crate resolves where the Redis Stack server lives and which credential
// to present, independently of the client that talks to it.

pub mod error;
pub mod settings;

// Re-export for convenience
pub use error::*;
pub use settings::*;
