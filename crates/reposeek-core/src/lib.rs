//! Core types, configuration, and error handling for reposeek.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`ReposeekError`]: unified error type using `thiserror`
//! - [`ReposeekConfig`]: configuration loaded from `.reposeek.toml`
//! - Shared types: [`ChunkType`], [`SearchResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{ChunkerConfig, EmbeddingConfig, ReposeekConfig, SearchConfig, WalkerConfig};
pub use error::ReposeekError;
pub use types::{ChunkType, OutputFormat, SearchResult};

/// A convenience `Result` type for reposeek operations.
pub type Result<T> = std::result::Result<T, ReposeekError>;
