//! Embedding, storage, and search for chunked repositories.
//!
//! Chunks from `reposeek-chunker` are rendered to text, embedded through an
//! [`embedding::Embedder`], and stored in a SQLite-backed
//! [`store::VectorStore`]. [`search::SearchEngine`] ties the two together.
//! [`repo`] fetches the code to index in the first place.

pub mod embedding;
pub mod repo;
pub mod search;
pub mod store;
