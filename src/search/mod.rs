//! Product Index (C2): embeds the catalog once and serves top-k
//! semantic-similarity lookups with deterministic re-ranking.

pub mod embedder;
pub mod query;

pub use embedder::{Embedder, LocalEmbedder};
pub use query::{ProductIndex, ProductMatch, SortKey, DEFAULT_K, MAX_K};
