//! Embedding trait and local implementation via fastembed
//!
//! The `Embedder` trait abstracts over embedding backends so the Product
//! Index can swap implementations without touching its callers, per
//! spec.md §9's design note.

use std::sync::Mutex;

use crate::error::{Error, Result};

/// Trait for text embedding (synchronous — CPU-bound work).
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts in a batch.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimension, fixed at `build` time (spec.md §9).
    fn dimension(&self) -> usize;
}

/// Local embedder using fastembed (all-MiniLM-L6-v2, ONNX Runtime).
///
/// Loaded eagerly at `ProductIndex::build` time; stays resident for the
/// server's lifetime. Uses interior mutability because fastembed's
/// `embed()` takes `&mut self`.
pub struct LocalEmbedder {
    model: Mutex<fastembed::TextEmbedding>,
    dimension: usize,
}

impl LocalEmbedder {
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| Error::Other(format!("failed to load embedding model: {}", e)))?;
        Ok(Self { model: Mutex::new(model), dimension: 384 })
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self.model.lock().map_err(|e| Error::Other(format!("embedder lock poisoned: {}", e)))?;
        let results = model
            .embed(vec![text], None)
            .map_err(|e| Error::Other(format!("embedding failed: {}", e)))?;
        results.into_iter().next().ok_or_else(|| Error::Other("no embedding returned".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let mut model = self.model.lock().map_err(|e| Error::Other(format!("embedder lock poisoned: {}", e)))?;
        model
            .embed(owned, None)
            .map_err(|e| Error::Other(format!("batch embedding failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A deterministic stand-in embedder (hashed bag-of-words) used across the
/// test suite so tests don't depend on an ONNX model download.
#[cfg(any(test, feature = "test-support"))]
pub struct HashEmbedder {
    pub dim: usize,
}

#[cfg(any(test, feature = "test-support"))]
impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in text.to_lowercase().split_whitespace() {
            let mut hash: u64 = 1469598103934665603;
            for b in token.bytes() {
                hash ^= b as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            v[(hash as usize) % self.dim] += 1.0;
        }
        Ok(v)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_deterministic() {
        let e = HashEmbedder { dim: 32 };
        assert_eq!(e.embed("tumbler").unwrap(), e.embed("tumbler").unwrap());
    }
}
