//! Product Index — in-process embedding store and semantic search
//!
//! Embeddings live in a plain `Vec`, not a SQL-backed vector store: the
//! Product Index exclusively owns this data, per spec.md §3's ownership
//! invariants, and the catalog is small enough that an in-memory linear
//! scan is the right trade-off.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Product};
use crate::http_client::EMBEDDING_TIMEOUT_SECS;
use super::embedder::Embedder;

pub const DEFAULT_K: usize = 5;
pub const MAX_K: usize = 20;

/// Secondary deterministic sort applied after similarity ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Cheapest,
    MostExpensive,
    Largest,
    Smallest,
}

impl SortKey {
    /// Detect a sort-key phrase in free text, per spec.md §4.2. First match
    /// in declaration order wins.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        const CHEAPEST: &[&str] = &["cheapest", "lowest price", "budget"];
        const EXPENSIVE: &[&str] = &["most expensive", "premium", "highest price"];
        const LARGEST: &[&str] = &["largest", "biggest", "most capacity"];
        const SMALLEST: &[&str] = &["smallest", "smallest capacity"];

        if CHEAPEST.iter().any(|k| lower.contains(k)) {
            Some(SortKey::Cheapest)
        } else if EXPENSIVE.iter().any(|k| lower.contains(k)) {
            Some(SortKey::MostExpensive)
        } else if LARGEST.iter().any(|k| lower.contains(k)) {
            Some(SortKey::Largest)
        } else if SMALLEST.iter().any(|k| lower.contains(k)) {
            Some(SortKey::Smallest)
        } else {
            None
        }
    }

    /// Canonical snake_case name, per spec.md §4.2's sort-key vocabulary.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Cheapest => "cheapest",
            SortKey::MostExpensive => "most_expensive",
            SortKey::Largest => "largest",
            SortKey::Smallest => "smallest",
        }
    }
}

/// A single semantic search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product: Product,
    pub score: f64,
}

struct Entry {
    product: Product,
    vector: Vec<f32>,
}

/// The Product Index: owns the catalog's embeddings and serves searches.
pub struct ProductIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<Entry>,
}

impl ProductIndex {
    /// Compute and store embeddings for every product. Idempotent; a
    /// failure here is fatal per spec.md §4.2.
    pub fn build(catalog: &Catalog, embedder: Arc<dyn Embedder>) -> crate::error::Result<Self> {
        let mut entries = Vec::with_capacity(catalog.len());
        for product in catalog.products() {
            let vector = embedder.embed(&product.searchable_text())?;
            entries.push(Entry { product: product.clone(), vector: normalize(&vector) });
        }
        Ok(Self { embedder, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k products by cosine similarity. Embeds the query on the
    /// blocking thread pool under a deadline, per spec.md §5's "embedding
    /// is a suspension point" requirement — the index's `Arc<dyn Embedder>`
    /// is `Send + Sync + 'static` so `spawn_blocking` can run it without
    /// needing an embedder-specific async wrapper. An embedding failure or
    /// timeout on the query is non-fatal: logs a warning and returns an
    /// empty list, per spec.md §4.2's failure semantics.
    pub async fn search(&self, query_text: &str, k: usize) -> Vec<ProductMatch> {
        let k = k.min(MAX_K);
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let query_vector = match self.embed_query(query_text).await {
            Ok(v) => normalize(&v),
            Err(e) => {
                tracing::warn!("query embedding failed, returning no matches: {}", e);
                return Vec::new();
            }
        };

        let mut scored: Vec<ProductMatch> = self
            .entries
            .iter()
            .map(|e| ProductMatch { product: e.product.clone(), score: cosine(&query_vector, &e.vector) })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product.id.cmp(&b.product.id))
        });
        scored.truncate(k);
        scored
    }

    /// Like `search`, but applies a deterministic secondary sort when
    /// `sort_key` is present. Ties broken by product id ascending.
    pub async fn search_sorted(&self, query_text: &str, k: usize, sort_key: Option<SortKey>) -> Vec<ProductMatch> {
        let mut results = self.search(query_text, k).await;
        if let Some(key) = sort_key {
            apply_sort_key(&mut results, key);
        }
        results
    }

    /// Runs the embedder's (CPU-bound, synchronous) `embed` off the async
    /// worker thread, bounded by the embedding deadline in spec.md §5.
    async fn embed_query(&self, text: &str) -> crate::error::Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let text = text.to_string();
        let joined = tokio::time::timeout(
            Duration::from_secs(EMBEDDING_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || embedder.embed(&text)),
        )
        .await
        .map_err(|_| crate::error::Error::ResourceExhausted("embedding call exceeded deadline".into()))?;

        joined.map_err(|e| crate::error::Error::Other(format!("embedding task panicked: {}", e)))?
    }
}

fn apply_sort_key(results: &mut [ProductMatch], key: SortKey) {
    match key {
        SortKey::Cheapest => {
            results.sort_by(|a, b| {
                a.product
                    .price
                    .partial_cmp(&b.product.price)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.product.id.cmp(&b.product.id))
            });
        }
        SortKey::MostExpensive => {
            results.sort_by(|a, b| {
                b.product
                    .price
                    .partial_cmp(&a.product.price)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.product.id.cmp(&b.product.id))
            });
        }
        SortKey::Largest => {
            results.sort_by(|a, b| capacity_order(b.product.capacity_ml, a.product.capacity_ml, &a.product.id, &b.product.id));
        }
        SortKey::Smallest => {
            results.sort_by(|a, b| capacity_order(a.product.capacity_ml, b.product.capacity_ml, &a.product.id, &b.product.id));
        }
    }
}

/// Orders `lhs` before `rhs` (ascending in the caller's intended direction);
/// unknown capacities sort last regardless of direction, per spec.md §4.2.
fn capacity_order(lhs: Option<f64>, rhs: Option<f64>, lhs_id: &str, rhs_id: &str) -> std::cmp::Ordering {
    match (lhs, rhs) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal).then_with(|| lhs_id.cmp(rhs_id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => lhs_id.cmp(rhs_id),
    }
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector.to_vec()
    } else {
        vector.iter().map(|x| x / norm).collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embedder::HashEmbedder;

    fn sample_catalog() -> Catalog {
        let data = [
            r#"{"id":"p1","name":"Steel Tumbler","description":"insulated tumbler keeps drinks cold","price":25.00,"capacity_ml":500,"tags":["tumbler","steel"]}"#,
            r#"{"id":"p2","name":"Budget Bottle","description":"a cheap plastic bottle","price":5.00,"capacity_ml":750,"tags":["bottle","budget"]}"#,
            r#"{"id":"p3","name":"Premium Mug","description":"ceramic mug for coffee","price":40.00,"capacity_ml":null,"tags":["mug","premium"]}"#,
        ]
        .join("\n");
        Catalog::load_from_reader(std::io::Cursor::new(data)).unwrap()
    }

    fn sample_index() -> ProductIndex {
        let catalog = sample_catalog();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder { dim: 64 });
        ProductIndex::build(&catalog, embedder).unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_results_for_nonempty_catalog() {
        let index = sample_index();
        let results = index.search("tumbler", 5).await;
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_search_k_zero_is_empty() {
        let index = sample_index();
        assert!(index.search("tumbler", 0).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_caps_k_at_max() {
        let index = sample_index();
        let results = index.search("tumbler", 1000).await;
        assert!(results.len() <= MAX_K);
    }

    #[tokio::test]
    async fn test_empty_catalog_search_is_empty() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder { dim: 64 });
        let index = ProductIndex::build(&Catalog::empty(), embedder).unwrap();
        assert!(index.search("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_deterministic() {
        let index = sample_index();
        let a = index.search("tumbler", 5).await;
        let b = index.search("tumbler", 5).await;
        let ids_a: Vec<&str> = a.iter().map(|m| m.product.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|m| m.product.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_sort_key_detection_cheapest() {
        assert_eq!(SortKey::detect("cheapest tumbler"), Some(SortKey::Cheapest));
    }

    #[test]
    fn test_sort_key_detection_none() {
        assert_eq!(SortKey::detect("show me tumblers"), None);
    }

    #[tokio::test]
    async fn test_search_sorted_cheapest_is_nondecreasing() {
        let index = sample_index();
        let results = index.search_sorted("drinkware", 5, Some(SortKey::Cheapest)).await;
        let prices: Vec<f64> = results.iter().map(|m| m.product.price).collect();
        for pair in prices.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[tokio::test]
    async fn test_search_sorted_largest_puts_unknown_capacity_last() {
        let index = sample_index();
        let results = index.search_sorted("drinkware", 5, Some(SortKey::Largest)).await;
        let last = results.last().unwrap();
        assert!(last.product.capacity_ml.is_none() || results.iter().all(|m| m.product.capacity_ml.is_some()));
    }
}
