//! Catalog types and loader
//!
//! The catalog is read once at startup from a line-delimited record stream
//! (one JSON object per line) and never mutated afterward, per spec.md §6.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};

/// A single drinkware catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub capacity_ml: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Product {
    /// Text fed to the embedder: concatenates the fields a semantic query is
    /// likely to match against.
    pub fn searchable_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.tags.join(" "))
    }
}

/// The immutable, loaded-once catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self { products: Vec::new() }
    }

    /// Load from a line-delimited JSON record stream. Blank lines are
    /// skipped. A malformed line or a duplicate id is fatal, per spec.md
    /// §4.2's "failure is fatal" contract for catalog build.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("failed to open catalog file {}: {}", path.display(), e)))?;
        Self::load_from_reader(std::io::BufReader::new(file))
    }

    pub fn load_from_reader(reader: impl BufRead) -> Result<Self> {
        let mut products = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::Io)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let product: Product = serde_json::from_str(line).map_err(|e| {
                Error::Configuration(format!("catalog line {} is not a valid record: {}", lineno + 1, e))
            })?;
            if !seen_ids.insert(product.id.clone()) {
                return Err(Error::Configuration(format!("duplicate product id '{}' at line {}", product.id, lineno + 1)));
            }
            products.push(product);
        }

        Ok(Self { products })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
