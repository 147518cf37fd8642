//! Product catalog loaded at startup.
//!
//! The catalog is a JSON array of products with prices as decimal strings:
//!
//! ```json
//! [{ "id": "tee", "name": "Tee", "price": "19.99" }]
//! ```
//!
//! Without a configured path the catalog is empty.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use thiserror::Error;
use tillpoint_core::{Product, ProductId};

/// Errors that can occur when loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate product id: {0}")]
    DuplicateId(ProductId),

    #[error("Negative price for product {0}")]
    NegativePrice(ProductId),
}

/// Products available for sale, in file order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and negative prices.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on the first invalid product.
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter().enumerate() {
            if product.price < Decimal::ZERO {
                return Err(CatalogError::NegativePrice(product.id.clone()));
            }
            if index.insert(product.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(product.id.clone()));
            }
        }
        Ok(Self { products, index })
    }

    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the JSON is malformed or a product is invalid.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Load the catalog from `path`, or an empty catalog when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let Some(path) = path else {
            tracing::warn!("No catalog configured; starting with an empty catalog");
            return Ok(Self::default());
        };

        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), products = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.index.get(id).and_then(|&i| self.products.get(i))
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
