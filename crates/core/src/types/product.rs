//! Product records and their per-catalog projections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CatalogId, CatalogPrice, CategoryId};

/// A product as returned by the catalog admin API.
///
/// Identity is `product_code`. `product_sequence` is assigned monotonically by
/// the platform and is what the sequence cursor walks on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_code: String,
    pub product_sequence: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_in_catalogs: Vec<ProductInCatalog>,
    /// Fields not modelled here (options, properties, content, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// The product's entry in `catalog_id`, if it has one.
    #[must_use]
    pub fn catalog_entry(&self, catalog_id: CatalogId) -> Option<&ProductInCatalog> {
        self.product_in_catalogs
            .iter()
            .find(|entry| entry.catalog_id == catalog_id)
    }

    /// Position of the product's entry in `catalog_id`, if it has one.
    #[must_use]
    pub fn catalog_entry_index(&self, catalog_id: CatalogId) -> Option<usize> {
        self.product_in_catalogs
            .iter()
            .position(|entry| entry.catalog_id == catalog_id)
    }
}

/// A product's projection into one catalog ("PIC").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInCatalog {
    pub catalog_id: CatalogId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ProductContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<CatalogPrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_categories: Option<Vec<CategoryRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_product_category: Option<CategoryRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductInCatalog {
    /// Ids of the categories this entry is linked to, in list order.
    #[must_use]
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.product_categories
            .iter()
            .flatten()
            .map(|category| category.category_id)
            .collect()
    }

    /// Id of the primary category, if set.
    #[must_use]
    pub fn primary_category_id(&self) -> Option<CategoryId> {
        self.primary_product_category
            .as_ref()
            .map(|category| category.category_id)
    }

    /// Number of product images in this entry's content (0 when absent).
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.content
            .as_ref()
            .and_then(|content| content.product_images.as_ref())
            .map_or(0, Vec::len)
    }
}

/// Localized content of a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_images: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A link from a catalog entry to a category of the same catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub category_id: CategoryId,
}

impl CategoryRef {
    /// Create a category link.
    #[must_use]
    pub const fn new(category_id: CategoryId) -> Self {
        Self { category_id }
    }
}

impl From<CategoryId> for CategoryRef {
    fn from(category_id: CategoryId) -> Self {
        Self::new(category_id)
    }
}
