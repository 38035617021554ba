//! Catalog category records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CategoryId;

/// A category scoped to one catalog.
///
/// `id` is catalog-local; `category_code` is the stable identifier shared by
/// "the same" category across catalogs. A category about to be created has no
/// id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_category_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<CategoryId>,
    /// Fields not modelled here (content, sequence, visibility, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    /// Category code, if the category has one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.category_code.as_deref()
    }

    /// Parent category code, if the category is not a root.
    #[must_use]
    pub fn parent_code(&self) -> Option<&str> {
        self.parent_category_code.as_deref()
    }
}
