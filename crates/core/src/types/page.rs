//! Paged collection envelope.

use serde::{Deserialize, Deserializer, Serialize};

/// One page of a remote collection listing.
///
/// `total_count` is the number of records matching the request's filter, not
/// the size of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub page_count: Option<u32>,
}

impl<T> Page<T> {
    /// Build a page from items and the server-reported total.
    #[must_use]
    pub const fn new(items: Vec<T>, total_count: u64) -> Self {
        Self {
            items,
            total_count,
            page_count: None,
        }
    }
}

/// Some listings send `"items": null` for an empty page.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
