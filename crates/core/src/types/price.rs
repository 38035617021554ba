//! Per-catalog price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Price given to a product the first time it is published into a catalog.
///
/// A placeholder only; the real price arrives through a separate price sync.
pub const PLACEHOLDER_PRICE: Decimal = Decimal::ONE;

/// A product's price within one catalog.
///
/// The API sends numbers, so the amount goes over the wire as a float. Sale
/// price, MSRP and the rest of the price block are carried untouched in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPrice {
    /// ISO 4217 currency code (e.g. "KWD", "AED").
    pub iso_currency_code: String,
    /// List price in the currency's standard unit.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogPrice {
    /// Create a price block.
    #[must_use]
    pub fn new(price: Decimal, iso_currency_code: impl Into<String>) -> Self {
        Self {
            iso_currency_code: iso_currency_code.into(),
            price: Some(price),
            extra: Map::new(),
        }
    }

    /// The [`PLACEHOLDER_PRICE`] in the given currency.
    #[must_use]
    pub fn placeholder(iso_currency_code: impl Into<String>) -> Self {
        Self::new(PLACEHOLDER_PRICE, iso_currency_code)
    }
}
