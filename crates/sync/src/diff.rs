//! Change detection for product records.
//!
//! Two snapshots are equal when they hold the same data regardless of the
//! order of any list: catalog entries, categories, images and nested lists
//! are all compared as multisets.

use std::cmp::Ordering;

use serde_json::Value;
use tenant_clone_core::Product;

/// Serialized form of a product, taken before it is mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Value);

impl Snapshot {
    /// Snapshot a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be serialized.
    pub fn of(product: &Product) -> Result<Self, serde_json::Error> {
        serde_json::to_value(product).map(Self)
    }

    /// Whether `product` differs from this snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be serialized.
    pub fn changed(&self, product: &Product) -> Result<bool, serde_json::Error> {
        Ok(changed(&self.0, &serde_json::to_value(product)?))
    }
}

/// Whether two serialized products differ, ignoring list order.
#[must_use]
pub fn changed(before: &Value, after: &Value) -> bool {
    !deep_equal(&canonicalize(before), &canonicalize(after))
}

/// Sort `productInCatalogs` by `catalogId` so entries line up pairwise.
fn canonicalize(product: &Value) -> Value {
    let mut product = product.clone();
    if let Some(entries) = product
        .get_mut("productInCatalogs")
        .and_then(Value::as_array_mut)
    {
        entries.sort_by(|a, b| {
            let a = a.get("catalogId").and_then(Value::as_i64);
            let b = b.get("catalogId").and_then(Value::as_i64);
            a.cmp(&b)
        });
    }
    product
}

/// Structural equality with lists compared as multisets.
///
/// Objects are walked on an explicit stack. Lining up list elements goes
/// through `canonical_cmp`, which recurses once per level of nested lists.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut stack = vec![(a, b)];
    while let Some((a, b)) = stack.pop() {
        match (a, b) {
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut a: Vec<&Value> = a.iter().collect();
                let mut b: Vec<&Value> = b.iter().collect();
                a.sort_by(|x, y| canonical_cmp(x, y));
                b.sort_by(|x, y| canonical_cmp(x, y));
                stack.extend(a.into_iter().zip(b));
            }
            (Value::Object(a), Value::Object(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                for (key, value) in a {
                    let Some(other) = b.get(key) else {
                        return false;
                    };
                    stack.push((value, other));
                }
            }
            (Value::Number(a), Value::Number(b)) => {
                if !numbers_equal(a, b) {
                    return false;
                }
            }
            (a, b) => {
                if a != b {
                    return false;
                }
            }
        }
    }
    true
}

/// `1` and `1.0` are the same number on the wire.
fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => a == b || a.as_f64() == b.as_f64(),
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used to line up list elements.
///
/// Lists order by length, then by their elements once sorted; objects by
/// size, then sorted keys, then values in key order. Equal values under
/// [`deep_equal`] always compare `Equal`. Sorting the elements of a nested
/// list calls back into this function.
fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    let mut stack = vec![(a, b)];
    while let Some((a, b)) = stack.pop() {
        let ordering = type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                if numbers_equal(a, b) {
                    Ordering::Equal
                } else {
                    a.as_f64()
                        .partial_cmp(&b.as_f64())
                        .unwrap_or(Ordering::Equal)
                }
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()),
            (Value::Object(a), Value::Object(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| sorted_keys(a).cmp(&sorted_keys(b))),
            _ => Ordering::Equal,
        });
        if ordering != Ordering::Equal {
            return ordering;
        }

        // Same shape: compare children, first child on top of the stack
        match (a, b) {
            (Value::Array(a), Value::Array(b)) => {
                let mut a: Vec<&Value> = a.iter().collect();
                let mut b: Vec<&Value> = b.iter().collect();
                a.sort_by(|x, y| canonical_cmp(x, y));
                b.sort_by(|x, y| canonical_cmp(x, y));
                stack.extend(a.into_iter().zip(b).rev());
            }
            (Value::Object(a), Value::Object(b)) => {
                let keys = sorted_keys(a);
                stack.extend(
                    keys.into_iter()
                        .rev()
                        .filter_map(|key| Some((a.get(key)?, b.get(key)?))),
                );
            }
            _ => {}
        }
    }
    Ordering::Equal
}

fn sorted_keys(map: &serde_json::Map<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
