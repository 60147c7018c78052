//! Row mutation requests.
//!
//! A [`WriteRequest`] is immutable once created; the buffer only moves
//! requests around, it never rewrites them.

use crate::{BufferError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered attribute-name to value mapping.
///
/// `serde_json` is built with `preserve_order`, so attributes keep their
/// insertion order and extracted key tuples compare deterministically.
pub type Attributes = serde_json::Map<String, Value>;

/// A single buffered row mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRequest {
    /// Insert or fully replace a row.
    Put { item: Attributes },

    /// Remove a row identified by its key attributes.
    Delete { key: Attributes },
}

impl WriteRequest {
    /// The attribute mapping key values are extracted from: the full item
    /// for a put, the key for a delete.
    pub fn attributes(&self) -> &Attributes {
        match self {
            WriteRequest::Put { item } => item,
            WriteRequest::Delete { key } => key,
        }
    }

    /// Extract the values of the named key attributes, in the order the
    /// names were given.
    ///
    /// Requests are compared for deduplication purely on the extracted
    /// values, never on the variant, so a put can displace a buffered
    /// delete for the same row and vice versa.
    ///
    /// Fails when an attribute is absent: a key spec that does not match
    /// the submitted rows is a caller bug, not a degraded mode.
    pub fn key_values<'a>(&'a self, keys: &[String]) -> Result<Vec<&'a Value>> {
        let attrs = self.attributes();
        keys.iter()
            .map(|name| {
                attrs.get(name).ok_or_else(|| {
                    BufferError::MissingKeyAttribute {
                        attribute: name.clone(),
                    }
                    .into()
                })
            })
            .collect()
    }
}
