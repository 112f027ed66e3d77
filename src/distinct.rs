//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use std::collections::HashSet;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ia_err, DataAPIError};
use crate::types::{escape_field_names, unescape_field_path, Document};

#[derive(Debug, Clone, PartialEq)]
struct KeySegment {
    name: String,
    // set when the segment is also a valid list index
    index: Option<usize>,
}

/// A parsed `distinct` key, such as `"tags"`, `"address.city"` or `"items.0.sku"`.
///
/// Numeric segments select a list item when the value at that level is a list,
/// and a field of that name otherwise. Lists met along the way without a
/// numeric segment are unrolled, as is a list found at the end of the path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DistinctKey {
    segments: Vec<KeySegment>,
}

// "0", "12" are list indexes; "00", "-1", "1a" are not
fn as_list_index(s: &str) -> Option<usize> {
    match s.parse::<usize>() {
        Ok(i) if i.to_string() == s => Some(i),
        _ => None,
    }
}

impl DistinctKey {
    pub(crate) fn parse(key: &str) -> Result<DistinctKey, DataAPIError> {
        let names = unescape_field_path(key)?;
        if names.is_empty() {
            return ia_err!("distinct key cannot be empty");
        }
        if names.iter().any(|n| n.is_empty()) {
            return ia_err!("distinct key '{}' has an empty path segment", key);
        }
        let segments: Vec<KeySegment> = names
            .into_iter()
            .map(|name| KeySegment {
                index: as_list_index(&name),
                name,
            })
            .collect();
        if segments[0].index.is_some() {
            return ia_err!("distinct key '{}' cannot start with a list index", key);
        }
        Ok(DistinctKey { segments })
    }

    /// The longest prefix of the key that is safe to use as a projection:
    /// everything before the first numeric segment.
    pub(crate) fn projection_key(&self) -> String {
        let prefix: Vec<&str> = self
            .segments
            .iter()
            .take_while(|s| s.index.is_none())
            .map(|s| s.name.as_str())
            .collect();
        escape_field_names(&prefix)
    }

    /// Tables only project top-level columns.
    pub(crate) fn column_key(&self) -> String {
        escape_field_names(&[self.segments[0].name.as_str()])
    }

    /// All values found under this key in `doc`, in document order.
    pub(crate) fn extract(&self, doc: &Document) -> Vec<Value> {
        let mut out = Vec::new();
        let first = &self.segments[0];
        if let Some(v) = doc.get(&first.name) {
            extract_into(&self.segments[1..], v, &mut out);
        }
        out
    }
}

fn extract_into(segments: &[KeySegment], value: &Value, out: &mut Vec<Value>) {
    let Some(seg) = segments.first() else {
        match value {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
        return;
    };
    match value {
        Value::Object(m) => {
            if let Some(v) = m.get(&seg.name) {
                extract_into(&segments[1..], v, out);
            }
        }
        Value::Array(items) => match seg.index {
            Some(i) => {
                if let Some(v) = items.get(i) {
                    extract_into(&segments[1..], v, out);
                }
            }
            None => {
                for item in items {
                    extract_into(segments, item, out);
                }
            }
        },
        // path goes deeper than the document
        _ => {}
    }
}

/// Collects distinct values, keeping the order of first appearance.
///
/// Two values are the same if their canonical json (object keys sorted) is
/// the same.
#[derive(Debug, Default)]
pub(crate) struct DistinctCollector {
    seen: HashSet<[u8; 32]>,
    values: Vec<Value>,
}

impl DistinctCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, v: Value) {
        if self.seen.insert(value_hash(&v)) {
            self.values.push(v);
        }
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

pub(crate) fn value_hash(v: &Value) -> [u8; 32] {
    let mut s = String::new();
    write_canonical(v, &mut s);
    Sha256::digest(s.as_bytes()).into()
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Object(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.to_string()).to_string());
                out.push(':');
                if let Some(child) = m.get(k.as_str()) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
