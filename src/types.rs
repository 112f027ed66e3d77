//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::error::{bad_response, ia_err, DataAPIError};

/// A single document, as sent to or returned by the Data API.
///
/// This is a json object. Key order is preserved.
pub type Document = Map<String, Value>;

/// The direction of one sort clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Ascending = 1,
    Descending = -1,
}

/// An ordered sort specification.
///
/// Clauses are applied in the order they were added:
///```
/// # use data_api_rust_sdk::Sort;
/// let sort = Sort::new().asc("lastname").desc("age");
/// assert_eq!(sort.to_value().to_string(), r#"{"lastname":1,"age":-1}"#);
///```
/// A vector sort (`$vector` or `$vectorize`) is normally the only clause of a sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort {
    pub(crate) clauses: Vec<(String, Value)>,
}

impl Sort {
    pub fn new() -> Sort {
        Sort::default()
    }

    pub fn asc(self, field: &str) -> Sort {
        self.by(field, SortMode::Ascending)
    }

    pub fn desc(self, field: &str) -> Sort {
        self.by(field, SortMode::Descending)
    }

    pub fn by(mut self, field: &str, mode: SortMode) -> Sort {
        self.set(field, json!(mode as i32));
        self
    }

    /// Sort by vector similarity to the given vector.
    pub fn vector(mut self, vector: &[f32]) -> Sort {
        self.set("$vector", json!(vector));
        self
    }

    /// Sort by vector similarity to the embedding of the given text,
    /// computed server-side.
    pub fn vectorize(mut self, text: &str) -> Sort {
        self.set("$vectorize", json!(text));
        self
    }

    /// Sort a table column by similarity to the given vector.
    pub fn column_vector(mut self, column: &str, vector: &[f32]) -> Sort {
        self.set(column, json!(vector));
        self
    }

    fn set(&mut self, field: &str, v: Value) {
        if let Some(pos) = self.clauses.iter().position(|(k, _)| k == field) {
            self.clauses[pos].1 = v;
        } else {
            self.clauses.push((field.to_string(), v));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn to_value(&self) -> Value {
        let mut m = Map::new();
        for (k, v) in &self.clauses {
            m.insert(k.clone(), v.clone());
        }
        Value::Object(m)
    }

    /// Build a sort from an existing json object, keeping its key order.
    pub fn from_document(d: &Document) -> Sort {
        Sort {
            clauses: d.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

/// Which fields of the matching documents to return.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Return only these fields (the `_id` field is returned unless excluded).
    Fields(Vec<String>),
    /// A full projection object, e.g. `{"field": 0}` or `{"a": true, "$vector": true}`.
    Map(Document),
}

impl Projection {
    /// Expand into the object form sent to the Data API.
    ///
    /// A list of fields becomes an inclusion map. An empty projection
    /// normalizes to `None`.
    pub fn normalize(&self) -> Option<Document> {
        match self {
            Projection::Fields(f) => {
                if f.is_empty() {
                    return None;
                }
                let mut m = Map::new();
                for field in f {
                    m.insert(field.clone(), Value::Bool(true));
                }
                Some(m)
            }
            Projection::Map(m) => {
                if m.is_empty() {
                    return None;
                }
                Some(m.clone())
            }
        }
    }
}

impl From<Document> for Projection {
    fn from(d: Document) -> Self {
        Projection::Map(d)
    }
}

impl From<Vec<String>> for Projection {
    fn from(v: Vec<String>) -> Self {
        Projection::Fields(v)
    }
}

impl From<&[&str]> for Projection {
    fn from(v: &[&str]) -> Self {
        Projection::Fields(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Projection {
    fn from(v: [&str; N]) -> Self {
        Projection::Fields(v.iter().map(|s| s.to_string()).collect())
    }
}

/// One configuration axis of a `find` command.
#[derive(Debug, Clone, PartialEq)]
pub enum FindOption {
    Filter(Document),
    Projection(Document),
    Sort(Sort),
    Skip(u64),
    Limit(u64),
    PageState(String),
    IncludeSimilarity(bool),
    IncludeSortVector(bool),
}

/// A fully built `find` command.
///
/// Use [`FindCommand::builder()`] to create one. Later options replace
/// earlier options of the same kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindCommand {
    pub(crate) filter: Option<Document>,
    pub(crate) projection: Option<Document>,
    pub(crate) sort: Option<Sort>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) page_state: Option<String>,
    pub(crate) include_similarity: Option<bool>,
    pub(crate) include_sort_vector: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FindCommandBuilder {
    options: Vec<FindOption>,
}

impl FindCommandBuilder {
    pub fn option(mut self, opt: FindOption) -> Self {
        self.options.push(opt);
        self
    }

    pub fn filter(self, filter: Document) -> Self {
        self.option(FindOption::Filter(filter))
    }

    pub fn projection(self, projection: Document) -> Self {
        self.option(FindOption::Projection(projection))
    }

    pub fn sort(self, sort: Sort) -> Self {
        self.option(FindOption::Sort(sort))
    }

    pub fn skip(self, skip: u64) -> Self {
        self.option(FindOption::Skip(skip))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.option(FindOption::Limit(limit))
    }

    pub fn page_state(self, state: &str) -> Self {
        self.option(FindOption::PageState(state.to_string()))
    }

    pub fn include_similarity(self, v: bool) -> Self {
        self.option(FindOption::IncludeSimilarity(v))
    }

    pub fn include_sort_vector(self, v: bool) -> Self {
        self.option(FindOption::IncludeSortVector(v))
    }

    pub fn build(self) -> FindCommand {
        let mut c = FindCommand::default();
        for opt in self.options {
            c.apply(opt);
        }
        c
    }
}

impl FindCommand {
    pub fn builder() -> FindCommandBuilder {
        FindCommandBuilder::default()
    }

    fn apply(&mut self, opt: FindOption) {
        match opt {
            FindOption::Filter(f) => self.filter = Some(f),
            FindOption::Projection(p) => self.projection = Some(p),
            FindOption::Sort(s) => self.sort = Some(s),
            FindOption::Skip(s) => self.skip = Some(s),
            FindOption::Limit(l) => self.limit = Some(l),
            FindOption::PageState(p) => self.page_state = Some(p),
            FindOption::IncludeSimilarity(v) => self.include_similarity = Some(v),
            FindOption::IncludeSortVector(v) => self.include_sort_vector = Some(v),
        }
    }

    /// A copy of this command asking for the page after `page_state`.
    pub fn with_page_state(&self, page_state: &str) -> FindCommand {
        let mut c = self.clone();
        c.page_state = Some(page_state.to_string());
        c
    }

    pub fn filter(&self) -> Option<&Document> {
        self.filter.as_ref()
    }

    pub fn projection(&self) -> Option<&Document> {
        self.projection.as_ref()
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn page_state(&self) -> Option<&str> {
        self.page_state.as_deref()
    }

    /// The json payload of this command:
    /// `{"find": {"filter", "projection", "sort", "options": {...}}}`.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "filter".to_string(),
            Value::Object(self.filter.clone().unwrap_or_default()),
        );
        if let Some(p) = &self.projection {
            body.insert("projection".to_string(), Value::Object(p.clone()));
        }
        if let Some(s) = &self.sort {
            if !s.is_empty() {
                body.insert("sort".to_string(), s.to_value());
            }
        }
        let mut options = Map::new();
        if let Some(s) = self.skip {
            options.insert("skip".to_string(), json!(s));
        }
        if let Some(l) = self.limit {
            options.insert("limit".to_string(), json!(l));
        }
        if let Some(p) = &self.page_state {
            options.insert("pageState".to_string(), json!(p));
        }
        if let Some(v) = self.include_similarity {
            options.insert("includeSimilarity".to_string(), json!(v));
        }
        if let Some(v) = self.include_sort_vector {
            options.insert("includeSortVector".to_string(), json!(v));
        }
        if !options.is_empty() {
            body.insert("options".to_string(), Value::Object(options));
        }
        json!({ "find": body })
    }
}

/// One page of results of a `find` command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindPage {
    pub documents: Vec<Document>,
    /// The continuation token. `None` on the last page.
    pub next_page_state: Option<String>,
    /// The vector used for sorting, if requested with `includeSortVector`.
    pub sort_vector: Option<Value>,
}

impl FindPage {
    pub fn new(documents: Vec<Document>, next_page_state: Option<&str>) -> FindPage {
        FindPage {
            documents,
            next_page_state: next_page_state.map(|s| s.to_string()),
            sort_vector: None,
        }
    }

    /// Decode `{"data": {"documents": [...], "nextPageState": ...}}`.
    pub fn from_response(resp: &Value) -> Result<FindPage, DataAPIError> {
        let data = match resp.get("data") {
            Some(Value::Object(d)) => d,
            _ => {
                return Err(bad_response!(
                    "find response is missing the 'data' object: {}",
                    resp
                ))
            }
        };
        let docs = match data.get("documents") {
            Some(Value::Array(a)) => a,
            _ => {
                return Err(bad_response!(
                    "find response is missing the 'data.documents' array: {}",
                    resp
                ))
            }
        };
        let mut documents = Vec::with_capacity(docs.len());
        for d in docs {
            match d {
                Value::Object(o) => documents.push(o.clone()),
                other => {
                    return Err(bad_response!(
                        "find response contains a non-object document: {}",
                        other
                    ))
                }
            }
        }
        let next_page_state = match data.get("nextPageState") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(bad_response!(
                    "find response has an invalid 'nextPageState': {}",
                    other
                ))
            }
        };
        let sort_vector = resp
            .pointer("/status/sortVector")
            .filter(|v| !v.is_null())
            .cloned();
        Ok(FindPage {
            documents,
            next_page_state,
            sort_vector,
        })
    }
}

/// Encode a timestamp in the extended-json form understood by the Data API.
pub fn ejson_date(dt: &DateTime<Utc>) -> Value {
    json!({ "$date": dt.timestamp_millis() })
}

/// Decode an extended-json `{"$date": <millis>}` value.
pub fn from_ejson_date(v: &Value) -> Result<DateTime<Utc>, DataAPIError> {
    let millis = match v.get("$date").and_then(|d| d.as_i64()) {
        Some(m) => m,
        None => return ia_err!("value is not an extended-json date: {}", v),
    };
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => Ok(dt),
        None => ia_err!("extended-json date out of range: {}", millis),
    }
}

/// A vector of 32-bit floats.
///
/// Vectors can be sent as plain json arrays, or in the more compact binary
/// form produced by [`DataAPIVector::to_binary_ejson()`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataAPIVector(pub Vec<f32>);

impl DataAPIVector {
    /// `{"$binary": "<base64 of the big-endian floats>"}`
    pub fn to_binary_ejson(&self) -> Value {
        let mut bytes = Vec::with_capacity(self.0.len() * 4);
        for f in &self.0 {
            bytes.extend_from_slice(&f.to_be_bytes());
        }
        json!({ "$binary": BASE64_STANDARD.encode(bytes) })
    }

    pub fn from_binary_ejson(v: &Value) -> Result<DataAPIVector, DataAPIError> {
        let b64 = match v.get("$binary").and_then(|b| b.as_str()) {
            Some(s) => s,
            None => return ia_err!("value is not an extended-json binary: {}", v),
        };
        let bytes = match BASE64_STANDARD.decode(b64) {
            Ok(b) => b,
            Err(e) => return ia_err!("invalid base64 in binary vector: {}", e),
        };
        if bytes.len() % 4 != 0 {
            return ia_err!(
                "binary vector length {} is not a multiple of 4",
                bytes.len()
            );
        }
        let floats = bytes
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(DataAPIVector(floats))
    }

    pub fn to_value(&self) -> Value {
        json!(self.0)
    }
}

const FIELD_SEPARATOR: char = '.';
const FIELD_ESCAPE: char = '&';

/// Split a dot-notation field path into its literal segments.
///
/// `&.` stands for a literal dot and `&&` for a literal ampersand.
/// Any other escape sequence, or a trailing `&`, is an error.
pub fn unescape_field_path(path: &str) -> Result<Vec<String>, DataAPIError> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return Ok(segments);
    }
    let mut buffer = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            FIELD_SEPARATOR => {
                segments.push(std::mem::take(&mut buffer));
            }
            FIELD_ESCAPE => match chars.next() {
                Some(e) if e == FIELD_SEPARATOR || e == FIELD_ESCAPE => buffer.push(e),
                Some(e) => {
                    return ia_err!("illegal escape sequence '&{}' in field path '{}'", e, path)
                }
                None => return ia_err!("unterminated escape at end of field path '{}'", path),
            },
            _ => buffer.push(c),
        }
    }
    segments.push(buffer);
    Ok(segments)
}

/// Escape literal segments into a single dot-notation field path.
pub fn escape_field_names<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().replace('&', "&&").replace('.', "&."))
        .collect::<Vec<String>>()
        .join(".")
}
