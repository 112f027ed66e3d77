//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use serde_json::{json, Map, Value};

use crate::error::{ia_err, DataAPIError};
use crate::types::{Document, Projection, Sort};

/// The default number of documents sent in a single `insertMany` command.
pub const DEFAULT_INSERT_MANY_CHUNK_SIZE: usize = 50;

/// Options for [`Collection::find()`](crate::Collection::find()) and [`Table::find()`](crate::Table::find()).
///
/// All of these can also be set on the returned [`Cursor`](crate::Cursor) before it is used.
#[derive(Default, Debug, Clone)]
pub struct FindOptions {
    pub(crate) projection: Option<Projection>,
    pub(crate) sort: Option<Sort>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) prefetched: Option<usize>,
    pub(crate) include_similarity: Option<bool>,
    pub(crate) include_sort_vector: Option<bool>,
    pub(crate) initial_page_state: Option<String>,
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    /// Which fields to return, either as a list of field names or a full projection map.
    pub fn projection<P: Into<Projection>>(mut self, projection: P) -> FindOptions {
        self.projection = Some(projection.into());
        self
    }

    pub fn sort(mut self, sort: Sort) -> FindOptions {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    /// Maximum number of documents returned. A limit of 0 means no limit.
    pub fn limit(mut self, limit: u64) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Fetch pages ahead of time on a background task, keeping up to `depth`
    /// documents ready.
    pub fn prefetched(mut self, depth: usize) -> FindOptions {
        self.prefetched = Some(depth);
        self
    }

    /// Return the similarity score of each document in its `$similarity` field,
    /// for vector searches.
    pub fn include_similarity(mut self, include: bool) -> FindOptions {
        self.include_similarity = Some(include);
        self
    }

    pub fn include_sort_vector(mut self, include: bool) -> FindOptions {
        self.include_sort_vector = Some(include);
        self
    }

    /// Resume from a page state returned by
    /// [`Cursor::fetch_next_page()`](crate::Cursor::fetch_next_page()).
    pub fn initial_page_state(mut self, page_state: &str) -> FindOptions {
        self.initial_page_state = Some(page_state.to_string());
        self
    }
}

/// Whether `find_one_and_*` operations return the document as it was before or after the change.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

/// Options for the `update_*`, `replace_one` and `find_one_and_*` operations.
#[derive(Default, Debug, Clone)]
pub struct UpdateOptions {
    pub(crate) upsert: Option<bool>,
    pub(crate) sort: Option<Sort>,
    pub(crate) projection: Option<Projection>,
    pub(crate) return_document: ReturnDocument,
}

impl UpdateOptions {
    pub fn new() -> UpdateOptions {
        UpdateOptions::default()
    }

    /// Insert a new document if nothing matches the filter.
    pub fn upsert(mut self, upsert: bool) -> UpdateOptions {
        self.upsert = Some(upsert);
        self
    }

    /// Choose which document to modify when several match.
    pub fn sort(mut self, sort: Sort) -> UpdateOptions {
        self.sort = Some(sort);
        self
    }

    /// For `find_one_and_*` only: which fields of the document to return.
    pub fn projection<P: Into<Projection>>(mut self, projection: P) -> UpdateOptions {
        self.projection = Some(projection.into());
        self
    }

    /// For `find_one_and_update` and `find_one_and_replace` only.
    pub fn return_document(mut self, rd: ReturnDocument) -> UpdateOptions {
        self.return_document = rd;
        self
    }

    pub(crate) fn options_value(&self, with_return_document: bool) -> Option<Value> {
        let mut m = Map::new();
        if let Some(u) = self.upsert {
            m.insert("upsert".to_string(), json!(u));
        }
        if with_return_document {
            let rd = match self.return_document {
                ReturnDocument::Before => "before",
                ReturnDocument::After => "after",
            };
            m.insert("returnDocument".to_string(), json!(rd));
        }
        if m.is_empty() {
            None
        } else {
            Some(Value::Object(m))
        }
    }
}

/// Options for `insert_many`.
#[derive(Debug, Clone)]
pub struct InsertManyOptions {
    pub(crate) ordered: bool,
    pub(crate) chunk_size: usize,
}

impl Default for InsertManyOptions {
    fn default() -> Self {
        InsertManyOptions {
            ordered: false,
            chunk_size: DEFAULT_INSERT_MANY_CHUNK_SIZE,
        }
    }
}

impl InsertManyOptions {
    pub fn new() -> InsertManyOptions {
        InsertManyOptions::default()
    }

    /// If true, documents are inserted in order and the operation stops at the first failure.
    pub fn ordered(mut self, ordered: bool) -> InsertManyOptions {
        self.ordered = ordered;
        self
    }

    /// How many documents to send in each `insertMany` command. Default is 50.
    pub fn chunk_size(mut self, size: usize) -> Result<InsertManyOptions, DataAPIError> {
        if size == 0 {
            return ia_err!("insert_many chunk size must be greater than zero");
        }
        self.chunk_size = size;
        Ok(self)
    }
}

/// Turn a filter given as json into a filter document.
///
/// `null` means "no filter".
pub(crate) fn to_filter(filter: Value) -> Result<Option<Document>, DataAPIError> {
    match filter {
        Value::Null => Ok(None),
        Value::Object(m) => Ok(Some(m)),
        other => ia_err!("filter must be a json object, got {}", other),
    }
}

pub(crate) fn to_document(v: Value, what: &str) -> Result<Document, DataAPIError> {
    match v {
        Value::Object(m) => Ok(m),
        other => ia_err!("{} must be a json object, got {}", what, other),
    }
}
