//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use serde_json::Value;

/// Struct representing the result of an `insert_one` operation.
#[derive(Default, Debug, Clone)]
pub struct InsertOneResult {
    pub(crate) inserted_id: Value,
    pub(crate) raw_results: Vec<Value>,
}

impl InsertOneResult {
    /// Get the id of the inserted document (or the primary key of the inserted row).
    pub fn inserted_id(&self) -> &Value {
        &self.inserted_id
    }
    /// Get the full responses of the Data API.
    pub fn raw_results(&self) -> &Vec<Value> {
        &self.raw_results
    }
}

/// Struct representing the result of an `insert_many` operation.
#[derive(Default, Debug, Clone)]
pub struct InsertManyResult {
    pub(crate) inserted_ids: Vec<Value>,
    pub(crate) raw_results: Vec<Value>,
}

impl InsertManyResult {
    /// Get the ids of the inserted documents, in insertion order.
    pub fn inserted_ids(&self) -> &Vec<Value> {
        &self.inserted_ids
    }
    /// Get the full responses of the Data API, one per chunk sent.
    pub fn raw_results(&self) -> &Vec<Value> {
        &self.raw_results
    }
}

/// Struct representing the result of an update or replace operation.
#[derive(Default, Debug, Clone)]
pub struct UpdateResult {
    pub(crate) matched_count: u64,
    pub(crate) modified_count: u64,
    pub(crate) upserted_id: Option<Value>,
    pub(crate) raw_results: Vec<Value>,
}

impl UpdateResult {
    pub fn matched_count(&self) -> u64 {
        self.matched_count
    }
    pub fn modified_count(&self) -> u64 {
        self.modified_count
    }
    /// Get the id of the document created, if the operation was an upsert
    /// that matched nothing.
    pub fn upserted_id(&self) -> Option<&Value> {
        self.upserted_id.as_ref()
    }
    pub fn raw_results(&self) -> &Vec<Value> {
        &self.raw_results
    }

    pub(crate) fn merge_status(&mut self, status: Option<&Value>) {
        if let Some(s) = status {
            self.matched_count += s.get("matchedCount").and_then(|v| v.as_u64()).unwrap_or(0);
            self.modified_count += s.get("modifiedCount").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(id) = s.get("upsertedId") {
                self.upserted_id = Some(id.clone());
            }
        }
    }
}

/// Struct representing the result of a delete operation.
#[derive(Default, Debug, Clone)]
pub struct DeleteResult {
    pub(crate) deleted_count: Option<u64>,
    pub(crate) raw_results: Vec<Value>,
}

impl DeleteResult {
    /// Get the number of deleted documents.
    ///
    /// This is `None` when the Data API does not report a count, as happens
    /// when deleting everything with an empty filter.
    pub fn deleted_count(&self) -> Option<u64> {
        self.deleted_count
    }
    pub fn raw_results(&self) -> &Vec<Value> {
        &self.raw_results
    }
}
