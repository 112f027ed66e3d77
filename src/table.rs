//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::collection::{
    build_cursor, count_from_response, deleted_count, document_from_response, find_one_payload,
    inserted_ids, insert_many_chunks,
};
use crate::cursor::Cursor;
use crate::database::Database;
use crate::descriptors::{
    AlterTableOperation, TableDefinition, TableDescriptor, TableIndexDefinition,
    TableIndexDescriptor, TableIndexOptions, TableVectorIndexOptions,
};
use crate::error::{bad_response, ia_err, DataAPIError};
use crate::handle::Handle;
use crate::options::{to_document, to_filter, FindOptions, InsertManyOptions};
use crate::paginator::PageFetcher;
use crate::results::{DeleteResult, InsertManyResult, InsertOneResult};
use crate::types::{Document, FindCommand, FindPage};

/// A table, with a fixed schema and a primary key.
///
/// Rows are read and written as json objects mapping column names to values.
#[derive(Clone, Debug)]
pub struct Table {
    pub(crate) handle: Handle,
    pub(crate) keyspace: String,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) timeout: Option<Duration>,
}

impl Table {
    pub(crate) fn new(handle: &Handle, keyspace: &str, name: &str) -> Table {
        Table {
            handle: handle.clone(),
            keyspace: keyspace.to_string(),
            name: name.to_string(),
            path: format!("{}/{}", handle.keyspace_path(keyspace), name),
            timeout: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Use a specific timeout for each request sent by this table object.
    pub fn timeout(mut self, t: &Duration) -> Table {
        self.timeout = Some(*t);
        self
    }

    async fn run(&self, payload: &Value) -> Result<Value, DataAPIError> {
        self.handle
            .execute_command(&self.path, payload, &self.timeout)
            .await
    }

    /// Send an arbitrary command to this table and return the raw response.
    pub async fn command(&self, payload: Value) -> Result<Value, DataAPIError> {
        self.run(&payload).await
    }

    /// Find all rows matching `filter`. See [`Collection::find()`](crate::Collection::find()).
    pub fn find(&self, filter: Value, options: FindOptions) -> Result<Cursor, DataAPIError> {
        let source: Arc<dyn PageFetcher> = Arc::new(self.clone());
        Ok(build_cursor(source, filter, options)?.for_table())
    }

    pub async fn find_one(
        &self,
        filter: Value,
        options: FindOptions,
    ) -> Result<Option<Document>, DataAPIError> {
        let payload = find_one_payload(to_filter(filter)?, &options);
        let resp = self.run(&payload).await?;
        document_from_response(&resp)
    }

    /// The distinct values of `key` across the rows matching `filter`.
    ///
    /// Only the column named by the first segment of `key` is read from the Data API.
    pub async fn distinct(&self, key: &str, filter: Value) -> Result<Vec<Value>, DataAPIError> {
        let cursor = self.find(filter, FindOptions::new())?;
        cursor.distinct(key).await
    }

    pub async fn count_documents(&self, filter: Value, upper_bound: u64) -> Result<u64, DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        let resp = self.run(&json!({ "countDocuments": { "filter": f } })).await?;
        count_from_response(&resp, Some(upper_bound))
    }

    /// A fast, approximate row count from the table statistics.
    pub async fn estimated_document_count(&self) -> Result<u64, DataAPIError> {
        let resp = self.run(&json!({ "estimatedDocumentCount": {} })).await?;
        count_from_response(&resp, None)
    }

    /// Insert one row. The returned id is the primary key of the row.
    pub async fn insert_one(&self, row: Value) -> Result<InsertOneResult, DataAPIError> {
        let r = to_document(row, "row")?;
        let resp = self.run(&json!({ "insertOne": { "document": r } })).await?;
        let ids = inserted_ids(&resp)?;
        match ids.into_iter().next() {
            Some(id) => Ok(InsertOneResult {
                inserted_id: id,
                raw_results: vec![resp],
            }),
            None => Err(bad_response!("insertOne returned no primary key: {}", resp)),
        }
    }

    pub async fn insert_many(
        &self,
        rows: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, DataAPIError> {
        insert_many_chunks(rows, &options, |payload| async move { self.run(&payload).await }).await
    }

    /// Update the row matching `filter`, which must name the full primary key.
    ///
    /// The update is an upsert; the Data API reports nothing about it.
    pub async fn update_one(&self, filter: Value, update: Value) -> Result<(), DataAPIError> {
        let f = match to_filter(filter)? {
            Some(f) if !f.is_empty() => f,
            _ => return ia_err!("table update_one requires a filter on the primary key"),
        };
        let u = to_document(update, "update")?;
        self.run(&json!({ "updateOne": { "filter": f, "update": u } })).await?;
        Ok(())
    }

    pub async fn delete_one(&self, filter: Value) -> Result<(), DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        self.run(&json!({ "deleteOne": { "filter": f } })).await?;
        Ok(())
    }

    /// Delete all rows matching `filter`. An empty filter truncates the table.
    pub async fn delete_many(&self, filter: Value) -> Result<DeleteResult, DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        let resp = self.run(&json!({ "deleteMany": { "filter": f } })).await?;
        // tables report no count
        let dc = match resp.pointer("/status/deletedCount") {
            Some(_) => deleted_count(&resp)?,
            None => None,
        };
        Ok(DeleteResult {
            deleted_count: dc,
            raw_results: vec![resp],
        })
    }

    /// Get the definition of this table from the Data API.
    pub async fn definition(&self) -> Result<TableDefinition, DataAPIError> {
        Ok(self.info().await?.definition)
    }

    /// Get the full descriptor of this table, as listed by the Data API.
    pub async fn info(&self) -> Result<TableDescriptor, DataAPIError> {
        let db = Database::new(&self.handle, &self.keyspace);
        for td in db.list_tables().await? {
            if td.name == self.name {
                return Ok(td);
            }
        }
        ia_err!("table {} not found in keyspace {}", self.name, self.keyspace)
    }

    /// Drop this table, with all its rows and indexes.
    pub async fn drop(&self) -> Result<(), DataAPIError> {
        Database::new(&self.handle, &self.keyspace)
            .drop_table(&self.name)
            .await
    }

    /// Create an index on a non-vector column.
    ///
    /// With `if_not_exists`, an existing index of the same name is not an error.
    pub async fn create_index(
        &self,
        name: &str,
        column: &str,
        options: Option<TableIndexOptions>,
        if_not_exists: bool,
    ) -> Result<(), DataAPIError> {
        let definition = TableIndexDefinition::Regular {
            column: column.to_string(),
            options: options.unwrap_or_default(),
        };
        self.create_generic_index("createIndex", name, &definition, if_not_exists)
            .await
    }

    /// Create a vector index on a vector column, enabling similarity searches on it.
    pub async fn create_vector_index(
        &self,
        name: &str,
        column: &str,
        options: TableVectorIndexOptions,
        if_not_exists: bool,
    ) -> Result<(), DataAPIError> {
        let definition = TableIndexDefinition::Vector {
            column: column.to_string(),
            options,
        };
        self.create_generic_index("createVectorIndex", name, &definition, if_not_exists)
            .await
    }

    async fn create_generic_index(
        &self,
        command: &str,
        name: &str,
        definition: &TableIndexDefinition,
        if_not_exists: bool,
    ) -> Result<(), DataAPIError> {
        if name.is_empty() {
            return ia_err!("index name must not be empty");
        }
        if definition.column().map(|c| c.is_empty()).unwrap_or(true) {
            return ia_err!("index {} needs a column", name);
        }
        let mut body = serde_json::Map::new();
        body.insert("name".to_string(), json!(name));
        body.insert("definition".to_string(), definition.to_value());
        body.insert("options".to_string(), json!({ "ifNotExists": if_not_exists }));
        let mut payload = serde_json::Map::new();
        payload.insert(command.to_string(), Value::Object(body));
        debug!("{}({}) on table {}", command, name, self.name);
        let resp = self.run(&Value::Object(payload)).await?;
        check_ok(&resp, command)
    }

    pub async fn list_index_names(&self) -> Result<Vec<String>, DataAPIError> {
        let resp = self.run(&json!({ "listIndexes": { "options": {} } })).await?;
        let mut out = Vec::new();
        for v in index_list(&resp)? {
            match v.as_str() {
                Some(n) => out.push(n.to_string()),
                None => return Err(bad_response!("expected an index name, got {}", v)),
            }
        }
        Ok(out)
    }

    pub async fn list_indexes(&self) -> Result<Vec<TableIndexDescriptor>, DataAPIError> {
        let resp = self
            .run(&json!({ "listIndexes": { "options": { "explain": true } } }))
            .await?;
        let mut out = Vec::new();
        for v in index_list(&resp)? {
            out.push(TableIndexDescriptor::from_value(v)?);
        }
        Ok(out)
    }

    /// Change the schema of this table.
    ///
    /// Returns a new `Table` object for the same table, as existing row
    /// expectations may no longer hold.
    pub async fn alter(&self, operation: AlterTableOperation) -> Result<Table, DataAPIError> {
        debug!("alterTable({}) on table {}", operation.name(), self.name);
        let resp = self
            .run(&json!({ "alterTable": { "operation": operation.to_value() } }))
            .await?;
        check_ok(&resp, "alterTable")?;
        Ok(self.clone())
    }
}

// Schema commands answer {"status": {"ok": 1}}.
fn check_ok(resp: &Value, command: &str) -> Result<(), DataAPIError> {
    match resp.pointer("/status/ok").and_then(|v| v.as_i64()) {
        Some(1) => Ok(()),
        _ => Err(bad_response!("unexpected response to {}: {}", command, resp)),
    }
}

fn index_list(resp: &Value) -> Result<&Vec<Value>, DataAPIError> {
    match resp.pointer("/status/indexes") {
        Some(Value::Array(a)) => Ok(a),
        _ => Err(bad_response!("listIndexes response has no 'status.indexes': {}", resp)),
    }
}

#[async_trait]
impl PageFetcher for Table {
    async fn fetch_page(&self, command: &FindCommand) -> Result<FindPage, DataAPIError> {
        let resp = self.run(&command.to_value()).await?;
        FindPage::from_response(&resp)
    }

    fn address(&self) -> String {
        format!("{}{}", self.handle.inner.api_endpoint, self.path)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
