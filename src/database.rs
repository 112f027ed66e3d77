//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::collection::Collection;
use crate::descriptors::{CollectionDescriptor, TableDefinition, TableDescriptor};
use crate::error::{bad_response, ia_err, DataAPIError};
use crate::handle::Handle;
use crate::table::Table;
use crate::types::Document;

/// A keyspace of a database, holding collections and tables.
///
/// Get one from [`Handle::database()`] or [`Handle::database_with_keyspace()`].
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) handle: Handle,
    pub(crate) keyspace: String,
    pub(crate) path: String,
}

impl Database {
    pub(crate) fn new(handle: &Handle, keyspace: &str) -> Database {
        Database {
            handle: handle.clone(),
            keyspace: keyspace.to_string(),
            path: handle.keyspace_path(keyspace),
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Get a [`Collection`] object. This does not check that the collection exists.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(&self.handle, &self.keyspace, name)
    }

    /// Get a [`Table`] object. This does not check that the table exists.
    pub fn table(&self, name: &str) -> Table {
        Table::new(&self.handle, &self.keyspace, name)
    }

    /// Send an arbitrary keyspace-level command and return the raw response.
    pub async fn command(&self, payload: Value) -> Result<Value, DataAPIError> {
        self.handle.execute_command(&self.path, &payload, &None).await
    }

    /// Create a collection.
    ///
    /// `options` is passed as-is as the `options` of the `createCollection` command,
    /// for example `{"vector": {"dimension": 5, "metric": "cosine"}}`.
    pub async fn create_collection(
        &self,
        name: &str,
        options: Option<Document>,
    ) -> Result<Collection, DataAPIError> {
        if name.is_empty() {
            return ia_err!("collection name must not be empty");
        }
        let mut body = Map::new();
        body.insert("name".to_string(), json!(name));
        if let Some(o) = options {
            if !o.is_empty() {
                body.insert("options".to_string(), Value::Object(o));
            }
        }
        debug!("creating collection {} in {}", name, self.keyspace);
        self.command(json!({ "createCollection": body })).await?;
        Ok(self.collection(name))
    }

    pub async fn list_collection_names(&self) -> Result<Vec<String>, DataAPIError> {
        let resp = self.command(json!({ "findCollections": {} })).await?;
        string_list(&resp, "/status/collections")
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionDescriptor>, DataAPIError> {
        let resp = self
            .command(json!({ "findCollections": { "options": { "explain": true } } }))
            .await?;
        let mut out = Vec::new();
        for c in value_list(&resp, "/status/collections")? {
            out.push(CollectionDescriptor::from_value(c)?);
        }
        Ok(out)
    }

    pub async fn drop_collection(&self, name: &str) -> Result<(), DataAPIError> {
        self.command(json!({ "deleteCollection": { "name": name } })).await?;
        Ok(())
    }

    /// Create a table. With `if_not_exists`, an existing table of the same name is not an error.
    pub async fn create_table(
        &self,
        name: &str,
        definition: &TableDefinition,
        if_not_exists: bool,
    ) -> Result<Table, DataAPIError> {
        if name.is_empty() {
            return ia_err!("table name must not be empty");
        }
        if definition.primary_key.partition_by.is_empty() {
            return ia_err!("table {} needs at least one partitionBy column", name);
        }
        let payload = json!({
            "createTable": {
                "name": name,
                "definition": definition.to_value(),
                "options": { "ifNotExists": if_not_exists },
            }
        });
        debug!("creating table {} in {}", name, self.keyspace);
        self.command(payload).await?;
        Ok(self.table(name))
    }

    pub async fn list_table_names(&self) -> Result<Vec<String>, DataAPIError> {
        let resp = self.command(json!({ "listTables": {} })).await?;
        string_list(&resp, "/status/tables")
    }

    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>, DataAPIError> {
        let resp = self
            .command(json!({ "listTables": { "options": { "explain": true } } }))
            .await?;
        let mut out = Vec::new();
        for t in value_list(&resp, "/status/tables")? {
            out.push(TableDescriptor::from_value(t)?);
        }
        Ok(out)
    }

    pub async fn drop_table(&self, name: &str) -> Result<(), DataAPIError> {
        self.command(json!({ "dropTable": { "name": name } })).await?;
        Ok(())
    }
}

fn string_list(resp: &Value, pointer: &str) -> Result<Vec<String>, DataAPIError> {
    let mut out = Vec::new();
    for v in value_list(resp, pointer)? {
        match v.as_str() {
            Some(s) => out.push(s.to_string()),
            None => return Err(bad_response!("expected a name at '{}', got {}", pointer, v)),
        }
    }
    Ok(out)
}

fn value_list<'a>(resp: &'a Value, pointer: &str) -> Result<&'a Vec<Value>, DataAPIError> {
    match resp.pointer(pointer) {
        Some(Value::Array(a)) => Ok(a),
        _ => Err(bad_response!("response has no '{}' list: {}", pointer, resp)),
    }
}
