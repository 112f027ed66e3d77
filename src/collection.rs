//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::cursor::Cursor;
use crate::database::Database;
use crate::descriptors::CollectionDescriptor;
use crate::error::{bad_response, ia_err, DataAPIError, DataAPIErrorCode};
use crate::handle::Handle;
use crate::options::{to_document, to_filter, FindOptions, InsertManyOptions, UpdateOptions};
use crate::paginator::PageFetcher;
use crate::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
use crate::types::{Document, FindCommand, FindPage, Sort};

/// A collection of json documents.
///
/// Get one from [`Database::collection()`](crate::Database::collection()). Creating
/// a `Collection` does not contact the Data API; cloning one is cheap.
#[derive(Clone, Debug)]
pub struct Collection {
    pub(crate) handle: Handle,
    pub(crate) keyspace: String,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) timeout: Option<Duration>,
}

impl Collection {
    pub(crate) fn new(handle: &Handle, keyspace: &str, name: &str) -> Collection {
        Collection {
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

    /// Use a specific timeout for each request sent by this collection object.
    pub fn timeout(mut self, t: &Duration) -> Collection {
        self.timeout = Some(*t);
        self
    }

    async fn run(&self, payload: &Value) -> Result<Value, DataAPIError> {
        self.handle
            .execute_command(&self.path, payload, &self.timeout)
            .await
    }

    /// Send an arbitrary command to this collection and return the raw response.
    pub async fn command(&self, payload: Value) -> Result<Value, DataAPIError> {
        self.run(&payload).await
    }

    /// Find all documents matching `filter`.
    ///
    /// This returns a [`Cursor`] in its initial state: no request is made until
    /// the cursor is iterated.
    ///```no_run
    /// # use data_api_rust_sdk::{Handle, FindOptions, Sort};
    /// # use serde_json::json;
    /// # #[tokio::main]
    /// # pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let handle = Handle::builder().from_environment()?.build().await?;
    /// let coll = handle.database().collection("orders");
    /// let mut cursor = coll.find(
    ///     json!({"customer": "c-17"}),
    ///     FindOptions::new()
    ///         .projection(["amount", "date"])
    ///         .sort(Sort::new().desc("date"))
    ///         .limit(10)
    ///         .prefetched(20),
    /// )?;
    /// for doc in cursor.to_list().await? {
    ///     println!("{:?}", doc);
    /// }
    /// # Ok(())
    /// # }
    ///```
    pub fn find(&self, filter: Value, options: FindOptions) -> Result<Cursor, DataAPIError> {
        let source: Arc<dyn PageFetcher> = Arc::new(self.clone());
        build_cursor(source, filter, options)
    }

    /// Find one document, or `None` if nothing matches.
    pub async fn find_one(
        &self,
        filter: Value,
        options: FindOptions,
    ) -> Result<Option<Document>, DataAPIError> {
        let payload = find_one_payload(to_filter(filter)?, &options);
        let resp = self.run(&payload).await?;
        document_from_response(&resp)
    }

    /// The distinct values of `key` across the documents matching `filter`.
    ///
    /// This reads all the matching documents, see [`Cursor::distinct()`].
    pub async fn distinct(&self, key: &str, filter: Value) -> Result<Vec<Value>, DataAPIError> {
        let cursor = self.find(filter, FindOptions::new())?;
        cursor.distinct(key).await
    }

    /// Count the documents matching `filter`.
    ///
    /// Fails with [`TooManyDocumentsToCount`](DataAPIErrorCode::TooManyDocumentsToCount)
    /// if there are more than `upper_bound` matches, or more than the Data API is
    /// willing to count.
    pub async fn count_documents(&self, filter: Value, upper_bound: u64) -> Result<u64, DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        let resp = self.run(&json!({ "countDocuments": { "filter": f } })).await?;
        count_from_response(&resp, Some(upper_bound))
    }

    /// A fast, approximate count of all documents in the collection.
    pub async fn estimated_document_count(&self) -> Result<u64, DataAPIError> {
        let resp = self.run(&json!({ "estimatedDocumentCount": {} })).await?;
        count_from_response(&resp, None)
    }

    /// Get the descriptor of this collection, as listed by the Data API.
    pub async fn info(&self) -> Result<CollectionDescriptor, DataAPIError> {
        let db = Database::new(&self.handle, &self.keyspace);
        for cd in db.list_collections().await? {
            if cd.name == self.name {
                return Ok(cd);
            }
        }
        ia_err!("collection {} not found in keyspace {}", self.name, self.keyspace)
    }

    /// Drop this collection and all its documents.
    pub async fn drop(&self) -> Result<(), DataAPIError> {
        Database::new(&self.handle, &self.keyspace)
            .drop_collection(&self.name)
            .await
    }

    pub async fn insert_one(&self, document: Value) -> Result<InsertOneResult, DataAPIError> {
        let doc = to_document(document, "document")?;
        let resp = self.run(&json!({ "insertOne": { "document": doc } })).await?;
        let ids = inserted_ids(&resp)?;
        match ids.into_iter().next() {
            Some(id) => Ok(InsertOneResult {
                inserted_id: id,
                raw_results: vec![resp],
            }),
            None => Err(bad_response!("insertOne returned no inserted id: {}", resp)),
        }
    }

    /// Insert many documents, in chunks (see [`InsertManyOptions::chunk_size()`]).
    pub async fn insert_many(
        &self,
        documents: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, DataAPIError> {
        insert_many_chunks(documents, &options, |payload| async move { self.run(&payload).await }).await
    }

    pub async fn update_one(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> Result<UpdateResult, DataAPIError> {
        let mut body = Map::new();
        body.insert("filter".to_string(), Value::Object(to_filter(filter)?.unwrap_or_default()));
        body.insert("update".to_string(), Value::Object(to_document(update, "update")?));
        if let Some(s) = &options.sort {
            body.insert("sort".to_string(), s.to_value());
        }
        if let Some(o) = options.options_value(false) {
            body.insert("options".to_string(), o);
        }
        let resp = self.run(&json!({ "updateOne": body })).await?;
        let mut result = UpdateResult::default();
        result.merge_status(resp.get("status"));
        result.raw_results.push(resp);
        Ok(result)
    }

    /// Update all documents matching `filter`.
    ///
    /// The Data API updates a bounded number of documents per command; this
    /// sends as many commands as needed.
    pub async fn update_many(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> Result<UpdateResult, DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        let u = to_document(update, "update")?;
        let mut result = UpdateResult::default();
        let mut page_state: Option<String> = None;
        loop {
            let mut opts = match options.options_value(false) {
                Some(Value::Object(m)) => m,
                _ => Map::new(),
            };
            if let Some(ps) = &page_state {
                opts.insert("pageState".to_string(), json!(ps));
            }
            let mut body = Map::new();
            body.insert("filter".to_string(), Value::Object(f.clone()));
            body.insert("update".to_string(), Value::Object(u.clone()));
            if !opts.is_empty() {
                body.insert("options".to_string(), Value::Object(opts));
            }
            trace!("updateMany on {} page_state={:?}", self.name, page_state);
            let resp = self.run(&json!({ "updateMany": body })).await?;
            result.merge_status(resp.get("status"));
            page_state = resp
                .pointer("/status/nextPageState")
                .and_then(|p| p.as_str())
                .map(|p| p.to_string());
            result.raw_results.push(resp);
            if page_state.is_none() {
                break;
            }
        }
        Ok(result)
    }

    /// Replace one document matching `filter` with `replacement`.
    pub async fn replace_one(
        &self,
        filter: Value,
        replacement: Value,
        options: UpdateOptions,
    ) -> Result<UpdateResult, DataAPIError> {
        let mut body = Map::new();
        body.insert("filter".to_string(), Value::Object(to_filter(filter)?.unwrap_or_default()));
        body.insert("replacement".to_string(), Value::Object(to_document(replacement, "replacement")?));
        body.insert("projection".to_string(), json!({ "*": false }));
        if let Some(s) = &options.sort {
            body.insert("sort".to_string(), s.to_value());
        }
        if let Some(o) = options.options_value(false) {
            body.insert("options".to_string(), o);
        }
        let resp = self.run(&json!({ "findOneAndReplace": body })).await?;
        let mut result = UpdateResult::default();
        result.merge_status(resp.get("status"));
        result.raw_results.push(resp);
        Ok(result)
    }

    pub async fn delete_one(&self, filter: Value, sort: Option<Sort>) -> Result<DeleteResult, DataAPIError> {
        let mut body = Map::new();
        body.insert("filter".to_string(), Value::Object(to_filter(filter)?.unwrap_or_default()));
        if let Some(s) = sort {
            body.insert("sort".to_string(), s.to_value());
        }
        let resp = self.run(&json!({ "deleteOne": body })).await?;
        Ok(DeleteResult {
            deleted_count: deleted_count(&resp)?,
            raw_results: vec![resp],
        })
    }

    /// Delete all documents matching `filter`.
    ///
    /// The Data API deletes a bounded number of documents per command; this
    /// repeats the command while the Data API reports more matches.
    pub async fn delete_many(&self, filter: Value) -> Result<DeleteResult, DataAPIError> {
        let f = to_filter(filter)?.unwrap_or_default();
        let payload = json!({ "deleteMany": { "filter": f } });
        let mut result = DeleteResult::default();
        debug!("starting delete_many on {}", self.name);
        loop {
            let resp = self.run(&payload).await?;
            let dc = deleted_count(&resp)?;
            let more = resp
                .pointer("/status/moreData")
                .and_then(|m| m.as_bool())
                .unwrap_or(false);
            result.deleted_count = match (result.deleted_count, dc) {
                (Some(a), Some(b)) => Some(a + b),
                (None, Some(b)) if result.raw_results.is_empty() => Some(b),
                _ => None,
            };
            result.raw_results.push(resp);
            if !more {
                break;
            }
        }
        debug!("finished delete_many on {}", self.name);
        Ok(result)
    }

    /// Update one document and return it, as it was before (the default) or after the update.
    pub async fn find_one_and_update(
        &self,
        filter: Value,
        update: Value,
        options: UpdateOptions,
    ) -> Result<Option<Document>, DataAPIError> {
        let u = to_document(update, "update")?;
        let payload = find_one_and_payload("findOneAndUpdate", to_filter(filter)?, Some(("update", u)), &options, true);
        let resp = self.run(&payload).await?;
        document_from_response(&resp)
    }

    /// Replace one document and return it, as it was before (the default) or after the replacement.
    pub async fn find_one_and_replace(
        &self,
        filter: Value,
        replacement: Value,
        options: UpdateOptions,
    ) -> Result<Option<Document>, DataAPIError> {
        let r = to_document(replacement, "replacement")?;
        let payload = find_one_and_payload("findOneAndReplace", to_filter(filter)?, Some(("replacement", r)), &options, true);
        let resp = self.run(&payload).await?;
        document_from_response(&resp)
    }

    /// Delete one document and return it.
    pub async fn find_one_and_delete(
        &self,
        filter: Value,
        options: UpdateOptions,
    ) -> Result<Option<Document>, DataAPIError> {
        let payload = find_one_and_payload("findOneAndDelete", to_filter(filter)?, None, &options, false);
        let resp = self.run(&payload).await?;
        document_from_response(&resp)
    }
}

#[async_trait]
impl PageFetcher for Collection {
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

pub(crate) fn build_cursor(
    source: Arc<dyn PageFetcher>,
    filter: Value,
    options: FindOptions,
) -> Result<Cursor, DataAPIError> {
    let mut cursor = Cursor::new(source, to_filter(filter)?);
    if let Some(p) = options.projection {
        cursor.projection(p)?;
    }
    if let Some(s) = options.sort {
        cursor.sort(s)?;
    }
    if let Some(s) = options.skip {
        cursor.skip(s)?;
    }
    if let Some(l) = options.limit {
        cursor.limit(l)?;
    }
    if let Some(p) = options.prefetched {
        cursor.prefetched(p)?;
    }
    if let Some(v) = options.include_similarity {
        cursor.include_similarity(v)?;
    }
    if let Some(v) = options.include_sort_vector {
        cursor.include_sort_vector(v)?;
    }
    if let Some(ps) = options.initial_page_state {
        cursor.initial_page_state(&ps)?;
    }
    Ok(cursor)
}

pub(crate) fn find_one_payload(filter: Option<Document>, options: &FindOptions) -> Value {
    let mut body = Map::new();
    body.insert("filter".to_string(), Value::Object(filter.unwrap_or_default()));
    if let Some(p) = options.projection.as_ref().and_then(|p| p.normalize()) {
        body.insert("projection".to_string(), Value::Object(p));
    }
    if let Some(s) = &options.sort {
        if !s.is_empty() {
            body.insert("sort".to_string(), s.to_value());
        }
    }
    let mut opts = Map::new();
    if let Some(v) = options.include_similarity {
        opts.insert("includeSimilarity".to_string(), json!(v));
    }
    if let Some(v) = options.include_sort_vector {
        opts.insert("includeSortVector".to_string(), json!(v));
    }
    if !opts.is_empty() {
        body.insert("options".to_string(), Value::Object(opts));
    }
    json!({ "findOne": body })
}

fn find_one_and_payload(
    command: &str,
    filter: Option<Document>,
    change: Option<(&str, Document)>,
    options: &UpdateOptions,
    with_return_document: bool,
) -> Value {
    let mut body = Map::new();
    body.insert("filter".to_string(), Value::Object(filter.unwrap_or_default()));
    if let Some((k, d)) = change {
        body.insert(k.to_string(), Value::Object(d));
    }
    if let Some(p) = options.projection.as_ref().and_then(|p| p.normalize()) {
        body.insert("projection".to_string(), Value::Object(p));
    }
    if let Some(s) = &options.sort {
        body.insert("sort".to_string(), s.to_value());
    }
    if let Some(o) = options.options_value(with_return_document) {
        body.insert("options".to_string(), o);
    }
    let mut cmd = Map::new();
    cmd.insert(command.to_string(), Value::Object(body));
    Value::Object(cmd)
}

// `data.document` may be absent or null when nothing matched.
pub(crate) fn document_from_response(resp: &Value) -> Result<Option<Document>, DataAPIError> {
    match resp.pointer("/data/document") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(d)) => Ok(Some(d.clone())),
        Some(other) => Err(bad_response!("invalid document in response: {}", other)),
    }
}

pub(crate) fn count_from_response(resp: &Value, upper_bound: Option<u64>) -> Result<u64, DataAPIError> {
    let count = match resp.pointer("/status/count").and_then(|c| c.as_u64()) {
        Some(c) => c,
        None => return Err(bad_response!("count response has no 'status.count': {}", resp)),
    };
    let more = resp
        .pointer("/status/moreData")
        .and_then(|m| m.as_bool())
        .unwrap_or(false);
    if more {
        return Err(DataAPIError::new(
            DataAPIErrorCode::TooManyDocumentsToCount,
            &format!("document count exceeds {}, the maximum allowed by the server", count),
        ));
    }
    if let Some(ub) = upper_bound {
        if count > ub {
            return Err(DataAPIError::new(
                DataAPIErrorCode::TooManyDocumentsToCount,
                &format!("document count exceeds the required upper bound {}", ub),
            ));
        }
    }
    Ok(count)
}

pub(crate) fn inserted_ids(resp: &Value) -> Result<Vec<Value>, DataAPIError> {
    match resp.pointer("/status/insertedIds") {
        Some(Value::Array(a)) => Ok(a.clone()),
        _ => Err(bad_response!("insert response has no 'status.insertedIds': {}", resp)),
    }
}

// A negative count (deleting with an empty filter) means "unknown".
pub(crate) fn deleted_count(resp: &Value) -> Result<Option<u64>, DataAPIError> {
    match resp.pointer("/status/deletedCount") {
        Some(v) => match v.as_i64() {
            Some(c) if c >= 0 => Ok(Some(c as u64)),
            Some(_) => Ok(None),
            None => Err(bad_response!("invalid 'status.deletedCount': {}", v)),
        },
        None => Err(bad_response!("delete response has no 'status.deletedCount': {}", resp)),
    }
}

pub(crate) async fn insert_many_chunks<F, Fut>(
    documents: Vec<Value>,
    options: &InsertManyOptions,
    mut send: F,
) -> Result<InsertManyResult, DataAPIError>
where
    F: FnMut(Value) -> Fut,
    Fut: std::future::Future<Output = Result<Value, DataAPIError>>,
{
    let mut docs = Vec::with_capacity(documents.len());
    for d in documents {
        docs.push(Value::Object(to_document(d, "document")?));
    }
    let mut result = InsertManyResult::default();
    for chunk in docs.chunks(options.chunk_size) {
        let payload = json!({
            "insertMany": {
                "documents": chunk,
                "options": { "ordered": options.ordered },
            }
        });
        let resp = send(payload).await?;
        result.inserted_ids.extend(inserted_ids(&resp)?);
        result.raw_results.push(resp);
    }
    Ok(result)
}
