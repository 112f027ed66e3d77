//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::distinct::{DistinctCollector, DistinctKey};
use crate::error::{usage_err, DataAPIError, DataAPIErrorCode};
use crate::paginator::{PageFetcher, Paginator};
use crate::types::{Document, FindCommand, FindPage, Projection, Sort};

static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

/// The lifecycle of a [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// The query has not been sent yet and can still be changed.
    New,
    /// Documents are being returned.
    Running,
    /// All matching documents have been returned.
    Exhausted,
    /// [`Cursor::close()`] was called.
    Closed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CursorState::New => "new",
            CursorState::Running => "running",
            CursorState::Exhausted => "exhausted",
            CursorState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// A lazy, forward-only iteration over the documents matching a `find`.
///
/// Cursors are returned by [`Collection::find()`](crate::Collection::find()) and
/// [`Table::find()`](crate::Table::find()). Nothing is sent to the Data API until the
/// first call to [`next()`](Cursor::next()); until then the query can be refined:
///```no_run
/// # use data_api_rust_sdk::{Handle, FindOptions, Sort};
/// # use serde_json::json;
/// # #[tokio::main]
/// # pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let handle = Handle::builder().from_environment()?.build().await?;
/// let coll = handle.database().collection("users");
/// let mut cursor = coll.find(json!({"status": "active"}), FindOptions::new())?;
/// cursor.sort(Sort::new().asc("lastname"))?.limit(20)?;
/// while let Some(doc) = cursor.next().await? {
///     println!("{:?}", doc);
/// }
/// # Ok(())
/// # }
///```
/// Once the first document has been returned, the query can no longer be changed.
///
/// If the cursor was created with a prefetch depth, pages after the first one are
/// fetched by a background task. That task is stopped by [`close()`](Cursor::close()),
/// or when the cursor is dropped. Prefer calling `close().await` when finished
/// with a cursor before reaching the end of its results, as it also waits for
/// the task to exit.
#[derive(Debug)]
pub struct Cursor {
    source: Arc<dyn PageFetcher>,
    filter: Option<Document>,
    projection: Option<Document>,
    sort: Option<Sort>,
    skip: Option<u64>,
    limit: Option<u64>,
    include_similarity: Option<bool>,
    include_sort_vector: Option<bool>,
    prefetched: Option<usize>,
    initial_page_state: Option<String>,
    table: bool,
    state: CursorState,
    started: bool,
    retrieved: u64,
    paginator: Option<Paginator>,
    cursor_id: u64,
}

impl Cursor {
    pub(crate) fn new(source: Arc<dyn PageFetcher>, filter: Option<Document>) -> Cursor {
        Cursor {
            source,
            filter,
            projection: None,
            sort: None,
            skip: None,
            limit: None,
            include_similarity: None,
            include_sort_vector: None,
            prefetched: None,
            initial_page_state: None,
            table: false,
            state: CursorState::New,
            started: false,
            retrieved: 0,
            paginator: None,
            cursor_id: NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A cursor reading its pages from `source`, with the given filter.
    ///
    /// [`Collection::find()`](crate::Collection::find()) and
    /// [`Table::find()`](crate::Table::find()) are the usual way to get a cursor;
    /// this is for other implementations of [`PageFetcher`].
    pub fn from_source(source: Arc<dyn PageFetcher>, filter: Option<Document>) -> Cursor {
        Cursor::new(source, filter)
    }

    pub(crate) fn for_table(mut self) -> Cursor {
        self.table = true;
        self
    }

    fn ensure_new(&self, what: &str) -> Result<(), DataAPIError> {
        match self.state {
            CursorState::New => Ok(()),
            CursorState::Running | CursorState::Exhausted => {
                usage_err!("cannot set {} on a cursor that has already been used", what)
            }
            CursorState::Closed => usage_err!("cannot set {} on a closed cursor", what),
        }
    }

    /// Replace the filter. An empty filter matches everything.
    pub fn filter(&mut self, filter: Document) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("filter")?;
        self.filter = Some(filter);
        Ok(self)
    }

    pub fn projection<P: Into<Projection>>(&mut self, projection: P) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("projection")?;
        self.projection = projection.into().normalize();
        Ok(self)
    }

    pub fn sort(&mut self, sort: Sort) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("sort")?;
        self.sort = if sort.is_empty() { None } else { Some(sort) };
        Ok(self)
    }

    pub fn skip(&mut self, skip: u64) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("skip")?;
        self.skip = Some(skip);
        Ok(self)
    }

    /// Return at most `limit` documents.
    ///
    /// Note that `limit(0)` removes the limit: the cursor returns all matching
    /// documents, not none of them.
    pub fn limit(&mut self, limit: u64) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("limit")?;
        self.limit = if limit == 0 { None } else { Some(limit) };
        Ok(self)
    }

    /// Fetch pages in the background, keeping up to `depth` documents ready.
    /// A depth of 0 disables prefetching.
    pub fn prefetched(&mut self, depth: usize) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("prefetched")?;
        self.prefetched = if depth == 0 { None } else { Some(depth) };
        Ok(self)
    }

    pub fn include_similarity(&mut self, include: bool) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("include_similarity")?;
        self.include_similarity = Some(include);
        Ok(self)
    }

    pub fn include_sort_vector(&mut self, include: bool) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("include_sort_vector")?;
        self.include_sort_vector = Some(include);
        Ok(self)
    }

    /// Start from a page of an earlier query, as given by
    /// [`FindPage::next_page_state`] from [`fetch_next_page()`](Cursor::fetch_next_page()).
    ///
    /// The earlier query must have had the same filter, sort and projection.
    pub fn initial_page_state(&mut self, page_state: &str) -> Result<&mut Self, DataAPIError> {
        self.ensure_new("initial_page_state")?;
        if page_state.is_empty() {
            return usage_err!("initial page state must not be empty");
        }
        self.initial_page_state = Some(page_state.to_string());
        Ok(self)
    }

    /// Restrict the cursor to a range of positions, like `cursor[a..b]`.
    ///
    /// This sets skip and limit on this cursor. Only a step of 1 is supported.
    ///
    /// An empty range such as `5..5` is rejected with a usage error rather than
    /// being turned into `limit(0)`, which would return every document after the
    /// start instead of none.
    pub fn slice<R: RangeBounds<u64>>(
        &mut self,
        range: R,
        step: Option<u64>,
    ) -> Result<&mut Self, DataAPIError> {
        if let Some(s) = step {
            if s != 1 {
                return usage_err!("cursor slicing only supports a step of 1, got {}", s);
            }
        }
        self.ensure_new("slice")?;
        let start = match range.start_bound() {
            Bound::Included(s) => *s,
            Bound::Excluded(s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(e) => Some(e.saturating_add(1)),
            Bound::Excluded(e) => Some(*e),
            Bound::Unbounded => None,
        };
        if let Some(stop) = stop {
            if stop <= start {
                return usage_err!("cannot slice a cursor with an empty range {}..{}", start, stop);
            }
        }
        self.skip = Some(start);
        self.limit = stop.map(|s| s - start);
        Ok(self)
    }

    /// The state of the cursor.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// False once the cursor is exhausted or closed.
    pub fn alive(&self) -> bool {
        matches!(self.state, CursorState::New | CursorState::Running)
    }

    /// True once the query has been sent. A cursor closed before its
    /// first `next()` was never started.
    pub fn started(&self) -> bool {
        self.started
    }

    /// The number of documents returned so far.
    pub fn retrieved(&self) -> u64 {
        self.retrieved
    }

    /// The url of the collection or table this cursor reads from.
    pub fn address(&self) -> String {
        self.source.address()
    }

    /// A process-unique identifier of this cursor.
    pub fn cursor_id(&self) -> u64 {
        self.cursor_id
    }

    /// The name of the collection or table this cursor reads from.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The vector used for sorting, when requested with
    /// [`include_sort_vector()`](Cursor::include_sort_vector()) and after
    /// the first document has been fetched.
    pub fn sort_vector(&self) -> Option<&Value> {
        self.paginator.as_ref().and_then(|p| p.sort_vector())
    }

    /// The number of documents fetched but not yet returned. Never sends a request.
    pub fn buffered_count(&self) -> usize {
        match &self.paginator {
            Some(p) => p.buffered_count(),
            None => 0,
        }
    }

    pub(crate) fn to_command(&self) -> FindCommand {
        let mut b = FindCommand::builder();
        if let Some(f) = &self.filter {
            b = b.filter(f.clone());
        }
        if let Some(p) = &self.projection {
            b = b.projection(p.clone());
        }
        if let Some(s) = &self.sort {
            b = b.sort(s.clone());
        }
        if let Some(s) = self.skip {
            b = b.skip(s);
        }
        if let Some(l) = self.limit {
            b = b.limit(l);
        }
        if let Some(v) = self.include_similarity {
            b = b.include_similarity(v);
        }
        if let Some(v) = self.include_sort_vector {
            b = b.include_sort_vector(v);
        }
        b.build()
    }

    // Create the paginator on first use. The query is frozen from here on.
    fn start(&mut self, prefetch: bool) {
        if self.state != CursorState::New {
            return;
        }
        debug!("starting cursor {} on {}", self.cursor_id, self.source.name());
        self.paginator = Some(
            Paginator::new(
                self.source.clone(),
                self.to_command(),
                self.limit,
                if prefetch { self.prefetched } else { None },
            )
            .starting_at(self.initial_page_state.clone()),
        );
        self.state = CursorState::Running;
        self.started = true;
    }

    async fn fail(&mut self, e: DataAPIError) -> DataAPIError {
        self.state = CursorState::Exhausted;
        if let Some(p) = &mut self.paginator {
            p.close().await;
        }
        e
    }

    /// Return the next document, or `None` when there are no more.
    ///
    /// The first call sends the query. An error fetching a page is returned
    /// once, after which the cursor is exhausted.
    pub async fn next(&mut self) -> Result<Option<Document>, DataAPIError> {
        if !self.alive() {
            return Ok(None);
        }
        self.start(true);
        let result = match &mut self.paginator {
            Some(p) => p.next().await,
            None => Ok(None),
        };
        match result {
            Ok(Some(d)) => {
                self.retrieved += 1;
                Ok(Some(d))
            }
            Ok(None) => {
                trace!("cursor {} exhausted after {} documents", self.cursor_id, self.retrieved);
                self.state = CursorState::Exhausted;
                Ok(None)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// True if [`next()`](Cursor::next()) would return a document.
    ///
    /// On a new cursor this sends the query, after which the query can no longer
    /// be changed. Nothing is consumed. Always false on an exhausted or closed cursor.
    pub async fn has_next(&mut self) -> Result<bool, DataAPIError> {
        if !self.alive() {
            return Ok(false);
        }
        self.start(true);
        let result = match &mut self.paginator {
            Some(p) => p.has_next().await,
            None => Ok(false),
        };
        match result {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Take up to `n` documents (all, if `None`) from those already fetched.
    ///
    /// Never sends a request; returns an empty list on a cursor that holds nothing.
    /// The documents count as returned: iteration carries on after them.
    pub fn consume_buffer(&mut self, n: Option<usize>) -> Vec<Document> {
        let docs = match &mut self.paginator {
            Some(p) => p.consume_buffer(n),
            None => Vec::new(),
        };
        self.retrieved += docs.len() as u64;
        docs
    }

    /// Fetch one whole page of results.
    ///
    /// This is for callers that page explicitly: pass the returned
    /// [`next_page_state`](FindPage::next_page_state) to
    /// [`initial_page_state()`](Cursor::initial_page_state()) on a fresh cursor
    /// to get the following page later. It cannot be mixed with `next()` on
    /// the same cursor, and no prefetching takes place. On an exhausted cursor
    /// this returns an empty page.
    ///```no_run
    /// # use data_api_rust_sdk::{Handle, FindOptions};
    /// # use serde_json::json;
    /// # #[tokio::main]
    /// # pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let handle = Handle::builder().from_environment()?.build().await?;
    /// let coll = handle.database().collection("users");
    /// let page = coll.find(json!({}), FindOptions::new())?.fetch_next_page().await?;
    /// if let Some(state) = page.next_page_state {
    ///     let mut later = coll.find(json!({}), FindOptions::new())?;
    ///     later.initial_page_state(&state)?;
    ///     let second = later.fetch_next_page().await?;
    ///     println!("{} more", second.documents.len());
    /// }
    /// # Ok(())
    /// # }
    ///```
    pub async fn fetch_next_page(&mut self) -> Result<FindPage, DataAPIError> {
        match self.state {
            CursorState::Closed => return usage_err!("cannot fetch a page from a closed cursor"),
            CursorState::Exhausted => return Ok(FindPage::default()),
            CursorState::Running => {
                if self.paginator.as_ref().map(|p| p.mid_page()).unwrap_or(false) {
                    return usage_err!(
                        "cannot fetch a whole page from a cursor that is returning documents one at a time"
                    );
                }
            }
            // pages are fetched on demand only
            CursorState::New => self.start(false),
        }
        let result = match &mut self.paginator {
            Some(p) => p.next_page().await,
            None => Ok(None),
        };
        match result {
            Ok(Some(page)) => {
                self.retrieved += page.documents.len() as u64;
                if page.next_page_state.is_none() {
                    self.state = CursorState::Exhausted;
                }
                Ok(page)
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(FindPage::default())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Fetch the document at position `index`, like `cursor[index]`.
    ///
    /// This runs a separate query and does not move or start this cursor, which
    /// must not have been used yet. The position counts from this cursor's skip.
    pub async fn get(&self, index: u64) -> Result<Document, DataAPIError> {
        self.ensure_new("an index lookup")?;
        if let Some(l) = self.limit {
            if index >= l {
                return Err(DataAPIError::new(
                    DataAPIErrorCode::IndexOutOfRange,
                    &format!("no document at index {} of a cursor limited to {}", index, l),
                ));
            }
        }
        let mut lookup = self.clone_cursor();
        lookup.skip = Some(self.skip.unwrap_or(0).saturating_add(index));
        lookup.limit = Some(1);
        lookup.prefetched = None;
        let doc = lookup.next().await?;
        lookup.close().await;
        match doc {
            Some(d) => Ok(d),
            None => Err(DataAPIError::new(
                DataAPIErrorCode::IndexOutOfRange,
                &format!("no document at index {}", index),
            )),
        }
    }

    /// Return the distinct values found under `key` in the documents of this cursor.
    ///
    /// The key uses dot notation (`"a.b"`, `"items.0.sku"`), see
    /// [`escape_field_names()`](crate::escape_field_names()) for field names containing dots.
    /// Lists are unrolled. This reads all the matching documents on a copy of this
    /// cursor; this cursor is not affected.
    pub async fn distinct(&self, key: &str) -> Result<Vec<Value>, DataAPIError> {
        let dkey = DistinctKey::parse(key)?;
        let pkey = if self.table {
            dkey.column_key()
        } else {
            dkey.projection_key()
        };
        let mut d_cursor = self.clone_cursor();
        let mut proj = Map::new();
        proj.insert(pkey, Value::Bool(true));
        d_cursor.projection = Some(proj);
        debug!("running distinct({}) on {}", key, self.source.name());
        let mut collector = DistinctCollector::new();
        while let Some(doc) = d_cursor.next().await? {
            for v in dkey.extract(&doc) {
                collector.add(v);
            }
        }
        Ok(collector.into_values())
    }

    /// A new cursor with the same query, in the [`New`](CursorState::New) state.
    pub fn clone_cursor(&self) -> Cursor {
        Cursor {
            source: self.source.clone(),
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            include_similarity: self.include_similarity,
            include_sort_vector: self.include_sort_vector,
            prefetched: self.prefetched,
            initial_page_state: self.initial_page_state.clone(),
            table: self.table,
            state: CursorState::New,
            started: false,
            retrieved: 0,
            paginator: None,
            cursor_id: NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Reset this cursor to the [`New`](CursorState::New) state, keeping its query.
    ///
    /// Any background prefetch task is stopped.
    pub fn rewind(&mut self) -> &mut Self {
        // dropping the paginator cancels its worker
        self.paginator = None;
        self.state = CursorState::New;
        self.started = false;
        self.retrieved = 0;
        self
    }

    /// Stop this cursor. Further calls to `next()` return `None`.
    ///
    /// Any background prefetch task is stopped and awaited. An exhausted
    /// cursor stays [`Exhausted`](CursorState::Exhausted).
    pub async fn close(&mut self) {
        if let Some(p) = &mut self.paginator {
            p.close().await;
        }
        self.paginator = None;
        if matches!(self.state, CursorState::New | CursorState::Running) {
            self.state = CursorState::Closed;
        }
    }

    /// A new cursor with the same query, returning `f(document)` instead of
    /// each document.
    ///
    /// This cursor must not have been started; it is left untouched.
    pub fn map<T, F>(&self, f: F) -> Result<MappedCursor<T>, DataAPIError>
    where
        T: 'static,
        F: Fn(Document) -> T + Send + Sync + 'static,
    {
        self.ensure_new("a mapping")?;
        Ok(MappedCursor {
            cursor: self.clone_cursor(),
            mapper: Arc::new(f),
        })
    }

    /// Read all the remaining documents.
    pub async fn to_list(&mut self) -> Result<Vec<Document>, DataAPIError> {
        let mut docs = Vec::new();
        while let Some(d) = self.next().await? {
            docs.push(d);
        }
        Ok(docs)
    }

    /// Call `f` for each remaining document, then close the cursor.
    ///
    /// Iteration stops early when `f` returns `Ok(false)` or an error. In every
    /// case the cursor is closed, and any prefetch task awaited, before returning.
    /// Returns the number of documents passed to `f`.
    pub async fn for_each<F>(&mut self, mut f: F) -> Result<u64, DataAPIError>
    where
        F: FnMut(Document) -> Result<bool, DataAPIError>,
    {
        let mut count = 0;
        let result = loop {
            match self.next().await {
                Ok(Some(d)) => {
                    count += 1;
                    match f(d) {
                        Ok(true) => continue,
                        Ok(false) => break Ok(count),
                        Err(e) => break Err(e),
                    }
                }
                Ok(None) => break Ok(count),
                Err(e) => break Err(e),
            }
        };
        self.close().await;
        result
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Cursor(\"{}\", {}, retrieved: {})",
            self.source.name(),
            self.state,
            self.retrieved
        )
    }
}

/// A [`Cursor`] whose documents go through a function. Made by [`Cursor::map()`].
pub struct MappedCursor<T> {
    cursor: Cursor,
    mapper: Arc<dyn Fn(Document) -> T + Send + Sync>,
}

impl<T: 'static> MappedCursor<T> {
    pub async fn next(&mut self) -> Result<Option<T>, DataAPIError> {
        Ok(self.cursor.next().await?.map(|d| (self.mapper)(d)))
    }

    pub async fn has_next(&mut self) -> Result<bool, DataAPIError> {
        self.cursor.has_next().await
    }

    pub async fn to_list(&mut self) -> Result<Vec<T>, DataAPIError> {
        let mut out = Vec::new();
        while let Some(v) = self.next().await? {
            out.push(v);
        }
        Ok(out)
    }

    /// Apply `g` after the current mapping. The cursor must not have been started.
    pub fn map<U, G>(&self, g: G) -> Result<MappedCursor<U>, DataAPIError>
    where
        U: 'static,
        G: Fn(T) -> U + Send + Sync + 'static,
    {
        self.cursor.ensure_new("a mapping")?;
        let f = self.mapper.clone();
        Ok(MappedCursor {
            cursor: self.cursor.clone_cursor(),
            mapper: Arc::new(move |d| g(f(d))),
        })
    }

    /// A new, unstarted cursor with the same query and mapping.
    pub fn clone_cursor(&self) -> MappedCursor<T> {
        MappedCursor {
            cursor: self.cursor.clone_cursor(),
            mapper: self.mapper.clone(),
        }
    }

    pub fn rewind(&mut self) -> &mut Self {
        self.cursor.rewind();
        self
    }

    pub async fn close(&mut self) {
        self.cursor.close().await
    }

    pub fn state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn retrieved(&self) -> u64 {
        self.cursor.retrieved()
    }

    /// The underlying cursor, for introspection.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }
}

impl<T> fmt::Debug for MappedCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MappedCursor")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
