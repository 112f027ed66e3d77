//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Page-by-page execution of a `find` command.
//!
//! The Data API answers a `find` one bounded page at a time, with a `nextPageState`
//! token when more pages follow. A [`Paginator`] hides this behind a simple
//! `next()` call, optionally fetching the following pages ahead of time on a
//! spawned task.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{DataAPIError, DataAPIErrorCode};
use crate::types::{Document, FindCommand, FindPage};

/// Anything that can run a single page of a `find` command.
///
/// [`Collection`](crate::Collection) and [`Table`](crate::Table) implement this
/// by sending the command to the Data API.
#[async_trait]
pub trait PageFetcher: Send + Sync + Debug {
    /// Execute `command` and return one page of results.
    async fn fetch_page(&self, command: &FindCommand) -> Result<FindPage, DataAPIError>;

    /// A string identifying where the pages come from, such as the full url.
    fn address(&self) -> String;

    /// The collection or table name.
    fn name(&self) -> &str;
}

type PrefetchItem = Result<Document, DataAPIError>;

#[derive(Debug)]
struct PrefetchWorker {
    rx: mpsc::Receiver<PrefetchItem>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Drop for PrefetchWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(t) = self.task.take() {
            t.abort();
        }
    }
}

/// A forward-only, non-restartable sequence of the documents matching a
/// `find` command.
#[derive(Debug)]
pub(crate) struct Paginator {
    source: Arc<dyn PageFetcher>,
    command: FindCommand,
    limit: Option<u64>,
    prefetched: Option<usize>,
    buffer: VecDeque<Document>,
    next_page_state: Option<String>,
    started: bool,
    finished: bool,
    yielded: u64,
    sort_vector: Option<Value>,
    pending_error: Option<DataAPIError>,
    worker: Option<PrefetchWorker>,
}

impl Paginator {
    /// No I/O happens until the first call to [`next()`](Paginator::next()).
    ///
    /// `limit` caps the total number of documents returned. If `prefetched` is
    /// `Some(n)` with `n > 0`, pages after the first one are fetched on a
    /// background task, keeping at most `n` documents waiting.
    pub(crate) fn new(
        source: Arc<dyn PageFetcher>,
        command: FindCommand,
        limit: Option<u64>,
        prefetched: Option<usize>,
    ) -> Paginator {
        Paginator {
            source,
            command,
            limit,
            prefetched: prefetched.filter(|n| *n > 0),
            buffer: VecDeque::new(),
            next_page_state: None,
            started: false,
            finished: false,
            yielded: 0,
            sort_vector: None,
            pending_error: None,
            worker: None,
        }
    }

    /// Resume a previous query: the first request carries `page_state`.
    pub(crate) fn starting_at(mut self, page_state: Option<String>) -> Paginator {
        self.next_page_state = page_state;
        self
    }

    /// Return the next document, or `None` once all documents have been returned.
    ///
    /// An error fetching a page is returned once; the paginator is finished afterwards.
    pub(crate) async fn next(&mut self) -> Result<Option<Document>, DataAPIError> {
        if !self.fill().await? {
            return Ok(None);
        }
        match self.buffer.pop_front() {
            Some(d) => Ok(Some(self.deliver(d))),
            None => Ok(None),
        }
    }

    /// True if [`next()`](Paginator::next()) would return a document.
    ///
    /// This may fetch a page, but does not consume anything.
    pub(crate) async fn has_next(&mut self) -> Result<bool, DataAPIError> {
        self.fill().await
    }

    /// Return one whole page, bypassing the document buffer.
    ///
    /// The page is cut short when it would go past the limit, and then has no
    /// `next_page_state`. Returns `None` once there are no more pages.
    pub(crate) async fn next_page(&mut self) -> Result<Option<FindPage>, DataAPIError> {
        if let Some(e) = self.pending_error.take() {
            self.finished = true;
            return Err(e);
        }
        if self.finished || self.limit_reached() {
            self.finished = true;
            return Ok(None);
        }
        let mut page = match self.fetch().await? {
            Some(p) => p,
            None => return Ok(None),
        };
        if let Some(l) = self.limit {
            let room = l.saturating_sub(self.yielded) as usize;
            if page.documents.len() >= room {
                page.documents.truncate(room);
                page.next_page_state = None;
            }
        }
        self.yielded += page.documents.len() as u64;
        self.next_page_state = page.next_page_state.clone();
        if self.next_page_state.is_none() {
            self.finished = true;
        }
        if page.sort_vector.is_none() {
            page.sort_vector = self.sort_vector.clone();
        }
        Ok(Some(page))
    }

    /// Documents fetched but not yet returned, within the limit. Never does I/O.
    pub(crate) fn buffered_count(&self) -> usize {
        let queued = match &self.worker {
            Some(w) => w.rx.len(),
            None => 0,
        };
        let n = self.buffer.len() + queued;
        match self.limit {
            Some(l) => n.min(l.saturating_sub(self.yielded) as usize),
            None => n,
        }
    }

    /// Take up to `n` (default: all) of the documents already fetched. Never does I/O.
    ///
    /// An error found among prefetched documents stops the draining and is
    /// returned by the following call to `next()`.
    pub(crate) fn consume_buffer(&mut self, n: Option<usize>) -> Vec<Document> {
        let mut wanted = n.unwrap_or(usize::MAX);
        if let Some(l) = self.limit {
            wanted = wanted.min(l.saturating_sub(self.yielded) as usize);
        }
        let mut out = Vec::new();
        while out.len() < wanted {
            let d = match self.buffer.pop_front() {
                Some(d) => d,
                None => match &mut self.worker {
                    Some(w) if self.pending_error.is_none() => match w.rx.try_recv() {
                        Ok(Ok(d)) => d,
                        Ok(Err(e)) => {
                            self.pending_error = Some(e);
                            break;
                        }
                        Err(_) => break,
                    },
                    _ => break,
                },
            };
            out.push(self.deliver(d));
        }
        out
    }

    /// True while documents are buffered or a prefetch task runs.
    pub(crate) fn mid_page(&self) -> bool {
        !self.buffer.is_empty() || self.worker.is_some()
    }

    /// Stop fetching and wait for any prefetch task to exit.
    ///
    /// Documents already buffered are dropped. Calling this more than once is harmless.
    pub(crate) async fn close(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.next_page_state = None;
        if let Some(mut w) = self.worker.take() {
            w.cancel.cancel();
            w.rx.close();
            if let Some(t) = w.task.take() {
                if let Err(e) = t.await {
                    warn!("prefetch task for {} ended abnormally: {}", self.source.name(), e);
                }
            }
        }
    }

    pub(crate) fn sort_vector(&self) -> Option<&Value> {
        self.sort_vector.as_ref()
    }

    pub(crate) fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    // Make sure a document is buffered. False once there are no more.
    async fn fill(&mut self) -> Result<bool, DataAPIError> {
        if let Some(e) = self.pending_error.take() {
            self.close().await;
            return Err(e);
        }
        if self.finished {
            return Ok(false);
        }
        if self.limit_reached() {
            self.close().await;
            return Ok(false);
        }
        loop {
            if !self.buffer.is_empty() {
                return Ok(true);
            }
            if let Some(w) = &mut self.worker {
                match w.rx.recv().await {
                    Some(Ok(d)) => {
                        self.buffer.push_back(d);
                        return Ok(true);
                    }
                    Some(Err(e)) => {
                        trace!("prefetch worker for {} failed: {}", self.source.name(), e);
                        self.close().await;
                        return Err(e);
                    }
                    None => {
                        self.finish_worker().await?;
                        return Ok(false);
                    }
                }
            }
            let page = match self.fetch().await? {
                Some(p) => p,
                None => return Ok(false),
            };
            self.buffer.extend(page.documents);
            self.next_page_state = page.next_page_state;
            if let (Some(depth), Some(ps)) = (self.prefetched, &self.next_page_state) {
                if self.worker.is_none() && !self.limit_reached_after_buffer() {
                    let ps = ps.clone();
                    self.next_page_state = None;
                    self.worker = Some(self.spawn_worker(ps, depth));
                }
            }
        }
    }

    // Send the query for the following page. None when the last page was already read.
    async fn fetch(&mut self) -> Result<Option<FindPage>, DataAPIError> {
        let cmd = match (self.started, self.next_page_state.take()) {
            (_, Some(ps)) => self.command.with_page_state(&ps),
            (false, None) => self.command.clone(),
            (true, None) => {
                self.finished = true;
                return Ok(None);
            }
        };
        self.started = true;
        let page = match self.source.fetch_page(&cmd).await {
            Ok(p) => p,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        trace!(
            "fetched page of {} documents from {}, next_page_state={:?}",
            page.documents.len(),
            self.source.name(),
            page.next_page_state
        );
        if self.sort_vector.is_none() {
            self.sort_vector = page.sort_vector.clone();
        }
        Ok(Some(page))
    }

    // The channel is closed. The task either sent the last page or died; only
    // the first is the end of the results.
    async fn finish_worker(&mut self) -> Result<(), DataAPIError> {
        self.finished = true;
        if let Some(mut w) = self.worker.take() {
            if let Some(t) = w.task.take() {
                if let Err(e) = t.await {
                    return Err(DataAPIError::new(
                        DataAPIErrorCode::UnknownError,
                        &format!(
                            "prefetch task for {} ended abnormally after {} documents: {}",
                            self.source.name(),
                            self.yielded,
                            e
                        ),
                    ));
                }
            }
        }
        trace!("prefetch worker for {} done", self.source.name());
        Ok(())
    }

    fn deliver(&mut self, d: Document) -> Document {
        self.yielded += 1;
        if self.limit_reached() {
            // nothing more will be read
            if let Some(w) = &self.worker {
                w.cancel.cancel();
            }
        }
        d
    }

    fn limit_reached(&self) -> bool {
        match self.limit {
            Some(l) => self.yielded >= l,
            None => false,
        }
    }

    fn limit_reached_after_buffer(&self) -> bool {
        match self.limit {
            Some(l) => self.yielded + self.buffer.len() as u64 >= l,
            None => false,
        }
    }

    fn spawn_worker(&self, page_state: String, depth: usize) -> PrefetchWorker {
        let (tx, rx) = mpsc::channel(depth);
        let cancel = CancellationToken::new();
        trace!(
            "starting prefetch worker for {} with depth {}",
            self.source.name(),
            depth
        );
        let task = tokio::spawn(prefetch_loop(
            self.source.clone(),
            self.command.clone(),
            page_state,
            tx,
            cancel.clone(),
        ));
        PrefetchWorker {
            rx,
            cancel,
            task: Some(task),
        }
    }
}

// Runs on its own task. Exits on the last page, on an error (after handing it
// over), on cancellation, or when the receiving side is gone.
async fn prefetch_loop(
    source: Arc<dyn PageFetcher>,
    command: FindCommand,
    mut page_state: String,
    tx: mpsc::Sender<PrefetchItem>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let cmd = command.with_page_state(&page_state);
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            r = source.fetch_page(&cmd) => r,
        };
        let page = match result {
            Ok(p) => p,
            Err(e) => {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tx.send(Err(e)) => {}
                }
                return;
            }
        };
        for d in page.documents {
            tokio::select! {
                _ = cancel.cancelled() => return,
                r = tx.send(Ok(d)) => {
                    if r.is_err() {
                        return;
                    }
                }
            }
        }
        match page.next_page_state {
            Some(ps) => page_state = ps,
            None => return,
        }
    }
}
