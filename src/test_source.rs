//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
// An in-memory find endpoint used by the cursor and paginator tests.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::cursor::Cursor;
use crate::error::{DataAPIError, DataAPIErrorCode};
use crate::paginator::PageFetcher;
use crate::types::{Document, FindCommand, FindPage};

#[derive(Debug)]
pub(crate) struct MemorySource {
    name: String,
    docs: Vec<Document>,
    page_size: usize,
    fail_at: Option<usize>,
    panic_at: Option<usize>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    commands: Mutex<Vec<FindCommand>>,
}

impl MemorySource {
    pub(crate) fn new(name: &str, docs: Vec<Document>, page_size: usize) -> MemorySource {
        MemorySource {
            name: name.to_string(),
            docs,
            page_size,
            fail_at: None,
            panic_at: None,
            delay: None,
            fetches: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// `count` documents `{"_id": "<i>", "seq": i, "field": "f<i>", "group": i % 3}`.
    pub(crate) fn numbered(count: usize, page_size: usize) -> MemorySource {
        let docs = (0..count)
            .map(|i| {
                doc(json!({
                    "_id": i.to_string(),
                    "seq": i,
                    "field": format!("f{}", i),
                    "group": i % 3,
                }))
            })
            .collect();
        MemorySource::new("numbers", docs, page_size)
    }

    /// The `n`-th fetch (1-based) fails.
    pub(crate) fn fail_at(mut self, n: usize) -> MemorySource {
        self.fail_at = Some(n);
        self
    }

    /// The `n`-th fetch (1-based) panics.
    pub(crate) fn panic_at(mut self, n: usize) -> MemorySource {
        self.panic_at = Some(n);
        self
    }

    /// Every fetch sleeps this long before answering.
    pub(crate) fn delay(mut self, d: Duration) -> MemorySource {
        self.delay = Some(d);
        self
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<FindCommand> {
        match self.commands.lock() {
            Ok(c) => c.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    fn matching(&self, command: &FindCommand) -> Vec<Document> {
        let mut out: Vec<Document> = self
            .docs
            .iter()
            .filter(|d| matches_filter(d, command.filter()))
            .cloned()
            .collect();
        if let Some(sort) = command.sort() {
            let clauses = sort.clauses.clone();
            out.sort_by(|a, b| {
                for (field, dir) in &clauses {
                    let o = compare(a.get(field), b.get(field));
                    let o = if dir.as_i64() == Some(-1) { o.reverse() } else { o };
                    if o != Ordering::Equal {
                        return o;
                    }
                }
                Ordering::Equal
            });
        }
        let skip = command.skip().unwrap_or(0) as usize;
        let mut out: Vec<Document> = out.into_iter().skip(skip).collect();
        if let Some(l) = command.limit() {
            out.truncate(l as usize);
        }
        out.into_iter()
            .map(|d| project(d, command.projection()))
            .collect()
    }
}

#[async_trait]
impl PageFetcher for MemorySource {
    async fn fetch_page(&self, command: &FindCommand) -> Result<FindPage, DataAPIError> {
        let n = self.fetches.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if let Ok(mut c) = self.commands.lock() {
            c.push(command.clone());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.panic_at == Some(n) {
            panic!("fetch {} blew up", n);
        }
        if self.fail_at == Some(n) {
            return Err(DataAPIError::new(
                DataAPIErrorCode::ServerError,
                &format!("injected failure on fetch {}", n),
            ));
        }
        let all = self.matching(command);
        let offset = match command.page_state() {
            Some(ps) => match ps.parse::<usize>() {
                Ok(o) => o,
                Err(_) => {
                    return Err(DataAPIError::new(
                        DataAPIErrorCode::ApiError,
                        &format!("bad page state {}", ps),
                    ))
                }
            },
            None => 0,
        };
        let end = (offset + self.page_size).min(all.len());
        let documents = all.get(offset..end).map(|s| s.to_vec()).unwrap_or_default();
        let next = if end < all.len() {
            Some(end.to_string())
        } else {
            None
        };
        let mut page = FindPage::new(documents, next.as_deref());
        if offset == 0 && command.to_value().pointer("/find/options/includeSortVector") == Some(&json!(true)) {
            page.sort_vector = Some(json!([0.5, -0.5]));
        }
        Ok(page)
    }

    fn address(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn doc(v: Value) -> Document {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

pub(crate) fn cursor_over(source: &Arc<MemorySource>) -> Cursor {
    let s: Arc<dyn PageFetcher> = source.clone();
    Cursor::from_source(s, None)
}

pub(crate) fn seqs(docs: &[Document]) -> Vec<u64> {
    docs.iter()
        .filter_map(|d| d.get("seq").and_then(|v| v.as_u64()))
        .collect()
}

fn matches_filter(d: &Document, filter: Option<&Document>) -> bool {
    match filter {
        None => true,
        Some(f) => f.iter().all(|(k, v)| d.get(k) == Some(v)),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

// top-level projection only: "a.b" keeps or drops all of "a"
fn project(d: Document, projection: Option<&Document>) -> Document {
    let Some(p) = projection else {
        return d;
    };
    let top = |k: &str| k.split('.').next().unwrap_or(k).to_string();
    let inclusive = p.iter().any(|(k, v)| k != "_id" && truthy(v));
    if inclusive {
        let keep: Vec<String> = p
            .iter()
            .filter(|(_, v)| truthy(v))
            .map(|(k, _)| top(k))
            .collect();
        let drop_id = p.get("_id").map(|v| !truthy(v)).unwrap_or(false);
        d.into_iter()
            .filter(|(k, _)| keep.contains(k) || (k == "_id" && !drop_id))
            .collect()
    } else {
        let drop: Vec<String> = p.keys().map(|k| top(k)).collect();
        d.into_iter().filter(|(k, _)| !drop.contains(k)).collect()
    }
}
