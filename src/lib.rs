//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Data API Rust SDK
//!
//! This is a Rust client for the JSON Data API of Astra DB and compatible databases.
//! It covers document collections and schemaful tables, with an emphasis on reading
//! large result sets: a `find` returns a lazy [`Cursor`] that walks the paginated
//! results page by page, optionally fetching the next pages ahead of time on a
//! background task.
//!
//! This SDK supplies and uses Rust `async` methods throughout, using the [tokio](https://crates.io/crates/tokio) runtime. There is currently no blocking support.
//!
//! The general flow for an application using the Data API is:
//! - Create a [`HandleBuilder`] with all needed parameters
//! - Create a [`Handle`] from the [`HandleBuilder`] that will be used throughout the application, across all threads
//! - Get a [`Database`] from the handle, then [`Collection`] or [`Table`] objects from the database
//! - Read with `find` and a [`Cursor`], write with `insert_*`, `update_*` and `delete_*`
//!
//! ## Simple Example
//! The following code creates a [`Handle`] from values in the current environment and then reads
//! the first documents of a collection, sorted by name.
//! ```no_run
//! use data_api_rust_sdk::{FindOptions, Handle, Sort};
//! use serde_json::json;
//! use std::error::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let handle = Handle::builder()
//!         .from_environment()?
//!         .build().await?;
//!     let users = handle.database().collection("users");
//!     let mut cursor = users.find(
//!         json!({"status": "active"}),
//!         FindOptions::new().sort(Sort::new().asc("name")).limit(100).prefetched(40),
//!     )?;
//!     while let Some(doc) = cursor.next().await? {
//!         println!("{:?}", doc);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Prerequisites
//! - Rust 1.78 or later
//! - A database exposing the Data API, and an application token for it.
//!
//! ## Configuring the SDK
//!
//! The [`HandleBuilder`] needs at least the API endpoint of the database and, for
//! secured databases, an application token. These can be given directly:
//! ```no_run
//! # use data_api_rust_sdk::Handle;
//! # #[tokio::main]
//! # pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = Handle::builder()
//!     .api_endpoint("https://01234567-89ab-cdef-0123-456789abcdef-us-east1.apps.astra.datastax.com")?
//!     .token("AstraCS:...")?
//!     .keyspace("default_keyspace")?
//!     .build().await?;
//! # Ok(())
//! # }
//! ```
//! or read from the environment with [`HandleBuilder::from_environment()`]. See that method for the
//! list of environment variables used.
//!
//! ## Cursors
//!
//! A [`Cursor`] sends nothing until its first [`next()`](Cursor::next()). Until then its query can
//! be refined with [`Cursor::sort()`], [`Cursor::limit()`], [`Cursor::slice()`] and friends.
//! Note that a limit of 0 means "no limit".
//!
//! A cursor can be [rewound](Cursor::rewind()) to run its query again, and
//! [cloned](Cursor::clone_cursor()) into an independent cursor. [`Cursor::get()`] fetches a
//! single document by position without moving the cursor, and [`Cursor::distinct()`] collects the
//! distinct values of a (dotted) key.
//!
//! With [`Cursor::prefetched()`], pages after the first one are fetched by a spawned task, which
//! keeps a bounded number of documents ready. The task is stopped when the cursor is closed,
//! rewound or dropped.
//!
//! ## Logging
//!
//! The SDK logs through the [tracing](https://crates.io/crates/tracing) crate. Request payloads and
//! headers are logged at `trace` level, with the token and embedding api key redacted.
//!
//! ## License
//!
//! Copyright (C) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//!
//! This SDK is licensed under the Universal Permissive License 1.0.
//!

pub(crate) mod handle_builder;
pub use crate::handle_builder::HandleBuilder;

pub(crate) mod handle;
pub use crate::handle::Handle;

pub(crate) mod collection;
pub use crate::collection::Collection;

pub(crate) mod cursor;
pub use crate::cursor::{Cursor, CursorState, MappedCursor};

pub(crate) mod database;
pub use crate::database::Database;

pub(crate) mod descriptors;
pub use crate::descriptors::{
    AlterTableOperation, ApiSupportDescriptor, CollectionDescriptor, ColumnTypeDescriptor,
    PrimaryKeyDescriptor, TableDefinition, TableDescriptor, TableIndexDefinition,
    TableIndexDescriptor, TableIndexOptions, TableVectorIndexOptions,
};

pub(crate) mod distinct;

pub(crate) mod error;
pub use crate::error::{DataAPIError, DataAPIErrorCode, DataAPIErrorDescriptor};

pub(crate) mod options;
pub use crate::options::{
    FindOptions, InsertManyOptions, ReturnDocument, UpdateOptions, DEFAULT_INSERT_MANY_CHUNK_SIZE,
};

pub(crate) mod paginator;
pub use crate::paginator::PageFetcher;

pub(crate) mod results;
pub use crate::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};

pub(crate) mod table;
pub use crate::table::Table;

pub mod types;
pub use crate::types::{
    escape_field_names, unescape_field_path, DataAPIVector, Document, FindCommand,
    FindCommandBuilder, FindOption, FindPage, Projection, Sort, SortMode,
};

#[cfg(test)]
pub(crate) mod test_source;





#[cfg(test)]
pub(crate) mod request_tests;
