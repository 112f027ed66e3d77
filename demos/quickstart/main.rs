//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//

// This is an example program showing the basic use of a collection: it creates
// a collection, inserts some documents, reads them back through cursors in a
// few different ways, then drops the collection.

// To run this example:
//    ASTRA_DB_API_ENDPOINT=... ASTRA_DB_APPLICATION_TOKEN=... cargo run --example quickstart
//
// for extra output:
//    RUST_LOG=debug cargo run --example quickstart
//
// or, for a LOT of tracing output:
//    RUST_LOG=trace cargo run --example quickstart

use data_api_rust_sdk::{
    DataAPIError, FindOptions, Handle, InsertManyOptions, ReturnDocument, Sort, UpdateOptions,
};
use serde_json::{json, Value};
use std::error::Error;
use std::time::Duration;
use tracing::info;

// This method shows various ways to configure a Handle.
async fn get_handle() -> Result<Handle, DataAPIError> {
    // Note: later methods called on this builder will override earlier methods.
    // This allows for setting desired defaults that can be overridden by, for example,
    // .from_environment().
    Handle::builder()
        // For a local Data API:
        .api_endpoint("http://localhost:8181")?
        //
        // For Astra DB, with a token kept in a file:
        // .api_endpoint("https://<db-id>-<region>.apps.astra.datastax.com")?
        // .token_from_file("~/.astra/token")?
        //
        // Optional: the keyspace to work in (default is "default_keyspace")
        // .keyspace("my_keyspace")?
        //
        // Optional: identify this application in the User-Agent
        .caller("quickstart", Some("1.0"))?
        //
        // To read all of the above from environment variables,
        // or to override above from environment:
        .from_environment()?
        //
        // Optional: set a different default timeout (default is 30 seconds)
        .timeout(Duration::from_secs(15))?
        //
        // Build the handle
        .build()
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Set up a tracing subscriber to see output based on RUST_LOG environment setting
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_ansi(false)
        .compact()
        .init();

    // Create a handle. This should be used throughout the program
    info!("Creating new handle...");
    let handle = get_handle().await?;
    let db = handle.database();

    // Create an example collection
    let coll = db.create_collection("quickstart_users", None).await?;

    let users: Vec<Value> = (0..120)
        .map(|i| {
            json!({
                "_id": format!("user{}", i),
                "name": format!("name{}", i),
                "age": 18 + i % 50,
                "tags": if i % 2 == 0 { json!(["even"]) } else { json!(["odd", "prime?"]) },
            })
        })
        .collect();
    let ins = coll.insert_many(users, InsertManyOptions::new()).await?;
    println!("inserted {} documents", ins.inserted_ids().len());

    // Read with a cursor. Pages after the first are fetched in the background.
    let mut cursor = coll.find(
        json!({"age": {"$gt": 40}}),
        FindOptions::new()
            .sort(Sort::new().asc("age"))
            .projection(["name", "age"])
            .prefetched(40),
    )?;
    while let Some(doc) = cursor.next().await? {
        println!("{:?}", doc);
    }
    println!("{}", cursor);

    // The same query again, from the start
    cursor.rewind();
    let all = cursor.to_list().await?;
    println!("second run: {} documents", all.len());

    // A single document by position, without moving the cursor
    let mut by_age = coll.find(json!({}), FindOptions::new().sort(Sort::new().desc("age")))?;
    println!("third oldest: {:?}", by_age.get(2).await?);

    // A window of the results
    by_age.slice(10..15, None)?;
    for doc in by_age.to_list().await? {
        println!("window: {:?}", doc.get("name"));
    }

    // Distinct values, with lists unrolled
    println!("tags: {:?}", coll.distinct("tags", json!({})).await?);

    // Stop early: the cursor is closed, and its prefetch task stopped, on return
    let mut first_ten = Vec::new();
    coll.find(json!({}), FindOptions::new().prefetched(20))?
        .for_each(|doc| {
            first_ten.push(doc);
            Ok(first_ten.len() < 10)
        })
        .await?;
    println!("first ten: {}", first_ten.len());

    let updated = coll
        .find_one_and_update(
            json!({"_id": "user7"}),
            json!({"$set": {"vip": true}}),
            UpdateOptions::new().return_document(ReturnDocument::After),
        )
        .await?;
    println!("updated: {:?}", updated);

    println!(
        "count: {}",
        coll.count_documents(json!({"vip": true}), 1000).await?
    );

    // Drop the collection
    db.drop_collection("quickstart_users").await?;

    Ok(())
}
