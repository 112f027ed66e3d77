//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::descriptors::{
        AlterTableOperation, ColumnTypeDescriptor, TableIndexDefinition, TableIndexOptions,
        TableVectorIndexOptions,
    };
    use crate::error::DataAPIErrorCode;
    use crate::handle::{check_response, compose_user_agent, redacted_headers};
    use crate::options::{FindOptions, InsertManyOptions};
    use crate::types::{FindCommand, FindOption, FindPage, Sort};
    use crate::Handle;

    #[derive(Debug, Clone)]
    struct Recorded {
        path: String,
        headers: Vec<(String, String)>,
        body: Value,
    }

    impl Recorded {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    type Log = Arc<Mutex<Vec<Recorded>>>;

    fn find_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
    }

    // A one-request-per-connection http server answering with `handler`.
    async fn fake_api<F>(handler: F) -> Result<(String, Log), Box<dyn Error>>
    where
        F: Fn(&Value) -> (u16, Value) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = format!("http://{}", listener.local_addr()?);
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);
        let task_log = log.clone();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let handler = handler.clone();
                let log = task_log.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let head_len = loop {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                        if let Some(p) = find_end(&buf) {
                            break p;
                        }
                    };
                    let head = String::from_utf8_lossy(&buf[..head_len]).to_string();
                    let mut lines = head.split("\r\n");
                    let path = lines
                        .next()
                        .and_then(|l| l.split(' ').nth(1))
                        .unwrap_or("")
                        .to_string();
                    let headers: Vec<(String, String)> = lines
                        .filter_map(|l| l.split_once(':'))
                        .map(|(n, v)| (n.trim().to_lowercase(), v.trim().to_string()))
                        .collect();
                    let len: usize = headers
                        .iter()
                        .find(|(n, _)| n == "content-length")
                        .and_then(|(_, v)| v.parse().ok())
                        .unwrap_or(0);
                    while buf.len() < head_len + len {
                        match sock.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let body: Value =
                        serde_json::from_slice(&buf[head_len..head_len + len]).unwrap_or(Value::Null);
                    let (status, reply) = handler(&body);
                    if let Ok(mut l) = log.lock() {
                        l.push(Recorded {
                            path,
                            headers,
                            body,
                        });
                    }
                    let text = reply.to_string();
                    let resp = format!(
                        "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        text.len(),
                        text
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        Ok((addr, log))
    }

    fn recorded(log: &Log) -> Vec<Recorded> {
        match log.lock() {
            Ok(l) => l.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    async fn handle_for(addr: &str) -> Result<Handle, Box<dyn Error>> {
        Ok(Handle::builder()
            .api_endpoint(addr)?
            .token("AstraCS:secret")?
            .keyspace("ks1")?
            .caller("billing", Some("2.1"))?
            .timeout(Duration::from_secs(5))?
            .build()
            .await?)
    }

    // serves 25 documents in pages of 10, honoring pageState
    fn paged(body: &Value) -> (u16, Value) {
        let start: usize = body
            .pointer("/find/options/pageState")
            .and_then(|p| p.as_str())
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        let end = (start + 10).min(25);
        let docs: Vec<Value> = (start..end).map(|i| json!({"_id": i, "n": i % 4})).collect();
        let next = if end < 25 { json!(end.to_string()) } else { Value::Null };
        (200, json!({"data": {"documents": docs, "nextPageState": next}}))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn collection_find_walks_pages() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(paged).await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("things");
        let mut cursor = coll.find(
            json!({"kind": "a"}),
            FindOptions::new().sort(Sort::new().asc("_id")).prefetched(5),
        )?;
        assert_eq!(cursor.address(), format!("{}/api/json/v1/ks1/things", addr));
        let docs = cursor.to_list().await?;
        assert_eq!(docs.len(), 25);
        let ids: Vec<u64> = docs.iter().filter_map(|d| d.get("_id")?.as_u64()).collect();
        assert_eq!(ids, (0..25).collect::<Vec<u64>>());

        let reqs = recorded(&log);
        assert_eq!(reqs.len(), 3);
        let first = &reqs[0];
        assert_eq!(first.path, "/api/json/v1/ks1/things");
        assert_eq!(first.header("token"), Some("AstraCS:secret"));
        assert_eq!(first.header("content-type"), Some("application/json"));
        let ua = first.header("user-agent").ok_or("no user agent")?;
        assert!(ua.starts_with("billing/2.1 DataAPI-RustSDK/"), "{}", ua);
        assert_eq!(first.body.pointer("/find/filter"), Some(&json!({"kind": "a"})));
        assert_eq!(first.body.pointer("/find/sort"), Some(&json!({"_id": 1})));
        assert_eq!(first.body.pointer("/find/options/pageState"), None);
        Ok(())
    }

    #[tokio::test]
    async fn distinct_through_collection() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(paged).await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("things");
        let values = coll.distinct("n", Value::Null).await?;
        assert_eq!(values, vec![json!(0), json!(1), json!(2), json!(3)]);
        for r in recorded(&log) {
            assert_eq!(r.body.pointer("/find/projection"), Some(&json!({"n": true})));
        }
        Ok(())
    }

    #[tokio::test]
    async fn api_errors_become_errors() -> Result<(), Box<dyn Error>> {
        let (addr, _log) = fake_api(|_| {
            (
                200,
                json!({"errors": [{
                    "title": "Collection not found",
                    "errorCode": "COLLECTION_NOT_EXIST",
                    "message": "no collection 'things'",
                    "family": "REQUEST",
                    "scope": "SCHEMA",
                    "id": "abc",
                    "extra": 1
                }]}),
            )
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("things");
        let mut cursor = coll.find(Value::Null, FindOptions::new())?;
        let err = cursor.next().await.err().ok_or("no error")?;
        assert_eq!(err.code, DataAPIErrorCode::ApiError);
        assert_eq!(err.descriptors.len(), 1);
        let d = &err.descriptors[0];
        assert_eq!(d.error_code.as_deref(), Some("COLLECTION_NOT_EXIST"));
        assert_eq!(d.attributes.get("extra"), Some(&json!(1)));
        assert!(err.message.contains("no collection 'things'"));
        assert!(!cursor.alive());
        Ok(())
    }

    #[tokio::test]
    async fn http_status_errors() -> Result<(), Box<dyn Error>> {
        let (addr, _log) = fake_api(|_| (401, json!({"message": "unauthorized"}))).await?;
        let handle = handle_for(&addr).await?;
        let err = handle
            .database()
            .collection("c")
            .find_one(Value::Null, FindOptions::new())
            .await
            .err()
            .ok_or("no error")?;
        assert_eq!(err.code, DataAPIErrorCode::HttpError);
        assert!(err.message.contains("401"));
        Ok(())
    }

    #[tokio::test]
    async fn counting() -> Result<(), Box<dyn Error>> {
        let (addr, _log) = fake_api(|body| {
            if body.get("estimatedDocumentCount").is_some() {
                (200, json!({"status": {"count": 5000}}))
            } else if body.pointer("/countDocuments/filter/big").is_some() {
                (200, json!({"status": {"count": 1000, "moreData": true}}))
            } else {
                (200, json!({"status": {"count": 42}}))
            }
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("c");
        assert_eq!(coll.count_documents(json!({}), 100).await?, 42);
        let err = coll.count_documents(json!({}), 10).await.err().ok_or("no error")?;
        assert_eq!(err.code, DataAPIErrorCode::TooManyDocumentsToCount);
        let err = coll
            .count_documents(json!({"big": true}), 5000)
            .await
            .err()
            .ok_or("no error")?;
        assert_eq!(err.code, DataAPIErrorCode::TooManyDocumentsToCount);
        assert_eq!(coll.estimated_document_count().await?, 5000);
        Ok(())
    }

    #[tokio::test]
    async fn insert_many_in_chunks() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(|body| {
            let ids: Vec<Value> = body
                .pointer("/insertMany/documents")
                .and_then(|d| d.as_array())
                .map(|a| a.iter().filter_map(|d| d.get("_id").cloned()).collect())
                .unwrap_or_default();
            (200, json!({"status": {"insertedIds": ids}}))
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("c");
        let docs: Vec<Value> = (0..7).map(|i| json!({"_id": i})).collect();
        let res = coll
            .insert_many(docs, InsertManyOptions::new().ordered(true).chunk_size(3)?)
            .await?;
        assert_eq!(res.inserted_ids().len(), 7);
        assert_eq!(res.raw_results().len(), 3);
        let reqs = recorded(&log);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].body.pointer("/insertMany/options/ordered"), Some(&json!(true)));

        assert!(InsertManyOptions::new().chunk_size(0).is_err());
        let err = coll
            .insert_many(vec![json!([1, 2])], InsertManyOptions::new())
            .await
            .err()
            .ok_or("non-object document accepted")?;
        assert_eq!(err.code, DataAPIErrorCode::IllegalArgument);
        Ok(())
    }

    #[tokio::test]
    async fn delete_many_repeats_while_more_data() -> Result<(), Box<dyn Error>> {
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        let (addr, _log) = fake_api(move |_| {
            let mut n = match c.lock() {
                Ok(n) => n,
                Err(p) => p.into_inner(),
            };
            *n += 1;
            if *n < 3 {
                (200, json!({"status": {"deletedCount": 20, "moreData": true}}))
            } else {
                (200, json!({"status": {"deletedCount": 7}}))
            }
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let res = handle
            .database()
            .collection("c")
            .delete_many(json!({"old": true}))
            .await?;
        assert_eq!(res.deleted_count(), Some(47));
        assert_eq!(res.raw_results().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn table_find_and_listing() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(|body| {
            if body.get("listTables").is_some() {
                (
                    200,
                    json!({"status": {"tables": [{
                        "name": "scores",
                        "definition": {
                            "columns": {"player": "text", "points": {"type": "int"}, "tags": {"type": "tuple"}},
                            "primaryKey": "player"
                        }
                    }]}}),
                )
            } else {
                (
                    200,
                    json!({"data": {"documents": [
                        {"player": "ann", "points": 3, "tags": ["x"]},
                        {"player": "bob", "points": 3, "tags": ["y", "x"]}
                    ], "nextPageState": null}}),
                )
            }
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let db = handle.database_with_keyspace("other")?;
        let table = db.table("scores");
        let tags = table.distinct("tags", Value::Null).await?;
        assert_eq!(tags, vec![json!("x"), json!("y")]);
        let reqs = recorded(&log);
        assert_eq!(reqs[0].path, "/api/json/v1/other/scores");
        assert_eq!(reqs[0].body.pointer("/find/projection"), Some(&json!({"tags": true})));

        let def = table.definition().await?;
        assert_eq!(def.primary_key.partition_by, vec!["player"]);
        assert!(def.get_column("tags").ok_or("no tags column")?.is_unknown());
        let reqs = recorded(&log);
        assert_eq!(reqs[1].path, "/api/json/v1/other");
        Ok(())
    }

    #[tokio::test]
    async fn table_indexes_and_schema() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(|body| {
            if let Some(li) = body.get("listIndexes") {
                if li.pointer("/options/explain") == Some(&json!(true)) {
                    (
                        200,
                        json!({"status": {"indexes": [
                            {"name": "points_idx", "definition": {"column": "points", "options": {}}},
                            {"name": "emb_idx", "definition": {"column": "emb", "options": {"metric": "dot_product"}}},
                            {"name": "cql_idx", "definition": {"column": "UNKNOWN", "apiSupport": {"cqlDefinition": "CREATE INDEX ...", "createIndex": false, "filter": true}}}
                        ]}}),
                    )
                } else {
                    (200, json!({"status": {"indexes": ["points_idx", "emb_idx", "cql_idx"]}}))
                }
            } else if body.get("estimatedDocumentCount").is_some() {
                (200, json!({"status": {"count": 1234}}))
            } else if body.get("listTables").is_some() {
                (
                    200,
                    json!({"status": {"tables": [{
                        "name": "scores",
                        "definition": {"columns": {"player": "text"}, "primaryKey": "player"}
                    }]}}),
                )
            } else if body.get("alterTable").is_some() && body.pointer("/alterTable/operation/drop").is_some() {
                (200, json!({"status": {"ok": 0}}))
            } else {
                (200, json!({"status": {"ok": 1}}))
            }
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let db = handle.database();
        let table = db.table("scores");

        table
            .create_index(
                "player_idx",
                "player",
                Some(TableIndexOptions {
                    case_sensitive: Some(false),
                    ..Default::default()
                }),
                true,
            )
            .await?;
        table
            .create_vector_index(
                "emb_idx",
                "emb",
                TableVectorIndexOptions {
                    metric: Some("dot_product".to_string()),
                    source_model: None,
                },
                false,
            )
            .await?;
        let reqs = recorded(&log);
        assert_eq!(reqs[0].path, "/api/json/v1/ks1/scores");
        assert_eq!(
            reqs[0].body,
            json!({"createIndex": {
                "name": "player_idx",
                "definition": {"column": "player", "options": {"caseSensitive": false}},
                "options": {"ifNotExists": true}
            }})
        );
        assert_eq!(
            reqs[1].body,
            json!({"createVectorIndex": {
                "name": "emb_idx",
                "definition": {"column": "emb", "options": {"metric": "dot_product"}},
                "options": {"ifNotExists": false}
            }})
        );
        assert!(table.create_index("", "player", None, false).await.is_err());
        assert!(table.create_index("i", "", None, false).await.is_err());

        assert_eq!(
            table.list_index_names().await?,
            vec!["points_idx", "emb_idx", "cql_idx"]
        );
        let indexes = table.list_indexes().await?;
        assert_eq!(indexes.len(), 3);
        assert_eq!(
            indexes[0].definition,
            TableIndexDefinition::Regular {
                column: "points".to_string(),
                options: TableIndexOptions::default(),
            }
        );
        assert_eq!(indexes[1].definition.column(), Some("emb"));
        assert!(matches!(indexes[1].definition, TableIndexDefinition::Vector { .. }));
        assert!(matches!(indexes[2].definition, TableIndexDefinition::Unknown(_)));

        let altered = table
            .alter(AlterTableOperation::AddColumns(vec![(
                "bonus".to_string(),
                ColumnTypeDescriptor::Scalar("int".to_string()),
            )]))
            .await?;
        assert_eq!(altered.name(), "scores");
        let reqs = recorded(&log);
        assert_eq!(
            reqs.last().ok_or("no request")?.body,
            json!({"alterTable": {"operation": {"add": {"columns": {"bonus": {"type": "int"}}}}}})
        );
        let err = table
            .alter(AlterTableOperation::DropColumns(vec!["bonus".to_string()]))
            .await
            .err()
            .ok_or("alterTable without ok accepted")?;
        assert_eq!(err.code, DataAPIErrorCode::BadResponse);

        assert_eq!(table.estimated_document_count().await?, 1234);
        assert_eq!(table.info().await?.name, "scores");
        assert!(db.table("missing").info().await.is_err());

        table.drop().await?;
        let reqs = recorded(&log);
        let last = reqs.last().ok_or("no request")?;
        assert_eq!(last.path, "/api/json/v1/ks1");
        assert_eq!(last.body, json!({"dropTable": {"name": "scores"}}));
        Ok(())
    }

    #[tokio::test]
    async fn collection_info_and_drop() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(|body| {
            if body.get("findCollections").is_some() {
                (
                    200,
                    json!({"status": {"collections": [
                        {"name": "plain"},
                        {"name": "vecs", "options": {"vector": {"dimension": 3, "metric": "cosine"}}}
                    ]}}),
                )
            } else {
                (200, json!({"status": {"ok": 1}}))
            }
        })
        .await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("vecs");
        let info = coll.info().await?;
        assert_eq!(info.vector_dimension(), Some(3));
        assert!(handle.database().collection("nope").info().await.is_err());
        coll.drop().await?;
        let reqs = recorded(&log);
        let last = reqs.last().ok_or("no request")?;
        assert_eq!(last.path, "/api/json/v1/ks1");
        assert_eq!(last.body, json!({"deleteCollection": {"name": "vecs"}}));
        Ok(())
    }

    #[tokio::test]
    async fn find_resumes_from_page_state() -> Result<(), Box<dyn Error>> {
        let (addr, log) = fake_api(paged).await?;
        let handle = handle_for(&addr).await?;
        let coll = handle.database().collection("people");
        let page = coll
            .find(json!({}), FindOptions::new())?
            .fetch_next_page()
            .await?;
        assert_eq!(page.documents.len(), 10);
        let state = page.next_page_state.ok_or("no next page state")?;
        let mut later = coll.find(json!({}), FindOptions::new().initial_page_state(&state))?;
        let rest = later.to_list().await?;
        assert_eq!(rest.len(), 15);
        let reqs = recorded(&log);
        assert_eq!(reqs[0].body.pointer("/find/options/pageState"), None);
        assert_eq!(
            reqs[1].body.pointer("/find/options/pageState"),
            Some(&json!(state))
        );
        Ok(())
    }

    #[tokio::test]
    async fn builder_validation() -> Result<(), Box<dyn Error>> {
        assert!(Handle::builder().build().await.is_err());
        assert!(Handle::builder().api_endpoint("ftp://example.com").is_err());
        assert!(Handle::builder().timeout(Duration::ZERO).is_err());
        let handle = Handle::builder()
            .api_endpoint("https://db.example.com/")?
            .api_path("/custom/")?
            .api_version("v2")?
            .build()
            .await?;
        let coll = handle.database().collection("c");
        assert_eq!(coll.keyspace(), "default_keyspace");
        let cursor = coll.find(Value::Null, FindOptions::new())?;
        assert_eq!(
            cursor.address(),
            "https://db.example.com/custom/v2/default_keyspace/c"
        );
        assert!(handle.database_with_keyspace("").is_err());
        assert!(coll.find(json!([1]), FindOptions::new()).is_err());
        Ok(())
    }

    #[test]
    fn token_from_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("token");
        std::fs::write(&path, "  AstraCS:from-file\n")?;
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        let builder = Handle::builder().token_from_file(path)?;
        assert_eq!(builder.token.as_deref(), Some("AstraCS:from-file"));

        let empty = dir.path().join("empty");
        std::fs::write(&empty, "\n")?;
        let empty = empty.to_str().ok_or("non-utf8 temp path")?;
        assert!(Handle::builder().token_from_file(empty).is_err());
        assert!(Handle::builder()
            .token_from_file(&format!("{}/missing", dir.path().display()))
            .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn request_headers_and_redaction() -> Result<(), Box<dyn Error>> {
        let handle = Handle::builder()
            .api_endpoint("http://localhost:8181")?
            .token("AstraCS:secret")?
            .embedding_api_key("emb-key")?
            .additional_header("X-Trace", "1")?
            .additional_header("x-trace", "2")?
            .build()
            .await?;
        let req = handle
            .prepare_request("/api/json/v1/ks", &json!({"findCollections": {}}), &None)?
            .build()?;
        assert_eq!(req.url().as_str(), "http://localhost:8181/api/json/v1/ks");
        assert_eq!(req.timeout(), Some(&Duration::from_secs(30)));
        let h = req.headers();
        assert_eq!(h.get("token"), Some(&HeaderValue::from_static("AstraCS:secret")));
        assert!(h.get("token").map(|v| v.is_sensitive()).unwrap_or(false));
        assert_eq!(h.get_all("x-trace").iter().count(), 1);
        assert_eq!(h.get("x-trace"), Some(&HeaderValue::from_static("2")));

        let shown = redacted_headers(h);
        for (k, v) in &shown {
            if k == "token" || k == "x-embedding-api-key" {
                assert_eq!(v, "***");
            }
        }
        assert!(shown.iter().any(|(k, v)| k == "x-trace" && v == "2"));
        assert!(!format!("{:?}", shown).contains("secret"));

        let req = handle
            .prepare_request("/x", &json!({}), &Some(Duration::from_millis(1500)))?
            .build()?;
        assert_eq!(req.timeout(), Some(&Duration::from_millis(1500)));
        Ok(())
    }

    #[test]
    fn redaction_is_case_insensitive() {
        let mut h = HeaderMap::new();
        h.insert("Token", HeaderValue::from_static("abc"));
        h.insert("X-Embedding-Api-Key", HeaderValue::from_static("def"));
        h.insert("accept", HeaderValue::from_static("*/*"));
        let shown = redacted_headers(&h);
        assert!(shown.contains(&("token".to_string(), "***".to_string())));
        assert!(shown.contains(&("x-embedding-api-key".to_string(), "***".to_string())));
        assert!(shown.contains(&("accept".to_string(), "*/*".to_string())));
    }

    #[test]
    fn user_agents() {
        let base = compose_user_agent(None, None);
        assert!(base.starts_with("DataAPI-RustSDK/"));
        assert_eq!(compose_user_agent(Some("app"), None), format!("app {}", base));
        assert_eq!(
            compose_user_agent(Some("app"), Some("0.9")),
            format!("app/0.9 {}", base)
        );
        // a version alone is not enough
        assert_eq!(compose_user_agent(None, Some("0.9")), base);
    }

    #[test]
    fn response_checks() {
        assert!(check_response(&json!({"status": {"ok": 1}})).is_ok());
        assert!(check_response(&json!({"errors": []})).is_ok());
        assert!(check_response(&json!({"status": {"warnings": [{"message": "deprecated"}]}})).is_ok());
        let e = check_response(&json!([1])).err();
        assert_eq!(e.map(|e| e.code), Some(DataAPIErrorCode::BadResponse));
        let e = check_response(&json!({"errors": ["plain text"]})).err();
        let e = match e {
            Some(e) => e,
            None => panic!("errors array accepted"),
        };
        assert_eq!(e.code, DataAPIErrorCode::ApiError);
        assert_eq!(e.descriptors[0].message.as_deref(), Some("plain text"));
    }

    #[test]
    fn find_command_payload() {
        let cmd = FindCommand::builder()
            .option(FindOption::Limit(5))
            .filter(crate::test_source::doc(json!({"a": 1})))
            .sort(Sort::new().desc("b"))
            .skip(2)
            .limit(10)
            .include_similarity(true)
            .build();
        assert_eq!(cmd.limit(), Some(10));
        assert_eq!(
            cmd.to_value(),
            json!({"find": {
                "filter": {"a": 1},
                "sort": {"b": -1},
                "options": {"skip": 2, "limit": 10, "includeSimilarity": true}
            }})
        );
        let next = cmd.with_page_state("tok");
        assert_eq!(next.page_state(), Some("tok"));
        assert_eq!(cmd.page_state(), None);
        assert_eq!(
            FindCommand::builder().build().to_value(),
            json!({"find": {"filter": {}}})
        );
    }

    #[test]
    fn find_page_decoding() -> Result<(), Box<dyn Error>> {
        let p = FindPage::from_response(&json!({
            "data": {"documents": [{"a": 1}], "nextPageState": "xyz"},
            "status": {"sortVector": [0.1, 0.2]}
        }))?;
        assert_eq!(p.documents.len(), 1);
        assert_eq!(p.next_page_state.as_deref(), Some("xyz"));
        assert!(p.sort_vector.is_some());

        let last = FindPage::from_response(&json!({"data": {"documents": [], "nextPageState": null}}))?;
        assert!(last.documents.is_empty());
        assert_eq!(last.next_page_state, None);

        for bad in [
            json!({}),
            json!({"data": {}}),
            json!({"data": {"documents": [1]}}),
            json!({"data": {"documents": [], "nextPageState": 3}}),
        ] {
            let e = FindPage::from_response(&bad).err().ok_or("bad page accepted")?;
            assert_eq!(e.code, DataAPIErrorCode::BadResponse);
        }
        Ok(())
    }
}
