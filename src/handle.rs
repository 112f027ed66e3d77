//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

use crate::database::Database;
use crate::error::{bad_response, ia_err, user_agent};
use crate::error::{DataAPIError, DataAPIErrorCode, DataAPIErrorDescriptor};
use crate::handle_builder::HandleBuilder;
use crate::handle_builder::DEFAULT_TIMEOUT;

use std::result::Result;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

pub(crate) const TOKEN_HEADER: &str = "Token";
pub(crate) const EMBEDDING_API_KEY_HEADER: &str = "x-embedding-api-key";

const REDACTED_HEADERS: [&str; 2] = [TOKEN_HEADER, EMBEDDING_API_KEY_HEADER];

/// **The main database handle**.
///
/// This should be created once and used
/// throughout the application lifetime, across all threads.
///
/// Note: there is no need to enclose this struct in an `Rc` or [`Arc`], as it uses an
/// [`Arc`] internally, so calling `.clone()` on this struct will always return the
/// same underlying handle.
#[derive(Clone, Debug)]
pub struct Handle {
    // Use an inner Arc so cloning keeps the same contents
    pub(crate) inner: Arc<HandleRef>,
}

#[derive(Debug)]
pub(crate) struct HandleRef {
    pub(crate) client: reqwest::Client,
    pub(crate) api_endpoint: String,
    pub(crate) builder: HandleBuilder,
    user_agent: String,
    request_id: AtomicUsize,
    timeout: Duration,
}

impl Handle {
    /// Create a new [`HandleBuilder`].
    pub fn builder() -> HandleBuilder {
        HandleBuilder::new()
    }

    // Create the new Handle based on builder configuration
    pub(crate) async fn new(b: &HandleBuilder) -> Result<Handle, DataAPIError> {
        if b.api_endpoint.is_empty() {
            if b.from_environment {
                return ia_err!("cannot build handle: no api endpoint given. set ASTRA_DB_API_ENDPOINT environment.");
            }
            return ia_err!("cannot build handle: call HandleBuilder::api_endpoint()");
        }
        // validate the endpoint before creating any connections
        Url::parse(&b.api_endpoint)?;

        let builder = b.clone();
        let timeout = builder.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let c = {
            if let Some(c) = &builder.client {
                c.clone()
            } else {
                let mut cb = reqwest::Client::builder()
                    .timeout(timeout)
                    .connect_timeout(timeout);
                if let Some(cert) = &builder.add_cert {
                    cb = cb.add_root_certificate(cert.clone());
                }
                if builder.accept_invalid_certs {
                    cb = cb.danger_accept_invalid_certs(true);
                }
                cb.build()?
            }
        };
        let ua = compose_user_agent(
            builder.caller_name.as_deref(),
            builder.caller_version.as_deref(),
        );
        debug!(
            "Creating new Handle: endpoint={}, keyspace={}, user_agent={}",
            builder.api_endpoint,
            builder.get_keyspace(),
            ua
        );
        Ok(Handle {
            inner: Arc::new(HandleRef {
                client: c,
                api_endpoint: builder.api_endpoint.clone(),
                builder: builder,
                user_agent: ua,
                request_id: AtomicUsize::new(1),
                timeout: timeout,
            }),
        })
    }

    /// Get a [`Database`] for the keyspace configured on the builder
    /// (`default_keyspace` if none was given).
    pub fn database(&self) -> Database {
        Database::new(self, self.inner.builder.get_keyspace())
    }

    /// Get a [`Database`] working on a specific keyspace.
    pub fn database_with_keyspace(&self, keyspace: &str) -> Result<Database, DataAPIError> {
        if keyspace.is_empty() {
            return ia_err!("keyspace must not be empty");
        }
        Ok(Database::new(self, keyspace))
    }

    /// The User-Agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    /// `{api_path}/{api_version}/{keyspace}`, relative to the endpoint.
    pub(crate) fn keyspace_path(&self, keyspace: &str) -> String {
        let b = &self.inner.builder;
        let mut p = String::new();
        for seg in [b.get_api_path(), b.get_api_version(), keyspace] {
            let s = seg.trim_matches('/');
            if !s.is_empty() {
                p.push('/');
                p.push_str(s);
            }
        }
        p
    }

    pub(crate) fn build_headers(&self) -> Result<HeaderMap, DataAPIError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.inner.user_agent)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(t) = &self.inner.builder.token {
            let mut hv = HeaderValue::from_str(t)?;
            hv.set_sensitive(true);
            headers.insert(HeaderName::from_static("token"), hv);
        }
        if let Some(k) = &self.inner.builder.embedding_api_key {
            let mut hv = HeaderValue::from_str(k)?;
            hv.set_sensitive(true);
            headers.insert(HeaderName::from_static(EMBEDDING_API_KEY_HEADER), hv);
        }
        // additional headers override the ones above
        for (name, value) in &self.inner.builder.additional_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    // Builds the request without sending it.
    pub(crate) fn prepare_request(
        &self,
        path: &str,
        payload: &Value,
        timeout: &Option<Duration>,
    ) -> Result<reqwest::RequestBuilder, DataAPIError> {
        let url = format!("{}{}", self.inner.api_endpoint, path);
        let headers = self.build_headers()?;
        Ok(self
            .inner
            .client
            .post(url)
            .headers(headers)
            .timeout(self.get_timeout(timeout))
            .body(serde_json::to_vec(payload)?))
    }

    /// Send one command to the Data API and return the full response body.
    ///
    /// A response carrying an `errors` array is turned into a
    /// [`DataAPIErrorCode::ApiError`]. Warnings are logged and otherwise ignored.
    pub(crate) async fn execute_command(
        &self,
        path: &str,
        payload: &Value,
        timeout: &Option<Duration>,
    ) -> Result<Value, DataAPIError> {
        let request_id = self.inner.request_id.fetch_add(1, Ordering::Relaxed);
        let rb = self.prepare_request(path, payload, timeout)?;
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Some(Ok(req)) = rb.try_clone().map(|r| r.build()) {
                trace!(
                    "request {}: headers={:?}",
                    request_id,
                    redacted_headers(req.headers())
                );
            }
            trace!("request {}: payload={}", request_id, payload);
        }
        debug!("request {}: POST {}{}", request_id, self.inner.api_endpoint, path);

        let resp = rb.send().await?;
        let status = resp.status();
        debug!("request {}: status={}", request_id, status);
        // check resp status for 2xx, err on others
        if !status.is_success() {
            let content = resp.text().await?;
            return Err(DataAPIError::new(
                DataAPIErrorCode::HttpError,
                &format!(
                    "got unexpected http status: {}, response text: {}",
                    status, content
                ),
            ));
        }
        let text = resp.text().await?;
        trace!("request {}: response={}", request_id, text);
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| bad_response!("response is not valid json: {}: {}", e, text))?;
        check_response(&body)?;
        Ok(body)
    }

    pub(crate) fn get_timeout(&self, t: &Option<Duration>) -> Duration {
        // if t is given, use that. If not, use handle's timeout
        if let Some(d) = t {
            return *d;
        }
        self.inner.timeout
    }
}

// Errors in the body win over everything else; warnings are only logged.
pub(crate) fn check_response(body: &Value) -> Result<(), DataAPIError> {
    if !body.is_object() {
        return Err(bad_response!("response is not a json object: {}", body));
    }
    if let Some(Value::Array(errors)) = body.get("errors") {
        if !errors.is_empty() {
            return Err(DataAPIError::from_api_errors(errors));
        }
    }
    if let Some(Value::Array(warnings)) = body.pointer("/status/warnings") {
        for w in warnings {
            warn!(
                "the Data API returned a warning: {}",
                DataAPIErrorDescriptor::from_value(w)
            );
        }
    }
    Ok(())
}

/// `"<caller_name>/<caller_version> <sdk user agent>"`, with the caller part
/// omitted when there is no caller name.
pub(crate) fn compose_user_agent(caller_name: Option<&str>, caller_version: Option<&str>) -> String {
    match (caller_name, caller_version) {
        (Some(n), Some(v)) => format!("{}/{} {}", n, v, user_agent()),
        (Some(n), None) => format!("{} {}", n, user_agent()),
        _ => user_agent().to_string(),
    }
}

pub(crate) fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (k, v) in headers.iter() {
        let redact = REDACTED_HEADERS
            .iter()
            .any(|r| r.eq_ignore_ascii_case(k.as_str()));
        let val = if redact {
            "***".to_string()
        } else {
            String::from_utf8_lossy(v.as_bytes()).to_string()
        };
        out.push((k.as_str().to_string(), val));
    }
    out
}
