//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Builder for creating a [`Data API Handle`](crate::Handle)
//!

use std::default::Default;
use std::env;
use std::path::PathBuf;
use std::result::Result;
use std::time::Duration;

use crate::error::{ia_err, DataAPIError};
use crate::handle::Handle;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Certificate, Client};

pub(crate) const DEFAULT_KEYSPACE: &str = "default_keyspace";
pub(crate) const DEFAULT_API_PATH: &str = "/api/json";
pub(crate) const DEFAULT_API_VERSION: &str = "v1";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder used to set all the parameters to create a [`Data API Handle`](crate::Handle).
///
/// At a minimum, an API endpoint must be given, either with
/// [`api_endpoint()`](HandleBuilder::api_endpoint()) or through the environment
/// (see [`from_environment()`](HandleBuilder::from_environment())).
#[derive(Default, Debug, Clone)]
pub struct HandleBuilder {
    pub(crate) api_endpoint: String,
    pub(crate) token: Option<String>,
    pub(crate) keyspace: Option<String>,
    pub(crate) api_path: Option<String>,
    pub(crate) api_version: Option<String>,
    pub(crate) caller_name: Option<String>,
    pub(crate) caller_version: Option<String>,
    pub(crate) additional_headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) embedding_api_key: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) add_cert: Option<Certificate>,
    pub(crate) client: Option<Client>,
    pub(crate) accept_invalid_certs: bool,
    // For error messaging
    pub(crate) from_environment: bool,
}

impl HandleBuilder {
    /// Create a new HandleBuilder struct.
    ///
    /// The default HandleBuilder has no endpoint and no token. Consider calling
    /// [`from_environment()`](HandleBuilder::from_environment()) to collect all parameters from
    /// the local environment by default.
    pub fn new() -> Self {
        HandleBuilder {
            ..Default::default()
        }
    }
    /// Build a new [`Handle`].
    ///
    /// Note: Internally, if the [`HandleBuilder`] contains
    /// a reference to an existing [`reqwest::Client`], it will clone and
    /// use that. Otherwise, it will create a new [`reqwest::Client`] for its
    /// own internal use. See [`reqwest_client()`](HandleBuilder::reqwest_client()).
    pub async fn build(self) -> Result<Handle, DataAPIError> {
        Handle::new(&self).await
    }
    /// Gather configuration settings from the current envrionment.
    ///
    /// This method will scan the process [`standard environment`](std::env::Vars) to collect and
    /// set the configuration parameters. The values can be overridden in code if this method is
    /// called first and other methods are called afterwards, for example:
    ///```no_run
    /// # use data_api_rust_sdk::Handle;
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    ///   let handle = Handle::builder()
    ///       .from_environment()?
    ///       .keyspace("my_keyspace")?
    ///       .build()
    ///       .await?;
    /// # Ok(())
    /// # }
    ///```
    /// The following environment variables are used:
    ///
    /// | variable | description |
    /// | -------- | ----------- |
    /// | `ASTRA_DB_API_ENDPOINT` | The API endpoint of the database. See [`HandleBuilder::api_endpoint()`]. |
    /// | `ASTRA_DB_APPLICATION_TOKEN` | The application token. See [`HandleBuilder::token()`]. |
    /// | `ASTRA_DB_TOKEN_FILE` | A file holding the application token. See [`HandleBuilder::token_from_file()`]. |
    /// | `ASTRA_DB_KEYSPACE` | The working keyspace. See [`HandleBuilder::keyspace()`]. |
    /// | `ASTRA_DB_CALLER_NAME` | The caller name sent in the User-Agent. See [`HandleBuilder::caller()`]. |
    /// | `ASTRA_DB_CALLER_VERSION` | The caller version sent in the User-Agent. |
    /// | `ASTRA_DB_ACCEPT_INVALID_CERTS` | If this is set to `1` or `true`, do not check certificates (see [`HandleBuilder::danger_accept_invalid_certs()`]). |
    ///
    pub fn from_environment(mut self) -> Result<Self, DataAPIError> {
        self.from_environment = true;
        if let Some(val) = env::var("ASTRA_DB_API_ENDPOINT").ok() {
            self = self.api_endpoint(&val)?;
        }
        if let Some(val) = env::var("ASTRA_DB_TOKEN_FILE").ok() {
            self = self.token_from_file(&val)?;
        }
        // an explicit token wins over the token file
        if let Some(val) = env::var("ASTRA_DB_APPLICATION_TOKEN").ok() {
            self = self.token(&val)?;
        }
        if let Some(val) = env::var("ASTRA_DB_KEYSPACE").ok() {
            self = self.keyspace(&val)?;
        }
        if let Some(name) = env::var("ASTRA_DB_CALLER_NAME").ok() {
            let version = env::var("ASTRA_DB_CALLER_VERSION").ok();
            self = self.caller(&name, version.as_deref())?;
        }
        if let Some(val) = env::var("ASTRA_DB_ACCEPT_INVALID_CERTS").ok() {
            let lv = val.to_lowercase();
            if lv == "true" || lv == "1" {
                self = self.danger_accept_invalid_certs(true)?;
            }
        }
        Ok(self)
    }
    /// Set the API endpoint of the database.
    ///
    /// Examples:
    /// ```text
    ///     // Astra DB
    ///     https://01234567-89ab-cdef-0123-456789abcdef-us-east1.apps.astra.datastax.com
    ///
    ///     // Local Data API
    ///     http://localhost:8181
    /// ```
    /// Any trailing `/` is removed.
    pub fn api_endpoint(mut self, endpoint: &str) -> Result<Self, DataAPIError> {
        let ep = endpoint.trim().trim_end_matches('/');
        if ep.is_empty() {
            return ia_err!("api endpoint must not be empty");
        }
        if !ep.starts_with("https://") && !ep.starts_with("http://") {
            return ia_err!(
                "api endpoint must start with http:// or https://, got '{}'",
                endpoint
            );
        }
        self.api_endpoint = ep.to_string();
        Ok(self)
    }
    /// Set the application token sent with every request in the `Token` header.
    pub fn token(mut self, token: &str) -> Result<Self, DataAPIError> {
        if token.is_empty() {
            return ia_err!("token must not be empty");
        }
        self.token = Some(token.to_string());
        Ok(self)
    }
    /// Read the application token from a local file.
    ///
    /// The file should contain only the token; surrounding whitespace is ignored.
    /// A leading `~/` is expanded to the user's home directory.
    pub fn token_from_file(self, filename: &str) -> Result<Self, DataAPIError> {
        let data = file_to_string(filename)?;
        let token = data.trim();
        if token.is_empty() {
            return ia_err!("token file {} is empty", filename);
        }
        self.token(token)
    }
    /// Set the keyspace used by [`Handle::database()`].
    ///
    /// The default keyspace is `default_keyspace`.
    pub fn keyspace(mut self, keyspace: &str) -> Result<Self, DataAPIError> {
        if keyspace.is_empty() {
            return ia_err!("keyspace must not be empty");
        }
        self.keyspace = Some(keyspace.to_string());
        Ok(self)
    }
    /// Set the path prefix of the Data API on the endpoint. Default is `/api/json`.
    ///
    /// An empty string means no prefix.
    pub fn api_path(mut self, path: &str) -> Result<Self, DataAPIError> {
        self.api_path = Some(path.trim().to_string());
        Ok(self)
    }
    /// Set the version segment of the Data API path. Default is `v1`.
    pub fn api_version(mut self, version: &str) -> Result<Self, DataAPIError> {
        self.api_version = Some(version.trim().to_string());
        Ok(self)
    }
    /// Identify the calling application.
    ///
    /// The caller is prepended to the User-Agent header, as `name/version`.
    pub fn caller(mut self, name: &str, version: Option<&str>) -> Result<Self, DataAPIError> {
        if name.is_empty() {
            return ia_err!("caller name must not be empty");
        }
        self.caller_name = Some(name.to_string());
        self.caller_version = version.filter(|v| !v.is_empty()).map(|v| v.to_string());
        Ok(self)
    }
    /// Add a header sent with every request.
    ///
    /// Additional headers override the headers set by the SDK itself.
    pub fn additional_header(mut self, name: &str, value: &str) -> Result<Self, DataAPIError> {
        let hn = HeaderName::from_bytes(name.as_bytes())?;
        let hv = HeaderValue::from_str(value)?;
        self.additional_headers.retain(|(n, _)| n != &hn);
        self.additional_headers.push((hn, hv));
        Ok(self)
    }
    /// Set the key sent in the `x-embedding-api-key` header, for collections
    /// using server-side vectorize with a key-based embedding provider.
    pub fn embedding_api_key(mut self, key: &str) -> Result<Self, DataAPIError> {
        self.embedding_api_key = Some(key.to_string());
        Ok(self)
    }
    /// Add a certificate to use for https connections from a file.
    ///
    /// The file must contain an x509 certificate in `PEM` file format.
    pub fn add_cert_from_pemfile(self, pemfile: &str) -> Result<Self, DataAPIError> {
        let buf = file_to_string(pemfile)?.into_bytes();
        match reqwest::Certificate::from_pem(&buf) {
            Ok(cert) => {
                return self.add_cert(cert);
            }
            Err(e) => {
                return ia_err!(
                    "error getting certificate from pemfile {}: {}",
                    pemfile,
                    e.to_string()
                );
            }
        }
    }

    /// Add a certificate to use for https connections.
    pub fn add_cert(mut self, cert: Certificate) -> Result<Self, DataAPIError> {
        self.add_cert = Some(cert);
        Ok(self)
    }
    // see https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#method.danger_accept_invalid_certs
    /// Allow https connection without validating certificates.
    ///
    /// **Warning:** This is only recommended for local testing purposes. Its use is insecure. See [`reqwest::ClientBuilder::danger_accept_invalid_certs()`] for details.
    ///
    pub fn danger_accept_invalid_certs(
        mut self,
        accept_invalid_certs: bool,
    ) -> Result<Self, DataAPIError> {
        self.accept_invalid_certs = accept_invalid_certs;
        Ok(self)
    }
    /// Specify a [`reqwest::Client`] to use for all http/s connections.
    ///
    /// By default, the [`Data API Handle`](crate::Handle) creates an internal [`reqwest::Client`] to use for
    /// all communications. If your application already has a reqwest Client, you can pass that
    /// into the HandleBuilder to avoid creating multiple connection pools.
    pub fn reqwest_client(mut self, client: &Client) -> Result<Self, DataAPIError> {
        self.client = Some(client.clone());
        Ok(self)
    }
    /// Specify the timeout used for operations.
    ///
    /// This is used for both connection and request timeouts.
    /// Note that the request timeout can be overridden for a single command.
    ///
    /// The default timeout is 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Result<Self, DataAPIError> {
        if timeout.is_zero() {
            return ia_err!("timeout must be greater than zero");
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    pub(crate) fn get_keyspace(&self) -> &str {
        self.keyspace.as_deref().unwrap_or(DEFAULT_KEYSPACE)
    }

    pub(crate) fn get_api_path(&self) -> &str {
        self.api_path.as_deref().unwrap_or(DEFAULT_API_PATH)
    }

    pub(crate) fn get_api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }
}

pub(crate) fn expand_user_home(file_path: &str) -> String {
    if file_path.starts_with("~/") || file_path.starts_with("~\\") {
        if let Some(home_dir) = dirs::home_dir() {
            let full_path = home_dir.join(PathBuf::from(correct_path(&file_path[2..])));
            return format!("{}", full_path.display());
        }
    }
    String::from(file_path)
}

fn correct_path(file_path: &str) -> String {
    if cfg!(target_os = "windows") {
        file_path.replace("/", "\\")
    } else {
        String::from(file_path)
    }
}

pub(crate) fn file_to_string(filename: &str) -> Result<String, DataAPIError> {
    let path = expand_user_home(filename);
    match std::fs::read_to_string(&path) {
        Ok(s) => Ok(s),
        Err(e) => ia_err!("error reading file {}: {}", path, e),
    }
}
