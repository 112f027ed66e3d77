//
// Copyright (c) 2024 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use serde_json::{Map, Value};

include!(concat!(env!("OUT_DIR"), "/ua.rs"));

pub(crate) fn sdk_version() -> &'static str {
    SDK_VERSION
}

pub(crate) fn user_agent() -> &'static str {
    USER_AGENT
}

/// Enumeration of all possible errors returned by this library.
#[derive(Debug, Clone)]
pub struct DataAPIError {
    pub code: DataAPIErrorCode,
    pub message: String,
    /// The individual error items returned by the Data API, if any.
    ///
    /// This is only populated for [`DataAPIErrorCode::ApiError`].
    pub descriptors: Vec<DataAPIErrorDescriptor>,
}

impl std::error::Error for DataAPIError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::fmt::Display for DataAPIError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "code={:?} message=\"{}\"", self.code, self.message)
    }
}

impl DataAPIError {
    pub fn new(code: DataAPIErrorCode, msg: &str) -> DataAPIError {
        DataAPIError {
            code,
            message: msg.to_string(),
            descriptors: Vec::new(),
        }
    }

    /// Build an [`ApiError`](DataAPIErrorCode::ApiError) from the `errors` array of a response.
    pub(crate) fn from_api_errors(errors: &[Value]) -> DataAPIError {
        let descriptors: Vec<DataAPIErrorDescriptor> = errors
            .iter()
            .map(DataAPIErrorDescriptor::from_value)
            .collect();
        let summaries: Vec<String> = descriptors
            .iter()
            .map(|d| d.summary())
            .filter(|s| !s.is_empty())
            .collect();
        let message = if summaries.is_empty() {
            "the Data API returned an error with no details".to_string()
        } else {
            summaries.join("; ")
        };
        DataAPIError {
            code: DataAPIErrorCode::ApiError,
            message,
            descriptors,
        }
    }

    /// Returns true if this error was caused by using a cursor in the wrong state.
    pub fn is_usage_error(&self) -> bool {
        self.code == DataAPIErrorCode::CursorState
    }
}

/// A single error (or warning) item as returned in the body of a Data API response.
///
/// The Data API may answer with a successful HTTP status and still carry a list
/// of errors in the response body. Each of them is parsed into one of these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataAPIErrorDescriptor {
    pub title: Option<String>,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub family: Option<String>,
    pub scope: Option<String>,
    pub id: Option<String>,
    /// Any other key-value pairs found in the error item.
    pub attributes: Map<String, Value>,
}

const DESCRIPTOR_KNOWN_FIELDS: [&str; 6] = ["title", "errorCode", "message", "family", "scope", "id"];

impl DataAPIErrorDescriptor {
    pub fn from_value(v: &Value) -> DataAPIErrorDescriptor {
        let obj = match v {
            Value::Object(o) => o,
            Value::String(s) => {
                return DataAPIErrorDescriptor {
                    message: Some(s.clone()),
                    ..Default::default()
                };
            }
            other => {
                return DataAPIErrorDescriptor {
                    message: Some(other.to_string()),
                    ..Default::default()
                };
            }
        };
        let get = |k: &str| obj.get(k).and_then(|x| x.as_str()).map(|s| s.to_string());
        let mut attributes = Map::new();
        for (k, val) in obj.iter() {
            if !DESCRIPTOR_KNOWN_FIELDS.contains(&k.as_str()) {
                attributes.insert(k.clone(), val.clone());
            }
        }
        DataAPIErrorDescriptor {
            title: get("title"),
            error_code: get("errorCode"),
            message: get("message"),
            family: get("family"),
            scope: get("scope"),
            id: get("id"),
            attributes,
        }
    }

    /// A succinct one-line description of the error item.
    pub fn summary(&self) -> String {
        let text = match (&self.title, &self.message) {
            (Some(t), Some(m)) => Some(format!("{}: {}", t, m)),
            (Some(t), None) => Some(t.clone()),
            (None, Some(m)) => Some(m.clone()),
            (None, None) => None,
        };
        match (text, &self.error_code) {
            (Some(t), Some(c)) => format!("{} ({})", t, c),
            (Some(t), None) => t,
            (None, Some(c)) => c.clone(),
            (None, None) => String::new(),
        }
    }
}

impl std::fmt::Display for DataAPIErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

macro_rules! ia_error {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        DataAPIError {
            code: crate::error::DataAPIErrorCode::IllegalArgument,
            message: format!("{} ({})", m, crate::error::sdk_version()),
            descriptors: Vec::new(),
        }
    }};
}

pub(crate) use ia_error;

macro_rules! ia_err {
    ($($t:tt)*) => {{
        Err(crate::error::ia_error!($($t)*))
    }};
}

pub(crate) use ia_err;

// Cursor misuse: reported synchronously, before any I/O.
macro_rules! usage_err {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        Err(DataAPIError {
            code: crate::error::DataAPIErrorCode::CursorState,
            message: format!("{} ({})", m, crate::error::sdk_version()),
            descriptors: Vec::new(),
        })
    }};
}

pub(crate) use usage_err;

macro_rules! bad_response {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        DataAPIError {
            code: crate::error::DataAPIErrorCode::BadResponse,
            message: format!("{} ({})", m, crate::error::sdk_version()),
            descriptors: Vec::new(),
        }
    }};
}

pub(crate) use bad_response;

impl From<reqwest::Error> for DataAPIError {
    fn from(e: reqwest::Error) -> Self {
        let mut code = DataAPIErrorCode::ServerError;
        if e.is_timeout() {
            code = DataAPIErrorCode::RequestTimeout;
        }
        DataAPIError {
            code,
            message: format!("reqwest error: {} ({})", e, crate::error::sdk_version()),
            descriptors: Vec::new(),
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for DataAPIError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        ia_error!("invalid header value: {}", e)
    }
}

impl From<reqwest::header::InvalidHeaderName> for DataAPIError {
    fn from(e: reqwest::header::InvalidHeaderName) -> Self {
        ia_error!("invalid header name: {}", e)
    }
}

impl From<url::ParseError> for DataAPIError {
    fn from(e: url::ParseError) -> Self {
        ia_error!("error parsing url: {}", e)
    }
}

impl From<serde_json::Error> for DataAPIError {
    fn from(e: serde_json::Error) -> Self {
        bad_response!("invalid json: {}", e)
    }
}

impl From<std::io::Error> for DataAPIError {
    fn from(e: std::io::Error) -> Self {
        ia_error!("i/o error: {}", e)
    }
}

/// DataAPIErrorCode represents the category of a [`DataAPIError`].
///
/// Errors fall into three groups:
///
/// 1. Local errors, detected before anything is sent over the network:
///    illegal arguments and cursor misuse.
///
/// 2. Transport errors: timeouts, connection failures and non-success http statuses.
///
/// 3. Errors reported by the Data API itself, or responses that cannot be understood.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DataAPIErrorCode {
    /// IllegalArgument error represents the application provided an illegal
    /// argument for the operation.
    IllegalArgument,

    /// CursorState error represents an operation attempted on a cursor in a state
    /// that does not allow it, such as changing the sort of a cursor that has already
    /// returned documents, or using a closed cursor.
    CursorState,

    /// IndexOutOfRange error represents a positional lookup on a cursor
    /// for which no document exists.
    IndexOutOfRange,

    /// RequestTimeout error represents the request did not complete
    /// when the specified timeout duration elapsed.
    ///
    /// Note that the server may have processed the request anyway.
    RequestTimeout,

    /// HttpError represents a non-success http status returned by the service.
    HttpError,

    /// ServerError represents a failure to communicate with the service.
    ServerError,

    /// ApiError represents one or more errors returned by the Data API in
    /// the body of a response. See [`DataAPIError::descriptors`].
    ApiError,

    /// BadResponse represents a response body that could not be decoded, or that
    /// did not have the expected shape.
    BadResponse,

    /// TooManyDocumentsToCount error represents a count operation that exceeded
    /// either the caller-provided upper bound or the maximum the Data API is willing to count.
    TooManyDocumentsToCount,

    /// UnknownError represents an unknown error.
    UnknownError,
}
