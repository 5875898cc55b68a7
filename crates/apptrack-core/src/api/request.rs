//! Owned request and response values.
//!
//! A request is kept as plain data rather than a `reqwest::RequestBuilder` so
//! it can be captured when it fails authorization and sent again later. Bodies
//! hold `Bytes`/`serde_json::Value` and clone cheaply.

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use reqwest::Method;

use super::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<MultipartPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File {
        filename: String,
        content_type: String,
        data: Bytes,
    },
}

impl MultipartPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            value: PartValue::File {
                filename: filename.into(),
                content_type: content_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/applications/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    retry: bool,
    pinned_token: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            retry: false,
            pinned_token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Opt this request out of the refresh-and-replay protocol: a 401 is
    /// returned to the caller untouched. Used for credential endpoints, where a
    /// 401 means bad credentials rather than an expired access token.
    pub fn without_refresh(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn is_retry(&self) -> bool {
        self.retry
    }

    pub(crate) fn mark_retry(&mut self) {
        self.retry = true;
    }

    /// Token produced by a refresh for this replay. Takes precedence over
    /// whatever the session holds when the request is decorated.
    pub fn pinned_token(&self) -> Option<&str> {
        self.pinned_token.as_deref()
    }

    pub(crate) fn pin_token(&mut self, token: String) {
        self.pinned_token = Some(token);
    }

    /// The bearer token currently attached to this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn set_bearer(&mut self, token: &str) -> Result<(), ApiError> {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid bearer token: {}", e)))?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_round_trip() {
        let mut request = ApiRequest::get("/applications/");
        assert_eq!(request.bearer_token(), None);
        request.set_bearer("A1").unwrap();
        assert_eq!(request.bearer_token(), Some("A1"));
        request.set_bearer("A2").unwrap();
        assert_eq!(request.bearer_token(), Some("A2"));
    }

    #[test]
    fn test_invalid_bearer_token_is_rejected() {
        let mut request = ApiRequest::get("/applications/");
        assert!(matches!(request.set_bearer("bad\ntoken"), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_without_refresh_marks_retry() {
        let request = ApiRequest::post("/auth/token/");
        assert!(!request.is_retry());
        assert!(request.without_refresh().is_retry());
    }

    #[test]
    fn test_response_json() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"access": "A2"}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["access"], "A2");

        let garbage = ApiResponse::new(StatusCode::OK, "<html>");
        assert!(matches!(garbage.json::<serde_json::Value>(), Err(ApiError::Decode(_))));
    }
}
