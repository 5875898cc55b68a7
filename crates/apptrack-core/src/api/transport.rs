//! The seam between the API client and the network.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::request::{ApiRequest, ApiResponse, PartValue, RequestBody};
use super::ApiError;

/// Sends one request and reads the whole response.
///
/// Every status code is a successful send; only failures to talk to the
/// server at all are errors.
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, url: String, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse, ApiError>>;
}

/// Transport backed by a pooled `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn build_form(parts: &[super::request::MultipartPart]) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for part in parts {
            form = match &part.value {
                PartValue::Text(value) => form.text(part.name.clone(), value.clone()),
                PartValue::File {
                    filename,
                    content_type,
                    data,
                } => {
                    let file = Part::bytes(data.to_vec())
                        .file_name(filename.clone())
                        .mime_str(content_type)?;
                    form.part(part.name.clone(), file)
                }
            };
        }
        Ok(form)
    }

    async fn execute(&self, url: String, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(Self::build_form(parts)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!(method = %request.method, url = %url, status = status.as_u16(), "Response received");

        Ok(ApiResponse { status, headers, body })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, url: String, request: &'a ApiRequest) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        self.execute(url, request).boxed()
    }
}
