//! The generic request wrapper every endpoint goes through.
//!
//! # Design
//! `ApiRequestBuilder` plays the role of the options record: method, extra
//! headers and an optional JSON body. `build` fixes the expected response
//! type and produces an `ApiRequest<T>`, which carries the plain
//! `HttpRequest` plus the type to parse the response into. Keeping `T` on
//! the request means the endpoint, not the caller, decides what a response
//! deserializes to.
//!
//! Status handling is deliberately uniform: anything outside 200..=299 is
//! an `ApiError::Request` holding the raw status and body text.

use std::fmt;
use std::marker::PhantomData;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{Credentials, HttpMethod, HttpRequest, HttpResponse};

pub const CONTENT_TYPE: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";

/// Characters escaped when a caller-supplied value becomes one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode `value` for use as a single path segment.
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// A fully built request whose successful response parses into `T`.
pub struct ApiRequest<T> {
    request: HttpRequest,
    _response: PhantomData<fn() -> T>,
}

impl<T> Clone for ApiRequest<T> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            _response: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ApiRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiRequest").field(&self.request).finish()
    }
}

impl<T> ApiRequest<T> {
    pub fn http(&self) -> &HttpRequest {
        &self.request
    }

    pub fn into_http(self) -> HttpRequest {
        self.request
    }
}

impl<T: DeserializeOwned> ApiRequest<T> {
    pub fn parse(&self, response: HttpResponse) -> Result<T, ApiError> {
        parse_response(response)
    }
}

/// Check the status and deserialize the body.
///
/// An empty body is read as JSON `null`, so endpoints answering 204 parse
/// into `()`.
pub fn parse_response<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Request {
            status: response.status,
            body: response.body,
        });
    }
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Options for a single request. Obtained from `ApiClient::api`.
#[derive(Debug)]
pub struct ApiRequestBuilder {
    url: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    body: Option<Result<String, ApiError>>,
}

impl ApiRequestBuilder {
    pub(crate) fn new(url: String, default_headers: &[(String, String)]) -> Self {
        let mut headers = vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())];
        merge_headers(&mut headers, default_headers.iter().cloned());
        Self {
            url,
            method: HttpMethod::default(),
            headers,
            body: None,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a header, replacing any earlier header with the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        merge_headers(&mut self.headers, [(name.to_string(), value.to_string())]);
        self
    }

    /// Serialize `body` as the JSON payload. A serialization failure is
    /// reported by `build`.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string())));
        self
    }

    pub fn build<T>(self) -> Result<ApiRequest<T>, ApiError> {
        let body = self.body.transpose()?;
        tracing::debug!(method = %self.method, url = %self.url, "built request");
        Ok(ApiRequest {
            request: HttpRequest {
                method: self.method,
                path: self.url,
                headers: self.headers,
                body,
                credentials: Credentials::Include,
            },
            _response: PhantomData,
        })
    }
}

fn merge_headers(
    headers: &mut Vec<(String, String)>,
    extra: impl IntoIterator<Item = (String, String)>,
) {
    for (name, value) in extra {
        match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(existing) => *existing = (name, value),
            None => headers.push((name, value)),
        }
    }
}
