//! The response object handed back by [`HttpTesterClient::start`](crate::HttpTesterClient::start)
//! and the helpers test code uses to pull the body out of it.
//!
//! The body is read from the wire exactly once, when the request is executed,
//! and kept in memory. Every extraction helper works on that buffer, so calling
//! `text()` after `json()` (or checking the body through the asserter and then
//! deserializing it) is fine. Large bodies are fully materialized.
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    StatusCode, Url, Version,
};
use serde::de::DeserializeOwned;

use crate::Result;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// Final URL after redirects. `None` for responses built by hand.
    pub url: Option<Url>,
    pub body: Bytes,
}

impl Response {
    /// Build a response without going through the network.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Response {
        Response {
            status,
            version: Version::HTTP_11,
            headers,
            url: None,
            body: body.into(),
        }
    }

    pub(crate) async fn from(res: reqwest::Response) -> Result<Response> {
        let status = res.status();
        let version = res.version();
        let headers = res.headers().clone();
        let url = res.url().clone();
        let body = res.bytes().await?;
        Ok(Response {
            status,
            version,
            headers,
            url: Some(url),
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Declared media type without parameters, e.g. `application/json` for
    /// `application/json; charset=utf-8`.
    pub fn content_type(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        match value.parse::<mime::Mime>() {
            Ok(mime) => Some(mime.essence_str().to_string()),
            Err(_) => value.split(';').next().map(|s| s.trim().to_string()),
        }
    }

    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Body as text with invalid utf-8 sequences replaced.
    pub(crate) fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse the body into an untyped JSON tree for ad-hoc field access.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        self.json()
    }

    pub fn xml<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(quick_xml::de::from_str(&self.text()?)?)
    }
}
