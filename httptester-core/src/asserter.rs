//! Deferred checks over one completed [`Response`].
//!
//! Every check appends an [`AssertResult`]; a failing condition is never an
//! error. Only malformed invocations (an empty keyword or header name) return
//! `Err`, which aborts the rest of a `?` chain without recording anything.
//!
//! ```rust
//! use httptester_core::{http::Response, HttpTestAsserter, StatusCode};
//! use reqwest::header::HeaderMap;
//! use std::time::Duration;
//!
//! # fn main() -> httptester_core::Result<()> {
//! let response = Response::new(StatusCode::CREATED, HeaderMap::new(), "created bike scott");
//! let mut asserter = HttpTestAsserter::new(&response);
//! let results = asserter
//!     .body_contains("Scott", true)?
//!     .status_code_is_success()
//!     .duration_satisfies(Duration::from_millis(120), |d| d.as_millis() < 2000, Some("< 2000ms"))
//!     .collect_results();
//!
//! assert_eq!(results.len(), 3);
//! assert!(results.iter().all(|r| r.is_true));
//! # Ok(())
//! # }
//! ```
use reqwest::{header::HeaderName, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::{http::Response, Error, Result};

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertResult {
    /// Name of the check that produced this result.
    pub name: String,
    pub is_true: bool,
    pub message: String,
}

impl std::fmt::Display for AssertResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.is_true { "ok" } else { "FAILED" };
        write!(f, "[{mark}] {}: {}", self.name, self.message)
    }
}

pub struct HttpTestAsserter<'a> {
    response: &'a Response,
    results: Vec<AssertResult>,
}

impl<'a> HttpTestAsserter<'a> {
    pub fn new(response: &'a Response) -> HttpTestAsserter<'a> {
        HttpTestAsserter {
            response,
            results: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, is_true: bool, message: String) -> &mut Self {
        self.results.push(AssertResult {
            name: name.to_string(),
            is_true,
            message,
        });
        self
    }

    /// Does the body contain `keyword`?
    pub fn body_contains(&mut self, keyword: &str, case_insensitive: bool) -> Result<&mut Self> {
        if keyword.is_empty() {
            return Err(Error::InvalidArgument("keyword is empty.".to_string()));
        }

        let body = self.response.text_lossy();
        let found = if case_insensitive {
            body.to_lowercase().contains(&keyword.to_lowercase())
        } else {
            body.contains(keyword)
        };
        let message = if found {
            format!("Response body contains keyword '{keyword}'.")
        } else {
            format!("Response body does not contain keyword '{keyword}'.")
        };
        Ok(self.push("body_contains", found, message))
    }

    /// Compare the declared media type, ignoring parameters such as `charset`.
    /// Media types are case-insensitive, so `Application/JSON` matches
    /// `application/json`.
    pub fn content_type_equals(&mut self, expected: &str) -> Result<&mut Self> {
        if expected.is_empty() {
            return Err(Error::InvalidArgument("expected content type is empty.".to_string()));
        }

        let actual = self.response.content_type().unwrap_or_default();
        let is_true = actual.eq_ignore_ascii_case(expected);
        Ok(self.push(
            "content_type_equals",
            is_true,
            format!("Expected content-type = '{expected}', actual = '{actual}'."),
        ))
    }

    /// Evaluate `predicate` over a duration measured by the caller, usually
    /// [`HttpTesterClient::duration`](crate::HttpTesterClient::duration) or
    /// [`HttpTesterClient::http_duration`](crate::HttpTesterClient::http_duration).
    pub fn duration_satisfies(
        &mut self,
        duration: Duration,
        predicate: impl FnOnce(Duration) -> bool,
        description: Option<&str>,
    ) -> &mut Self {
        let is_true = predicate(duration);
        let verdict = if is_true { "valid" } else { "invalid" };
        let ms = duration.as_millis();
        let message = match description.filter(|d| !d.is_empty()) {
            Some(d) => format!("Duration is '{ms}ms' and is {verdict} with predicate '{d}'."),
            None => format!("Duration is '{ms}ms' and is {verdict}."),
        };
        self.push("duration_satisfies", is_true, message)
    }

    /// Is the header present, whatever its value?
    pub fn has_header(&mut self, name: &str) -> Result<&mut Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("header name is empty.".to_string()));
        }

        let present = HeaderName::from_bytes(name.as_bytes())
            .map(|h| self.response.headers.contains_key(h))
            .unwrap_or(false);
        let message = if present {
            format!("Response message contains header '{name}'.")
        } else {
            format!("Response message does not contain header '{name}'.")
        };
        Ok(self.push("has_header", present, message))
    }

    pub fn status_code_equals(&mut self, expected: StatusCode) -> &mut Self {
        let actual = self.response.status;
        self.push(
            "status_code_equals",
            actual == expected,
            format!("Expected status code = '{expected}', actual = '{actual}'."),
        )
    }

    pub fn status_code_is_success(&mut self) -> &mut Self {
        let actual = self.response.status;
        self.push(
            "status_code_is_success",
            actual.is_success(),
            format!("Expected status code = '2xx', actual = '{actual}'."),
        )
    }

    pub fn body_is_empty(&mut self) -> &mut Self {
        let body = self.response.text_lossy();
        self.push(
            "body_is_empty",
            body.is_empty(),
            format!("Expected empty response body, actual = '{body}'."),
        )
    }

    /// Results in the order the checks were made. Does not clear them.
    pub fn collect_results(&self) -> &[AssertResult] {
        &self.results
    }
}
