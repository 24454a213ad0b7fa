//! # httptester core
//!
//! Building blocks for HTTP API tests:
//! - [`HttpTesterClient`], a fluent builder that configures, sends and times one request
//! - [`HttpTestAsserter`], deferred checks over the returned [`Response`](http::Response)
//! - request descriptors, authorization schemes (Basic, Bearer, NTLM, client certificate)
//! - configuration loaded from `httptester.toml` and the environment
//! - checking macros that return errors instead of panicking
//!
//! ```text
//! +--------------------+   start()   +------------+   &Response   +-------------------+
//! | HttpTesterClient   | ----------> | Response   | ------------> | HttpTestAsserter  |
//! | path/query/headers |   reqwest   | + duration |               | Vec<AssertResult> |
//! | body/auth/agent    |             +------------+               +-------------------+
//! +--------------------+                                                   |
//!          ^                                                               v
//! +--------------------+                                          check_all!(results)
//! | HttpRequest / env  |
//! +--------------------+
//! ```
//!
//! Most users should depend on the `httptester` crate instead of this one.

pub mod asserter;
#[doc(hidden)]
pub mod assertion;
pub mod auth;
pub mod body;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod masking;
pub mod ntlm;
mod transport;

// Re-export crates used by the checking macros
pub use eyre;
pub use pretty_assertions;

pub use asserter::{AssertResult, HttpTestAsserter};
pub use client::{ExecutionResult, HttpTesterClient, State};
pub use config::{get_config, Config, EnvironmentConfig};
pub use descriptor::{HttpRequest, Location, Parameter};
pub use error::{Error, Result};
pub use reqwest::{Method, StatusCode};
