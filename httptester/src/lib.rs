//! # httptester - fluent HTTP test requests and response assertions
//!
//! Configure a request with [`HttpTesterClient`], send it, then collect checks
//! over the response with [`HttpTestAsserter`]:
//!
//! ```rust,no_run
//! use httptester::{check_all, eyre, HttpTestAsserter, HttpTesterClient, Method};
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     httptester::init_logging();
//!
//!     let mut client = HttpTesterClient::new();
//!     let response = client
//!         .initialize("https://qatoolkitapi.azurewebsites.net", true)?
//!         .with_path("/api/bicycles/{id}")
//!         .with_path_replacement_values([("id", "1")])?
//!         .with_query_params([("api-version", "1")])
//!         .with_headers([("ApiKey", "1234")])
//!         .with_method(Method::GET)
//!         .start()
//!         .await?;
//!
//!     let mut asserter = HttpTestAsserter::new(&response);
//!     asserter
//!         .status_code_is_success()
//!         .body_contains("scott", true)?
//!         .has_header("Date")?
//!         .duration_satisfies(client.duration(), |d| d.as_millis() < 2000, Some("< 2s"));
//!
//!     check_all!(asserter.collect_results());
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! Builder and asserter misuse returns [`Error`]; a failed check is only
//! recorded as an [`AssertResult`] with `is_true == false`. `check!`,
//! `check_eq!`, `check_ne!` and `check_all!` turn failures into `eyre` errors
//! so tests can be written as `async fn ... -> eyre::Result<()>`.
//!
//! ## Logging
//!
//! Requests are logged through `tracing` with credentials masked.
//! [`init_logging`] installs a formatter filtered by `RUST_LOG`.

// Re-export error handling crates for user convenience
pub use eyre;
pub use pretty_assertions;

// Re-export core functionality
pub use httptester_core::{
    asserter, auth, body, client, config,
    config::{get_config, Config, EnvironmentConfig},
    descriptor, http, masking, ntlm, AssertResult, Error, ExecutionResult, HttpRequest,
    HttpTestAsserter, HttpTesterClient, Location, Method, Parameter, Result, State, StatusCode,
    {check, check_all, check_eq, check_ne},
};

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set, so it may be called
/// from every test.
pub fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
    {
        tracing::debug!("logging initialized");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
