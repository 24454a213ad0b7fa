//! Fluent builder that configures and sends one HTTP test request.
//!
//! ```rust,no_run
//! use httptester_core::{HttpTesterClient, Method};
//!
//! # async fn run() -> httptester_core::Result<()> {
//! let mut client = HttpTesterClient::new();
//! let response = client
//!     .initialize("https://api.example.com", true)?
//!     .with_path("/api/bicycles/{id}")
//!     .with_path_replacement_values([("id", "1")])?
//!     .with_query_params([("api-version", "1")])
//!     .with_method(Method::GET)
//!     .start()
//!     .await?;
//!
//! assert!(response.is_success());
//! println!("took {:?}", client.duration());
//! # Ok(())
//! # }
//! ```
use bytes::Bytes;
use indexmap::IndexMap;
use itertools::Itertools;
use reqwest::{Method, Url};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::*;

use crate::{
    auth::Authorization,
    body::{MultipartPart, RequestBody},
    config::{get_config, EnvironmentConfig},
    descriptor::{HttpRequest, Location},
    http::Response,
    masking::Masker,
    ntlm::Credentials,
    transport::{Outgoing, Transport},
    Error, Result,
};

/// Lifecycle of a [`HttpTesterClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Uninitialized,
    Configuring,
    /// At least one request was sent. `start` may still be called again.
    Executed,
    Disposed,
}

/// Response plus the two measured durations of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Response,
    /// Wall clock time of the whole `execute` call, body buffering included.
    pub duration: Duration,
    /// Wall clock time spent sending the request and receiving the response head.
    pub http_duration: Duration,
}

#[derive(Debug, Default)]
pub struct HttpTesterClient {
    transport: Option<Transport>,
    state: State,
    path: Option<String>,
    method: Option<Method>,
    headers: IndexMap<String, String>,
    query_parameters: IndexMap<String, String>,
    body: Option<RequestBody>,
    masker: Masker,
    duration: Duration,
    http_duration: Duration,
}

impl HttpTesterClient {
    pub fn new() -> HttpTesterClient {
        HttpTesterClient::default()
    }

    /// Create the underlying transport for `base_address`.
    ///
    /// With `validate_certificate = false` any server certificate is accepted.
    /// This is insecure and meant for test servers with self-signed certificates.
    pub fn initialize(
        &mut self,
        base_address: impl AsRef<str>,
        validate_certificate: bool,
    ) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        let base_address = Url::parse(base_address.as_ref())?;
        self.transport = Some(Transport::new(base_address, validate_certificate)?);
        self.state = State::Configuring;
        Ok(self)
    }

    /// Initialize from an externally produced request descriptor.
    ///
    /// Path and method are taken over; query and header parameters that carry
    /// a value are added to the request.
    pub fn initialize_from_descriptor(
        &mut self,
        descriptor: &HttpRequest,
        validate_certificate: bool,
    ) -> Result<&mut Self> {
        self.ensure_uninitialized()?;
        if descriptor.path.is_empty() {
            return Err(Error::Configuration(
                "HttpRequest path is required.".to_string(),
            ));
        }

        self.initialize(&descriptor.base_path, validate_certificate)?;
        self.path = Some(descriptor.path.clone());
        self.method = Some(descriptor.method.clone());

        for (name, value) in descriptor.parameters_in(Location::Query) {
            self.query_parameters
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        self.with_headers(descriptor.parameters_in(Location::Header));

        Ok(self)
    }

    /// Initialize from a configured environment (`base_url`,
    /// `validate_certificate`, `mask_sensitive`).
    pub fn initialize_from_environment(&mut self, env: &EnvironmentConfig) -> Result<&mut Self> {
        let base_url = env.base_url.as_deref().ok_or_else(|| {
            Error::Configuration(format!("environment \"{}\" has no base_url", env.name))
        })?;
        self.masker = Masker::new(env.mask_sensitive);
        self.initialize(base_url, env.validate_certificate)
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        if self.state != State::Uninitialized || self.transport.is_some() {
            return Err(Error::Configuration(
                "HTTP client is already initialized. Create a new HttpTesterClient.".to_string(),
            ));
        }
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Transport> {
        self.transport.as_mut().ok_or_else(|| {
            Error::Configuration(
                "HTTP client is not initialized. Call 'initialize' first.".to_string(),
            )
        })
    }

    /// Relative path joined to the base address. May contain `{name}` placeholders.
    pub fn with_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    /// Replace `{key}` in the current path with the matching value.
    pub fn with_path_replacement_values<K, V>(
        &mut self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<&mut Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let Some(path) = self.path.as_mut().filter(|p| !p.is_empty()) else {
            return Err(Error::Configuration(
                "path is empty. Use 'with_path' before calling 'with_path_replacement_values'."
                    .to_string(),
            ));
        };

        for (key, value) in values {
            *path = path.replace(&format!("{{{}}}", key.as_ref()), value.as_ref());
        }
        Ok(self)
    }

    /// Add request headers. A header that was already set keeps its first value.
    /// Header names are compared case-insensitively.
    pub fn with_headers<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            let name = name.into();
            if self.headers.keys().any(|k| k.eq_ignore_ascii_case(&name)) {
                trace!("header {name:?} is already set, keeping the first value");
                continue;
            }
            self.headers.insert(name, value.into());
        }
        self
    }

    pub fn with_method(&mut self, method: Method) -> &mut Self {
        self.method = Some(method);
        self
    }

    /// Replace all query parameters. Values are sent verbatim, so they must
    /// already be percent-encoded where needed.
    pub fn with_query_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_parameters = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Serialize `body` into a JSON body. Values serializing to `null` (such
    /// as `None`) leave the current body untouched.
    pub fn with_json_body<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<&mut Self> {
        self.ensure_no_multipart()?;
        let json = serde_json::to_string(body)?;
        if json == "null" {
            return Ok(self);
        }
        self.body = Some(RequestBody::Json(json));
        Ok(self)
    }

    /// Set already serialized JSON text as the body. It is sent verbatim.
    pub fn with_json_text(&mut self, json: impl Into<String>) -> Result<&mut Self> {
        self.ensure_no_multipart()?;
        self.body = Some(RequestBody::Json(json.into()));
        Ok(self)
    }

    fn ensure_no_multipart(&self) -> Result<()> {
        if let Some(RequestBody::Multipart(_)) = self.body {
            return Err(Error::Conflict(
                "Body multipart/form-data already defined on the HTTP client. Can not add application/json content type."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Append a text field to the multipart body.
    pub fn with_multipart_field(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = non_empty("name", name.into())?;
        self.push_part(MultipartPart::Field {
            name,
            value: value.into(),
        })
    }

    /// Append a file to the multipart body. Its content type is guessed from `file_name`.
    pub fn with_multipart_file(
        &mut self,
        content: impl Into<Bytes>,
        name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = non_empty("name", name.into())?;
        let file_name = non_empty("file_name", file_name.into())?;
        self.push_part(MultipartPart::File {
            name,
            file_name,
            content: content.into(),
        })
    }

    fn push_part(&mut self, part: MultipartPart) -> Result<&mut Self> {
        match &mut self.body {
            Some(RequestBody::Json(_)) => Err(Error::Conflict(
                "Body application/json already defined on the HTTP client. Can not add multipart/form-data content type."
                    .to_string(),
            )),
            Some(RequestBody::Multipart(parts)) => {
                parts.push(part);
                Ok(self)
            }
            None => {
                self.body = Some(RequestBody::Multipart(vec![part]));
                Ok(self)
            }
        }
    }

    pub fn with_basic_authentication(
        &mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<&mut Self> {
        let user = non_empty("user", user.into())?;
        self.set_authorization(Authorization::Basic {
            user,
            password: password.into(),
        })
    }

    pub fn with_bearer_authentication(&mut self, token: impl Into<String>) -> Result<&mut Self> {
        let token = non_empty("token", token.into())?;
        self.set_authorization(Authorization::Bearer(token))
    }

    /// NTLM with explicit credentials. `user` may be written as `DOMAIN\user`.
    pub fn with_ntlm_authentication(
        &mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<&mut Self> {
        let user = non_empty("user", user.into())?;
        let password = non_empty("password", password.into())?;
        self.set_authorization(Authorization::Ntlm(Credentials::new(user, password)))
    }

    /// NTLM with the ambient credentials of the current configuration environment.
    pub fn with_default_ntlm_authentication(&mut self) -> Result<&mut Self> {
        let creds = get_config().current()?.ntlm_credentials().ok_or_else(|| {
            Error::Configuration(
                "no ambient NTLM credentials configured. Set [environments.ntlm] or HTTPTESTER_NTLM_USER/HTTPTESTER_NTLM_PASSWORD."
                    .to_string(),
            )
        })?;
        self.with_ntlm_credentials(creds)
    }

    pub fn with_ntlm_credentials(&mut self, creds: Credentials) -> Result<&mut Self> {
        self.set_authorization(Authorization::Ntlm(creds))
    }

    /// Authenticate with a TLS client certificate. The server certificate is
    /// then always validated, even if the client was initialized without
    /// certificate validation; a rejected server certificate surfaces as
    /// [`Error::TlsValidation`] from `start`. That classification is made from
    /// the TLS backend's error messages. Any other handshake failure, such as
    /// the server refusing the identity, stays [`Error::Transport`].
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    pub fn with_certificate_authentication(
        &mut self,
        identity: reqwest::Identity,
    ) -> Result<&mut Self> {
        self.transport_mut()?.use_client_certificate(identity)?;
        Ok(self)
    }

    fn set_authorization(&mut self, authorization: Authorization) -> Result<&mut Self> {
        let transport = self.transport_mut()?;
        debug!("using {} authorization", authorization.scheme());
        transport.authorization = Some(authorization);
        Ok(self)
    }

    /// Append `name/version (url)` to the `User-Agent` header.
    pub fn with_user_agent(
        &mut self,
        product_name: impl Into<String>,
        product_version: impl Into<String>,
        product_url: impl Into<String>,
    ) -> Result<&mut Self> {
        let name = non_empty("product_name", product_name.into())?;
        let version = non_empty("product_version", product_version.into())?;
        let url = non_empty("product_url", product_url.into())?;

        let transport = self.transport_mut()?;
        transport.user_agent.push(format!("{name}/{version}"));
        transport.user_agent.push(format!("({url})"));
        Ok(self)
    }

    /// Turn masking of credentials in request logs on or off.
    pub fn mask_sensitive_logs(&mut self, enabled: bool) -> &mut Self {
        self.masker = Masker::new(enabled);
        self
    }

    /// Send the request and return the response.
    ///
    /// May be called repeatedly; every call re-sends the current configuration.
    pub async fn start(&mut self) -> Result<Response> {
        Ok(self.execute().await?.response)
    }

    /// Like [`start`](Self::start), also returning both measured durations.
    pub async fn execute(&mut self) -> Result<ExecutionResult> {
        let started = Instant::now();

        let Some(transport) = self.transport.as_ref() else {
            return Err(Error::Configuration(
                "HTTP client is not initialized. Call 'initialize' first.".to_string(),
            ));
        };
        let Some(method) = self.method.as_ref() else {
            return Err(Error::Configuration(
                "Define method for a HTTP request.".to_string(),
            ));
        };
        if (*method == Method::GET || *method == Method::HEAD) && self.body.is_some() {
            return Err(Error::Configuration(format!(
                "'{method}' method can not have a HTTP body."
            )));
        }

        let url = transport.base_address().join(&self.request_target())?;
        let outgoing = Outgoing {
            method,
            url,
            headers: &self.headers,
            body: self.body.as_ref(),
        };

        let (res, http_duration) = transport.send(&outgoing, &self.masker).await?;
        let response = Response::from(res).await?;
        let duration = started.elapsed();

        debug!(
            "{} {} -> {} in {duration:?} (http {http_duration:?})",
            method,
            self.masker.url(&outgoing.url),
            response.status,
        );

        self.state = State::Executed;
        self.duration = duration;
        self.http_duration = http_duration;

        Ok(ExecutionResult {
            response,
            duration,
            http_duration,
        })
    }

    /// `path?key=value&...` with keys and values as given.
    fn request_target(&self) -> String {
        let path = self.path.as_deref().unwrap_or_default();
        if self.query_parameters.is_empty() {
            return path.to_string();
        }
        let query = self
            .query_parameters
            .iter()
            .format_with("&", |(k, v), f| f(&format_args!("{k}={v}")));
        format!("{path}?{query}")
    }

    /// Release the transport. Safe to call more than once; returns whether
    /// anything was released.
    pub fn dispose(&mut self) -> bool {
        self.state = State::Disposed;
        match self.transport.take() {
            Some(transport) => {
                trace!("releasing transport for {}", transport.base_address());
                drop(transport);
                true
            }
            None => false,
        }
    }

    pub fn request_headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    pub fn query_parameters(&self) -> &IndexMap<String, String> {
        &self.query_parameters
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        self.transport.as_ref()?.authorization.as_ref()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Total duration of the last execution.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Network duration of the last execution.
    pub fn http_duration(&self) -> Duration {
        self.http_duration
    }
}

impl Drop for HttpTesterClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn non_empty(argument: &str, value: String) -> Result<String> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{argument} is empty.")));
    }
    Ok(value)
}
