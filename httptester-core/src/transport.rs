//! The reqwest client owned by one [`HttpTesterClient`](crate::HttpTesterClient)
//! together with the transport-level defaults (authorization, user agent)
//! applied to every request it sends.
use indexmap::IndexMap;
use reqwest::{
    header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT, WWW_AUTHENTICATE},
    Method, StatusCode, Url,
};
use std::time::{Duration, Instant};
use tracing::*;

use crate::{
    auth::Authorization,
    body::RequestBody,
    masking::Masker,
    ntlm::{self, Credentials},
    Error, Result,
};

/// Everything needed to (re)build one outgoing request.
pub(crate) struct Outgoing<'a> {
    pub method: &'a Method,
    pub url: Url,
    pub headers: &'a IndexMap<String, String>,
    pub body: Option<&'a RequestBody>,
}

#[derive(Debug)]
pub(crate) struct Transport {
    base_address: Url,
    client_certificate: bool,
    pub(crate) user_agent: Vec<String>,
    pub(crate) authorization: Option<Authorization>,
    inner: reqwest::Client,
}

impl Transport {
    pub fn new(base_address: Url, validate_certificate: bool) -> Result<Transport> {
        let insecure =
            !validate_certificate && matches!(base_address.scheme(), "http" | "https");
        if insecure {
            warn!("server certificate validation is disabled for {base_address}; use only against test servers");
        }

        Ok(Transport {
            inner: build_client(insecure)?,
            base_address,
            client_certificate: false,
            user_agent: Vec::new(),
            authorization: None,
        })
    }

    pub fn base_address(&self) -> &Url {
        &self.base_address
    }

    /// Present `identity` during the TLS handshake and require a valid server certificate.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    pub fn use_client_certificate(&mut self, identity: reqwest::Identity) -> Result<()> {
        self.inner = reqwest::Client::builder().identity(identity).build()?;
        self.client_certificate = true;
        self.authorization = Some(Authorization::ClientCertificate);
        Ok(())
    }

    /// Send the request, running the NTLM handshake first when configured.
    /// Returns the response head and the time spent on the wire.
    pub async fn send(
        &self,
        req: &Outgoing<'_>,
        masker: &Masker,
    ) -> Result<(reqwest::Response, Duration)> {
        if let Some(Authorization::Ntlm(creds)) = &self.authorization {
            return self.send_ntlm(req, creds, masker).await;
        }
        self.timed_execute(self.build(req, None)?, masker).await
    }

    async fn send_ntlm(
        &self,
        req: &Outgoing<'_>,
        creds: &Credentials,
        masker: &Masker,
    ) -> Result<(reqwest::Response, Duration)> {
        let negotiate = format!("NTLM {}", ntlm::negotiate());
        let (first, mut elapsed) = self
            .timed_execute(self.build(req, Some(negotiate))?, masker)
            .await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok((first, elapsed));
        }

        let challenge = first
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(ntlm::challenge_from_header);
        let Some(challenge) = challenge else {
            debug!("server answered 401 without an NTLM challenge");
            return Ok((first, elapsed));
        };
        let challenge = challenge?;

        // NTLM authenticates the connection: drain the challenge response so
        // the pooled connection is reused for the final leg.
        let drain_started = Instant::now();
        first.bytes().await?;
        elapsed += drain_started.elapsed();

        let authenticate = format!("NTLM {}", ntlm::authenticate(creds, &challenge));
        let (res, last) = self
            .timed_execute(self.build(req, Some(authenticate))?, masker)
            .await?;
        Ok((res, elapsed + last))
    }

    async fn timed_execute(
        &self,
        request: reqwest::Request,
        masker: &Masker,
    ) -> Result<(reqwest::Response, Duration)> {
        debug!("{} {}", request.method(), masker.url(request.url()));
        trace!(headers = ?masker.headers(request.headers()), "request headers");

        let started = Instant::now();
        let res = self.inner.execute(request).await;
        let elapsed = started.elapsed();

        match res {
            Ok(res) => {
                trace!(headers = ?masker.headers(res.headers()), "response headers");
                Ok((res, elapsed))
            }
            Err(e) => {
                debug!("request failed after {elapsed:?}: {e}");
                Err(self.classify(e))
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> Error {
        if self.client_certificate && is_server_certificate_error(&e) {
            return Error::TlsValidation(error_chain(&e));
        }
        Error::Transport(e)
    }

    fn build(&self, req: &Outgoing<'_>, ntlm_token: Option<String>) -> Result<reqwest::Request> {
        let mut builder = self.inner.request(req.method.clone(), req.url.clone());
        if let Some(body) = req.body {
            builder = body.apply(builder)?;
        }
        let mut request = builder.build()?;

        let headers = request.headers_mut();
        for (name, value) in req.headers {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                warn!("header {name:?} can not be represented on the wire and is not sent");
                continue;
            };
            // the body decides its own content type
            if req.body.is_some() && name == CONTENT_TYPE {
                continue;
            }
            headers.append(name, value);
        }

        // product tokens extend a User-Agent set through the headers
        if !self.user_agent.is_empty() {
            let tokens = self.user_agent.join(" ");
            let agent = match headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{existing} {tokens}"),
                None => tokens,
            };
            headers.insert(USER_AGENT, header_value(&agent)?);
        }

        let authorization = ntlm_token.or_else(|| {
            self.authorization
                .as_ref()
                .and_then(Authorization::header_value)
        });
        if let Some(authorization) = authorization {
            headers.insert(AUTHORIZATION, header_value(&authorization)?);
        }

        Ok(request)
    }
}

fn build_client(insecure: bool) -> Result<reqwest::Client> {
    let builder = reqwest::Client::builder();
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    let builder = builder.danger_accept_invalid_certs(insecure);
    #[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
    let _ = insecure;
    Ok(builder.build()?)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("{value:?} is not a valid header value: {e}")))
}

/// Messages the TLS backends (openssl, schannel, security-framework, rustls)
/// use when the server certificate fails verification.
const SERVER_VERIFICATION_FAILURES: &[&str] = &[
    "certificate verify failed",
    "invalid peer certificate",
    "self signed certificate",
    "self-signed certificate",
    "unable to get local issuer certificate",
    "certificate has expired",
    "not trusted",
    "untrusted root",
    "hostname mismatch",
];

/// reqwest has no typed TLS error, so this is a heuristic over the source
/// chain. Alerts sent by the server about our own identity ("bad certificate",
/// "certificate required") are not verification failures and do not match.
fn is_server_certificate_error(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(e);
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if SERVER_VERIFICATION_FAILURES
            .iter()
            .any(|failure| message.contains(failure))
        {
            return true;
        }
        source = err.source();
    }
    false
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        parts.push(err.to_string());
        source = err.source();
    }
    parts.join(": ")
}
