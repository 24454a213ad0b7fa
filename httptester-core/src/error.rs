pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required argument was empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An operation was called out of order or a required value is missing.
    #[error("{0}")]
    Configuration(String),
    /// JSON and multipart bodies were both requested on one builder.
    #[error("{0}")]
    Conflict(String),
    /// The server certificate was rejected while client-certificate authentication was active.
    #[error("server certificate validation failed: {0}")]
    TlsValidation(String),
    /// Failure reported by the underlying HTTP client, surfaced unchanged.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to deserialize http response into the specified type: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("failed to deserialize xml response into the specified type: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("response body is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("ntlm handshake failed: {0}")]
    Ntlm(String),
    /// Occurs when `httptester.toml` fails to load.
    #[error("failed to load httptester.toml: {0}")]
    LoadError(String),
    /// Occurs when the specified key is not found in the configuration.
    #[error("the specified key \"{0}\" not found in httptester.toml")]
    ValueNotFound(String),
    #[error("invalid configuration value: {0:#}")]
    ValueError(eyre::Error),
}
