use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::ntlm::Credentials;

/// Authorization mechanism attached to every request sent by a builder.
#[derive(Debug, Clone)]
pub enum Authorization {
    Basic { user: String, password: String },
    Bearer(String),
    Ntlm(Credentials),
    /// TLS client certificate; the identity itself lives in the transport.
    ClientCertificate,
}

impl Authorization {
    /// Static `Authorization` header value, if the scheme has one.
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            Authorization::Basic { user, password } => {
                Some(format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))))
            }
            Authorization::Bearer(token) => Some(format!("Bearer {token}")),
            Authorization::Ntlm(_) | Authorization::ClientCertificate => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Authorization::Basic { .. } => "Basic",
            Authorization::Bearer(_) => "Bearer",
            Authorization::Ntlm(_) => "NTLM",
            Authorization::ClientCertificate => "ClientCertificate",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn basic_header() {
        let auth = Authorization::Basic {
            user: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(auth.header_value().as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn bearer_header() {
        let auth = Authorization::Bearer("123".into());
        assert_eq!(auth.header_value().as_deref(), Some("Bearer 123"));
        assert_eq!(auth.scheme(), "Bearer");
    }

    #[test]
    fn handshake_schemes_have_no_static_header() {
        assert!(Authorization::Ntlm(Credentials::new("u", "p"))
            .header_value()
            .is_none());
        assert!(Authorization::ClientCertificate.header_value().is_none());
    }
}
