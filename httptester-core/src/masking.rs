//! Hides credentials before requests and responses reach the log output.
//!
//! Query strings are sent exactly as the caller wrote them, so the masker works
//! on the raw query text and never re-encodes the parts it keeps.

use reqwest::{header::HeaderMap, Url};

const MASK: &str = "*****";

const SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "api-key",
    "client_secret",
    "code",
    "key",
    "password",
    "secret",
    "token",
];

const SENSITIVE_HEADERS: &[&str] = &[
    "apikey",
    "authorization",
    "cookie",
    "proxy-authorization",
    "set-cookie",
    "www-authenticate",
    "x-api-key",
    "x-auth-token",
];

#[derive(Debug, Clone, Copy)]
pub struct Masker {
    enabled: bool,
}

impl Default for Masker {
    fn default() -> Self {
        Masker { enabled: true }
    }
}

impl Masker {
    pub fn new(enabled: bool) -> Masker {
        Masker { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Render `url` for logging with sensitive query values replaced.
    ///
    /// ```
    /// use httptester_core::masking::Masker;
    /// use reqwest::Url;
    ///
    /// let url = Url::parse("https://api.example.com/bikes?token=abc&page=2").unwrap();
    /// assert_eq!(
    ///     Masker::default().url(&url),
    ///     "https://api.example.com/bikes?token=*****&page=2"
    /// );
    /// ```
    pub fn url(&self, url: &Url) -> String {
        let Some(query) = url.query().filter(|_| self.enabled) else {
            return url.to_string();
        };

        let mut masked = url.clone();
        masked.set_query(Some(&self.query(query)));
        masked.to_string()
    }

    /// Mask the values of sensitive `key=value` pairs in a raw query string.
    pub fn query(&self, query: &str) -> String {
        if !self.enabled {
            return query.to_string();
        }

        let mut pairs = Vec::new();
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some((key, _)) if is_sensitive(SENSITIVE_QUERY_PARAMS, key) => {
                    pairs.push(format!("{key}={MASK}"))
                }
                _ => pairs.push(pair.to_string()),
            }
        }
        pairs.join("&")
    }

    /// Header names and printable values, sensitive values replaced.
    pub fn headers(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if self.enabled && is_sensitive(SENSITIVE_HEADERS, name.as_str()) {
                    MASK.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

fn is_sensitive(list: &[&str], name: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderValue;
    use test_case::test_case;

    #[test_case("access_token=secret&name=john", "access_token=*****&name=john"; "single")]
    #[test_case("API_KEY=k&Token=t&user=alice", "API_KEY=*****&Token=*****&user=alice"; "case insensitive")]
    #[test_case("token=one&token=two", "token=*****&token=*****"; "repeated")]
    #[test_case("secret=&flag", "secret=*****&flag"; "empty value and bare flag")]
    #[test_case("name=john%20doe&page=1", "name=john%20doe&page=1"; "nothing sensitive")]
    fn query(input: &str, expected: &str) {
        assert_eq!(Masker::default().query(input), expected);
    }

    #[test]
    fn url_without_query_is_unchanged() {
        let url = Url::parse("https://api.example.com/bikes").unwrap();
        assert_eq!(Masker::default().url(&url), "https://api.example.com/bikes");
    }

    #[test]
    fn disabled_masker_passes_through() {
        let url = Url::parse("https://api.example.com/?token=abc").unwrap();
        let masker = Masker::new(false);
        assert_eq!(masker.url(&url), "https://api.example.com/?token=abc");

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(
            masker.headers(&headers),
            vec![("authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[test]
    fn headers() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert("ApiKey", HeaderValue::from_static("1234"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let masked = Masker::default().headers(&headers);
        assert_eq!(
            masked,
            vec![
                ("authorization".to_string(), MASK.to_string()),
                ("apikey".to_string(), MASK.to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ]
        );
    }
}
