//! Request descriptors produced by external tooling (for example an OpenAPI
//! loader) and consumed by [`HttpTesterClient::initialize_from_descriptor`](crate::HttpTesterClient::initialize_from_descriptor).
use reqwest::Method;
use serde::{Deserialize, Deserializer};

/// Where a [`Parameter`] goes in the request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Location {
    Query,
    Header,
    Path,
    Body,
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "in", alias = "location")]
    pub location: Location,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Option<&str>, location: Location) -> Parameter {
        Parameter {
            name: name.into(),
            value: value.map(str::to_string),
            location,
        }
    }
}

/// Structured description of one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub base_path: String,
    pub path: String,
    #[serde(deserialize_with = "deserialize_method")]
    pub method: Method,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl HttpRequest {
    pub fn new(base_path: impl Into<String>, path: impl Into<String>, method: Method) -> HttpRequest {
        HttpRequest {
            base_path: base_path.into(),
            path: path.into(),
            method,
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, parameter: Parameter) -> HttpRequest {
        self.parameters.push(parameter);
        self
    }

    /// Parameters in `location` that carry a value, in declaration order.
    pub fn parameters_in(&self, location: Location) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
            .filter_map(|p| p.value.as_deref().map(|v| (p.name.as_str(), v)))
    }
}

fn deserialize_method<'de, D>(deserializer: D) -> Result<Method, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Method::from_bytes(s.to_uppercase().as_bytes()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn deserialize_descriptor() -> eyre::Result<()> {
        let json = r#"{
            "basePath": "https://api.example.com",
            "path": "/api/bicycles/{id}",
            "method": "get",
            "parameters": [
                {"name": "id", "value": "1", "in": "path"},
                {"name": "api-version", "value": "1", "in": "query"},
                {"name": "ApiKey", "value": null, "in": "header"}
            ]
        }"#;
        let req: HttpRequest = serde_json::from_str(json)?;
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.parameters.len(), 3);
        assert_eq!(req.parameters[0].location, Location::Path);
        assert_eq!(
            req.parameters_in(Location::Query).collect::<Vec<_>>(),
            vec![("api-version", "1")]
        );
        assert_eq!(req.parameters_in(Location::Header).count(), 0);
        Ok(())
    }

    #[test]
    fn location_from_str() {
        assert_eq!(Location::from_str("Header").unwrap(), Location::Header);
        assert_eq!(Location::Query.to_string(), "query");
    }
}
