//! # Configuration Module
//!
//! Loads shared settings for test suites from `httptester.toml` and the
//! process environment, so base addresses and credentials do not have to be
//! hard-coded into tests.
//!
//! ## Config File Location
//!
//! 1. If `HTTPTESTER_CONFIG` is set, load from that path
//! 2. Otherwise, load from `httptester.toml` in the current directory
//!
//! A missing default file is not an error; the built-in default environment is
//! used instead. A `.env` file is read before the environment is inspected.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [[environments]]
//! name = "staging"
//! base_url = "https://staging.api.example.com"
//! validate_certificate = false
//! mask_sensitive = true
//! api_version = "2"
//!
//! [environments.ntlm]
//! user = "CORP\\tester"
//! password = "secret"
//! ```
//!
//! Keys without a dedicated field (`api_version` above) land in
//! [`EnvironmentConfig::data`].
//!
//! ## Environment Variables
//!
//! `HTTPTESTER_<KEY>=value` is merged into every environment as `key`.
//! `HTTPTESTER_<ENV>_<KEY>=value` is merged into environment `<env>` only.
//! `HTTPTESTER_ENVIRONMENT` selects the environment returned by
//! [`Config::current`].

use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, io::Read, path::Path, sync::Arc};
use toml::Value as TomlValue;
use tracing::*;

use crate::{ntlm::Credentials, Error, Result};

const CONFIG_ENV: &str = "HTTPTESTER_CONFIG";
const ENVIRONMENT_ENV: &str = "HTTPTESTER_ENVIRONMENT";
const ENV_PREFIX: &str = "HTTPTESTER";
const DEFAULT_ENVIRONMENT: &str = "default";

static CONFIG: Lazy<Config> = Lazy::new(|| {
    let _ = dotenv::dotenv();
    match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}; falling back to default configuration");
            Config::default()
        }
    }
});

/// Lazily loaded process-wide configuration.
pub fn get_config() -> &'static Config {
    &CONFIG
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environments: Vec<Arc<EnvironmentConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            environments: vec![Arc::new(EnvironmentConfig {
                name: DEFAULT_ENVIRONMENT.to_string(),
                ..Default::default()
            })],
        }
    }
}

impl Config {
    fn load_from(path: &Path) -> Result<Config> {
        let Ok(mut file) = std::fs::File::open(path) else {
            let mut cfg = Config::default();
            cfg.load_env(std::env::vars());
            return Ok(cfg);
        };

        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|e| Error::LoadError(e.to_string()))?;

        let mut cfg = Config::parse(&buf)?;
        debug!("{} was successfully loaded: {cfg:#?}", path.display());

        cfg.load_env(std::env::vars());
        Ok(cfg)
    }

    fn parse(buf: &str) -> Result<Config> {
        #[derive(Deserialize)]
        struct ConfigHelper {
            #[serde(default)]
            environments: Vec<EnvironmentConfig>,
        }

        let helper: ConfigHelper = toml::from_str(buf).map_err(|e| {
            Error::LoadError(format!("failed to deserialize httptester.toml: {e}"))
        })?;

        if helper.environments.is_empty() {
            return Ok(Config::default());
        }

        Ok(Config {
            environments: helper.environments.into_iter().map(Arc::new).collect(),
        })
    }

    fn load() -> Result<Config> {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Config::load_from(Path::new("httptester.toml"));
        };

        let path = Path::new(&path);
        let looks_like_path = path.extension().is_some_and(|ext| ext == "toml")
            || path.to_string_lossy().contains(std::path::MAIN_SEPARATOR)
            || path.to_string_lossy().contains('/');
        if !looks_like_path {
            return Err(Error::LoadError(format!(
                "{CONFIG_ENV} should be a path to a config file, not a config value. \
                 Got: {path:?}. Use {ENV_PREFIX}_<KEY>=value for config values instead."
            )));
        }

        if !path.exists() {
            return Err(Error::LoadError(format!(
                "config file specified by {CONFIG_ENV} not found: {path:?}"
            )));
        }

        debug!("Loading config from {CONFIG_ENV}={path:?}");
        Config::load_from(path)
    }

    /// Merge `HTTPTESTER_*` variables into each environment's data.
    fn load_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        let vars: Vec<_> = vars.into_iter().collect();
        let global_prefix = format!("{ENV_PREFIX}_");
        let env_prefixes: Vec<_> = self
            .environments
            .iter()
            .map(|e| format!("{ENV_PREFIX}_{}_", e.name.to_uppercase()))
            .collect();

        let global: HashMap<String, TomlValue> = vars
            .iter()
            .filter(|(k, _)| k != CONFIG_ENV && k != ENVIRONMENT_ENV)
            .filter(|(k, _)| !env_prefixes.iter().any(|p| k.starts_with(p)))
            .filter_map(|(k, v)| {
                let key = k.strip_prefix(&global_prefix)?;
                Some((key.to_lowercase(), TomlValue::String(v.clone())))
            })
            .collect();

        for (env, prefix) in self.environments.iter_mut().zip(&env_prefixes) {
            let scoped = vars.iter().filter_map(|(k, v)| {
                let key = k.strip_prefix(prefix.as_str())?;
                Some((key.to_lowercase(), TomlValue::String(v.clone())))
            });
            let env = Arc::make_mut(env);
            env.data.extend(global.clone());
            env.data.extend(scoped);
        }

        trace!("configuration after merging env: {self:#?}");
    }

    pub fn environment(&self, name: &str) -> Result<Arc<EnvironmentConfig>> {
        self.environments
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| Error::ValueNotFound(format!("environments.{name}")))
    }

    /// Environment named by `HTTPTESTER_ENVIRONMENT`, or `default`.
    pub fn current(&self) -> Result<Arc<EnvironmentConfig>> {
        let name = std::env::var(ENVIRONMENT_ENV).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.into());
        self.environment(&name)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NtlmConfig {
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub workstation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub validate_certificate: bool,
    /// Mask credentials in request/response logs.
    #[serde(default = "default_true")]
    pub mask_sensitive: bool,
    #[serde(default)]
    pub ntlm: Option<NtlmConfig>,
    #[serde(flatten)]
    pub data: HashMap<String, TomlValue>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            name: String::new(),
            base_url: None,
            validate_certificate: true,
            mask_sensitive: true,
            ntlm: None,
            data: HashMap::new(),
        }
    }
}

impl EnvironmentConfig {
    pub fn get(&self, key: impl AsRef<str>) -> Result<&TomlValue> {
        let key = key.as_ref();
        self.data
            .get(key)
            .ok_or_else(|| Error::ValueNotFound(key.to_string()))
    }

    pub fn get_str(&self, key: impl AsRef<str>) -> Result<&str> {
        let key = key.as_ref();
        self.get(key)?
            .as_str()
            .ok_or_else(|| Error::ValueNotFound(key.to_string()))
    }

    /// Integers written in toml or passed as strings through the environment.
    pub fn get_int(&self, key: impl AsRef<str>) -> Result<i64> {
        match self.get(key)? {
            TomlValue::Integer(i) => Ok(*i),
            TomlValue::String(s) => s.parse().map_err(|e| Error::ValueError(eyre::Error::from(e))),
            other => Err(Error::ValueError(eyre::eyre!("expected integer, got {other}"))),
        }
    }

    pub fn get_bool(&self, key: impl AsRef<str>) -> Result<bool> {
        match self.get(key)? {
            TomlValue::Boolean(b) => Ok(*b),
            TomlValue::String(s) => s.parse().map_err(|e| Error::ValueError(eyre::Error::from(e))),
            other => Err(Error::ValueError(eyre::eyre!("expected boolean, got {other}"))),
        }
    }

    /// Deserialize a JSON document stored under `key`.
    pub fn get_object<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Result<T> {
        serde_json::from_str(self.get_str(key)?)
            .map_err(|e| Error::ValueError(eyre::Error::from(e)))
    }

    /// Credentials used by [`HttpTesterClient::with_default_ntlm_authentication`](crate::HttpTesterClient::with_default_ntlm_authentication).
    pub fn ntlm_credentials(&self) -> Option<Credentials> {
        if let Some(ntlm) = &self.ntlm {
            let mut creds = Credentials::new(&ntlm.user, &ntlm.password);
            if let Some(domain) = &ntlm.domain {
                creds = creds.domain(domain);
            }
            if let Some(workstation) = &ntlm.workstation {
                creds = creds.workstation(workstation);
            }
            return Some(creds);
        }

        let user = self.get_str("ntlm_user").ok()?;
        let password = self.get_str("ntlm_password").ok()?;
        let mut creds = Credentials::new(user, password);
        if let Ok(domain) = self.get_str("ntlm_domain") {
            creds = creds.domain(domain);
        }
        Some(creds)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use test_case::test_case;

    const SAMPLE: &str = r#"
        [[environments]]
        name = "default"
        base_url = "https://qatoolkitapi.azurewebsites.net"
        api_version = "1"
        retries = 3

        [[environments]]
        name = "staging"
        validate_certificate = false
        mask_sensitive = false

        [environments.ntlm]
        user = "CORP\\tester"
        password = "secret"
    "#;

    fn sample() -> Config {
        Config::parse(SAMPLE).unwrap()
    }

    #[test]
    fn parse_environments() -> eyre::Result<()> {
        let cfg = sample();
        assert_eq!(cfg.environments.len(), 2);

        let default = cfg.environment("default")?;
        assert_eq!(
            default.base_url.as_deref(),
            Some("https://qatoolkitapi.azurewebsites.net")
        );
        assert!(default.validate_certificate);
        assert!(default.mask_sensitive);
        assert_eq!(default.get_str("api_version")?, "1");
        assert_eq!(default.get_int("retries")?, 3);

        let staging = cfg.environment("staging")?;
        assert!(!staging.validate_certificate);
        assert!(!staging.mask_sensitive);
        Ok(())
    }

    #[test]
    fn empty_file_falls_back_to_default() -> eyre::Result<()> {
        let cfg = Config::parse("")?;
        assert_eq!(cfg.environments.len(), 1);
        assert_eq!(cfg.environments[0].name, "default");
        Ok(())
    }

    #[test]
    fn unknown_environment() {
        let err = sample().environment("production").unwrap_err();
        assert!(matches!(err, Error::ValueNotFound(_)));
    }

    #[test_case("HTTPTESTER_DEFAULT_TIMEOUT_MS", "default", true; "scoped to default")]
    #[test_case("HTTPTESTER_STAGING_TIMEOUT_MS", "default", false; "scoped to other environment")]
    #[test_case("HTTPTESTER_TIMEOUT_MS", "staging", true; "global")]
    fn env_vars_are_merged(var: &str, env: &str, visible: bool) -> eyre::Result<()> {
        let mut cfg = sample();
        cfg.load_env([(var.to_string(), "1500".to_string())]);
        let env = cfg.environment(env)?;
        assert_eq!(env.get_int("timeout_ms").ok(), visible.then_some(1500));
        Ok(())
    }

    #[test]
    fn reserved_vars_are_not_config_values() -> eyre::Result<()> {
        let mut cfg = sample();
        cfg.load_env([
            (CONFIG_ENV.to_string(), "./httptester.toml".to_string()),
            (ENVIRONMENT_ENV.to_string(), "staging".to_string()),
        ]);
        let env = cfg.environment("default")?;
        assert!(env.get("config").is_err());
        assert!(env.get("environment").is_err());
        Ok(())
    }

    #[test]
    fn get_bool_and_object() -> eyre::Result<()> {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Bike {
            brand: String,
        }

        let mut cfg = sample();
        cfg.load_env([
            ("HTTPTESTER_FLAG".to_string(), "true".to_string()),
            (
                "HTTPTESTER_BIKE".to_string(),
                r#"{"brand": "Giant"}"#.to_string(),
            ),
        ]);
        let env = cfg.environment("default")?;
        assert!(env.get_bool("flag")?);
        assert_eq!(
            env.get_object::<Bike>("bike")?,
            Bike {
                brand: "Giant".into()
            }
        );
        Ok(())
    }

    #[test]
    fn ntlm_credentials_from_table() -> eyre::Result<()> {
        let creds = sample()
            .environment("staging")?
            .ntlm_credentials()
            .expect("credentials");
        assert_eq!(creds.user(), "tester");
        assert_eq!(creds.domain_name(), "CORP");
        Ok(())
    }

    #[test]
    fn ntlm_credentials_from_data() -> eyre::Result<()> {
        let mut cfg = sample();
        assert!(cfg.environment("default")?.ntlm_credentials().is_none());

        cfg.load_env([
            ("HTTPTESTER_NTLM_USER".to_string(), "alice".to_string()),
            ("HTTPTESTER_NTLM_PASSWORD".to_string(), "pw".to_string()),
            ("HTTPTESTER_NTLM_DOMAIN".to_string(), "LAB".to_string()),
        ]);
        let creds = cfg
            .environment("default")?
            .ntlm_credentials()
            .expect("credentials");
        assert_eq!(creds.user(), "alice");
        assert_eq!(creds.domain_name(), "LAB");
        Ok(())
    }

    mod config_env {
        use super::super::{Config, CONFIG_ENV};
        use serial_test::serial;
        use test_case::test_case;

        #[test]
        #[serial]
        fn error_when_file_not_found() {
            std::env::set_var(CONFIG_ENV, "/nonexistent/path/httptester.toml");
            let result = Config::load();
            std::env::remove_var(CONFIG_ENV);

            let err = result.unwrap_err().to_string();
            assert!(err.contains("not found"), "{err}");
        }

        #[test_case("true"; "boolean value")]
        #[test_case("some_value"; "string value")]
        #[serial]
        fn error_when_value_looks_like_config_value(value: &str) {
            std::env::set_var(CONFIG_ENV, value);
            let result = Config::load();
            std::env::remove_var(CONFIG_ENV);

            let err = result.unwrap_err().to_string();
            assert!(err.contains("should be a path"), "{err}");
        }
    }

    #[test]
    #[serial]
    fn env_vars_apply_without_config_file() -> eyre::Result<()> {
        std::env::set_var("HTTPTESTER_NTLM_USER", "alice");
        std::env::set_var("HTTPTESTER_NTLM_PASSWORD", "pw");
        std::env::set_var("HTTPTESTER_DEFAULT_BASE_PATH", "/v2");
        let cfg = Config::load_from(Path::new("/nonexistent/httptester.toml"));
        std::env::remove_var("HTTPTESTER_NTLM_USER");
        std::env::remove_var("HTTPTESTER_NTLM_PASSWORD");
        std::env::remove_var("HTTPTESTER_DEFAULT_BASE_PATH");

        let env = cfg?.environment("default")?;
        let creds = env.ntlm_credentials().expect("credentials from environment");
        assert_eq!(creds.user(), "alice");
        assert_eq!(env.get_str("base_path")?, "/v2");
        Ok(())
    }

    #[test]
    #[serial]
    fn current_uses_selected_environment() -> eyre::Result<()> {
        let cfg = sample();
        std::env::set_var(ENVIRONMENT_ENV, "staging");
        let current = cfg.current();
        std::env::remove_var(ENVIRONMENT_ENV);
        assert_eq!(current?.name, "staging");

        assert_eq!(cfg.current()?.name, "default");
        Ok(())
    }
}
