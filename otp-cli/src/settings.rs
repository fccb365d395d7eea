use anyhow::Result;
use config::{Config, ConfigError, Environment, File, Map, Source, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use url::Url;

use crate::paths::config_file;

/// Where the hosted OTP provider lives
pub const DEFAULT_API_ENDPOINT: &str = "https://otp-service-beta.vercel.app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the OTP provider
    pub api_endpoint: Url,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: Url::parse(DEFAULT_API_ENDPOINT).expect("Valid hardcoded server URL"),
        }
    }
}

impl Settings {
    /// Defaults, overridden by the config file (if any), overridden by
    /// `OTP_*` environment variables, e.g. `OTP_API_ENDPOINT`.
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(DefaultImplSource::<Settings>::new());

        match config_file() {
            Ok(path) => {
                tracing::debug!(?path, "Looking for config file");
                builder = builder.add_source(
                    File::with_name(&path.as_path().display().to_string()).required(false),
                );
            }
            Err(e) => tracing::debug!(%e, "Skipping config file"),
        }

        let s = builder.add_source(environment()).build()?;
        Ok(s.try_deserialize()?)
    }
}

/// `OTP_API_ENDPOINT` sets `api_endpoint`, nested keys are split on `__`
fn environment() -> Environment {
    Environment::with_prefix("OTP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

// Lets `Settings::default()` act as the lowest config layer, so that
// no config file is needed. The default is serialized into a `toml::Value`
// and converted into a `config::Value` the same way `config` itself
// converts toml files.

struct DefaultImplSource<T: Default + Serialize>(PhantomData<T>);

impl<T: Default + Serialize> Clone for DefaultImplSource<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Default + Serialize> std::fmt::Debug for DefaultImplSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DefaultImplSource").finish()
    }
}

impl<T: Default + Serialize> DefaultImplSource<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Default + Serialize + Send + Sync + 'static> Source for DefaultImplSource<T> {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let toml_value =
            toml::Value::try_from(T::default()).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        match from_toml_value(&toml_value).kind {
            ValueKind::Table(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn from_toml_value(value: &toml::Value) -> Value {
    match *value {
        toml::Value::String(ref value) => Value::new(None, value.to_string()),
        toml::Value::Float(value) => Value::new(None, value),
        toml::Value::Integer(value) => Value::new(None, value),
        toml::Value::Boolean(value) => Value::new(None, value),
        toml::Value::Table(ref table) => {
            let mut m = Map::new();
            for (key, value) in table {
                m.insert(key.clone(), from_toml_value(value));
            }
            Value::new(None, m)
        }
        toml::Value::Array(ref array) => {
            Value::new(None, array.iter().map(from_toml_value).collect::<Vec<_>>())
        }
        toml::Value::Datetime(ref datetime) => Value::new(None, datetime.to_string()),
    }
}
