use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{key} is required when STORE_BACKEND={backend}")]
    Missing {
        key: &'static str,
        backend: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Firestore => "firestore",
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub collection: String,
    pub redis_url: String,
    pub firebase_project_id: Option<String>,
    pub firebase_api_key: Option<String>,
    pub firestore_url: String,
    pub identity_url: String,
    pub google_client_id: Option<String>,
    pub max_description_chars: usize,
    pub min_detect_chars: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret)
    }

    /// Builds the config from arbitrary variable and secret sources.
    pub fn from_lookup(
        var: impl Fn(&str) -> Option<String>,
        secret: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            host: try_load(&var, "RUST_HOST", "127.0.0.1")?,
            port: try_load(&var, "RUST_PORT", "1111")?,
            store_backend: try_load(&var, "STORE_BACKEND", "memory")?,
            collection: try_load(&var, "REVIEWS_COLLECTION", "reviews")?,
            redis_url: try_load(&var, "REDIS_URL", "redis://127.0.0.1:6379")?,
            firebase_project_id: optional(&var, "FIREBASE_PROJECT_ID"),
            firebase_api_key: secret("FIREBASE_API_KEY")
                .or_else(|| optional(&var, "FIREBASE_API_KEY")),
            firestore_url: try_load(&var, "FIRESTORE_URL", "https://firestore.googleapis.com/v1")?,
            identity_url: try_load(
                &var,
                "IDENTITY_URL",
                "https://identitytoolkit.googleapis.com/v1",
            )?,
            google_client_id: optional(&var, "GOOGLE_CLIENT_ID"),
            max_description_chars: try_load(&var, "MAX_DESCRIPTION_CHARS", "200")?,
            min_detect_chars: try_load(&var, "MIN_DETECT_CHARS", "10")?,
        };

        if config.max_description_chars == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_DESCRIPTION_CHARS",
                reason: "must be at least 1".to_string(),
            });
        }

        if config.store_backend == StoreBackend::Firestore {
            let backend = config.store_backend.as_str();

            if config.firebase_project_id.is_none() {
                return Err(ConfigError::Missing {
                    key: "FIREBASE_PROJECT_ID",
                    backend,
                });
            }
            if config.firebase_api_key.is_none() {
                return Err(ConfigError::Missing {
                    key: "FIREBASE_API_KEY",
                    backend,
                });
            }
        }

        Ok(config)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(var: impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Secret {secret_name} not readable from file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned(), |_| None)
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.address(), "127.0.0.1:1111");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.collection, "reviews");
        assert_eq!(config.max_description_chars, 200);
        assert_eq!(config.min_detect_chars, 10);
        assert!(config.google_client_id.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("RUST_PORT", "not-a-port")]).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "RUST_PORT", .. }));
    }

    #[test]
    fn test_firestore_requires_project_and_key() {
        let err = load(&[("STORE_BACKEND", "firestore")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "FIREBASE_PROJECT_ID",
                ..
            }
        ));

        let err = load(&[("STORE_BACKEND", "firestore"), ("FIREBASE_PROJECT_ID", "p")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "FIREBASE_API_KEY",
                ..
            }
        ));

        let config = load(&[
            ("STORE_BACKEND", "Firestore"),
            ("FIREBASE_PROJECT_ID", "p"),
            ("FIREBASE_API_KEY", "k"),
        ])
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Firestore);
    }

    #[test]
    fn test_secret_wins_over_env() {
        let config = Config::from_lookup(
            |key| (key == "FIREBASE_API_KEY").then(|| "from-env".to_string()),
            |name| (name == "FIREBASE_API_KEY").then(|| "from-secret".to_string()),
        )
        .unwrap();

        assert_eq!(config.firebase_api_key.as_deref(), Some("from-secret"));
    }

    #[test]
    fn test_zero_description_limit() {
        assert!(load(&[("MAX_DESCRIPTION_CHARS", "0")]).is_err());
    }

    #[test]
    fn test_blank_optional_is_unset() {
        let config = load(&[("GOOGLE_CLIENT_ID", "   ")]).unwrap();

        assert!(config.google_client_id.is_none());
    }
}
