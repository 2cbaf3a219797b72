//! Runtime configuration loaded from environment variables

use std::path::PathBuf;

use crate::types::DispatchMode;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Errors in the environment-provided configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Hub server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Listening port
    pub port: u16,
    /// Directory served for every path not claimed by the hub
    pub static_dir: PathBuf,
    pub dispatch: DispatchMode,
    /// Remove entries as soon as their connection drops instead of on the
    /// next broadcast pass
    pub eager_eviction: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("."),
            dispatch: DispatchMode::HandOff,
            eager_eviction: false,
        }
    }
}

impl HubConfig {
    /// Load config from environment variables:
    /// PORT, STATIC_DIR, DISPATCH_MODE (handoff|queued), QUEUE_CAPACITY,
    /// EAGER_EVICTION
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("PORT", &v, e.to_string()))?,
            Err(_) => DEFAULT_PORT,
        };

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let capacity = match std::env::var("QUEUE_CAPACITY") {
            Ok(v) => match v.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::invalid("QUEUE_CAPACITY", &v, "must be > 0"));
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::invalid("QUEUE_CAPACITY", &v, e.to_string()));
                }
            },
            Err(_) => DEFAULT_QUEUE_CAPACITY,
        };

        let dispatch = match std::env::var("DISPATCH_MODE") {
            Ok(v) => match v.trim().to_lowercase().as_str() {
                "" | "handoff" | "hand_off" => DispatchMode::HandOff,
                "queued" => DispatchMode::Queued { capacity },
                _ => {
                    return Err(ConfigError::invalid(
                        "DISPATCH_MODE",
                        &v,
                        "expected \"handoff\" or \"queued\"",
                    ))
                }
            },
            Err(_) => DispatchMode::HandOff,
        };

        let eager_eviction = std::env::var("EAGER_EVICTION")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let config = Self {
            port,
            static_dir,
            dispatch,
            eager_eviction,
        };

        tracing::info!(
            port = config.port,
            static_dir = %config.static_dir.display(),
            dispatch = ?config.dispatch,
            eager_eviction = config.eager_eviction,
            "Hub config loaded"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PORT",
        "STATIC_DIR",
        "DISPATCH_MODE",
        "QUEUE_CAPACITY",
        "EAGER_EVICTION",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = HubConfig::from_env().unwrap();
        assert_eq!(config, HubConfig::default());
        // Closed entries wait for the next broadcast pass unless opted in
        assert!(!config.eager_eviction);
    }

    #[test]
    #[serial]
    fn test_eager_eviction_is_opt_in() {
        clear_env();
        std::env::set_var("EAGER_EVICTION", "true");
        let enabled = HubConfig::from_env().unwrap();
        std::env::set_var("EAGER_EVICTION", "off");
        let disabled = HubConfig::from_env().unwrap();
        clear_env();

        assert!(enabled.eager_eviction);
        assert!(!disabled.eager_eviction);
    }

    #[test]
    #[serial]
    fn test_reads_all_values() {
        clear_env();
        std::env::set_var("PORT", "9090");
        std::env::set_var("STATIC_DIR", "public");
        std::env::set_var("DISPATCH_MODE", "queued");
        std::env::set_var("QUEUE_CAPACITY", "8");
        std::env::set_var("EAGER_EVICTION", "1");

        let config = HubConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.port, 9090);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.dispatch, DispatchMode::Queued { capacity: 8 });
        assert!(config.eager_eviction);
    }

    #[test]
    #[serial]
    fn test_rejects_bad_port() {
        clear_env();
        std::env::set_var("PORT", "eighty");
        let result = HubConfig::from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    #[serial]
    fn test_rejects_unknown_dispatch_mode() {
        clear_env();
        std::env::set_var("DISPATCH_MODE", "fastest");
        let result = HubConfig::from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_rejects_zero_queue_capacity() {
        clear_env();
        std::env::set_var("DISPATCH_MODE", "queued");
        std::env::set_var("QUEUE_CAPACITY", "0");
        let result = HubConfig::from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("QUEUE_CAPACITY"));
    }
}
