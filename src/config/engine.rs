//! Engine tuning knobs, loaded from the environment.

use std::env;
use std::time::Duration;

const DEFAULT_BUILD_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Composition-wide limits.
///
/// `build_timeout` bounds each per-server build (credential lookup plus
/// descriptor construction, including waits on the link cache);
/// `request_timeout` bounds individual RPC calls on a built handle;
/// `max_concurrency` caps the build fan-out.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub build_timeout: Duration,
    pub request_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            build_timeout: Duration::from_millis(DEFAULT_BUILD_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl EngineConfig {
    /// Reads `WEAVEMCP_BUILD_TIMEOUT_MS`, `WEAVEMCP_REQUEST_TIMEOUT_MS` and
    /// `WEAVEMCP_MAX_CONCURRENCY`; unset or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            build_timeout: Duration::from_millis(env_u64(
                "WEAVEMCP_BUILD_TIMEOUT_MS",
                DEFAULT_BUILD_TIMEOUT_MS,
            )),
            request_timeout: Duration::from_millis(env_u64(
                "WEAVEMCP_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            max_concurrency: env_u64(
                "WEAVEMCP_MAX_CONCURRENCY",
                DEFAULT_MAX_CONCURRENCY as u64,
            )
            .max(1) as usize,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "unparsable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.build_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    #[serial]
    fn environment_overrides_apply() {
        env::set_var("WEAVEMCP_BUILD_TIMEOUT_MS", "1500");
        env::set_var("WEAVEMCP_MAX_CONCURRENCY", "2");

        let config = EngineConfig::from_env();
        assert_eq!(config.build_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_concurrency, 2);

        env::remove_var("WEAVEMCP_BUILD_TIMEOUT_MS");
        env::remove_var("WEAVEMCP_MAX_CONCURRENCY");
    }

    #[test]
    #[serial]
    fn unparsable_values_fall_back() {
        env::set_var("WEAVEMCP_BUILD_TIMEOUT_MS", "soon");

        let config = EngineConfig::from_env();
        assert_eq!(config.build_timeout, Duration::from_secs(5));

        env::remove_var("WEAVEMCP_BUILD_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn concurrency_never_drops_to_zero() {
        env::set_var("WEAVEMCP_MAX_CONCURRENCY", "0");

        let config = EngineConfig::from_env();
        assert_eq!(config.max_concurrency, 1);

        env::remove_var("WEAVEMCP_MAX_CONCURRENCY");
    }
}
