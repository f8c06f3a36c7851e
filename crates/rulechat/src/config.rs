use std::env;

use rulechat_core::RetryPolicy;
use rulechat_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use thiserror::Error;

use crate::session::Flow;

/// A problem with the process environment.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to something unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

/// Everything the binary reads from its environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Provider settings.
    pub openai: OpenAIConfig,
    /// The flow to run.
    pub flow: Flow,
    /// How failed model requests are retried.
    pub retry_policy: RetryPolicy,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = var("OPENAI_API_KEY")
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let mut openai = OpenAIConfigBuilder::with_api_key(api_key);
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            openai = openai.with_base_url(base_url);
        }
        if let Some(model) = var("OPENAI_MODEL") {
            openai = openai.with_model(model);
        }

        let flow = match var("RULECHAT_FLOW").as_deref() {
            None | Some("chat") => Flow::Chat,
            Some("scored") => Flow::Scored,
            Some("reader") => Flow::Reader,
            Some("question") => Flow::Question {
                topic: var("RULECHAT_TOPIC")
                    .ok_or(ConfigError::Missing("RULECHAT_TOPIC"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "RULECHAT_FLOW",
                    reason: format!(
                        "unknown flow `{other}`, expected chat, scored, reader \
                         or question"
                    ),
                });
            }
        };

        let mut retry_policy = RetryPolicy::default();
        if let Some(value) = var("RULECHAT_MAX_ATTEMPTS") {
            retry_policy.max_attempts = value
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "RULECHAT_MAX_ATTEMPTS",
                    reason: format!("`{value}` is not a positive integer"),
                })?;
        }

        Ok(Self {
            openai: openai.build(),
            flow,
            retry_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.flow, Flow::Chat);
        assert_eq!(config.openai.model(), "gpt-4o-mini");
        assert_eq!(config.openai.base_url(), "https://api.openai.com/v1");
        assert_eq!(config.retry_policy, RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ("OPENAI_MODEL", "local"),
            ("RULECHAT_FLOW", "question"),
            ("RULECHAT_TOPIC", "a gaming PC"),
            ("RULECHAT_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.openai.base_url(), "http://localhost:8080/v1");
        assert_eq!(config.openai.model(), "local");
        assert_eq!(
            config.flow,
            Flow::Question {
                topic: "a gaming PC".to_owned()
            }
        );
        assert_eq!(config.retry_policy.max_attempts, 5);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            config(&[("OPENAI_API_KEY", "  ")]).unwrap_err(),
            ConfigError::Missing("OPENAI_API_KEY")
        );
        assert_eq!(
            config(&[("OPENAI_API_KEY", "sk"), ("RULECHAT_FLOW", "question")])
                .unwrap_err(),
            ConfigError::Missing("RULECHAT_TOPIC")
        );
        assert!(matches!(
            config(&[("OPENAI_API_KEY", "sk"), ("RULECHAT_FLOW", "poetry")]),
            Err(ConfigError::Invalid {
                name: "RULECHAT_FLOW",
                ..
            })
        ));
        assert!(matches!(
            config(&[("OPENAI_API_KEY", "sk"), ("RULECHAT_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid {
                name: "RULECHAT_MAX_ATTEMPTS",
                ..
            })
        ));
    }
}
