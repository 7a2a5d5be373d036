//! Process configuration read from the environment.

use millerp_observability::LogFormat;

/// Runtime knobs for the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpConfig {
    /// Reject completing a production order below its planned quantity.
    pub require_full_completion: bool,
    pub log_format: LogFormat,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            require_full_completion: false,
            log_format: LogFormat::Json,
        }
    }
}

impl ErpConfig {
    /// Read `MILLERP_REQUIRE_FULL_COMPLETION` and `MILLERP_LOG_FORMAT`.
    /// Missing or malformed values fall back to the defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let require_full_completion = match lookup("MILLERP_REQUIRE_FULL_COMPLETION") {
            None => defaults.require_full_completion,
            Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid MILLERP_REQUIRE_FULL_COMPLETION; using default");
                defaults.require_full_completion
            }),
        };

        let log_format = match lookup("MILLERP_LOG_FORMAT") {
            None => defaults.log_format,
            Some(raw) => raw.parse::<LogFormat>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid MILLERP_LOG_FORMAT; using default");
                defaults.log_format
            }),
        };

        Self {
            require_full_completion,
            log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ErpConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ErpConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config(&[]), ErpConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("MILLERP_REQUIRE_FULL_COMPLETION", "true"),
            ("MILLERP_LOG_FORMAT", "pretty"),
        ]);
        assert!(cfg.require_full_completion);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = config(&[
            ("MILLERP_REQUIRE_FULL_COMPLETION", "yes please"),
            ("MILLERP_LOG_FORMAT", "xml"),
        ]);
        assert_eq!(cfg, ErpConfig::default());
    }

    proptest! {
        #[test]
        fn anything_but_a_bool_keeps_completion_lenient(raw in "[a-z ]{0,12}") {
            prop_assume!(!matches!(raw.trim(), "true" | "false"));
            let cfg = config(&[("MILLERP_REQUIRE_FULL_COMPLETION", raw.as_str())]);
            prop_assert!(!cfg.require_full_completion);
        }
    }
}
