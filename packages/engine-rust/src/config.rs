use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable overriding [`RoutingConfig::name`].
pub const ENV_CONTEXT_NAME: &str = "RELAY_CONTEXT_NAME";
/// Environment variable overriding [`RoutingConfig::allow_use_original_message`].
pub const ENV_ALLOW_USE_ORIGINAL_MESSAGE: &str = "RELAY_ALLOW_USE_ORIGINAL_MESSAGE";
/// Environment variable overriding [`RoutingConfig::use_breadcrumb`].
pub const ENV_USE_BREADCRUMB: &str = "RELAY_USE_BREADCRUMB";

/// Routing-context level flags consulted by every unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Name of the routing context, used in log fields.
    pub name: String,
    /// Whether each unit of work keeps a snapshot of the original inbound message.
    pub allow_use_original_message: bool,
    /// Whether a breadcrumb correlation header is injected into new exchanges.
    pub use_breadcrumb: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            name: "relay".to_string(),
            allow_use_original_message: true,
            use_breadcrumb: false,
        }
    }
}

impl RoutingConfig {
    /// Loads the defaults overridden by `RELAY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBool`] if a boolean variable is set to
    /// something other than `true/false/1/0/yes/no`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`RoutingConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`RoutingConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_CONTEXT_NAME) {
            config.name = name;
        }
        if let Some(value) = lookup(ENV_ALLOW_USE_ORIGINAL_MESSAGE) {
            config.allow_use_original_message = parse_bool(ENV_ALLOW_USE_ORIGINAL_MESSAGE, &value)?;
        }
        if let Some(value) = lookup(ENV_USE_BREADCRUMB) {
            config.use_breadcrumb = parse_bool(ENV_USE_BREADCRUMB, &value)?;
        }
        Ok(config)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_values() {
        let config = RoutingConfig::default();
        assert_eq!(config.name, "relay");
        assert!(config.allow_use_original_message);
        assert!(!config.use_breadcrumb);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = RoutingConfig::from_lookup(lookup_from(&[
            (ENV_CONTEXT_NAME, "orders"),
            (ENV_ALLOW_USE_ORIGINAL_MESSAGE, "no"),
            (ENV_USE_BREADCRUMB, " TRUE "),
        ]))
        .unwrap();

        assert_eq!(config.name, "orders");
        assert!(!config.allow_use_original_message);
        assert!(config.use_breadcrumb);
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let err = RoutingConfig::from_lookup(lookup_from(&[(ENV_USE_BREADCRUMB, "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidBool { var: ENV_USE_BREADCRUMB, .. }
        ));
    }

    #[test]
    fn deserializes_with_missing_fields_defaulted() {
        let config: RoutingConfig =
            serde_json::from_str(r#"{ "use_breadcrumb": true }"#).unwrap();
        assert_eq!(config.name, "relay");
        assert!(config.allow_use_original_message);
        assert!(config.use_breadcrumb);
    }
}
