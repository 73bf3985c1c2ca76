//! Bridge configuration.
//!
//! Loaded from a JSON document (what host plugins read out of their manifest
//! or plist) or from environment variables.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sdk::{Migration, StartOptions};

/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "BATCH_BRIDGE_API_KEY";
/// Environment variable for the initial do-not-disturb state
pub const ENV_DO_NOT_DISTURB: &str = "BATCH_BRIDGE_DO_NOT_DISTURB";
/// Environment variable toggling the custom id migration
pub const ENV_CUSTOM_ID_MIGRATION: &str = "BATCH_BRIDGE_PROFILE_CUSTOM_ID_MIGRATION";
/// Environment variable toggling the custom data migration
pub const ENV_CUSTOM_DATA_MIGRATION: &str = "BATCH_BRIDGE_PROFILE_CUSTOM_DATA_MIGRATION";
/// Environment variable toggling advanced device information
pub const ENV_ADVANCED_DEVICE_INFO: &str = "BATCH_BRIDGE_ADVANCED_DEVICE_INFO";

/// Configuration applied by setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// SDK API key
    pub api_key: Option<String>,
    /// Start with in-app messages held back
    pub initial_do_not_disturb: bool,
    /// Let the SDK migrate the installation custom id to the profile
    pub profile_custom_id_migration_enabled: bool,
    /// Let the SDK migrate installation custom data to the profile
    pub profile_custom_data_migration_enabled: bool,
    /// Let the SDK collect advanced device information
    pub use_advanced_device_information: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            initial_do_not_disturb: false,
            profile_custom_id_migration_enabled: true,
            profile_custom_data_migration_enabled: true,
            use_advanced_device_information: true,
        }
    }
}

impl BridgeConfig {
    /// Config with an API key and every other setting at its default
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unparseable booleans fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            lookup(name)
                .and_then(|raw| parse_bool(&raw))
                .unwrap_or(default)
        };

        Self {
            api_key: lookup(ENV_API_KEY),
            initial_do_not_disturb: flag(ENV_DO_NOT_DISTURB, defaults.initial_do_not_disturb),
            profile_custom_id_migration_enabled: flag(
                ENV_CUSTOM_ID_MIGRATION,
                defaults.profile_custom_id_migration_enabled,
            ),
            profile_custom_data_migration_enabled: flag(
                ENV_CUSTOM_DATA_MIGRATION,
                defaults.profile_custom_data_migration_enabled,
            ),
            use_advanced_device_information: flag(
                ENV_ADVANCED_DEVICE_INFO,
                defaults.use_advanced_device_information,
            ),
        }
    }

    /// Check if an API key is configured (non-blank).
    pub fn has_valid_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Start options derived from this config
    pub fn start_options(&self) -> StartOptions {
        let mut disabled_migrations = Vec::new();
        if !self.profile_custom_id_migration_enabled {
            disabled_migrations.push(Migration::CustomId);
        }
        if !self.profile_custom_data_migration_enabled {
            disabled_migrations.push(Migration::CustomData);
        }
        StartOptions {
            disabled_migrations,
            use_advanced_device_information: self.use_advanced_device_information,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(!config.has_valid_api_key());
        assert!(!config.initial_do_not_disturb);
        assert!(config.start_options().disabled_migrations.is_empty());
        assert!(config.start_options().use_advanced_device_information);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            BridgeConfig::from_json(r#"{"apiKey": "KEY", "profileCustomIdMigrationEnabled": false}"#)
                .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("KEY"));
        assert!(config.profile_custom_data_migration_enabled);
        assert_eq!(config.start_options().disabled_migrations, vec![Migration::CustomId]);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_KEY, "KEY"),
            (ENV_DO_NOT_DISTURB, "yes"),
            (ENV_CUSTOM_DATA_MIGRATION, "0"),
            (ENV_ADVANCED_DEVICE_INFO, "maybe"),
        ]
        .into_iter()
        .collect();

        let config = BridgeConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(config.has_valid_api_key());
        assert!(config.initial_do_not_disturb);
        assert!(config.profile_custom_id_migration_enabled);
        assert!(!config.profile_custom_data_migration_enabled);
        assert!(config.use_advanced_device_information);
    }

    #[test]
    fn test_blank_api_key_is_invalid() {
        assert!(!BridgeConfig::with_api_key("   ").has_valid_api_key());
        assert!(!BridgeConfig::with_api_key("").has_valid_api_key());
        assert!(BridgeConfig::with_api_key("KEY").has_valid_api_key());
    }
}
