//! Config validation.

use fanout_plan::legalize_identifier;

use crate::config::FanoutConfig;
use crate::error::{ConfigError, Result};

/// Pluggable validation strategy.
pub trait ConfigValidator {
    fn validate(&self, config: &FanoutConfig) -> Result<()>;
}

/// Checks the configuration on its own, without touching the filesystem.
///
/// ```
/// use fanout_config::{ConfigValidator, FanoutConfig, SchemaValidator};
///
/// SchemaValidator.validate(&FanoutConfig::default()).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &FanoutConfig) -> Result<()> {
        if !config.targets.any_enabled() {
            return Err(ConfigError::NoTargets);
        }

        // Language levels are checked by building the matrix.
        config.target_matrix()?;

        for external in &config.external {
            if external.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "external package names cannot be empty".to_string(),
                    hint: Some("Remove empty strings from the 'external' array".to_string()),
                });
            }
        }

        if let Some(name) = &config.global_name {
            let valid = !name.is_empty()
                && name
                    .split('.')
                    .all(|segment| !segment.is_empty() && legalize_identifier(segment) == segment);
            if !valid {
                return Err(ConfigError::SchemaValidation {
                    message: format!("global_name `{name}` is not a valid identifier path"),
                    hint: Some("Use identifiers joined by dots, e.g. Acme.Widgets".to_string()),
                });
            }
        }

        if config.out_dir.as_os_str().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "out_dir cannot be empty".to_string(),
                hint: None,
            });
        }

        Ok(())
    }
}
