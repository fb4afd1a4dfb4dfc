//! File-based config discovery and layering.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::FanoutConfig;
use crate::error::{ConfigError, Result};

/// Config file looked up in the package root.
pub const CONFIG_FILE: &str = "fanout.toml";
/// Field of `package.json` holding inline configuration.
pub const PACKAGE_KEY: &str = "fanout";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FANOUT_";

/// Finds and merges configuration sources for one package root.
///
/// ```no_run
/// use fanout_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new("packages/widgets").load().unwrap();
/// println!("writing to {}", config.out_dir.display());
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Configuration files that exist, in merge order.
    ///
    /// `package.json` only counts when it has a non-null `fanout` field.
    pub fn find(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();

        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            found.push(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let has_inline = fs::read_to_string(&pkg_path)
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .is_some_and(|parsed| parsed.get(PACKAGE_KEY).is_some_and(|v| !v.is_null()));
        if has_inline {
            found.push(pkg_path);
        }

        found
    }

    /// Load the layered configuration: defaults, file, package.json, environment.
    pub fn load(&self) -> Result<FanoutConfig> {
        self.extract(self.figment()?)
    }

    /// Load with `overrides` merged on top of every other source.
    pub fn load_with_overrides<T: Serialize>(&self, overrides: &T) -> Result<FanoutConfig> {
        let figment = self.figment()?.merge(Serialized::defaults(overrides));
        self.extract(figment)
    }

    fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(FanoutConfig::default()));

        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            debug!(path = %toml_path.display(), "merging config file");
            figment = figment.merge(Toml::file(toml_path));
        }

        if let Some(inline) = self.package_config()? {
            debug!("merging `fanout` field of package.json");
            figment = figment.merge(Serialized::defaults(inline));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn package_config(&self) -> Result<Option<Value>> {
        let pkg_path = self.root.join("package.json");
        if !pkg_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&pkg_path)?;
        let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
            field: "package.json".to_string(),
            message: format!("invalid JSON: {e}"),
        })?;

        match parsed.get(PACKAGE_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(inline @ Value::Object(_)) => Ok(Some(inline.clone())),
            Some(_) => Err(ConfigError::InvalidValue {
                field: PACKAGE_KEY.to_string(),
                message: "must be an object".to_string(),
            }),
        }
    }

    fn extract(&self, figment: Figment) -> Result<FanoutConfig> {
        figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: e
                .path
                .last()
                .cloned()
                .unwrap_or_else(|| "configuration".to_string()),
            message: e.to_string(),
        })
    }
}
