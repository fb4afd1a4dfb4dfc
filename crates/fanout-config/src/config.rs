//! The `FanoutConfig` model and its defaults.

use std::path::PathBuf;

use fanout_plan::{DefaultPrecedence, TargetKind, TargetMatrix};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Build configuration for one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Output directory, relative to the package root.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Language level per target kind; `false` disables a kind for every entry.
    #[serde(default)]
    pub targets: TargetLevels,

    /// Write `.map` files next to every artifact.
    #[serde(default = "default_true")]
    pub sourcemap: bool,

    /// Minify the script (global) bundles.
    #[serde(default = "default_true")]
    pub minify_script: bool,

    /// Emit `.d.ts` files for TypeScript entries.
    #[serde(default = "default_true")]
    pub dts: bool,

    /// Collapse identical artifacts into re-export facades.
    #[serde(default = "default_true")]
    pub dedupe: bool,

    #[serde(default)]
    pub development: DevelopmentMode,

    #[serde(default)]
    pub default_precedence: DefaultPrecedence,

    /// Package global for script bundles, overriding the one derived from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,

    /// Extra externals on top of `dependencies` and `peerDependencies`.
    #[serde(default)]
    pub external: Vec<String>,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            targets: TargetLevels::default(),
            sourcemap: true,
            minify_script: true,
            dts: true,
            dedupe: true,
            development: DevelopmentMode::default(),
            default_precedence: DefaultPrecedence::default(),
            global_name: None,
            external: Vec::new(),
        }
    }
}

impl FanoutConfig {
    /// Create from a JSON value, e.g. the `fanout` field of a manifest.
    ///
    /// ```
    /// use fanout_config::FanoutConfig;
    /// use serde_json::json;
    ///
    /// let config = FanoutConfig::from_value(json!({
    ///     "out_dir": "lib",
    ///     "targets": { "esnext": false }
    /// })).unwrap();
    /// assert_eq!(config.out_dir.to_str(), Some("lib"));
    /// assert!(config.targets.level(fanout_plan::TargetKind::Esnext).is_none());
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// The target matrix this configuration enables.
    pub fn target_matrix(&self) -> Result<TargetMatrix> {
        TargetKind::ALL
            .into_iter()
            .try_fold(TargetMatrix::default(), |matrix, kind| {
                let level = self.targets.level(kind);
                matrix
                    .with_level(kind, level.as_deref())
                    .map_err(|e| ConfigError::InvalidValue {
                        field: format!("targets.{kind}"),
                        message: e.to_string(),
                    })
            })
            .map(|matrix| matrix.with_minify_script(self.minify_script))
    }
}

/// Whether the development pass runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentMode {
    /// Run it when compiled code imports the build-mode intrinsic.
    #[default]
    Auto,
    Always,
    Never,
}

impl DevelopmentMode {
    /// Resolve against the mode latch of the production pass.
    pub fn should_run(self, latch: bool) -> bool {
        match self {
            Self::Auto => latch,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// A target entry: a language level, or a bare switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSetting {
    /// `true` enables the kind at its default level, `false` disables it.
    Enabled(bool),
    Level(String),
}

/// Language level per target kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLevels {
    #[serde(default = "default_esnext")]
    pub esnext: Option<TargetSetting>,
    #[serde(default = "default_module")]
    pub module: Option<TargetSetting>,
    #[serde(default = "default_node")]
    pub node: Option<TargetSetting>,
    #[serde(default = "default_script")]
    pub script: Option<TargetSetting>,
    #[serde(default = "default_browser")]
    pub browser: Option<TargetSetting>,
}

impl Default for TargetLevels {
    fn default() -> Self {
        Self {
            esnext: default_esnext(),
            module: default_module(),
            node: default_node(),
            script: default_script(),
            browser: default_browser(),
        }
    }
}

impl TargetLevels {
    fn setting(&self, kind: TargetKind) -> Option<&TargetSetting> {
        match kind {
            TargetKind::Esnext => self.esnext.as_ref(),
            TargetKind::Module => self.module.as_ref(),
            TargetKind::Node => self.node.as_ref(),
            TargetKind::Script => self.script.as_ref(),
            TargetKind::Browser => self.browser.as_ref(),
        }
    }

    /// Effective language level, or `None` when the kind is disabled.
    pub fn level(&self, kind: TargetKind) -> Option<String> {
        match self.setting(kind)? {
            TargetSetting::Enabled(false) => None,
            TargetSetting::Enabled(true) => Some(kind.default_level().to_string()),
            TargetSetting::Level(level) => Some(level.clone()),
        }
    }

    pub fn any_enabled(&self) -> bool {
        TargetKind::ALL.into_iter().any(|kind| self.level(kind).is_some())
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_true() -> bool {
    true
}

fn default_level(kind: TargetKind) -> Option<TargetSetting> {
    Some(TargetSetting::Level(kind.default_level().to_string()))
}

fn default_esnext() -> Option<TargetSetting> {
    default_level(TargetKind::Esnext)
}

fn default_module() -> Option<TargetSetting> {
    default_level(TargetKind::Module)
}

fn default_node() -> Option<TargetSetting> {
    default_level(TargetKind::Node)
}

fn default_script() -> Option<TargetSetting> {
    default_level(TargetKind::Script)
}

fn default_browser() -> Option<TargetSetting> {
    default_level(TargetKind::Browser)
}
