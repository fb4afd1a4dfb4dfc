//! Target kinds and the fixed target matrix.
//!
//! Every kind has a fixed platform and module format. The only configurable
//! parts are the language level per kind (absent disables the kind for every
//! entry) and whether the script bundle is minified.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::conditions::names;
use crate::{PlanError, Result};

/// Language levels accepted for a target: `esnext`, `es2020`, `node18`, `chrome100`, ...
static LANGUAGE_LEVEL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?:esnext|es\d{1,4}|(?:node|chrome|firefox|edge|safari|ios|deno)\d+(?:\.\d+){0,2})$")
        .ok()
});

/// One compiled output flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Esnext,
    Module,
    Node,
    Script,
    Browser,
}

impl TargetKind {
    /// All kinds in planning order.
    pub const ALL: [TargetKind; 5] = [
        TargetKind::Esnext,
        TargetKind::Module,
        TargetKind::Node,
        TargetKind::Script,
        TargetKind::Browser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esnext => names::ESNEXT,
            Self::Module => names::MODULE,
            Self::Node => names::NODE,
            Self::Script => names::SCRIPT,
            Self::Browser => names::BROWSER,
        }
    }

    pub fn platform(self) -> Platform {
        match self {
            Self::Esnext | Self::Module => Platform::Neutral,
            Self::Node => Platform::Node,
            Self::Script | Self::Browser => Platform::Browser,
        }
    }

    pub fn format(self) -> ModuleFormat {
        match self {
            Self::Node => ModuleFormat::Cjs,
            Self::Script => ModuleFormat::Iife,
            Self::Esnext | Self::Module | Self::Browser => ModuleFormat::Esm,
        }
    }

    /// Batched kinds compile every entry in one unit so shared code lands in
    /// common chunks. Script bundles are self-contained and built per entry.
    pub fn is_batched(self) -> bool {
        !matches!(self, Self::Script)
    }

    /// Condition lookup order for the source file backing this kind.
    pub fn source_order(self) -> &'static [&'static str] {
        match self {
            Self::Esnext => &[names::ESNEXT, names::DEFAULT, names::BROWSER],
            Self::Module => &[names::MODULE, names::DEFAULT, names::BROWSER],
            Self::Node => &[names::NODE, names::DEFAULT],
            Self::Script => &[names::SCRIPT, names::BROWSER, names::DEFAULT],
            Self::Browser => &[names::BROWSER, names::DEFAULT],
        }
    }

    /// Default language level when the configuration does not override it.
    pub fn default_level(self) -> &'static str {
        match self {
            Self::Esnext => "esnext",
            Self::Module => "es2020",
            Self::Node => "node18",
            Self::Script => "es2017",
            Self::Browser => "es2020",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Node,
    Browser,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    Esm,
    Cjs,
    Iife,
}

/// Which build-mode constants a pass substitutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildMode {
    #[default]
    Production,
    Development,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    pub fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// One compilation target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    pub kind: TargetKind,
    pub platform: Platform,
    pub language_level: String,
    pub format: ModuleFormat,
    pub minify: bool,
}

/// The set of globally enabled targets and their language levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatrix {
    levels: [Option<String>; 5],
    minify_script: bool,
}

impl Default for TargetMatrix {
    fn default() -> Self {
        Self {
            levels: TargetKind::ALL.map(|kind| Some(kind.default_level().to_string())),
            minify_script: true,
        }
    }
}

impl TargetMatrix {
    /// A matrix with every kind disabled.
    pub fn empty() -> Self {
        Self {
            levels: Default::default(),
            minify_script: true,
        }
    }

    /// Set the language level of `kind`; `None` disables the kind for every entry.
    pub fn with_level(mut self, kind: TargetKind, level: Option<&str>) -> Result<Self> {
        if let Some(level) = level {
            validate_level(kind, level)?;
        }
        self.levels[kind as usize] = level.map(str::to_string);
        Ok(self)
    }

    pub fn with_minify_script(mut self, minify: bool) -> Self {
        self.minify_script = minify;
        self
    }

    pub fn is_enabled(&self, kind: TargetKind) -> bool {
        self.levels[kind as usize].is_some()
    }

    /// Descriptor for `kind`, or `None` when the kind is disabled.
    pub fn descriptor(&self, kind: TargetKind) -> Option<TargetDescriptor> {
        let level = self.levels[kind as usize].as_ref()?;
        Some(TargetDescriptor {
            kind,
            platform: kind.platform(),
            language_level: level.clone(),
            format: kind.format(),
            minify: kind == TargetKind::Script && self.minify_script,
        })
    }

    /// Descriptors of every enabled kind, in planning order.
    pub fn enabled(&self) -> impl Iterator<Item = TargetDescriptor> + '_ {
        TargetKind::ALL
            .into_iter()
            .filter_map(|kind| self.descriptor(kind))
    }
}

/// Check a language level string for `kind`.
pub fn validate_level(kind: TargetKind, level: &str) -> Result<()> {
    if LANGUAGE_LEVEL.as_ref().is_some_and(|re| re.is_match(level)) {
        Ok(())
    } else {
        Err(PlanError::InvalidLanguageLevel {
            kind,
            level: level.to_string(),
        })
    }
}
