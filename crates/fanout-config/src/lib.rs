//! Configuration for fanout builds.
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. `fanout.toml` in the package root
//! 3. the `fanout` field of `package.json`
//! 4. `FANOUT_*` environment variables (`__` separates nested keys)
//! 5. explicit overrides, usually CLI flags

pub mod config;
pub mod discovery;
pub mod error;
pub mod validation;

pub use config::*;
pub use error::*;

pub use discovery::{CONFIG_FILE, ConfigDiscovery, ENV_PREFIX, PACKAGE_KEY};
pub use validation::{ConfigValidator, SchemaValidator};
