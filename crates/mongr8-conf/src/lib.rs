//! # mongr8 Configuration
//!
//! Settings for the mongr8 command line, merged from layered sources:
//!
//! 1. Built-in defaults (lowest priority)
//! 2. A TOML file, usually `mongr8.toml`
//! 3. `MONGR8_*` environment variables (highest priority)
//!
//! ## Example
//!
//! ```rust,no_run
//! use mongr8_conf::settings::Settings;
//!
//! let settings = Settings::load("mongr8.toml")?;
//! println!("migrations live in {}", settings.migrations_dir.display());
//! # Ok::<(), mongr8_conf::settings::SettingsError>(())
//! ```

pub mod settings;

pub use settings::{Settings, SettingsError};
