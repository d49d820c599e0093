//! Command execution context

use mongr8_conf::Settings;
use mongr8_db::migrations::MigrationOptions;
use std::collections::HashMap;
use std::path::PathBuf;

/// Arguments, options and settings handed to a command
///
/// Flags are stored under their long name (`use-transaction`); a flag is set
/// when its key is present.
#[derive(Debug, Clone)]
pub struct CommandContext {
	pub args: Vec<String>,
	pub options: HashMap<String, Vec<String>>,
	pub verbosity: u8,
	pub settings: Settings,
}

impl CommandContext {
	pub fn new(settings: Settings) -> Self {
		Self {
			args: Vec::new(),
			options: HashMap::new(),
			verbosity: 0,
			settings,
		}
	}

	pub fn with_args(mut self, args: Vec<String>) -> Self {
		self.args = args;
		self
	}

	pub fn arg(&self, index: usize) -> Option<&String> {
		self.args.get(index)
	}

	pub fn option(&self, key: &str) -> Option<&String> {
		self.options.get(key).and_then(|v| v.first())
	}

	pub fn has_option(&self, key: &str) -> bool {
		self.options.contains_key(key)
	}

	pub fn set_option(&mut self, key: String, value: String) {
		self.options.insert(key, vec![value]);
	}

	/// Set a boolean flag; `false` leaves it unset.
	pub fn set_flag(&mut self, key: &str, enabled: bool) {
		if enabled {
			self.set_option(key.to_string(), "true".to_string());
		}
	}

	pub fn add_arg(&mut self, arg: String) {
		self.args.push(arg);
	}

	pub fn set_verbosity(&mut self, level: u8) {
		self.verbosity = level;
	}

	pub fn verbosity(&self) -> u8 {
		self.verbosity
	}

	/// Migration options from the `use-*` flags and `desc`
	pub fn migration_options(&self) -> MigrationOptions {
		MigrationOptions {
			use_sorted_schema: self.has_option("use-sorted-schema"),
			use_force_conversion: self.has_option("use-force-conversion"),
			use_schema_validation: self.has_option("use-schema-validation"),
			use_transaction: self.has_option("use-transaction"),
			desc: self.option("desc").cloned().unwrap_or_default(),
		}
	}

	pub fn migrations_dir(&self) -> PathBuf {
		self.settings.migrations_dir.clone()
	}

	pub fn info(&self, message: &str) {
		println!("[INFO] {}", message);
	}

	pub fn success(&self, message: &str) {
		println!("[SUCCESS] {}", message);
	}

	pub fn warning(&self, message: &str) {
		eprintln!("[WARNING] {}", message);
	}

	/// Printed only with `-v` or more
	pub fn verbose(&self, message: &str) {
		if self.verbosity > 0 {
			println!("[VERBOSE] {}", message);
		}
	}
}

impl Default for CommandContext {
	fn default() -> Self {
		Self::new(Settings::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_migration_options_from_flags() {
		// Arrange
		let mut ctx = CommandContext::default();
		ctx.set_flag("use-sorted-schema", true);
		ctx.set_flag("use-transaction", true);
		ctx.set_flag("use-force-conversion", false);
		ctx.set_option("desc".to_string(), "add bio".to_string());

		// Act
		let options = ctx.migration_options();

		// Assert
		assert_eq!(
			options,
			MigrationOptions {
				use_sorted_schema: true,
				use_force_conversion: false,
				use_schema_validation: false,
				use_transaction: true,
				desc: "add bio".to_string(),
			}
		);
	}
}
