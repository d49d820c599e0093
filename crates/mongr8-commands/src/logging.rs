//! Logging bootstrap

use tracing_subscriber::EnvFilter;

/// Level implied by `-v` repetitions, falling back to the configured level
pub fn level_for(verbosity: u8, configured: &str) -> String {
	match verbosity {
		0 => configured.to_string(),
		1 => "info".to_string(),
		2 => "debug".to_string(),
		_ => "trace".to_string(),
	}
}

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `verbosity` and `configured`. Installing twice is a
/// no-op.
pub fn init_logging(verbosity: u8, configured: &str) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(level_for(verbosity, configured)));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.try_init();
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0, "warn")]
	#[case(1, "info")]
	#[case(2, "debug")]
	#[case(3, "trace")]
	#[case(9, "trace")]
	fn test_level_for(#[case] verbosity: u8, #[case] expected: &str) {
		assert_eq!(level_for(verbosity, "warn"), expected);
	}

	#[rstest]
	fn test_init_twice_is_harmless() {
		init_logging(0, "warn");
		init_logging(2, "warn");
	}
}
