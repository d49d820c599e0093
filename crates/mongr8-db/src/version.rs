//! Engine version recorded with every applied migration

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid version '{input}': {reason}")]
pub struct VersionError {
	pub input: String,
	pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
	pub major: u64,
	pub minor: u64,
	pub patch: u64,
}

impl Version {
	pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
		Self {
			major,
			minor,
			patch,
		}
	}

	/// Version of this build
	pub fn current() -> Self {
		env!("CARGO_PKG_VERSION").parse().unwrap_or_default()
	}

	pub fn is_at_least(&self, other: &Version) -> bool {
		self >= other
	}
}

impl FromStr for Version {
	type Err = VersionError;

	/// Accepts `1.2.3` and `v1.2.3`; pre-release and build tags are ignored.
	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let parsed = semver::Version::parse(input.trim().trim_start_matches('v')).map_err(|e| {
			VersionError {
				input: input.to_string(),
				reason: e.to_string(),
			}
		})?;
		Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
	}
}

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("1.2.3", Version::new(1, 2, 3))]
	#[case("v0.4.0", Version::new(0, 4, 0))]
	#[case("2.0.0-beta.1", Version::new(2, 0, 0))]
	fn test_parse(#[case] input: &str, #[case] expected: Version) {
		assert_eq!(input.parse::<Version>().unwrap(), expected);
	}

	#[rstest]
	fn test_parse_rejects_garbage() {
		assert!("latest".parse::<Version>().is_err());
	}

	#[rstest]
	#[case(Version::new(1, 2, 3), Version::new(1, 2, 3), true)]
	#[case(Version::new(1, 3, 0), Version::new(1, 2, 9), true)]
	#[case(Version::new(0, 9, 0), Version::new(1, 0, 0), false)]
	fn test_is_at_least(#[case] current: Version, #[case] recorded: Version, #[case] expected: bool) {
		assert_eq!(current.is_at_least(&recorded), expected);
	}

	#[rstest]
	fn test_current_matches_package() {
		assert_eq!(Version::current().to_string(), env!("CARGO_PKG_VERSION"));
	}
}
