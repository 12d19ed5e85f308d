//! Protocol versioning for safe upgrades.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol version for bridge/client-daemon communication.
///
/// `major.minor`: a major bump is breaking, a minor bump only adds
/// message types or optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    /// Current protocol version.
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Parses a version string like "1.0".
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(s.to_string());

        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u16>().map_err(|_| invalid())?;
        let minor = minor.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self { major, minor })
    }

    /// Same major version means compatible.
    pub fn is_compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Errors that can occur with version handling.
#[derive(Error, Debug, Clone)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = ProtocolVersion::parse("1.3").unwrap();
        assert_eq!(v, ProtocolVersion::new(1, 3));
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(ProtocolVersion::parse("1").is_err());
        assert!(ProtocolVersion::parse("1.0.0").is_err());
        assert!(ProtocolVersion::parse("one.two").is_err());
    }

    #[test]
    fn test_version_compatibility() {
        assert!(ProtocolVersion::new(1, 0).is_compatible_with(&ProtocolVersion::new(1, 4)));
        assert!(!ProtocolVersion::new(1, 0).is_compatible_with(&ProtocolVersion::new(2, 0)));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ProtocolVersion::new(1, 2).to_string(), "1.2");
    }
}
