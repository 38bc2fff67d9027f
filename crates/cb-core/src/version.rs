//! Host version feature table
//!
//! The host's declarative blocking engine gained features over time. Every
//! version-dependent decision in the converter goes through this type.

use std::fmt;
use std::str::FromStr;

/// Entry limit for hosts before version 15.
pub const LEGACY_RULES_LIMIT: usize = 50_000;
/// Entry limit for hosts from version 15 on.
pub const RULES_LIMIT: usize = 150_000;

/// Host version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum HostVersion {
    #[default]
    V13,
    V14,
    V15,
    V16,
    V16_4,
    V17,
    V18,
}

/// Error returned when a host version token is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown host version: {0}")]
pub struct UnknownHostVersion(pub String);

impl HostVersion {
    /// Newest known host version.
    pub const LATEST: Self = Self::V18;

    /// Maximum number of entries the host accepts in one ruleset.
    pub fn rules_limit(self) -> usize {
        if self >= Self::V15 {
            RULES_LIMIT
        } else {
            LEGACY_RULES_LIMIT
        }
    }

    /// `$ping` content type is available.
    pub fn supports_ping(self) -> bool {
        self >= Self::V14
    }

    /// `:is()` is handled by the host's CSS engine.
    pub fn supports_native_is(self) -> bool {
        self >= Self::V14
    }

    /// `:has()` is handled by the host's CSS engine.
    pub fn supports_native_has(self) -> bool {
        self >= Self::V16_4
    }

    /// Blocking `$subdocument` rules need a third-party or domain scope.
    pub fn requires_subdocument_scope(self) -> bool {
        self < Self::V16
    }

    /// Cosmetic exceptions may be folded into `unless-domain` of a rule that
    /// also has `if-domain`.
    pub fn supports_mixed_domain_scope(self) -> bool {
        self >= Self::V16_4
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V13 => "13",
            Self::V14 => "14",
            Self::V15 => "15",
            Self::V16 => "16",
            Self::V16_4 => "16.4",
            Self::V17 => "17",
            Self::V18 => "18",
        }
    }
}

impl FromStr for HostVersion {
    type Err = UnknownHostVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "13" | "13.0" => Ok(Self::V13),
            "14" | "14.0" => Ok(Self::V14),
            "15" | "15.0" => Ok(Self::V15),
            "16" | "16.0" => Ok(Self::V16),
            "16.4" => Ok(Self::V16_4),
            "17" | "17.0" => Ok(Self::V17),
            "18" | "18.0" => Ok(Self::V18),
            other => Err(UnknownHostVersion(other.to_string())),
        }
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tokens() {
        assert_eq!("16.4".parse::<HostVersion>(), Ok(HostVersion::V16_4));
        assert_eq!(" 15 ".parse::<HostVersion>(), Ok(HostVersion::V15));
        assert!("12".parse::<HostVersion>().is_err());
        assert_eq!(HostVersion::V16_4.to_string(), "16.4");
    }

    #[test]
    fn feature_thresholds() {
        assert_eq!(HostVersion::V14.rules_limit(), LEGACY_RULES_LIMIT);
        assert_eq!(HostVersion::V15.rules_limit(), RULES_LIMIT);
        assert!(!HostVersion::V13.supports_ping());
        assert!(HostVersion::V14.supports_native_is());
        assert!(!HostVersion::V16.supports_native_has());
        assert!(HostVersion::V17.supports_native_has());
        assert!(HostVersion::V15.requires_subdocument_scope());
        assert!(!HostVersion::V16.requires_subdocument_scope());
    }
}
