//! Content blocker converter core library
//!
//! Leaf primitives shared by the filter-list compiler: the rule option bit
//! sets, the host version feature table, domain helpers, the URL pattern to
//! regex translator and the host regex dialect validator.
//!
//! # Modules
//!
//! - `types`: content type, option and party bit sets
//! - `version`: host version token and its feature thresholds
//! - `domain`: subdomain tests, IDN encoding, pattern host extraction
//! - `pattern`: URL pattern to regex translation
//! - `dialect`: host regex dialect validation

pub mod dialect;
pub mod domain;
pub mod pattern;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use dialect::{validate_regex, RegexDialectError};
pub use pattern::{pattern_to_regex, PatternError};
pub use types::{ContentType, CosmeticKind, NetworkOption, PartyMask};
pub use version::HostVersion;
