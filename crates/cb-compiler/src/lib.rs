//! Filter list compiler
//!
//! This crate compiles AdGuard/uBO/ABP filter lists into the host's
//! declarative content blocker JSON.
//!
//! Pipeline: [`normalizer`] → [`factory`] (with [`network`] and [`cosmetic`]
//! parsers) → [`optimizer`] → [`builder`], driven by [`converter::convert`].

pub mod builder;
pub mod converter;
pub mod cosmetic;
pub mod entry;
pub mod error;
pub mod factory;
pub mod marker;
pub mod network;
pub mod normalizer;
pub mod optimizer;
pub mod rule;
pub mod scriptlet;

pub use builder::{build_json, BuildOutput, EMPTY_RESULT_JSON};
pub use converter::{
    allowlist_rule, convert, inverted_allowlist_rule, CancellationToken, ConversionResult,
    ConvertOptions,
};
pub use entry::{Entry, Trigger};
pub use error::SyntaxError;
pub use factory::{create_rule, create_rules, ErrorCounter};
pub use optimizer::filter_out_exceptions;
pub use rule::{Rule, RuleHeader};
