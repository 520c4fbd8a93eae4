//! # Rule Normalizer
//!
//! Validates author-facing `@auth` rules and expands them into a canonical
//! form every later stage can rely on:
//! - provider defaulted from the strategy
//! - `read` expanded into `get`, `list`, `search`, `sync`, `listen`
//! - single-string `groups` turned into a list
//! - owner/groups defaults (`owner`, `username`, `cognito:groups`)
//!
//! Every rejection is a configuration error that aborts compiling the type.

mod normalizer;
mod types;

pub use normalizer::{common_rule_validation, RuleNormalizer};
pub use types::{
    AuthRule, GroupsValue, NormalizedRule, RuleScope, DEFAULT_GROUP_CLAIM, DEFAULT_IDENTITY_CLAIM,
    DEFAULT_OWNER_FIELD,
};
