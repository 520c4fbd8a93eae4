//! # Engine
//!
//! Ties the stages together per type: rules are normalized, roles derived,
//! the access control matrix built and the runtime compiler prepared once,
//! then shared read-only across requests.

mod compiled;
mod registry;
mod source;

pub use compiled::CompiledTypeAuth;
pub use registry::AuthRegistry;
pub use source::{RuleDocument, SchemaRuleSource, TypeRules};
