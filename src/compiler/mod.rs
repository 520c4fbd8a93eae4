//! # Runtime Expression Compiler
//!
//! Evaluates the roles of one operation for one caller in two phases:
//!
//! 1. **Static**: roles whose outcome does not depend on record data (public,
//!    private, fixed groups, custom). A satisfied static role allows the
//!    request immediately; no claim of a dynamic role is read.
//! 2. **Dynamic**: owner and field-based group roles become `eq`/`in`
//!    predicates bound to the caller's claims. Owner predicates are `or`-ed,
//!    group predicates are `or`-ed, and the two groups are `or`-ed together.
//!
//! Only the bucket of the caller's own authentication type is evaluated.
//! Anything not explicitly allowed is denied.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use authz_rules::compiler::{Decision, ExpressionCompiler};
//! use authz_rules::claims::CallerIdentity;
//! use authz_rules::config::{CompilerConfig, ConfiguredAuthProviders};
//! use authz_rules::filter::FilterExpr;
//! use authz_rules::roles::RoleDeriver;
//! use authz_rules::rules::{AuthRule, RuleNormalizer, RuleScope};
//! use authz_rules::types::{AuthType, ModelOperation, TypeSchema};
//!
//! let providers = ConfiguredAuthProviders::new(AuthType::UserPools);
//! let rules = RuleNormalizer::new(&providers)
//!     .normalize(&RuleScope::model("Todo"), &[AuthRule::owner()])
//!     .unwrap();
//!
//! let mut deriver = RoleDeriver::new();
//! deriver.add_model_rules(&rules);
//! let roles = deriver.finish();
//!
//! let schema = TypeSchema::with_scalars("Todo", &["id", "owner"]);
//! let acm = roles.build_acm("Todo", schema.field_names());
//! let compiler = ExpressionCompiler::new(
//!     schema,
//!     &roles,
//!     &acm,
//!     Arc::new(providers),
//!     CompilerConfig::default(),
//! );
//!
//! let claims = serde_json::json!({ "username": "alice" });
//! let expr = compiler.evaluate(ModelOperation::List, &CallerIdentity::user_pools(&claims));
//!
//! assert_eq!(expr.decision, Decision::Deferred);
//! assert_eq!(expr.filter, Some(FilterExpr::eq("owner", "alice")));
//! ```

mod evaluator;
mod expression;

pub use evaluator::{ExpressionCompiler, PlanStep, PROVIDER_PRECEDENCE};
pub use expression::{AuthorizationExpression, Decision, DenyReason, DynamicGrant};
