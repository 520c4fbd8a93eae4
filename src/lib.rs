//! # Authorization Rules Engine (authz-rules)
//!
//! Compiles declarative per-type and per-field authorization rules into:
//! - a static allow/deny decision made before any data is fetched
//! - a per-field redaction matrix
//! - a runtime filter expression over record fields, bound to the caller's
//!   identity claims
//!
//! Rules cover five strategies (owner, groups, public, private, custom) across
//! six identity providers. Anything not explicitly allowed is denied.
//!
//! ## Example
//!
//! ```rust
//! use authz_rules::claims::CallerIdentity;
//! use authz_rules::config::{CompilerConfig, ConfiguredAuthProviders};
//! use authz_rules::engine::{AuthRegistry, TypeRules};
//! use authz_rules::filter::FilterExpr;
//! use authz_rules::rules::AuthRule;
//! use authz_rules::types::{AuthType, ModelOperation, TypeSchema};
//!
//! let registry = AuthRegistry::new(
//!     ConfiguredAuthProviders::new(AuthType::UserPools),
//!     CompilerConfig::default(),
//! );
//!
//! registry.register(
//!     &TypeRules::new(TypeSchema::with_scalars("Todo", &["id", "content"]))
//!         .with_rules(vec![AuthRule::owner(), AuthRule::groups(["Admin"])]),
//! )?;
//!
//! let claims = serde_json::json!({ "username": "alice", "cognito:groups": [] });
//! let expr = registry.authorize("Todo", ModelOperation::List, &CallerIdentity::user_pools(&claims))?;
//!
//! assert!(!expr.decided());
//! assert_eq!(expr.filter, Some(FilterExpr::eq("owner", "alice")));
//! # Ok::<(), authz_rules::AuthzError>(())
//! ```

pub mod acm;
pub mod claims;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod redaction;
pub mod roles;
pub mod rules;
pub mod types;

pub use claims::{CallerIdentity, ClaimValue, IdentityClaims, IamPrincipal};
pub use compiler::{AuthorizationExpression, Decision, DenyReason, ExpressionCompiler};
pub use config::{AuthConfig, CompilerConfig, ConfiguredAuthProviders};
pub use engine::{AuthRegistry, CompiledTypeAuth, RuleDocument, SchemaRuleSource, TypeRules};
pub use error::{AuthzError, Result};
pub use filter::FilterExpr;
pub use rules::AuthRule;
pub use types::{AuthProvider, AuthStrategy, AuthType, ModelOperation, TypeSchema};
