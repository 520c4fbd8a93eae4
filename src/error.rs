//! Error types for the authorization engine
//!
//! Every variant is a configuration error: it is raised while compiling the
//! rules of one type and aborts that compilation. Per-request denials are not
//! errors; see [`crate::compiler::DenyReason`].

use thiserror::Error;

use crate::types::{AuthProvider, AuthStrategy, ModelOperation};

/// Result type alias for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Configuration errors produced while normalizing and compiling rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Rule names a provider the API does not have configured
    #[error("@auth directive with '{provider}' provider found on '{resource}', but the project has no {provider} authentication provider configured")]
    ProviderNotConfigured {
        resource: String,
        provider: AuthProvider,
    },

    /// Strategy cannot be expressed by the given provider
    #[error("@auth directive with '{strategy}' strategy does not support the '{provider}' provider (on '{resource}')")]
    UnsupportedProvider {
        resource: String,
        strategy: AuthStrategy,
        provider: AuthProvider,
    },

    /// `read` combined with one of the operations it expands to
    #[error("@auth rule on '{resource}' combines 'read' with '{operation}'; use one or the other")]
    AmbiguousReadOperation {
        resource: String,
        operation: ModelOperation,
    },

    /// Field-level rule uses an operation that only exists at object level
    #[error("'{operation}' operation is not allowed at the field level (field '{field}')")]
    InvalidFieldOperation {
        field: String,
        operation: ModelOperation,
    },

    /// `identityClaim` on a non-owner rule
    #[error("@auth identityClaim can only be used for 'allow: owner' (on '{resource}')")]
    IdentityClaimOnNonOwner { resource: String },

    /// `groupClaim` on a non-groups rule
    #[error("@auth groupClaim can only be used for 'allow: groups' (on '{resource}')")]
    GroupClaimOnNonGroups { resource: String },

    /// Both `groups` and `groupsField` on one rule
    #[error("@auth rule on '{resource}' has groupsField and groups, please use one or the other")]
    GroupsAndGroupsField { resource: String },

    /// Groups rule with neither `groups` nor `groupsField`
    #[error("@auth rules using groups strategy must specify either 'groups' or 'groupsField' (on '{resource}')")]
    MissingGroups { resource: String },

    /// `groupsField` on an owner rule
    #[error("'groupsField' is not valid for allow: owner (on '{resource}')")]
    GroupsFieldOnOwner { resource: String },

    /// Field, claim or group name that is not a valid identifier
    #[error("invalid {kind} '{name}' in @auth rule on '{resource}'")]
    InvalidIdentifier {
        resource: String,
        kind: &'static str,
        name: String,
    },

    /// Field-level rule on a field the type does not declare
    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    /// Registry lookup for a type that was never compiled
    #[error("no authorization rules compiled for type '{type_name}'")]
    TypeNotFound { type_name: String },

    /// Rule document that does not parse
    #[error("invalid rule document: {message}")]
    InvalidRuleDocument { message: String },
}
