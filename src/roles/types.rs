//! Canonical role definitions and their identity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AuthProvider, AuthStrategy};

/// Identity of a role: the five attributes two roles must share to be the
/// same role
///
/// The `Display` form is the role's name in the access control matrix, e.g.
/// `userPools:owner:owner:username` or `apiKey:public`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId {
    pub provider: AuthProvider,
    pub strategy: AuthStrategy,
    pub is_static: bool,
    pub claim: Option<String>,
    pub entity: Option<String>,
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let claim = self.claim.as_deref().unwrap_or("");
        let entity = self.entity.as_deref().unwrap_or("");
        match (self.strategy, self.is_static) {
            (AuthStrategy::Groups, true) => {
                write!(f, "{}:staticGroup:{}:{}", self.provider, entity, claim)
            }
            (AuthStrategy::Groups, false) => {
                write!(f, "{}:dynamicGroup:{}:{}", self.provider, entity, claim)
            }
            (AuthStrategy::Owner, _) => write!(f, "{}:owner:{}:{}", self.provider, entity, claim),
            (strategy, _) => write!(f, "{}:{}", self.provider, strategy),
        }
    }
}

/// Canonical, deduplicated unit of authorization
///
/// Built once per type from its normalized rules. The field lists are only
/// populated on the copies handed out for a mutation operation (see
/// [`crate::roles::DerivedRoles::roles_for_operation`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub provider: AuthProvider,
    pub strategy: AuthStrategy,

    /// True when the outcome does not depend on per-record data
    #[serde(rename = "static")]
    pub is_static: bool,

    /// Identity claim read from the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,

    /// Record field (or fixed group name) the claim is compared against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Fields this role may write; `None` when every field is allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_fields: Option<Vec<String>>,

    /// Fields this role may set to null on update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_allowed_fields: Option<Vec<String>>,

    #[serde(default)]
    pub are_all_fields_allowed: bool,

    #[serde(default)]
    pub are_all_fields_null_allowed: bool,
}

impl RoleDefinition {
    pub fn new(provider: AuthProvider, strategy: AuthStrategy, is_static: bool) -> Self {
        Self {
            provider,
            strategy,
            is_static,
            claim: None,
            entity: None,
            allowed_fields: None,
            null_allowed_fields: None,
            are_all_fields_allowed: true,
            are_all_fields_null_allowed: true,
        }
    }

    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = Some(claim.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn id(&self) -> RoleId {
        RoleId {
            provider: self.provider,
            strategy: self.strategy,
            is_static: self.is_static,
            claim: self.claim.clone(),
            entity: self.entity.clone(),
        }
    }

    /// Same provider, strategy, static flag, claim and entity
    pub fn is_identical(&self, other: &RoleDefinition) -> bool {
        self.provider == other.provider
            && self.strategy == other.strategy
            && self.is_static == other.is_static
            && self.claim == other.claim
            && self.entity == other.entity
    }

    /// Whether this role may write `field`
    pub fn permits_field(&self, field: &str) -> bool {
        self.are_all_fields_allowed
            || self
                .allowed_fields
                .as_ref()
                .is_some_and(|fields| fields.iter().any(|f| f == field))
    }

    /// Whether this role may set `field` to null
    pub fn permits_null(&self, field: &str) -> bool {
        self.are_all_fields_null_allowed
            || self
                .null_allowed_fields
                .as_ref()
                .is_some_and(|fields| fields.iter().any(|f| f == field))
    }
}

/// Free-function form of [`RoleDefinition::is_identical`]
pub fn is_identical_auth_role(a: &RoleDefinition, b: &RoleDefinition) -> bool {
    a.is_identical(b)
}
