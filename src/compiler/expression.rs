//! Result of one authorization evaluation

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::filter::FilterExpr;
use crate::roles::RoleId;
use crate::types::{AuthType, ModelOperation};

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum DenyReason {
    /// The request carries no authentication at all
    Unauthenticated,
    /// The caller's authentication type is not active for the API
    ProviderNotConfigured { auth_type: AuthType },
    /// No role of the caller's provider grants the operation
    NoMatchingRoles,
    /// Dynamic roles exist but the caller lacks every claim they read
    NoQualifyingClaims,
    /// Dynamic predicates were evaluated against the input and none held
    ConditionNotMet,
    /// Input names fields no applying role may write
    UnauthorizedFields { fields: Vec<String> },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => f.write_str("request is not authenticated"),
            DenyReason::ProviderNotConfigured { auth_type } => {
                write!(f, "{} is not configured for this API", auth_type)
            }
            DenyReason::NoMatchingRoles => f.write_str("no rule grants this operation"),
            DenyReason::NoQualifyingClaims => f.write_str("caller has none of the required claims"),
            DenyReason::ConditionNotMet => f.write_str("input does not satisfy any rule"),
            DenyReason::UnauthorizedFields { fields } => {
                write!(f, "unauthorized on fields [{}]", fields.join(", "))
            }
        }
    }
}

/// Outcome of the static phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
    /// The answer depends on record data; see the expression's filter
    Deferred,
}

/// A dynamic role together with the predicate it contributed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicGrant {
    pub role: RoleId,
    pub predicate: FilterExpr,
}

/// Compiled authorization for one request
///
/// `decided()` is true for allow and deny. A deferred expression always
/// carries a filter; records the filter rejects must be treated as denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExpression {
    pub operation: ModelOperation,
    pub decision: Decision,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpr>,

    /// Roles that allowed the request outright
    pub granted_roles: Vec<RoleId>,

    /// Dynamic roles behind `filter`, in evaluation order
    pub dynamic_grants: Vec<DynamicGrant>,

    /// Set when an IAM admin role bypassed every rule
    pub admin: bool,

    /// Values filled into a create input before it was checked (the owner
    /// field)
    pub input_defaults: IndexMap<String, serde_json::Value>,
}

impl AuthorizationExpression {
    pub(crate) fn new(operation: ModelOperation, decision: Decision) -> Self {
        Self {
            operation,
            decision,
            filter: None,
            granted_roles: Vec::new(),
            dynamic_grants: Vec::new(),
            admin: false,
            input_defaults: IndexMap::new(),
        }
    }

    pub(crate) fn deny(operation: ModelOperation, reason: DenyReason) -> Self {
        Self::new(operation, Decision::Deny(reason))
    }

    pub fn decided(&self) -> bool {
        !matches!(self.decision, Decision::Deferred)
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self.decision, Decision::Deny(_))
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match &self.decision {
            Decision::Deny(reason) => Some(reason),
            _ => None,
        }
    }

    /// Filter to run the query with: the caller's own filter narrowed by the
    /// authorization filter
    ///
    /// `None` means no authorization narrowing applies (decided allow);
    /// callers must not run the query for a denied expression.
    pub fn merge_with_caller_filter(&self, caller_filter: Option<FilterExpr>) -> Option<FilterExpr> {
        match &self.filter {
            Some(auth) => Some(FilterExpr::intersect(caller_filter, auth.clone())),
            None => caller_filter,
        }
    }

    /// Whether `record` may be returned or written
    pub fn permits_record(&self, record: &serde_json::Value) -> bool {
        match &self.decision {
            Decision::Allow => true,
            Decision::Deny(_) => false,
            Decision::Deferred => self.filter.as_ref().is_some_and(|f| f.matches(record)),
        }
    }

    /// Roles that let the caller see `record`: the outright grants plus the
    /// dynamic grants whose predicate holds for the record
    pub fn allowing_roles_for(&self, record: &serde_json::Value) -> Vec<RoleId> {
        let mut roles = self.granted_roles.clone();
        for grant in &self.dynamic_grants {
            if grant.predicate.matches(record) && !roles.contains(&grant.role) {
                roles.push(grant.role.clone());
            }
        }
        roles
    }

    /// Writes the computed defaults into a mutation input object
    pub fn apply_input_defaults(&self, input: &mut serde_json::Value) {
        if let serde_json::Value::Object(map) = input {
            for (field, value) in &self.input_defaults {
                map.insert(field.clone(), value.clone());
            }
        }
    }
}
