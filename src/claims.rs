//! Caller identity: the claims accessor consumed by the compiler and the
//! request-level facts (authentication type, IAM principal) that select
//! which provider bucket is evaluated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::AuthType;

/// Separator for composite claims such as `sub::username`
pub const CLAIM_DELIMITER: &str = "::";

/// Value of one identity claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Single(String),
    List(Vec<String>),
}

impl ClaimValue {
    /// The value as a single string, if it is one
    pub fn as_single(&self) -> Option<&str> {
        match self {
            ClaimValue::Single(value) => Some(value),
            ClaimValue::List(_) => None,
        }
    }

    /// Claim values as a list
    ///
    /// A single string holding a JSON array (some OIDC issuers serialize
    /// group lists that way) is unpacked; any other single string is a
    /// one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            ClaimValue::List(values) => values.clone(),
            ClaimValue::Single(value) if value.trim_start().starts_with('[') => {
                serde_json::from_str::<Vec<String>>(value).unwrap_or_else(|_| vec![value.clone()])
            }
            ClaimValue::Single(value) => vec![value.clone()],
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.to_list().iter().any(|v| v == needle)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Single(value.to_string())
    }
}

impl From<Vec<&str>> for ClaimValue {
    fn from(values: Vec<&str>) -> Self {
        ClaimValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Read-only accessor for the caller's identity claims
///
/// Implementations must return the same answer for the same name within one
/// evaluation.
pub trait IdentityClaims {
    fn claim(&self, name: &str) -> Option<ClaimValue>;
}

impl<T: IdentityClaims + ?Sized> IdentityClaims for &T {
    fn claim(&self, name: &str) -> Option<ClaimValue> {
        (**self).claim(name)
    }
}

/// Decoded token claims, e.g. a JWT payload
impl IdentityClaims for serde_json::Value {
    fn claim(&self, name: &str) -> Option<ClaimValue> {
        match self.get(name)? {
            serde_json::Value::String(s) => Some(ClaimValue::Single(s.clone())),
            serde_json::Value::Array(items) => Some(ClaimValue::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )),
            serde_json::Value::Null => None,
            other => Some(ClaimValue::Single(other.to_string())),
        }
    }
}

impl IdentityClaims for HashMap<String, ClaimValue> {
    fn claim(&self, name: &str) -> Option<ClaimValue> {
        self.get(name).cloned()
    }
}

/// Claims accessor with no claims at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClaims;

impl IdentityClaims for NoClaims {
    fn claim(&self, _name: &str) -> Option<ClaimValue> {
        None
    }
}

static NO_CLAIMS: NoClaims = NoClaims;

/// Resolves a claim, joining composite names (`sub::username`)
///
/// A composite claim is present only when every part is a single string.
pub fn resolve_claim(claims: &dyn IdentityClaims, name: &str) -> Option<ClaimValue> {
    if !name.contains(CLAIM_DELIMITER) {
        return claims.claim(name);
    }

    let mut parts = Vec::new();
    for part in name.split(CLAIM_DELIMITER) {
        let value = claims.claim(part)?;
        parts.push(value.as_single()?.to_string());
    }
    Some(ClaimValue::Single(parts.join(CLAIM_DELIMITER)))
}

/// Facts about an IAM-signed caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPrincipal {
    #[serde(default)]
    pub user_arn: Option<String>,

    #[serde(default)]
    pub cognito_identity_pool_id: Option<String>,

    /// `authenticated` or `unauthenticated` for identity pool principals
    #[serde(default)]
    pub cognito_identity_auth_type: Option<String>,
}

impl IamPrincipal {
    pub fn identity_pool(pool_id: impl Into<String>, auth_type: impl Into<String>) -> Self {
        Self {
            user_arn: None,
            cognito_identity_pool_id: Some(pool_id.into()),
            cognito_identity_auth_type: Some(auth_type.into()),
        }
    }

    pub fn with_user_arn(mut self, arn: impl Into<String>) -> Self {
        self.user_arn = Some(arn.into());
        self
    }
}

/// Everything the compiler knows about the caller of one request
#[derive(Clone, Copy)]
pub struct CallerIdentity<'a> {
    /// Authentication type the caller proved; `None` when unauthenticated
    pub auth_type: Option<AuthType>,

    pub claims: &'a dyn IdentityClaims,

    pub iam: Option<&'a IamPrincipal>,
}

impl<'a> CallerIdentity<'a> {
    pub fn unauthenticated() -> CallerIdentity<'static> {
        CallerIdentity {
            auth_type: None,
            claims: &NO_CLAIMS,
            iam: None,
        }
    }

    pub fn api_key() -> CallerIdentity<'static> {
        CallerIdentity {
            auth_type: Some(AuthType::ApiKey),
            claims: &NO_CLAIMS,
            iam: None,
        }
    }

    pub fn user_pools(claims: &'a dyn IdentityClaims) -> Self {
        Self {
            auth_type: Some(AuthType::UserPools),
            claims,
            iam: None,
        }
    }

    pub fn oidc(claims: &'a dyn IdentityClaims) -> Self {
        Self {
            auth_type: Some(AuthType::Oidc),
            claims,
            iam: None,
        }
    }

    pub fn lambda(claims: &'a dyn IdentityClaims) -> Self {
        Self {
            auth_type: Some(AuthType::Lambda),
            claims,
            iam: None,
        }
    }

    pub fn iam(principal: &'a IamPrincipal) -> Self {
        Self {
            auth_type: Some(AuthType::Iam),
            claims: &NO_CLAIMS,
            iam: Some(principal),
        }
    }

    pub fn resolve_claim(&self, name: &str) -> Option<ClaimValue> {
        resolve_claim(self.claims, name)
    }
}

impl std::fmt::Debug for CallerIdentity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerIdentity")
            .field("auth_type", &self.auth_type)
            .field("iam", &self.iam)
            .finish_non_exhaustive()
    }
}
