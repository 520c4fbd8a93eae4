//! Rule types: the author-facing `AuthRule` and its normalized form

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AuthProvider, AuthStrategy, ModelOperation};

pub const DEFAULT_OWNER_FIELD: &str = "owner";
pub const DEFAULT_IDENTITY_CLAIM: &str = "username";
pub const DEFAULT_GROUP_CLAIM: &str = "cognito:groups";

/// `groups` accepts a single group name or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupsValue {
    One(String),
    Many(Vec<String>),
}

impl GroupsValue {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            GroupsValue::One(group) => vec![group],
            GroupsValue::Many(groups) => groups,
        }
    }
}

/// One authorization rule as written by a schema author
///
/// ```
/// use authz_rules::rules::AuthRule;
/// use authz_rules::types::ModelOperation;
///
/// let rule: AuthRule = serde_json::from_str(
///     r#"{ "allow": "owner", "operations": ["read", "update"] }"#,
/// ).unwrap();
///
/// assert_eq!(rule, AuthRule::owner().with_operations([ModelOperation::Read, ModelOperation::Update]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRule {
    #[serde(rename = "allow")]
    pub strategy: AuthStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AuthProvider>,

    /// Absent or empty grants every operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<ModelOperation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_claim: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<GroupsValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_claim: Option<String>,
}

impl AuthRule {
    pub fn new(strategy: AuthStrategy) -> Self {
        Self {
            strategy,
            provider: None,
            operations: None,
            owner_field: None,
            identity_claim: None,
            groups_field: None,
            groups: None,
            group_claim: None,
        }
    }

    pub fn owner() -> Self {
        Self::new(AuthStrategy::Owner)
    }

    pub fn public() -> Self {
        Self::new(AuthStrategy::Public)
    }

    pub fn private() -> Self {
        Self::new(AuthStrategy::Private)
    }

    pub fn custom() -> Self {
        Self::new(AuthStrategy::Custom)
    }

    /// Static groups rule
    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rule = Self::new(AuthStrategy::Groups);
        rule.groups = Some(GroupsValue::Many(groups.into_iter().map(Into::into).collect()));
        rule
    }

    /// Dynamic groups rule reading the allowed groups from a record field
    pub fn groups_field(field: impl Into<String>) -> Self {
        let mut rule = Self::new(AuthStrategy::Groups);
        rule.groups_field = Some(field.into());
        rule
    }

    pub fn with_provider(mut self, provider: AuthProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_operations<I>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = ModelOperation>,
    {
        self.operations = Some(operations.into_iter().collect());
        self
    }

    pub fn with_owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = Some(field.into());
        self
    }

    pub fn with_identity_claim(mut self, claim: impl Into<String>) -> Self {
        self.identity_claim = Some(claim.into());
        self
    }

    pub fn with_group_claim(mut self, claim: impl Into<String>) -> Self {
        self.group_claim = Some(claim.into());
        self
    }
}

/// Where a rule list is attached
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleScope {
    /// Object-level rules of a type
    Model { type_name: String },
    /// Rules attached to one field of a type
    Field { type_name: String, field: String },
}

impl RuleScope {
    pub fn model(type_name: impl Into<String>) -> Self {
        RuleScope::Model {
            type_name: type_name.into(),
        }
    }

    pub fn field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        RuleScope::Field {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self, RuleScope::Field { .. })
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleScope::Model { type_name } => f.write_str(type_name),
            RuleScope::Field { type_name, field } => write!(f, "{}.{}", type_name, field),
        }
    }
}

/// A validated rule with every default applied
///
/// Invariants: `operations` never contains `read` and is never empty;
/// `groups` and `groups_field` are not both set; owner rules carry an owner
/// field and identity claim; groups rules carry a group claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRule {
    pub strategy: AuthStrategy,
    pub provider: AuthProvider,
    pub operations: IndexSet<ModelOperation>,
    pub owner_field: Option<String>,
    pub identity_claim: Option<String>,
    pub groups: Vec<String>,
    pub groups_field: Option<String>,
    pub group_claim: Option<String>,
}

impl NormalizedRule {
    /// Groups rule listing its groups inline
    pub fn is_static_groups(&self) -> bool {
        self.strategy == AuthStrategy::Groups && self.groups_field.is_none()
    }

    pub fn grants(&self, operation: ModelOperation) -> bool {
        self.operations.contains(&operation)
    }
}
