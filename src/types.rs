//! Core vocabulary shared by every stage: operations, strategies, providers
//! and the minimal schema description of a type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a rule can grant
///
/// `Read` only appears in author-facing rules; normalization expands it into
/// [`ModelOperation::READ_EXPANSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOperation {
    Create,
    Update,
    Delete,
    Get,
    List,
    Sync,
    Search,
    Listen,
    Read,
}

impl ModelOperation {
    /// Canonical operation set of a model (everything except the `read` shorthand)
    pub const ALL: [ModelOperation; 8] = [
        ModelOperation::Create,
        ModelOperation::Update,
        ModelOperation::Delete,
        ModelOperation::Get,
        ModelOperation::List,
        ModelOperation::Sync,
        ModelOperation::Search,
        ModelOperation::Listen,
    ];

    /// What `read` stands for
    pub const READ_EXPANSION: [ModelOperation; 5] = [
        ModelOperation::Get,
        ModelOperation::List,
        ModelOperation::Search,
        ModelOperation::Sync,
        ModelOperation::Listen,
    ];

    /// Operations a field-level rule may name
    pub const FIELD_LEVEL: [ModelOperation; 4] = [
        ModelOperation::Create,
        ModelOperation::Update,
        ModelOperation::Delete,
        ModelOperation::Read,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelOperation::Create => "create",
            ModelOperation::Update => "update",
            ModelOperation::Delete => "delete",
            ModelOperation::Get => "get",
            ModelOperation::List => "list",
            ModelOperation::Sync => "sync",
            ModelOperation::Search => "search",
            ModelOperation::Listen => "listen",
            ModelOperation::Read => "read",
        }
    }
}

impl fmt::Display for ModelOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of authorization check a rule performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    Owner,
    Groups,
    Public,
    Private,
    Custom,
}

impl AuthStrategy {
    /// Provider assumed when a rule does not name one
    pub fn default_provider(&self) -> AuthProvider {
        match self {
            AuthStrategy::Owner | AuthStrategy::Groups | AuthStrategy::Private => {
                AuthProvider::UserPools
            }
            AuthStrategy::Public => AuthProvider::ApiKey,
            AuthStrategy::Custom => AuthProvider::Function,
        }
    }

    /// Providers able to express this strategy
    pub fn supported_providers(&self) -> &'static [AuthProvider] {
        match self {
            AuthStrategy::Owner | AuthStrategy::Groups => {
                &[AuthProvider::UserPools, AuthProvider::Oidc]
            }
            AuthStrategy::Public => &[
                AuthProvider::ApiKey,
                AuthProvider::Iam,
                AuthProvider::IdentityPool,
            ],
            AuthStrategy::Private => &[
                AuthProvider::UserPools,
                AuthProvider::Oidc,
                AuthProvider::Iam,
                AuthProvider::IdentityPool,
            ],
            AuthStrategy::Custom => &[AuthProvider::Function],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStrategy::Owner => "owner",
            AuthStrategy::Groups => "groups",
            AuthStrategy::Public => "public",
            AuthStrategy::Private => "private",
            AuthStrategy::Custom => "custom",
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity mechanism a rule is written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthProvider {
    ApiKey,
    Iam,
    IdentityPool,
    Oidc,
    UserPools,
    Function,
}

impl AuthProvider {
    /// Request-level authentication type that proves a caller for this provider
    pub fn auth_type(&self) -> AuthType {
        match self {
            AuthProvider::ApiKey => AuthType::ApiKey,
            AuthProvider::Iam | AuthProvider::IdentityPool => AuthType::Iam,
            AuthProvider::Oidc => AuthType::Oidc,
            AuthProvider::UserPools => AuthType::UserPools,
            AuthProvider::Function => AuthType::Lambda,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::ApiKey => "apiKey",
            AuthProvider::Iam => "iam",
            AuthProvider::IdentityPool => "identityPool",
            AuthProvider::Oidc => "oidc",
            AuthProvider::UserPools => "userPools",
            AuthProvider::Function => "function",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a request was authenticated
///
/// Several providers can share one authentication type (`iam` and
/// `identityPool` are both proven by signed IAM requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthType {
    #[serde(rename = "API_KEY")]
    ApiKey,
    #[serde(rename = "AWS_IAM")]
    Iam,
    #[serde(rename = "AMAZON_COGNITO_USER_POOLS")]
    UserPools,
    #[serde(rename = "OPENID_CONNECT")]
    Oidc,
    #[serde(rename = "AWS_LAMBDA")]
    Lambda,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthType::ApiKey => "API_KEY",
            AuthType::Iam => "AWS_IAM",
            AuthType::UserPools => "AMAZON_COGNITO_USER_POOLS",
            AuthType::Oidc => "OPENID_CONNECT",
            AuthType::Lambda => "AWS_LAMBDA",
        };
        f.write_str(name)
    }
}

/// One field of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,

    /// List-valued fields compare with "contains" instead of equality
    #[serde(default)]
    pub is_list: bool,
}

impl FieldDef {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_list: false,
        }
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_list: true,
        }
    }
}

/// The shape of a type as far as authorization cares: its name and fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Convenience constructor for types whose fields are all scalars
    pub fn with_scalars(name: impl Into<String>, fields: &[&str]) -> Self {
        Self::new(name, fields.iter().map(|f| FieldDef::scalar(*f)).collect())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn is_list_field(&self, name: &str) -> bool {
        self.field(name).map(|f| f.is_list).unwrap_or(false)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Adds a scalar field unless one with that name already exists
    ///
    /// Owner and groups fields referenced by rules are implicitly part of the
    /// type even when the schema does not declare them.
    pub fn ensure_field(&mut self, name: &str) -> bool {
        if self.has_field(name) {
            return false;
        }
        self.fields.push(FieldDef::scalar(name));
        true
    }
}
