//! Provider configuration and compiler limits
//!
//! Both are plain immutable values handed to every compilation and
//! evaluation call; nothing here is process-wide state.

use serde::{Deserialize, Serialize};

use crate::types::{AuthProvider, AuthType};

/// Largest number of clauses the downstream query engine accepts in one filter
pub const DEFAULT_MAX_FILTER_CLAUSES: usize = 10;

/// Authentication types active for the API
///
/// # Examples
///
/// ```
/// use authz_rules::config::ConfiguredAuthProviders;
/// use authz_rules::types::AuthType;
///
/// let providers = ConfiguredAuthProviders::new(AuthType::UserPools)
///     .with_additional(AuthType::ApiKey);
///
/// assert!(providers.has_user_pools());
/// assert!(providers.has_api_key());
/// assert!(!providers.has_iam());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredAuthProviders {
    /// Default authentication type
    pub default: AuthType,

    /// Additional authentication types
    #[serde(default)]
    pub additional: Vec<AuthType>,

    /// IAM roles that bypass every rule
    #[serde(default)]
    pub admin_roles: Vec<String>,

    /// Identity pool whose principals the iam public/private rules refer to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_pool_id: Option<String>,
}

impl ConfiguredAuthProviders {
    pub fn new(default: AuthType) -> Self {
        Self {
            default,
            additional: Vec::new(),
            admin_roles: Vec::new(),
            identity_pool_id: None,
        }
    }

    pub fn with_additional(mut self, auth_type: AuthType) -> Self {
        if auth_type != self.default && !self.additional.contains(&auth_type) {
            self.additional.push(auth_type);
        }
        self
    }

    pub fn with_admin_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_identity_pool_id(mut self, id: impl Into<String>) -> Self {
        self.identity_pool_id = Some(id.into());
        self
    }

    pub fn is_configured(&self, auth_type: AuthType) -> bool {
        self.default == auth_type || self.additional.contains(&auth_type)
    }

    /// True when rules written against `provider` can ever be satisfied
    pub fn supports(&self, provider: AuthProvider) -> bool {
        self.is_configured(provider.auth_type())
    }

    pub fn has_api_key(&self) -> bool {
        self.is_configured(AuthType::ApiKey)
    }

    pub fn has_iam(&self) -> bool {
        self.is_configured(AuthType::Iam)
    }

    pub fn has_user_pools(&self) -> bool {
        self.is_configured(AuthType::UserPools)
    }

    pub fn has_oidc(&self) -> bool {
        self.is_configured(AuthType::Oidc)
    }

    pub fn has_lambda(&self) -> bool {
        self.is_configured(AuthType::Lambda)
    }

    pub fn has_admin_roles(&self) -> bool {
        self.has_iam() && !self.admin_roles.is_empty()
    }
}

/// One authentication mode entry of an API's auth configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthModeConfig {
    pub authentication_type: AuthType,
}

/// API authentication configuration as stored alongside a schema
///
/// ```
/// use authz_rules::config::{AuthConfig, ConfiguredAuthProviders};
///
/// let config: AuthConfig = serde_json::from_str(r#"{
///     "defaultAuthentication": { "authenticationType": "AMAZON_COGNITO_USER_POOLS" },
///     "additionalAuthenticationProviders": [ { "authenticationType": "API_KEY" } ]
/// }"#).unwrap();
///
/// let providers = ConfiguredAuthProviders::from(config);
/// assert!(providers.has_api_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub default_authentication: AuthModeConfig,

    #[serde(default)]
    pub additional_authentication_providers: Vec<AuthModeConfig>,

    #[serde(default)]
    pub admin_roles: Vec<String>,

    #[serde(default)]
    pub identity_pool_id: Option<String>,
}

impl From<AuthConfig> for ConfiguredAuthProviders {
    fn from(config: AuthConfig) -> Self {
        let mut providers =
            ConfiguredAuthProviders::new(config.default_authentication.authentication_type);
        for mode in config.additional_authentication_providers {
            providers = providers.with_additional(mode.authentication_type);
        }
        providers.admin_roles = config.admin_roles;
        providers.identity_pool_id = config.identity_pool_id;
        providers
    }
}

/// Limits applied by the runtime expression compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Maximum owner + group predicates in one generated filter
    pub max_filter_clauses: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_filter_clauses: DEFAULT_MAX_FILTER_CLAUSES,
        }
    }
}
