//! Partitions roles into per-provider static and dynamic buckets

use serde::Serialize;

use super::types::RoleDefinition;
use crate::types::{AuthProvider, AuthType};

/// One of the seven disjoint role buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    CognitoStatic,
    CognitoDynamic,
    OidcStatic,
    OidcDynamic,
    Iam,
    ApiKey,
    Lambda,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::CognitoStatic,
        Bucket::CognitoDynamic,
        Bucket::OidcStatic,
        Bucket::OidcDynamic,
        Bucket::Iam,
        Bucket::ApiKey,
        Bucket::Lambda,
    ];

    /// Bucket a role lands in, keyed by `(provider, static)`
    pub fn for_role(provider: AuthProvider, is_static: bool) -> Bucket {
        match (provider, is_static) {
            (AuthProvider::UserPools, true) => Bucket::CognitoStatic,
            (AuthProvider::UserPools, false) => Bucket::CognitoDynamic,
            (AuthProvider::Oidc, true) => Bucket::OidcStatic,
            (AuthProvider::Oidc, false) => Bucket::OidcDynamic,
            (AuthProvider::Iam | AuthProvider::IdentityPool, _) => Bucket::Iam,
            (AuthProvider::ApiKey, _) => Bucket::ApiKey,
            (AuthProvider::Function, _) => Bucket::Lambda,
        }
    }

    /// `(static, dynamic)` buckets evaluated for a caller of `auth_type`
    pub fn for_auth_type(auth_type: AuthType) -> (Bucket, Option<Bucket>) {
        match auth_type {
            AuthType::ApiKey => (Bucket::ApiKey, None),
            AuthType::Lambda => (Bucket::Lambda, None),
            AuthType::Iam => (Bucket::Iam, None),
            AuthType::UserPools => (Bucket::CognitoStatic, Some(Bucket::CognitoDynamic)),
            AuthType::Oidc => (Bucket::OidcStatic, Some(Bucket::OidcDynamic)),
        }
    }
}

/// Roles of one operation partitioned by provider and static-ness
///
/// Each bucket keeps the input order of its roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolesByProvider {
    pub cognito_static: Vec<RoleDefinition>,
    pub cognito_dynamic: Vec<RoleDefinition>,
    pub oidc_static: Vec<RoleDefinition>,
    pub oidc_dynamic: Vec<RoleDefinition>,
    pub iam: Vec<RoleDefinition>,
    pub api_key: Vec<RoleDefinition>,
    pub lambda: Vec<RoleDefinition>,
}

impl RolesByProvider {
    pub fn split(roles: &[RoleDefinition]) -> Self {
        let mut split = Self::default();
        for role in roles {
            split
                .bucket_mut(Bucket::for_role(role.provider, role.is_static))
                .push(role.clone());
        }
        split
    }

    pub fn bucket(&self, bucket: Bucket) -> &[RoleDefinition] {
        match bucket {
            Bucket::CognitoStatic => &self.cognito_static,
            Bucket::CognitoDynamic => &self.cognito_dynamic,
            Bucket::OidcStatic => &self.oidc_static,
            Bucket::OidcDynamic => &self.oidc_dynamic,
            Bucket::Iam => &self.iam,
            Bucket::ApiKey => &self.api_key,
            Bucket::Lambda => &self.lambda,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<RoleDefinition> {
        match bucket {
            Bucket::CognitoStatic => &mut self.cognito_static,
            Bucket::CognitoDynamic => &mut self.cognito_dynamic,
            Bucket::OidcStatic => &mut self.oidc_static,
            Bucket::OidcDynamic => &mut self.oidc_dynamic,
            Bucket::Iam => &mut self.iam,
            Bucket::ApiKey => &mut self.api_key,
            Bucket::Lambda => &mut self.lambda,
        }
    }

    pub fn len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Free-function form of [`RolesByProvider::split`]
pub fn split_roles(roles: &[RoleDefinition]) -> RolesByProvider {
    RolesByProvider::split(roles)
}
