//! Static/dynamic evaluation of a type's roles for one caller

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use wildmatch::WildMatch;

use super::expression::{AuthorizationExpression, Decision, DenyReason, DynamicGrant};
use crate::acm::AccessControlMatrix;
use crate::claims::{CallerIdentity, ClaimValue};
use crate::config::{CompilerConfig, ConfiguredAuthProviders};
use crate::filter::FilterExpr;
use crate::roles::{Bucket, DerivedRoles, RoleDefinition, RoleId, RolesByProvider};
use crate::rules::DEFAULT_IDENTITY_CLAIM;
use crate::types::{AuthProvider, AuthStrategy, AuthType, ModelOperation, TypeSchema};

/// Order in which provider checks are laid out
pub const PROVIDER_PRECEDENCE: [AuthType; 5] = [
    AuthType::ApiKey,
    AuthType::Lambda,
    AuthType::Iam,
    AuthType::UserPools,
    AuthType::Oidc,
];

/// Claim user pools tokens carry the username under
const COGNITO_USERNAME_CLAIM: &str = "cognito:username";

/// One provider check of an operation's evaluation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub auth_type: AuthType,
    pub static_roles: Vec<RoleId>,
    pub dynamic_roles: Vec<RoleId>,
}

/// Dynamic role with the predicate it produced for the current caller
struct Candidate<'r> {
    role: &'r RoleDefinition,
    predicate: FilterExpr,
}

/// Compiles a caller and an operation into an [`AuthorizationExpression`]
///
/// Built once per type; evaluation only reads it.
#[derive(Debug)]
pub struct ExpressionCompiler {
    schema: TypeSchema,
    providers: Arc<ConfiguredAuthProviders>,
    config: CompilerConfig,
    operations: IndexMap<ModelOperation, RolesByProvider>,
    admin_patterns: Vec<WildMatch>,
}

impl ExpressionCompiler {
    pub fn new(
        schema: TypeSchema,
        roles: &DerivedRoles,
        acm: &AccessControlMatrix,
        providers: Arc<ConfiguredAuthProviders>,
        config: CompilerConfig,
    ) -> Self {
        let operations = ModelOperation::ALL
            .iter()
            .map(|op| (*op, RolesByProvider::split(&roles.roles_for_operation(acm, *op))))
            .collect();

        let admin_patterns = if providers.has_admin_roles() {
            providers
                .admin_roles
                .iter()
                .map(|role| WildMatch::new(&format!("*:assumed-role/{}/*", role)))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            schema,
            providers,
            config,
            operations,
            admin_patterns,
        }
    }

    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Roles of `operation` split into provider buckets
    pub fn roles(&self, operation: ModelOperation) -> Option<&RolesByProvider> {
        self.operations.get(&operation)
    }

    /// Provider checks for `operation` in precedence order, limited to the
    /// configured authentication types
    pub fn plan(&self, operation: ModelOperation) -> Vec<PlanStep> {
        let Some(roles) = self.roles(operation) else {
            return Vec::new();
        };

        PROVIDER_PRECEDENCE
            .iter()
            .filter(|auth_type| self.providers.is_configured(**auth_type))
            .map(|auth_type| {
                let (static_bucket, dynamic_bucket) = Bucket::for_auth_type(*auth_type);
                PlanStep {
                    auth_type: *auth_type,
                    static_roles: roles.bucket(static_bucket).iter().map(RoleDefinition::id).collect(),
                    dynamic_roles: dynamic_bucket
                        .map(|b| roles.bucket(b).iter().map(RoleDefinition::id).collect())
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Evaluates a read, or a mutation whose input is not checked here
    pub fn evaluate(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
    ) -> AuthorizationExpression {
        self.evaluate_with_input(operation, caller, None)
    }

    /// Evaluates a create or update together with its input object
    ///
    /// Create predicates are checked against the input itself, so the result
    /// is always decided. Update results stay deferred when dynamic roles
    /// apply; the filter then only admits roles allowed to write every input
    /// field.
    pub fn evaluate_mutation(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        input: &serde_json::Value,
    ) -> AuthorizationExpression {
        self.evaluate_with_input(operation, caller, Some(input))
    }

    fn evaluate_with_input(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        input: Option<&serde_json::Value>,
    ) -> AuthorizationExpression {
        let expr = self.decide(operation, caller, input);
        if let Decision::Deny(reason) = &expr.decision {
            debug!(
                type_name = %self.schema.name,
                operation = %operation,
                reason = %reason,
                "Authorization denied"
            );
        }
        expr
    }

    fn decide(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        input: Option<&serde_json::Value>,
    ) -> AuthorizationExpression {
        let Some(auth_type) = caller.auth_type else {
            return AuthorizationExpression::deny(operation, DenyReason::Unauthenticated);
        };

        if !self.providers.is_configured(auth_type) {
            return AuthorizationExpression::deny(
                operation,
                DenyReason::ProviderNotConfigured { auth_type },
            );
        }

        if self.is_admin(caller) {
            debug!(type_name = %self.schema.name, operation = %operation, "IAM admin role bypass");
            let mut expr = AuthorizationExpression::new(operation, Decision::Allow);
            expr.admin = true;
            return expr;
        }

        let Some(roles) = self.roles(operation) else {
            return AuthorizationExpression::deny(operation, DenyReason::NoMatchingRoles);
        };

        let (static_bucket, dynamic_bucket) = Bucket::for_auth_type(auth_type);
        let static_roles = roles.bucket(static_bucket);
        let dynamic_roles = dynamic_bucket.map(|b| roles.bucket(b)).unwrap_or_default();

        if static_roles.is_empty() && dynamic_roles.is_empty() {
            return AuthorizationExpression::deny(operation, DenyReason::NoMatchingRoles);
        }

        let checks_input = input.filter(|_| {
            matches!(operation, ModelOperation::Create | ModelOperation::Update)
        });

        // Static phase
        let satisfied: Vec<&RoleDefinition> = static_roles
            .iter()
            .filter(|role| self.is_static_role_satisfied(role, caller))
            .collect();

        let granted: Vec<RoleId> = satisfied
            .iter()
            .filter(|role| checks_input.map_or(true, |input| permits_input(role, operation, input)))
            .map(|role| role.id())
            .collect();

        if !granted.is_empty() {
            let mut expr = AuthorizationExpression::new(operation, Decision::Allow);
            expr.granted_roles = granted;
            return expr;
        }

        // Dynamic phase
        let mut candidates = self.dynamic_candidates(dynamic_roles, caller);

        if let Some(input) = checks_input {
            let all_roles: Vec<&RoleDefinition> = satisfied
                .iter()
                .copied()
                .chain(candidates.iter().map(|c| c.role))
                .collect();

            candidates.retain(|c| permits_input(c.role, operation, input));

            if candidates.is_empty() && !all_roles.is_empty() {
                let fields = unauthorized_fields(&all_roles, operation, input);
                return AuthorizationExpression::deny(
                    operation,
                    DenyReason::UnauthorizedFields { fields },
                );
            }
        }

        if candidates.is_empty() {
            let reason = if dynamic_roles.is_empty() {
                DenyReason::NoMatchingRoles
            } else {
                DenyReason::NoQualifyingClaims
            };
            return AuthorizationExpression::deny(operation, reason);
        }

        match (operation, checks_input) {
            (ModelOperation::Create, Some(input)) => {
                self.decide_create(operation, caller, candidates, dynamic_roles, input)
            }
            _ => deferred(operation, candidates),
        }
    }

    /// Create predicates are evaluated against the input, after filling a
    /// missing owner field when exactly one owner role applies
    fn decide_create(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        candidates: Vec<Candidate<'_>>,
        dynamic_roles: &[RoleDefinition],
        input: &serde_json::Value,
    ) -> AuthorizationExpression {
        let mut input_defaults = IndexMap::new();

        let owner_roles: Vec<&RoleDefinition> = dynamic_roles
            .iter()
            .filter(|role| role.strategy == AuthStrategy::Owner)
            .collect();

        if let [owner] = owner_roles.as_slice() {
            if let (Some(entity), Some(value)) = (owner.entity.as_deref(), owner_claim(owner, caller)) {
                let missing = input.get(entity).map_or(true, serde_json::Value::is_null);
                if missing {
                    let value = if self.schema.is_list_field(entity) {
                        serde_json::json!([value])
                    } else {
                        serde_json::Value::String(value)
                    };
                    input_defaults.insert(entity.to_string(), value);
                }
            }
        }

        let mut effective = input.clone();
        if let serde_json::Value::Object(map) = &mut effective {
            for (field, value) in &input_defaults {
                map.insert(field.clone(), value.clone());
            }
        }

        let granted: Vec<RoleId> = candidates
            .iter()
            .filter(|c| c.predicate.matches(&effective))
            .map(|c| c.role.id())
            .fold(Vec::new(), |mut acc, id| {
                if !acc.contains(&id) {
                    acc.push(id);
                }
                acc
            });

        if granted.is_empty() {
            return AuthorizationExpression::deny(operation, DenyReason::ConditionNotMet);
        }

        let mut expr = AuthorizationExpression::new(operation, Decision::Allow);
        expr.granted_roles = granted;
        expr.input_defaults = input_defaults;
        expr
    }

    fn dynamic_candidates<'r>(
        &self,
        roles: &'r [RoleDefinition],
        caller: &CallerIdentity<'_>,
    ) -> Vec<Candidate<'r>> {
        let mut owners = Vec::new();
        let mut groups = Vec::new();

        for role in roles {
            let target = match role.strategy {
                AuthStrategy::Owner => &mut owners,
                AuthStrategy::Groups => &mut groups,
                _ => continue,
            };
            for predicate in self.role_predicates(role, caller) {
                target.push(Candidate { role, predicate });
            }
        }

        if owners.len() + groups.len() > self.config.max_filter_clauses {
            warn!(
                type_name = %self.schema.name,
                owner_predicates = owners.len(),
                group_predicates = groups.len(),
                max_filter_clauses = self.config.max_filter_clauses,
                "Filter too large, dropping group predicates"
            );
            groups.clear();
        }

        owners.extend(groups);
        owners
    }

    /// Predicates a dynamic role contributes for `caller`; empty when the
    /// caller lacks the role's claim
    ///
    /// Owner roles compare the record field with the caller's identity
    /// claim. Group roles test the record field against the caller's
    /// groups, one predicate per group when the field is a list.
    pub fn role_predicates(&self, role: &RoleDefinition, caller: &CallerIdentity<'_>) -> Vec<FilterExpr> {
        let Some(entity) = role.entity.as_deref() else {
            return Vec::new();
        };

        match role.strategy {
            AuthStrategy::Owner => owner_claim(role, caller)
                .map(|value| vec![FilterExpr::eq(entity, value)])
                .unwrap_or_default(),
            AuthStrategy::Groups if !role.is_static => {
                let groups = role
                    .claim
                    .as_deref()
                    .and_then(|claim| caller.resolve_claim(claim))
                    .map(|value| value.to_list())
                    .unwrap_or_default();

                if groups.is_empty() {
                    Vec::new()
                } else if self.schema.is_list_field(entity) {
                    groups.into_iter().map(|g| FilterExpr::eq(entity, g)).collect()
                } else {
                    vec![FilterExpr::in_list(entity, groups)]
                }
            }
            _ => Vec::new(),
        }
    }

    /// Whether a static role grants access to `caller` without looking at
    /// any record
    pub fn is_static_role_satisfied(&self, role: &RoleDefinition, caller: &CallerIdentity<'_>) -> bool {
        if caller.auth_type != Some(role.provider.auth_type()) {
            return false;
        }

        match (role.provider, role.strategy) {
            (AuthProvider::ApiKey, AuthStrategy::Public) => true,
            (AuthProvider::Function, AuthStrategy::Custom) => true,
            (AuthProvider::Iam | AuthProvider::IdentityPool, AuthStrategy::Public | AuthStrategy::Private) => {
                let Some(principal) = caller.iam else {
                    return false;
                };
                let auth_type_matches = role.claim.is_some()
                    && principal.cognito_identity_auth_type == role.claim;
                let pool_matches = self.providers.identity_pool_id.as_ref().map_or(true, |pool| {
                    principal.cognito_identity_pool_id.as_ref() == Some(pool)
                });
                auth_type_matches && pool_matches
            }
            (AuthProvider::UserPools | AuthProvider::Oidc, AuthStrategy::Private) => true,
            (AuthProvider::UserPools | AuthProvider::Oidc, AuthStrategy::Groups) if role.is_static => {
                match (role.claim.as_deref(), role.entity.as_deref()) {
                    (Some(claim), Some(group)) => caller
                        .resolve_claim(claim)
                        .is_some_and(|groups| groups.contains(group)),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn is_admin(&self, caller: &CallerIdentity<'_>) -> bool {
        if caller.auth_type != Some(AuthType::Iam) || self.admin_patterns.is_empty() {
            return false;
        }
        caller
            .iam
            .and_then(|principal| principal.user_arn.as_deref())
            .is_some_and(|arn| self.admin_patterns.iter().any(|p| p.matches(arn)))
    }
}

/// Identity claim of an owner role as a single value
///
/// The default `username` claim falls back to `cognito:username`, which is
/// where user pools access tokens put it.
fn owner_claim(role: &RoleDefinition, caller: &CallerIdentity<'_>) -> Option<String> {
    let claim = role.claim.as_deref()?;
    let value = caller.resolve_claim(claim).or_else(|| {
        (claim == DEFAULT_IDENTITY_CLAIM)
            .then(|| caller.resolve_claim(COGNITO_USERNAME_CLAIM))
            .flatten()
    })?;

    match value {
        ClaimValue::Single(value) => Some(value),
        ClaimValue::List(_) => None,
    }
}

fn deferred(operation: ModelOperation, candidates: Vec<Candidate<'_>>) -> AuthorizationExpression {
    let (owners, groups): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.role.strategy == AuthStrategy::Owner);

    let owner_filter = FilterExpr::any_of(owners.iter().map(|c| c.predicate.clone()).collect());
    let group_filter = FilterExpr::any_of(groups.iter().map(|c| c.predicate.clone()).collect());

    let mut expr = AuthorizationExpression::new(operation, Decision::Deferred);
    expr.filter = FilterExpr::any_of(owner_filter.into_iter().chain(group_filter).collect());
    expr.dynamic_grants = owners
        .into_iter()
        .chain(groups)
        .map(|c| DynamicGrant {
            role: c.role.id(),
            predicate: c.predicate,
        })
        .collect();
    expr
}

/// Whether `role` may write every field of `input`
///
/// On update a null value clears the field and needs the delete grant.
fn permits_input(role: &RoleDefinition, operation: ModelOperation, input: &serde_json::Value) -> bool {
    input_fields(input).all(|(field, value)| permits_value(role, operation, field, value))
}

fn permits_value(
    role: &RoleDefinition,
    operation: ModelOperation,
    field: &str,
    value: &serde_json::Value,
) -> bool {
    if operation == ModelOperation::Update && value.is_null() {
        role.permits_null(field)
    } else {
        role.permits_field(field)
    }
}

/// Input fields no role may write; when every field is writable by some
/// role but no single role covers them all, the first role's gaps
fn unauthorized_fields(
    roles: &[&RoleDefinition],
    operation: ModelOperation,
    input: &serde_json::Value,
) -> Vec<String> {
    let denied: Vec<String> = input_fields(input)
        .filter(|(field, value)| !roles.iter().any(|r| permits_value(r, operation, field, value)))
        .map(|(field, _)| field.to_string())
        .collect();

    if !denied.is_empty() {
        return denied;
    }

    roles
        .first()
        .map(|role| {
            input_fields(input)
                .filter(|(field, value)| !permits_value(role, operation, field, value))
                .map(|(field, _)| field.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn input_fields(input: &serde_json::Value) -> impl Iterator<Item = (&str, &serde_json::Value)> {
    input
        .as_object()
        .into_iter()
        .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v)))
}
