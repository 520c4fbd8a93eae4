//! Rule validation and expansion

use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;

use super::types::{
    AuthRule, NormalizedRule, RuleScope, DEFAULT_GROUP_CLAIM, DEFAULT_IDENTITY_CLAIM,
    DEFAULT_OWNER_FIELD,
};
use crate::config::ConfiguredAuthProviders;
use crate::error::{AuthzError, Result};
use crate::types::{AuthStrategy, ModelOperation};

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("field name pattern"));

// Claims may be namespaced (`cognito:groups`, `custom:tenant`, URLs in OIDC)
// and composite (`sub::username`).
static CLAIM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_:./\-]+$").expect("claim name pattern"));

/// Checks that hold for a rule regardless of where it is attached
///
/// ```
/// use authz_rules::rules::{common_rule_validation, AuthRule};
///
/// let rule = AuthRule::groups(["Admin"]).with_identity_claim("sub");
/// assert!(common_rule_validation(&rule, "Doc").is_err());
/// ```
pub fn common_rule_validation(rule: &AuthRule, resource: &str) -> Result<()> {
    let resource = resource.to_string();

    if rule.strategy != AuthStrategy::Owner && rule.identity_claim.is_some() {
        return Err(AuthzError::IdentityClaimOnNonOwner { resource });
    }
    if rule.strategy != AuthStrategy::Groups && rule.group_claim.is_some() {
        return Err(AuthzError::GroupClaimOnNonGroups { resource });
    }
    if rule.groups.is_some() && rule.groups_field.is_some() {
        return Err(AuthzError::GroupsAndGroupsField { resource });
    }
    if rule.strategy == AuthStrategy::Owner && rule.groups_field.is_some() {
        return Err(AuthzError::GroupsFieldOnOwner { resource });
    }
    if rule.strategy == AuthStrategy::Groups && rule.groups.is_none() && rule.groups_field.is_none() {
        return Err(AuthzError::MissingGroups { resource });
    }

    Ok(())
}

/// Validates and expands raw rules against the API's provider configuration
#[derive(Debug, Clone, Copy)]
pub struct RuleNormalizer<'a> {
    providers: &'a ConfiguredAuthProviders,
}

impl<'a> RuleNormalizer<'a> {
    pub fn new(providers: &'a ConfiguredAuthProviders) -> Self {
        Self { providers }
    }

    /// Normalizes every rule of one type or field, failing on the first
    /// invalid rule
    ///
    /// ```
    /// use authz_rules::config::ConfiguredAuthProviders;
    /// use authz_rules::rules::{AuthRule, RuleNormalizer, RuleScope};
    /// use authz_rules::types::{AuthProvider, AuthType, ModelOperation};
    ///
    /// let providers = ConfiguredAuthProviders::new(AuthType::UserPools);
    /// let normalizer = RuleNormalizer::new(&providers);
    ///
    /// let rules = normalizer
    ///     .normalize(&RuleScope::model("Doc"), &[AuthRule::owner().with_operations([ModelOperation::Read])])
    ///     .unwrap();
    ///
    /// assert_eq!(rules[0].provider, AuthProvider::UserPools);
    /// assert_eq!(rules[0].operations.len(), 5);
    /// assert_eq!(rules[0].owner_field.as_deref(), Some("owner"));
    /// ```
    pub fn normalize(&self, scope: &RuleScope, rules: &[AuthRule]) -> Result<Vec<NormalizedRule>> {
        rules
            .iter()
            .map(|rule| self.normalize_rule(scope, rule))
            .collect()
    }

    /// Normalizes a single rule
    pub fn normalize_rule(&self, scope: &RuleScope, rule: &AuthRule) -> Result<NormalizedRule> {
        let resource = scope.to_string();

        common_rule_validation(rule, &resource)?;

        let provider = rule
            .provider
            .unwrap_or_else(|| rule.strategy.default_provider());

        if !rule.strategy.supported_providers().contains(&provider) {
            return Err(AuthzError::UnsupportedProvider {
                resource,
                strategy: rule.strategy,
                provider,
            });
        }

        if !self.providers.supports(provider) {
            return Err(AuthzError::ProviderNotConfigured { resource, provider });
        }

        let operations = expand_operations(scope, rule.operations.as_deref().unwrap_or_default())?;

        let mut normalized = NormalizedRule {
            strategy: rule.strategy,
            provider,
            operations,
            owner_field: None,
            identity_claim: None,
            groups: Vec::new(),
            groups_field: None,
            group_claim: None,
        };

        match rule.strategy {
            AuthStrategy::Owner => {
                let owner_field = rule.owner_field.as_deref().unwrap_or(DEFAULT_OWNER_FIELD);
                let identity_claim = rule
                    .identity_claim
                    .as_deref()
                    .unwrap_or(DEFAULT_IDENTITY_CLAIM);
                check_identifier(&FIELD_NAME, &resource, "owner field", owner_field)?;
                check_identifier(&CLAIM_NAME, &resource, "identity claim", identity_claim)?;
                normalized.owner_field = Some(owner_field.to_string());
                normalized.identity_claim = Some(identity_claim.to_string());
            }
            AuthStrategy::Groups => {
                let group_claim = rule.group_claim.as_deref().unwrap_or(DEFAULT_GROUP_CLAIM);
                check_identifier(&CLAIM_NAME, &resource, "group claim", group_claim)?;
                normalized.group_claim = Some(group_claim.to_string());

                match (&rule.groups, &rule.groups_field) {
                    (Some(groups), None) => {
                        let groups = groups.clone().into_vec();
                        if groups.is_empty() {
                            return Err(AuthzError::MissingGroups { resource });
                        }
                        for group in &groups {
                            if group.trim().is_empty() {
                                return Err(AuthzError::InvalidIdentifier {
                                    resource,
                                    kind: "group",
                                    name: group.clone(),
                                });
                            }
                        }
                        normalized.groups = dedup(groups);
                    }
                    (None, Some(field)) => {
                        check_identifier(&FIELD_NAME, &resource, "groups field", field)?;
                        normalized.groups_field = Some(field.clone());
                    }
                    (Some(_), Some(_)) => {
                        return Err(AuthzError::GroupsAndGroupsField { resource });
                    }
                    (None, None) => return Err(AuthzError::MissingGroups { resource }),
                }
            }
            AuthStrategy::Public | AuthStrategy::Private | AuthStrategy::Custom => {}
        }

        Ok(normalized)
    }
}

fn expand_operations(
    scope: &RuleScope,
    requested: &[ModelOperation],
) -> Result<IndexSet<ModelOperation>> {
    if let RuleScope::Field { field, .. } = scope {
        if let Some(op) = requested
            .iter()
            .find(|op| !ModelOperation::FIELD_LEVEL.contains(op))
        {
            return Err(AuthzError::InvalidFieldOperation {
                field: field.clone(),
                operation: *op,
            });
        }
    }

    if requested.contains(&ModelOperation::Read) {
        if let Some(op) = requested
            .iter()
            .find(|op| ModelOperation::READ_EXPANSION.contains(op))
        {
            return Err(AuthzError::AmbiguousReadOperation {
                resource: scope.to_string(),
                operation: *op,
            });
        }
    }

    if requested.is_empty() {
        return Ok(ModelOperation::ALL.into_iter().collect());
    }

    let mut operations = IndexSet::new();
    for op in requested {
        if *op == ModelOperation::Read {
            operations.extend(ModelOperation::READ_EXPANSION);
        } else {
            operations.insert(*op);
        }
    }
    Ok(operations)
}

fn check_identifier(pattern: &Regex, resource: &str, kind: &'static str, name: &str) -> Result<()> {
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(AuthzError::InvalidIdentifier {
            resource: resource.to_string(),
            kind,
            name: name.to_string(),
        })
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    values.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}
