//! Turns normalized rules into deduplicated roles and their grants

use indexmap::{IndexMap, IndexSet};

use super::types::{RoleDefinition, RoleId};
use crate::acm::AccessControlMatrix;
use crate::rules::NormalizedRule;
use crate::types::{AuthProvider, AuthStrategy, ModelOperation};

/// Identity pool auth type carried by iam public roles
pub const UNAUTHENTICATED_CLAIM: &str = "unauthenticated";
/// Identity pool auth type carried by iam private roles
pub const AUTHENTICATED_CLAIM: &str = "authenticated";

/// Operations granted to one role by one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: RoleId,
    /// `None` for object-level rules
    pub field: Option<String>,
    pub operations: IndexSet<ModelOperation>,
}

/// Roles of one type together with every grant that produced them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedRoles {
    roles: IndexMap<RoleId, RoleDefinition>,
    grants: Vec<RoleGrant>,
    restricted_fields: IndexSet<String>,
}

impl DerivedRoles {
    pub fn get(&self, id: &RoleId) -> Option<&RoleDefinition> {
        self.roles.get(id)
    }

    /// Roles in the order their first rule appeared
    pub fn iter(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn grants(&self) -> &[RoleGrant] {
        &self.grants
    }

    /// Fields carrying their own rules
    pub fn restricted_fields(&self) -> impl Iterator<Item = &str> {
        self.restricted_fields.iter().map(String::as_str)
    }

    /// Builds the access control matrix over `fields` and the type name
    ///
    /// Object-level grants are applied first. Each restricted field is then
    /// reset once and granted to its own rules' roles only.
    pub fn build_acm<I, S>(&self, type_name: &str, fields: I) -> AccessControlMatrix
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut acm = AccessControlMatrix::new(type_name, fields);

        for grant in self.grants.iter().filter(|g| g.field.is_none()) {
            acm.set_role(&grant.role, None, grant.operations.iter().copied());
        }

        for field in &self.restricted_fields {
            acm.reset_access_for_resource(field);
        }

        for grant in &self.grants {
            if let Some(field) = &grant.field {
                acm.set_role(&grant.role, Some(field), grant.operations.iter().copied());
            }
        }

        acm
    }

    /// Roles with object-level access for `operation`, with mutation
    /// metadata filled in from the matrix
    ///
    /// - create: `allowed_fields` from create grants
    /// - update: `allowed_fields` from update grants, `null_allowed_fields`
    ///   from delete grants
    ///
    /// When a role covers every field the matching `are_all_*` flag is set and
    /// the explicit list dropped.
    ///
    /// Deleting a record removes every field, so delete needs the grant on
    /// all fields as well as on the type.
    pub fn roles_for_operation(
        &self,
        acm: &AccessControlMatrix,
        operation: ModelOperation,
    ) -> Vec<RoleDefinition> {
        let field_count = acm.fields().count();
        let full_delete = match operation {
            ModelOperation::Delete => acm.roles_per_operation(operation, true),
            _ => Vec::new(),
        };

        self.roles
            .iter()
            .filter(|(id, _)| acm.is_allowed(id, acm.type_name(), operation))
            .filter(|(id, _)| operation != ModelOperation::Delete || full_delete.contains(id))
            .map(|(id, role)| {
                let mut role = role.clone();
                match operation {
                    ModelOperation::Create => {
                        let allowed = acm.fields_for_role(id, ModelOperation::Create);
                        set_allowed(&mut role, &allowed, field_count);
                    }
                    ModelOperation::Update => {
                        let allowed = acm.fields_for_role(id, ModelOperation::Update);
                        set_allowed(&mut role, &allowed, field_count);

                        let nullable = acm.fields_for_role(id, ModelOperation::Delete);
                        if nullable.len() == field_count {
                            role.are_all_fields_null_allowed = true;
                            role.null_allowed_fields = None;
                        } else {
                            role.are_all_fields_null_allowed = false;
                            role.null_allowed_fields =
                                Some(nullable.into_iter().map(str::to_string).collect());
                        }
                    }
                    _ => {}
                }
                role
            })
            .collect()
    }
}

fn set_allowed(role: &mut RoleDefinition, allowed: &[&str], field_count: usize) {
    if allowed.len() == field_count {
        role.are_all_fields_allowed = true;
        role.allowed_fields = None;
    } else {
        role.are_all_fields_allowed = false;
        role.allowed_fields = Some(allowed.iter().map(|f| f.to_string()).collect());
    }
}

/// Collects roles rule by rule, merging identical roles
#[derive(Debug, Default)]
pub struct RoleDeriver {
    derived: DerivedRoles,
}

impl RoleDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type's object-level rules
    pub fn add_model_rules(&mut self, rules: &[NormalizedRule]) -> &mut Self {
        for rule in rules {
            self.add_rule(None, rule);
        }
        self
    }

    /// Adds the rules attached to `field`
    ///
    /// The field becomes restricted even when `rules` is empty, which denies
    /// it to everyone.
    pub fn add_field_rules(&mut self, field: &str, rules: &[NormalizedRule]) -> &mut Self {
        self.derived.restricted_fields.insert(field.to_string());
        for rule in rules {
            self.add_rule(Some(field), rule);
        }
        self
    }

    pub fn finish(self) -> DerivedRoles {
        self.derived
    }

    fn add_rule(&mut self, field: Option<&str>, rule: &NormalizedRule) {
        for role in roles_for_rule(rule) {
            let id = role.id();
            self.derived.roles.entry(id.clone()).or_insert(role);
            self.derived.grants.push(RoleGrant {
                role: id,
                field: field.map(str::to_string),
                operations: rule.operations.clone(),
            });
        }
    }
}

/// Roles one rule stands for: one per fixed group, otherwise exactly one
pub fn roles_for_rule(rule: &NormalizedRule) -> Vec<RoleDefinition> {
    let base = |is_static: bool| RoleDefinition::new(rule.provider, rule.strategy, is_static);

    match rule.strategy {
        AuthStrategy::Owner => {
            let mut role = base(false);
            role.claim = rule.identity_claim.clone();
            role.entity = rule.owner_field.clone();
            vec![role]
        }
        AuthStrategy::Groups if rule.is_static_groups() => rule
            .groups
            .iter()
            .map(|group| {
                let mut role = base(true).with_entity(group.clone());
                role.claim = rule.group_claim.clone();
                role
            })
            .collect(),
        AuthStrategy::Groups => {
            let mut role = base(false);
            role.claim = rule.group_claim.clone();
            role.entity = rule.groups_field.clone();
            vec![role]
        }
        AuthStrategy::Public | AuthStrategy::Private => {
            let mut role = base(true);
            if matches!(rule.provider, AuthProvider::Iam | AuthProvider::IdentityPool) {
                role.claim = Some(
                    if rule.strategy == AuthStrategy::Public {
                        UNAUTHENTICATED_CLAIM
                    } else {
                        AUTHENTICATED_CLAIM
                    }
                    .to_string(),
                );
            }
            vec![role]
        }
        AuthStrategy::Custom => vec![base(false)],
    }
}
