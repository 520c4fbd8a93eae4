//! All compiled authorization data of one type

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use super::source::TypeRules;
use crate::acm::AccessControlMatrix;
use crate::claims::CallerIdentity;
use crate::compiler::{AuthorizationExpression, ExpressionCompiler};
use crate::config::{CompilerConfig, ConfiguredAuthProviders};
use crate::error::{AuthzError, Result};
use crate::redaction::RedactionResolver;
use crate::roles::{DerivedRoles, RoleDeriver, RoleId};
use crate::rules::{NormalizedRule, RuleNormalizer, RuleScope};
use crate::types::{ModelOperation, TypeSchema};

/// Roles, access control matrix and runtime compiler of one type
///
/// Immutable once compiled; share it behind an `Arc`.
#[derive(Debug)]
pub struct CompiledTypeAuth {
    schema: TypeSchema,
    roles: DerivedRoles,
    acm: AccessControlMatrix,
    compiler: ExpressionCompiler,
}

impl CompiledTypeAuth {
    /// Runs every compile-time stage for one type
    ///
    /// Owner and groups fields named by rules become part of the type when
    /// the schema does not declare them. Field rules on any other undeclared
    /// field are an error.
    pub fn compile(
        type_rules: &TypeRules,
        providers: Arc<ConfiguredAuthProviders>,
        config: CompilerConfig,
    ) -> Result<Self> {
        let mut schema = type_rules.schema.clone();
        let normalizer = RuleNormalizer::new(&providers);

        let model_rules =
            normalizer.normalize(&RuleScope::model(schema.name.clone()), &type_rules.rules)?;
        add_implicit_fields(&mut schema, &model_rules);

        let mut field_rules: IndexMap<&str, Vec<NormalizedRule>> = IndexMap::new();
        for (field, rules) in &type_rules.field_rules {
            if !schema.has_field(field) {
                return Err(AuthzError::UnknownField {
                    type_name: schema.name.clone(),
                    field: field.clone(),
                });
            }
            let normalized =
                normalizer.normalize(&RuleScope::field(schema.name.clone(), field.clone()), rules)?;
            add_implicit_fields(&mut schema, &normalized);
            field_rules.insert(field.as_str(), normalized);
        }

        let mut deriver = RoleDeriver::new();
        deriver.add_model_rules(&model_rules);
        for (field, rules) in &field_rules {
            deriver.add_field_rules(field, rules);
        }
        let roles = deriver.finish();
        let acm = roles.build_acm(&schema.name, schema.field_names());

        debug!(
            type_name = %schema.name,
            roles = roles.len(),
            restricted_fields = roles.restricted_fields().count(),
            "Compiled authorization rules"
        );

        let compiler = ExpressionCompiler::new(schema.clone(), &roles, &acm, providers, config);

        Ok(Self {
            schema,
            roles,
            acm,
            compiler,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.schema.name
    }

    /// Schema including implicit owner/groups fields
    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    pub fn roles(&self) -> &DerivedRoles {
        &self.roles
    }

    pub fn acm(&self) -> &AccessControlMatrix {
        &self.acm
    }

    pub fn compiler(&self) -> &ExpressionCompiler {
        &self.compiler
    }

    pub fn redactor(&self) -> RedactionResolver<'_> {
        RedactionResolver::new(&self.acm)
    }

    pub fn authorize(&self, operation: ModelOperation, caller: &CallerIdentity<'_>) -> AuthorizationExpression {
        self.compiler.evaluate(operation, caller)
    }

    pub fn authorize_mutation(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        input: &serde_json::Value,
    ) -> AuthorizationExpression {
        self.compiler.evaluate_mutation(operation, caller, input)
    }

    /// Roles of `caller` that hold for `record`
    ///
    /// Starts from the expression's own grants and adds every other role of
    /// the caller's provider that is satisfied, statically or by the record.
    /// Field-level rules can name roles the object-level decision never
    /// looked at.
    pub fn allowing_roles(
        &self,
        caller: &CallerIdentity<'_>,
        expr: &AuthorizationExpression,
        record: &serde_json::Value,
    ) -> Vec<RoleId> {
        let mut allowing = expr.allowing_roles_for(record);

        for role in self.roles.iter() {
            if caller.auth_type != Some(role.provider.auth_type()) {
                continue;
            }
            let id = role.id();
            if allowing.contains(&id) {
                continue;
            }
            let holds = self.compiler.is_static_role_satisfied(role, caller)
                || self
                    .compiler
                    .role_predicates(role, caller)
                    .iter()
                    .any(|predicate| predicate.matches(record));
            if holds {
                allowing.push(id);
            }
        }

        allowing
    }

    /// Nulls the fields of `record` the caller may not see, returning them
    ///
    /// Admin callers see everything.
    pub fn redact_record(
        &self,
        operation: ModelOperation,
        caller: &CallerIdentity<'_>,
        expr: &AuthorizationExpression,
        record: &mut serde_json::Value,
    ) -> Vec<String> {
        if expr.admin {
            return Vec::new();
        }
        let allowing = self.allowing_roles(caller, expr, record);
        self.redactor().redact(operation, &allowing, record)
    }
}

fn add_implicit_fields(schema: &mut TypeSchema, rules: &[NormalizedRule]) {
    for rule in rules {
        for field in [rule.owner_field.as_deref(), rule.groups_field.as_deref()]
            .into_iter()
            .flatten()
        {
            if schema.ensure_field(field) {
                debug!(type_name = %schema.name, field, "Added implicit authorization field");
            }
        }
    }
}
