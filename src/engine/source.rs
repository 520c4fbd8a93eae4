//! Where per-type rules come from

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::rules::AuthRule;
use crate::types::TypeSchema;

/// A type, its object-level rules and its field-level rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRules {
    #[serde(flatten)]
    pub schema: TypeSchema,

    #[serde(default)]
    pub rules: Vec<AuthRule>,

    /// Field name to the rules attached to that field
    #[serde(default)]
    pub field_rules: IndexMap<String, Vec<AuthRule>>,
}

impl TypeRules {
    pub fn new(schema: TypeSchema) -> Self {
        Self {
            schema,
            rules: Vec::new(),
            field_rules: IndexMap::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<AuthRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_field_rules(mut self, field: impl Into<String>, rules: Vec<AuthRule>) -> Self {
        self.field_rules.insert(field.into(), rules);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.schema.name
    }
}

/// Supplies the types and rules to compile
pub trait SchemaRuleSource {
    fn type_rules(&self) -> Vec<TypeRules>;
}

/// JSON rule document
///
/// ```
/// use authz_rules::engine::{RuleDocument, SchemaRuleSource};
///
/// let doc = RuleDocument::from_json(r#"{
///     "types": [{
///         "name": "Todo",
///         "fields": [{ "name": "id" }, { "name": "owner" }],
///         "rules": [{ "allow": "owner" }]
///     }]
/// }"#).unwrap();
///
/// assert_eq!(doc.type_rules()[0].type_name(), "Todo");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub types: Vec<TypeRules>,
}

impl RuleDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthzError::InvalidRuleDocument {
            message: e.to_string(),
        })
    }
}

impl SchemaRuleSource for RuleDocument {
    fn type_rules(&self) -> Vec<TypeRules> {
        self.types.clone()
    }
}

impl SchemaRuleSource for Vec<TypeRules> {
    fn type_rules(&self) -> Vec<TypeRules> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthStrategy, FieldDef};

    #[test]
    fn test_document_with_field_rules() {
        let doc = RuleDocument::from_json(
            r#"{
                "types": [{
                    "name": "Doc",
                    "fields": [{ "name": "id" }, { "name": "tags", "isList": true }],
                    "rules": [{ "allow": "public" }],
                    "fieldRules": { "tags": [{ "allow": "owner", "operations": ["read"] }] }
                }]
            }"#,
        )
        .unwrap();

        let types = doc.type_rules();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].schema.fields[1], FieldDef::list("tags"));
        assert_eq!(types[0].field_rules["tags"][0].strategy, AuthStrategy::Owner);
    }

    #[test]
    fn test_invalid_document() {
        let err = RuleDocument::from_json(r#"{ "types": [{ "name": 1 }] }"#).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRuleDocument { .. }));
    }
}
