//! # Redaction Resolver
//!
//! Decides, per field, whether a value returned to the caller must be
//! replaced by null. A field stays visible when one of the roles that let
//! the caller see the record is, or is compatible with, a role the field
//! grants the operation to.
//!
//! Redaction never fails a read. Writes to restricted fields are rejected by
//! the compiler instead.

use crate::acm::AccessControlMatrix;
use crate::roles::RoleId;
use crate::types::{AuthProvider, AuthStrategy, ModelOperation};

/// Whether `allowing` stands in for `field_role` on a field
///
/// A `private` field role on a token provider (user pools, OIDC, identity
/// pool) is satisfied by any allowing role of the same provider.
pub fn is_compatible_role(field_role: &RoleId, allowing: &RoleId) -> bool {
    field_role.strategy == AuthStrategy::Private
        && matches!(
            field_role.provider,
            AuthProvider::UserPools | AuthProvider::Oidc | AuthProvider::IdentityPool
        )
        && field_role.provider == allowing.provider
}

/// Field visibility over one type's access control matrix
#[derive(Debug, Clone, Copy)]
pub struct RedactionResolver<'a> {
    acm: &'a AccessControlMatrix,
}

impl<'a> RedactionResolver<'a> {
    pub fn new(acm: &'a AccessControlMatrix) -> Self {
        Self { acm }
    }

    pub fn is_field_visible(&self, field: &str, operation: ModelOperation, allowing: &[RoleId]) -> bool {
        let field_roles = self.acm.roles_for(field, operation);
        allowing.iter().any(|allowing| {
            field_roles
                .iter()
                .any(|field_role| *field_role == allowing || is_compatible_role(field_role, allowing))
        })
    }

    /// Fields of the type that must be nulled for these allowing roles
    pub fn fields_to_redact(&self, operation: ModelOperation, allowing: &[RoleId]) -> Vec<String> {
        self.acm
            .fields()
            .filter(|field| !self.is_field_visible(field, operation, allowing))
            .map(str::to_string)
            .collect()
    }

    /// Nulls every restricted field present in `record`, returning their names
    ///
    /// Non-object records are left untouched.
    pub fn redact(
        &self,
        operation: ModelOperation,
        allowing: &[RoleId],
        record: &mut serde_json::Value,
    ) -> Vec<String> {
        let serde_json::Value::Object(map) = record else {
            return Vec::new();
        };

        let mut redacted = Vec::new();
        for field in self.fields_to_redact(operation, allowing) {
            if let Some(value) = map.get_mut(&field) {
                if !value.is_null() {
                    *value = serde_json::Value::Null;
                }
                redacted.push(field);
            }
        }
        redacted
    }
}
