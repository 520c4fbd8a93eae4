//! # Access Control Matrix
//!
//! Answers "may role R perform operation O on resource X" for one type.
//! Resources are the type's fields plus the type name itself, which stands
//! for object-level access.
//!
//! Field-level rules override object-level rules for their field: the field
//! is first reset for every role, then only the field rule's roles are
//! granted. Repeated grants for the same role are unioned.
//!
//! ## Example
//!
//! ```
//! use authz_rules::acm::AccessControlMatrix;
//! use authz_rules::roles::RoleDefinition;
//! use authz_rules::types::{AuthProvider, AuthStrategy, ModelOperation};
//!
//! let public = RoleDefinition::new(AuthProvider::ApiKey, AuthStrategy::Public, true).id();
//!
//! let mut acm = AccessControlMatrix::new("Post", ["id", "title"]);
//! acm.set_role(&public, None, [ModelOperation::Get]);
//!
//! assert!(acm.is_allowed(&public, "title", ModelOperation::Get));
//! assert!(!acm.is_allowed(&public, "title", ModelOperation::List));
//! ```

use indexmap::{IndexMap, IndexSet};

use crate::roles::RoleId;
use crate::types::ModelOperation;

/// Role sets per `(resource, operation)` cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlMatrix {
    type_name: String,
    resources: IndexSet<String>,
    roles: IndexSet<RoleId>,
    cells: IndexMap<(String, ModelOperation), IndexSet<RoleId>>,
}

impl AccessControlMatrix {
    /// Creates an empty matrix; every cell starts out denied
    pub fn new<I, S>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let type_name = type_name.into();
        let mut resources: IndexSet<String> = fields.into_iter().map(Into::into).collect();
        resources.insert(type_name.clone());

        Self {
            type_name,
            resources,
            roles: IndexSet::new(),
            cells: IndexMap::new(),
        }
    }

    /// Name of the type, which is also its object-level resource
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Every resource, fields first and the type name last
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(String::as_str)
    }

    /// Field resources only
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.resources().filter(move |r| *r != self.type_name)
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        self.resources.contains(resource)
    }

    /// Roles that were ever granted something, in grant order
    pub fn roles(&self) -> impl Iterator<Item = &RoleId> {
        self.roles.iter()
    }

    pub fn has_role(&self, role: &RoleId) -> bool {
        self.roles.contains(role)
    }

    /// Grants `operations` to `role`
    ///
    /// `resource == None` grants on every resource (an object-level rule).
    /// Returns false, granting nothing, when `resource` is not part of the
    /// type.
    pub fn set_role<I>(&mut self, role: &RoleId, resource: Option<&str>, operations: I) -> bool
    where
        I: IntoIterator<Item = ModelOperation>,
    {
        let targets: Vec<String> = match resource {
            Some(resource) if self.has_resource(resource) => vec![resource.to_string()],
            Some(_) => return false,
            None => self.resources.iter().cloned().collect(),
        };

        self.roles.insert(role.clone());
        for operation in operations {
            for target in &targets {
                self.cells
                    .entry((target.clone(), operation))
                    .or_default()
                    .insert(role.clone());
            }
        }
        true
    }

    /// Removes every role's access to `resource`
    pub fn reset_access_for_resource(&mut self, resource: &str) {
        self.cells.retain(|(cell_resource, _), _| cell_resource != resource);
    }

    /// Unknown roles and resources are not allowed
    pub fn is_allowed(&self, role: &RoleId, resource: &str, operation: ModelOperation) -> bool {
        self.cells
            .get(&(resource.to_string(), operation))
            .is_some_and(|roles| roles.contains(role))
    }

    /// Roles allowed to perform `operation` on `resource`, in grant order
    pub fn roles_for(&self, resource: &str, operation: ModelOperation) -> Vec<&RoleId> {
        self.cells
            .get(&(resource.to_string(), operation))
            .map(|roles| roles.iter().collect())
            .unwrap_or_default()
    }

    /// Fields `role` may access for `operation`
    pub fn fields_for_role(&self, role: &RoleId, operation: ModelOperation) -> Vec<&str> {
        self.fields()
            .filter(|field| self.is_allowed(role, field, operation))
            .collect()
    }

    /// Roles allowed `operation` on any resource, or on every resource when
    /// `full_access` is set
    pub fn roles_per_operation(&self, operation: ModelOperation, full_access: bool) -> Vec<&RoleId> {
        self.roles
            .iter()
            .filter(|role| {
                let mut resources = self.resources();
                if full_access {
                    resources.all(|r| self.is_allowed(role, r, operation))
                } else {
                    resources.any(|r| self.is_allowed(role, r, operation))
                }
            })
            .collect()
    }
}
