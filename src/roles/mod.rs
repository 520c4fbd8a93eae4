//! # Roles
//!
//! A role is the canonical unit of authorization derived from one rule
//! (or one fixed group of a groups rule). Rules that describe the same
//! provider, strategy, static flag, claim and entity collapse into one role
//! whose grants are unioned.
//!
//! - [`RoleDeriver`] builds the roles of a type and its access control matrix
//! - [`RolesByProvider`] partitions the roles of one operation into the
//!   buckets the runtime compiler evaluates

mod deriver;
mod split;
mod types;

pub use deriver::{
    roles_for_rule, DerivedRoles, RoleDeriver, RoleGrant, AUTHENTICATED_CLAIM,
    UNAUTHENTICATED_CLAIM,
};
pub use split::{split_roles, Bucket, RolesByProvider};
pub use types::{is_identical_auth_role, RoleDefinition, RoleId};
