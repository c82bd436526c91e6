//! `civgate-auth`: role permissions, module catalogs and organizational scoping.
//!
//! This crate is decoupled from HTTP and from any particular database. Storage
//! is reached only through [`OrgDirectory`]; the transport layer builds a
//! [`RequestContext`] per request and asks an [`Authorizer`].

pub mod authorize;
pub mod checker;
pub mod context;
pub mod directory;
pub mod gate;
pub mod matrix;
pub mod modules;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod scope;

pub use authorize::{AccessPolicy, Authorizer};
pub use checker::PermissionChecker;
pub use context::RequestContext;
pub use directory::{
    CatalogScope, DirectoryError, InMemoryDirectory, ModuleActivation, OrgDirectory,
};
pub use gate::{
    AccessGate, AllowReason, Decision, GateConfig, NamespaceRule, Rejection, ResolvedRoute,
    RouteResolver, UnregisteredNamespaces,
};
pub use matrix::PermissionMatrix;
pub use modules::{ModuleCatalogConfig, ModuleCatalogResolver, ModuleScope, normalize_module_key};
pub use permissions::{PermissionKey, PermissionSet};
pub use principal::{Account, Profile};
pub use roles::{Role, UnknownRole};
pub use scope::{Ownership, OwnershipChain, ScopeFilter, ScopeRegistry, ScopeResolver};
