//! Read-only storage port for profiles, hierarchy nodes and module catalogs.
//!
//! The resolvers never write. Every lookup may fail with a [`DirectoryError`],
//! which resolvers propagate unchanged: an outage is neither an allow nor a deny.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use civgate_core::{AccountId, DepartmentId, MunicipalityId, NodeRef, OrgNode};

use crate::Profile;

pub mod memory;

pub use memory::InMemoryDirectory;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The backing store could not be reached or the query failed.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that cannot be interpreted.
    #[error("directory returned corrupt data: {0}")]
    Corrupt(String),
}

/// The organizational node a module catalog is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum CatalogScope {
    Department(DepartmentId),
    Municipality(MunicipalityId),
}

impl core::fmt::Display for CatalogScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CatalogScope::Department(id) => write!(f, "department:{id}"),
            CatalogScope::Municipality(id) => write!(f, "municipality:{id}"),
        }
    }
}

/// One row of a module catalog.
///
/// Any row for a scope, active or not, means that scope has an explicit
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleActivation {
    pub scope: CatalogScope,
    pub module: String,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Read access to the data the authorization core depends on.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// The profile owned by `account`, if one exists.
    async fn profile(&self, account: AccountId) -> Result<Option<Profile>, DirectoryError>;

    /// A hierarchy node (with its parent link), if it exists.
    async fn node(&self, node: NodeRef) -> Result<Option<OrgNode>, DirectoryError>;

    /// Every catalog row attached to `scope`, active or not.
    async fn module_activations(
        &self,
        scope: CatalogScope,
    ) -> Result<Vec<ModuleActivation>, DirectoryError>;
}

#[async_trait]
impl<D> OrgDirectory for Arc<D>
where
    D: OrgDirectory + ?Sized,
{
    async fn profile(&self, account: AccountId) -> Result<Option<Profile>, DirectoryError> {
        (**self).profile(account).await
    }

    async fn node(&self, node: NodeRef) -> Result<Option<OrgNode>, DirectoryError> {
        (**self).node(node).await
    }

    async fn module_activations(
        &self,
        scope: CatalogScope,
    ) -> Result<Vec<ModuleActivation>, DirectoryError> {
        (**self).module_activations(scope).await
    }
}

/// Parent of `node`, or `None` for a municipality or an unknown node.
pub async fn parent_of(
    directory: &dyn OrgDirectory,
    node: NodeRef,
) -> Result<Option<NodeRef>, DirectoryError> {
    Ok(directory.node(node).await?.and_then(|n| n.parent()))
}
