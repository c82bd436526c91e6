//! In-memory directory for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use civgate_core::{AccountId, DomainError, DomainResult, NodeRef, OrgNode};

use super::{CatalogScope, DirectoryError, ModuleActivation, OrgDirectory};
use crate::Profile;

/// In-memory organizational directory.
///
/// - Enforces the tree invariant on insert (parent must already exist)
/// - Can simulate an outage, so callers can check that failures propagate
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<AccountId, Profile>>,
    nodes: RwLock<HashMap<NodeRef, OrgNode>>,
    catalogs: RwLock<HashMap<CatalogScope, Vec<ModuleActivation>>>,
    unavailable: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&self, node: OrgNode) -> DomainResult<()> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| DomainError::invariant("node table lock poisoned"))?;

        if let Some(parent) = node.parent() {
            if !nodes.contains_key(&parent) {
                return Err(DomainError::invariant(format!(
                    "parent {parent} of {} does not exist",
                    node.node()
                )));
            }
        }

        nodes.insert(node.node(), node);
        Ok(())
    }

    pub fn upsert_profile(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.account_id, profile);
        }
    }

    /// Insert or replace the catalog row for `module` under `scope`.
    pub fn set_module(&self, scope: CatalogScope, module: &str, active: bool) {
        if let Ok(mut catalogs) = self.catalogs.write() {
            let rows = catalogs.entry(scope).or_default();
            rows.retain(|row| row.module != module);
            rows.push(ModuleActivation {
                scope,
                module: module.to_string(),
                active,
                updated_at: Utc::now(),
            });
        }
    }

    /// Make every subsequent lookup fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl OrgDirectory for InMemoryDirectory {
    async fn profile(&self, account: AccountId) -> Result<Option<Profile>, DirectoryError> {
        self.check_available()?;
        let profiles = self.profiles.read().map_err(|_| poisoned())?;
        Ok(profiles.get(&account).cloned())
    }

    async fn node(&self, node: NodeRef) -> Result<Option<OrgNode>, DirectoryError> {
        self.check_available()?;
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.get(&node).cloned())
    }

    async fn module_activations(
        &self,
        scope: CatalogScope,
    ) -> Result<Vec<ModuleActivation>, DirectoryError> {
        self.check_available()?;
        let catalogs = self.catalogs.read().map_err(|_| poisoned())?;
        Ok(catalogs.get(&scope).cloned().unwrap_or_default())
    }
}
