//! Organizational scoping of queries.
//!
//! Every list/detail query in a business module is narrowed to the caller's
//! place in the hierarchy. The deepest hierarchy link on the profile wins,
//! regardless of role, so an operator can be deliberately over-restricted
//! without changing their role.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use civgate_core::{DepartmentId, MunicipalityId, NodeRef, OrgLevel, SectorId, UnitId};

use crate::checker::PermissionChecker;
use crate::directory::{DirectoryError, parent_of};
use crate::RequestContext;

/// How an entity type reaches each hierarchy level: a field path per level
/// (e.g. `"enrollment.class.unit_id"`).
///
/// Levels the entity cannot be attributed to are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipChain {
    paths: BTreeMap<OrgLevel, String>,
}

impl OwnershipChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, level: OrgLevel, path: impl Into<String>) -> Self {
        self.paths.insert(level, path.into());
        self
    }

    pub fn path(&self, level: OrgLevel) -> Option<&str> {
        self.paths.get(&level).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Ownership chains keyed by entity type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRegistry {
    chains: HashMap<String, OwnershipChain>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entity_type: impl Into<String>, chain: OwnershipChain) -> Self {
        self.chains.insert(entity_type.into(), chain);
        self
    }

    pub fn chain(&self, entity_type: &str) -> Option<&OwnershipChain> {
        self.chains.get(entity_type)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Chains for the hierarchy node tables themselves.
    pub fn builtin() -> Self {
        Self::new()
            .register(
                "municipality",
                OwnershipChain::new().at(OrgLevel::Municipality, "id"),
            )
            .register(
                "department",
                OwnershipChain::new()
                    .at(OrgLevel::Municipality, "municipality_id")
                    .at(OrgLevel::Department, "id"),
            )
            .register(
                "unit",
                OwnershipChain::new()
                    .at(OrgLevel::Municipality, "department.municipality_id")
                    .at(OrgLevel::Department, "department_id")
                    .at(OrgLevel::Unit, "id"),
            )
            .register(
                "sector",
                OwnershipChain::new()
                    .at(OrgLevel::Municipality, "unit.department.municipality_id")
                    .at(OrgLevel::Department, "unit.department_id")
                    .at(OrgLevel::Unit, "unit_id")
                    .at(OrgLevel::Sector, "id"),
            )
    }
}

/// Where a concrete record sits in the hierarchy, as far as it is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub municipality: Option<MunicipalityId>,
    pub department: Option<DepartmentId>,
    pub unit: Option<UnitId>,
    pub sector: Option<SectorId>,
}

impl Ownership {
    pub fn at(&self, level: OrgLevel) -> Option<Uuid> {
        match level {
            OrgLevel::Municipality => self.municipality.map(|id| *id.as_uuid()),
            OrgLevel::Department => self.department.map(|id| *id.as_uuid()),
            OrgLevel::Unit => self.unit.map(|id| *id.as_uuid()),
            OrgLevel::Sector => self.sector.map(|id| *id.as_uuid()),
        }
    }
}

/// Filter clause to AND onto an entity's base query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    /// No filtering (administrators).
    Unrestricted,
    /// Matches nothing (fail closed).
    Nothing,
    /// Records whose ownership at `node`'s level equals `node`, reached via `path`.
    Restrict { node: NodeRef, path: String },
}

impl ScopeFilter {
    /// Evaluate the filter against a record's resolved ownership.
    pub fn permits(&self, ownership: &Ownership) -> bool {
        match self {
            ScopeFilter::Unrestricted => true,
            ScopeFilter::Nothing => false,
            ScopeFilter::Restrict { node, .. } => ownership.at(node.level()) == Some(node.uuid()),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, ScopeFilter::Unrestricted)
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ScopeFilter::Nothing)
    }
}

#[derive(Clone)]
pub struct ScopeResolver {
    checker: PermissionChecker,
    registry: Arc<ScopeRegistry>,
}

impl ScopeResolver {
    pub fn new(checker: PermissionChecker, registry: Arc<ScopeRegistry>) -> Self {
        Self { checker, registry }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// The most specific filter the caller's position allows for `entity_type`.
    pub async fn scope_filter(
        &self,
        ctx: &RequestContext,
        entity_type: &str,
    ) -> Result<ScopeFilter, DirectoryError> {
        if self.checker.is_admin(ctx).await? {
            return Ok(ScopeFilter::Unrestricted);
        }

        let Some(profile) = ctx.active_profile(self.checker.directory()).await? else {
            return Ok(ScopeFilter::Nothing);
        };

        let Some(chain) = self.registry.chain(entity_type) else {
            tracing::warn!(entity_type, "no ownership chain registered; scoping to nothing");
            return Ok(ScopeFilter::Nothing);
        };

        let Some(anchor) = profile.anchor() else {
            return Ok(ScopeFilter::Nothing);
        };

        // Entities that cannot be attributed at the anchor's level are
        // filtered at the closest ancestor they do carry.
        let mut node = anchor;
        loop {
            if let Some(path) = chain.path(node.level()) {
                return Ok(ScopeFilter::Restrict {
                    node,
                    path: path.to_string(),
                });
            }

            match parent_of(self.checker.directory(), node).await? {
                Some(parent) => node = parent,
                None => {
                    tracing::warn!(
                        entity_type,
                        anchor = %anchor,
                        "entity has no ownership path at or above the caller's scope"
                    );
                    return Ok(ScopeFilter::Nothing);
                }
            }
        }
    }
}
