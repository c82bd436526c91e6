//! The four-level organizational tree: Municipality → Department → Unit → Sector.
//!
//! Nodes are created and edited by administrative tooling elsewhere; the
//! authorization core only reads them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::id::{DepartmentId, MunicipalityId, SectorId, UnitId};

/// Depth in the organizational tree, shallowest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgLevel {
    Municipality,
    Department,
    Unit,
    Sector,
}

impl OrgLevel {
    /// All levels, deepest first (the order scope precedence is evaluated in).
    pub const DEEPEST_FIRST: [OrgLevel; 4] = [
        OrgLevel::Sector,
        OrgLevel::Unit,
        OrgLevel::Department,
        OrgLevel::Municipality,
    ];

    /// The level directly above this one, if any.
    pub fn parent_level(self) -> Option<OrgLevel> {
        match self {
            OrgLevel::Municipality => None,
            OrgLevel::Department => Some(OrgLevel::Municipality),
            OrgLevel::Unit => Some(OrgLevel::Department),
            OrgLevel::Sector => Some(OrgLevel::Unit),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrgLevel::Municipality => "municipality",
            OrgLevel::Department => "department",
            OrgLevel::Unit => "unit",
            OrgLevel::Sector => "sector",
        }
    }
}

impl core::fmt::Display for OrgLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reference to one node of the tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    Municipality(MunicipalityId),
    Department(DepartmentId),
    Unit(UnitId),
    Sector(SectorId),
}

impl NodeRef {
    pub fn level(&self) -> OrgLevel {
        match self {
            NodeRef::Municipality(_) => OrgLevel::Municipality,
            NodeRef::Department(_) => OrgLevel::Department,
            NodeRef::Unit(_) => OrgLevel::Unit,
            NodeRef::Sector(_) => OrgLevel::Sector,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            NodeRef::Municipality(id) => *id.as_uuid(),
            NodeRef::Department(id) => *id.as_uuid(),
            NodeRef::Unit(id) => *id.as_uuid(),
            NodeRef::Sector(id) => *id.as_uuid(),
        }
    }

    /// Rebuild a typed reference from a level and a raw identifier.
    pub fn from_parts(level: OrgLevel, id: Uuid) -> Self {
        match level {
            OrgLevel::Municipality => NodeRef::Municipality(MunicipalityId::from_uuid(id)),
            OrgLevel::Department => NodeRef::Department(DepartmentId::from_uuid(id)),
            OrgLevel::Unit => NodeRef::Unit(UnitId::from_uuid(id)),
            OrgLevel::Sector => NodeRef::Sector(SectorId::from_uuid(id)),
        }
    }
}

impl core::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.level(), self.uuid())
    }
}

impl From<MunicipalityId> for NodeRef {
    fn from(value: MunicipalityId) -> Self {
        NodeRef::Municipality(value)
    }
}

impl From<DepartmentId> for NodeRef {
    fn from(value: DepartmentId) -> Self {
        NodeRef::Department(value)
    }
}

impl From<UnitId> for NodeRef {
    fn from(value: UnitId) -> Self {
        NodeRef::Unit(value)
    }
}

impl From<SectorId> for NodeRef {
    fn from(value: SectorId) -> Self {
        NodeRef::Sector(value)
    }
}

/// A node of the organizational tree as stored.
///
/// # Invariants
/// - A municipality has no parent.
/// - Every other node has exactly one parent, exactly one level above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgNode {
    node: NodeRef,
    parent: Option<NodeRef>,
    pub name: String,
    pub active: bool,
}

impl OrgNode {
    /// A municipality (tree root).
    pub fn municipality(id: MunicipalityId, name: impl Into<String>) -> Self {
        Self {
            node: NodeRef::Municipality(id),
            parent: None,
            name: name.into(),
            active: true,
        }
    }

    /// A non-root node; rejects parents that are not exactly one level up.
    pub fn child(node: NodeRef, parent: NodeRef, name: impl Into<String>) -> DomainResult<Self> {
        let child_level = node.level();
        if child_level.parent_level() != Some(parent.level()) {
            return Err(DomainError::InvalidParent {
                child: child_level,
                parent: parent.level(),
            });
        }

        Ok(Self {
            node,
            parent: Some(parent),
            name: name.into(),
            active: true,
        })
    }

    pub fn node(&self) -> NodeRef {
        self.node
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_must_hang_off_a_department() {
        let unit = NodeRef::Unit(UnitId::new());

        assert!(OrgNode::child(unit, NodeRef::Department(DepartmentId::new()), "School 12").is_ok());

        let err = OrgNode::child(unit, NodeRef::Municipality(MunicipalityId::new()), "School 12")
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidParent {
                child: OrgLevel::Unit,
                parent: OrgLevel::Municipality,
            }
        );
    }

    #[test]
    fn municipality_cannot_be_a_child() {
        let muni = NodeRef::Municipality(MunicipalityId::new());
        let dept = NodeRef::Department(DepartmentId::new());
        assert!(OrgNode::child(muni, dept, "x").is_err());
    }

    #[test]
    fn node_ref_round_trips_through_parts() {
        let sector = NodeRef::Sector(SectorId::new());
        assert_eq!(NodeRef::from_parts(sector.level(), sector.uuid()), sector);
    }

    #[test]
    fn deepest_first_is_reverse_depth_order() {
        let mut levels = OrgLevel::DEEPEST_FIRST.to_vec();
        levels.sort();
        levels.reverse();
        assert_eq!(levels, OrgLevel::DEEPEST_FIRST.to_vec());
    }
}
