use serde::{Deserialize, Serialize};

use civgate_core::{AccountId, DepartmentId, MunicipalityId, NodeRef, SectorId, UnitId};

use crate::Role;

/// An authenticated account, as handed over by the authentication layer.
///
/// `platform_admin` is the operator bit (superuser/staff) and is distinct
/// from the profile's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    #[serde(default)]
    pub platform_admin: bool,
}

impl Account {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            platform_admin: false,
        }
    }

    pub fn platform_admin(id: AccountId) -> Self {
        Self {
            id,
            platform_admin: true,
        }
    }
}

/// Where in the organizational tree an account operates, plus its role.
///
/// Exactly one profile exists per account. Every hierarchy link is optional;
/// the deepest one present is the authoritative scope anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub account_id: AccountId,
    /// `None` when the stored role is not one the matrix knows about.
    pub role: Option<Role>,
    pub active: bool,
    pub municipality_id: Option<MunicipalityId>,
    pub department_id: Option<DepartmentId>,
    pub unit_id: Option<UnitId>,
    pub sector_id: Option<SectorId>,
}

impl Profile {
    /// An active profile with no hierarchy links.
    pub fn new(account_id: AccountId, role: Role) -> Self {
        Self {
            account_id,
            role: Some(role),
            active: true,
            municipality_id: None,
            department_id: None,
            unit_id: None,
            sector_id: None,
        }
    }

    pub fn in_municipality(mut self, id: MunicipalityId) -> Self {
        self.municipality_id = Some(id);
        self
    }

    pub fn in_department(mut self, id: DepartmentId) -> Self {
        self.department_id = Some(id);
        self
    }

    pub fn in_unit(mut self, id: UnitId) -> Self {
        self.unit_id = Some(id);
        self
    }

    pub fn in_sector(mut self, id: SectorId) -> Self {
        self.sector_id = Some(id);
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    /// The deepest hierarchy link present: sector, then unit, then
    /// department, then municipality.
    pub fn anchor(&self) -> Option<NodeRef> {
        self.sector_id
            .map(NodeRef::Sector)
            .or(self.unit_id.map(NodeRef::Unit))
            .or(self.department_id.map(NodeRef::Department))
            .or(self.municipality_id.map(NodeRef::Municipality))
    }
}
