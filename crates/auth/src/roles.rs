use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role carried by a profile.
///
/// Roles are plain data looked up against the [`PermissionMatrix`](crate::PermissionMatrix);
/// a role never grants anything on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Municipal,
    Department,
    Unit,
    Specialist,
    #[serde(rename = "READONLY")]
    ReadOnly,
    EndUser,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Municipal,
        Role::Department,
        Role::Unit,
        Role::Specialist,
        Role::ReadOnly,
        Role::EndUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Municipal => "MUNICIPAL",
            Role::Department => "DEPARTMENT",
            Role::Unit => "UNIT",
            Role::Specialist => "SPECIALIST",
            Role::ReadOnly => "READONLY",
            Role::EndUser => "END_USER",
        }
    }

    /// Roles anchored below the municipality, subject to the department
    /// catalog guard.
    pub fn is_department_scoped(&self) -> bool {
        matches!(self, Role::Department | Role::Unit)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
