//! Role → permission mapping.

use std::collections::BTreeMap;

use crate::{PermissionKey, PermissionSet, Role};

/// Static mapping from [`Role`] to the permission keys it grants.
///
/// Loaded once at startup and immutable afterwards. A role absent from the
/// matrix grants nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    roles: BTreeMap<Role, PermissionSet>,
    empty: PermissionSet,
}

impl PermissionMatrix {
    pub fn new(roles: impl IntoIterator<Item = (Role, PermissionSet)>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            empty: PermissionSet::empty(),
        }
    }

    /// Permissions granted to `role`; empty (with a configuration warning)
    /// if the role has no entry.
    pub fn permissions_for(&self, role: Role) -> &PermissionSet {
        match self.roles.get(&role) {
            Some(set) => set,
            None => {
                tracing::warn!(role = %role, "role has no entry in the permission matrix");
                &self.empty
            }
        }
    }

    pub fn admin_set(&self) -> &PermissionSet {
        self.permissions_for(Role::Admin)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = (Role, &PermissionSet)> {
        self.roles.iter().map(|(r, s)| (*r, s))
    }

    /// Keys granted to some non-admin role but missing from the ADMIN set.
    ///
    /// ADMIN is expected to be a superset of every other role; nothing
    /// enforces it, so loaders report these gaps as warnings.
    pub fn admin_gaps(&self) -> Vec<(Role, PermissionKey)> {
        let admin = self.roles.get(&Role::Admin).unwrap_or(&self.empty);
        self.roles
            .iter()
            .filter(|(role, _)| **role != Role::Admin)
            .flat_map(|(role, set)| {
                set.iter()
                    .filter(|key| !admin.contains(key.as_str()))
                    .map(|key| (*role, key.clone()))
            })
            .collect()
    }

    /// Default matrix shipped with the crate.
    pub fn builtin() -> Self {
        Self::new(Role::ALL.into_iter().map(|role| {
            let set = builtin_role_permissions(role)
                .iter()
                .copied()
                .map(PermissionKey::from_static)
                .collect();
            (role, set)
        }))
    }
}

fn builtin_role_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[
            "org.view",
            "org.manage_municipality",
            "org.manage_department",
            "org.manage_unit",
            "education.view",
            "education.manage",
            "special_needs.view",
            "special_needs.manage",
            "reports.view",
            "accounts.view",
            "accounts.manage_users",
            "portal.view",
            "system.admin",
        ],
        Role::Municipal => &[
            "org.view",
            "org.manage_department",
            "org.manage_unit",
            "education.view",
            "education.manage",
            "special_needs.view",
            "special_needs.manage",
            "reports.view",
            "accounts.view",
            "accounts.manage_users",
        ],
        Role::Department => &[
            "org.view",
            "org.manage_unit",
            "education.view",
            "education.manage",
            "special_needs.view",
            "special_needs.manage",
            "reports.view",
        ],
        Role::Unit => &[
            "org.view",
            "education.view",
            "education.manage",
            "special_needs.view",
            "special_needs.manage",
            "reports.view",
        ],
        Role::Specialist => &[
            "org.view",
            "education.view",
            "special_needs.view",
            "special_needs.manage",
            "reports.view",
        ],
        Role::ReadOnly => &["org.view", "education.view", "special_needs.view", "reports.view"],
        Role::EndUser => &["portal.view"],
    }
}
