//! Module catalog gate: is an optional functional module reachable for a caller?
//!
//! This is a product-tier gate layered on top of RBAC. Only a closed list of
//! managed modules is ever restricted; everything else is always reachable.
//!
//! Catalogs live at department and municipality level. A department with any
//! catalog row (even only inactive ones) owns its catalog; a department with
//! no rows inherits its municipality's. With no catalog anywhere in the
//! caller's chain the gate is open (legacy mode).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use civgate_core::{DepartmentId, MunicipalityId, NodeRef};

use crate::checker::PermissionChecker;
use crate::directory::{CatalogScope, DirectoryError, parent_of};
use crate::{Profile, RequestContext, Role};

/// Trim and lower-case a module key.
pub fn normalize_module_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Which modules are managed, and which keys also satisfy a check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleCatalogConfig {
    managed: BTreeSet<String>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleCatalogConfig {
    pub fn new<M, A, T>(managed: M, aliases: A) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        A: IntoIterator<Item = (String, T)>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            managed: managed
                .into_iter()
                .map(|m| normalize_module_key(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(key, targets)| {
                    (
                        normalize_module_key(&key),
                        targets
                            .into_iter()
                            .map(|t| normalize_module_key(t.as_ref()))
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            [
                "education",
                "assessments",
                "special_needs",
                "health",
                "finance",
                "processes",
                "procurement",
                "contracts",
                "integrations",
                "dashboards",
                "converter",
                "hr",
                "timekeeping",
                "payroll",
                "assets",
                "warehouse",
                "fleet",
                "ombudsman",
                "taxes",
            ],
            [(
                "special_needs".to_string(),
                ["special_needs", "education"],
            )],
        )
    }

    /// `key` must already be normalized.
    pub fn is_managed(&self, key: &str) -> bool {
        self.managed.contains(key)
    }

    pub fn managed(&self) -> impl Iterator<Item = &str> {
        self.managed.iter().map(String::as_str)
    }

    /// `key` itself plus every alias target configured for it.
    pub fn candidates(&self, key: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::from([key.to_string()]);
        if let Some(targets) = self.aliases.get(key) {
            out.extend(targets.iter().cloned());
        }
        out
    }
}

/// Resolved catalog for one caller within one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScope {
    pub active: BTreeSet<String>,
    /// `false` when no catalog exists anywhere in the caller's chain.
    pub enforce: bool,
}

impl ModuleScope {
    /// No catalog configured: nothing is restricted.
    pub fn open() -> Self {
        Self::default()
    }

    /// Enforced with nothing enabled.
    pub fn locked() -> Self {
        Self {
            active: BTreeSet::new(),
            enforce: true,
        }
    }
}

#[derive(Clone)]
pub struct ModuleCatalogResolver {
    checker: PermissionChecker,
    config: Arc<ModuleCatalogConfig>,
}

impl ModuleCatalogResolver {
    pub fn new(checker: PermissionChecker, config: Arc<ModuleCatalogConfig>) -> Self {
        Self { checker, config }
    }

    pub fn config(&self) -> &ModuleCatalogConfig {
        &self.config
    }

    /// Whether `module_key`'s entry points are reachable for the caller.
    pub async fn module_enabled(
        &self,
        ctx: &RequestContext,
        module_key: &str,
    ) -> Result<bool, DirectoryError> {
        let module = normalize_module_key(module_key);
        if module.is_empty() || !self.config.is_managed(&module) {
            return Ok(true);
        }

        if !ctx.is_authenticated() {
            return Ok(false);
        }

        if self.checker.is_admin(ctx).await? {
            return Ok(true);
        }

        let Some(profile) = ctx.active_profile(self.checker.directory()).await? else {
            return Ok(false);
        };

        let scope = ctx.module_scope(|| self.load_scope(profile)).await?;
        if !scope.enforce {
            return Ok(true);
        }

        let enabled = self
            .config
            .candidates(&module)
            .iter()
            .any(|candidate| scope.active.contains(candidate));
        tracing::debug!(
            account = %profile.account_id,
            module = %module,
            enabled,
            "module catalog check"
        );
        Ok(enabled)
    }

    async fn load_scope(&self, profile: &Profile) -> Result<ModuleScope, DirectoryError> {
        let department_scoped = profile.role.is_some_and(|r| r.is_department_scoped());

        if department_scoped {
            let Some(department) = self.resolve_department(profile).await? else {
                // No municipality fallback without a department.
                tracing::warn!(
                    account = %profile.account_id,
                    "department-scoped profile has no resolvable department; module catalog locked"
                );
                return Ok(ModuleScope::locked());
            };

            let own = self.load_catalog(CatalogScope::Department(department)).await?;
            if own.enforce {
                return Ok(own);
            }

            return match self.resolve_municipality(profile, department).await? {
                Some(municipality) => {
                    self.load_catalog(CatalogScope::Municipality(municipality))
                        .await
                }
                None => Ok(own),
            };
        }

        match profile.municipality_id {
            Some(municipality) => {
                self.load_catalog(CatalogScope::Municipality(municipality))
                    .await
            }
            None => Ok(ModuleScope::open()),
        }
    }

    async fn resolve_department(
        &self,
        profile: &Profile,
    ) -> Result<Option<DepartmentId>, DirectoryError> {
        if let Some(department) = profile.department_id {
            return Ok(Some(department));
        }

        match (profile.role, profile.unit_id) {
            (Some(Role::Unit), Some(unit)) => {
                match parent_of(self.checker.directory(), NodeRef::Unit(unit)).await? {
                    Some(NodeRef::Department(department)) => Ok(Some(department)),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    async fn resolve_municipality(
        &self,
        profile: &Profile,
        department: DepartmentId,
    ) -> Result<Option<MunicipalityId>, DirectoryError> {
        if let Some(municipality) = profile.municipality_id {
            return Ok(Some(municipality));
        }

        match parent_of(self.checker.directory(), NodeRef::Department(department)).await? {
            Some(NodeRef::Municipality(municipality)) => Ok(Some(municipality)),
            _ => Ok(None),
        }
    }

    async fn load_catalog(&self, scope: CatalogScope) -> Result<ModuleScope, DirectoryError> {
        let rows = self.checker.directory().module_activations(scope).await?;
        let enforce = !rows.is_empty();
        let active = rows
            .iter()
            .filter(|row| row.active)
            .map(|row| normalize_module_key(&row.module))
            .collect();

        Ok(ModuleScope { active, enforce })
    }
}
