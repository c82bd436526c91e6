//! Configuration loading and representation.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults ([`AccessPolicy::builtin`], [`LogSettings::default`])
//! 2. a TOML file (optional; a missing file is not an error)
//! 3. `CIVGATE_`-prefixed environment variables, `__` separating sections
//!    (`CIVGATE_GATE__UNREGISTERED_NAMESPACES=deny`)
//!
//! `[matrix]`, `[namespaces]` and `[catalog]` replace their built-in
//! counterpart wholesale when present. `[entities]` is merged over the
//! built-in hierarchy chains.
//!
//! Every policy mistake is reported here, at startup, never at request time.

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use civgate_auth::{
    AccessPolicy, GateConfig, ModuleCatalogConfig, NamespaceRule, OwnershipChain,
    PermissionKey, PermissionMatrix, PermissionSet, Role, ScopeRegistry, UnknownRole,
    UnregisteredNamespaces, normalize_module_key,
};
use civgate_core::{DomainError, OrgLevel};
use civgate_observability::LogSettings;

pub const ENV_PREFIX: &str = "CIVGATE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("[matrix]: {0}")]
    UnknownRole(#[from] UnknownRole),

    #[error("{context}: {source}")]
    InvalidPermission {
        context: String,
        #[source]
        source: DomainError,
    },

    #[error("[namespaces.{0}]: report_actions require report_permission")]
    ReportActionsWithoutPermission(String),

    #[error("[namespaces.{0}]: edit, report and module rules require base_permission")]
    RulesWithoutBasePermission(String),

    #[error("[namespaces.{namespace}]: module '{module}' is not a managed module")]
    UnmanagedModule { namespace: String, module: String },

    #[error("[entities.{0}]: at least one ownership path is required")]
    EmptyOwnershipChain(String),

    #[error("[[routes]] entry {0}: pattern must not be empty")]
    EmptyRoutePattern(usize),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    /// Role name → permission keys.
    pub matrix: Option<BTreeMap<String, Vec<String>>>,
    pub gate: GateSettings,
    pub namespaces: Option<BTreeMap<String, NamespaceSettings>>,
    pub catalog: Option<CatalogSettings>,
    pub entities: BTreeMap<String, EntitySettings>,
    pub routes: Vec<RouteSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub bypass_prefixes: Option<Vec<String>>,
    pub public_routes: Option<Vec<String>>,
    pub unregistered_namespaces: UnregisteredNamespaces,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamespaceSettings {
    pub base_permission: Option<String>,
    pub module: Option<String>,
    pub report_permission: Option<String>,
    pub report_actions: Vec<String>,
    /// Action name → permission key.
    pub edit_rules: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub managed_modules: Vec<String>,
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// Ownership path per hierarchy level for one entity type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntitySettings {
    pub municipality: Option<String>,
    pub department: Option<String>,
    pub unit: Option<String>,
    pub sector: Option<String>,
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSettings {
    pub pattern: String,
    pub namespace: String,
    pub action: String,
}

impl Settings {
    /// Defaults ← `path` (if it exists) ← environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Defaults ← `toml`, without reading the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// Build and validate the access policy.
    pub fn policy(&self) -> Result<AccessPolicy, ConfigError> {
        let matrix = match &self.matrix {
            Some(roles) => build_matrix(roles)?,
            None => PermissionMatrix::builtin(),
        };

        let catalog = match &self.catalog {
            Some(catalog) => ModuleCatalogConfig::new(
                &catalog.managed_modules,
                catalog
                    .aliases
                    .iter()
                    .map(|(key, targets)| (key.clone(), targets)),
            ),
            None => ModuleCatalogConfig::builtin(),
        };

        let mut gate = match &self.namespaces {
            Some(namespaces) => {
                let mut gate = GateConfig::default();
                for (name, settings) in namespaces {
                    gate.namespaces
                        .insert(name.clone(), build_namespace(name, settings)?);
                }
                gate
            }
            None => GateConfig::builtin(),
        };
        if let Some(prefixes) = &self.gate.bypass_prefixes {
            gate.bypass_prefixes = prefixes.clone();
        }
        if let Some(public) = &self.gate.public_routes {
            gate.public_routes = public.iter().cloned().collect();
        }
        gate.unregistered = self.gate.unregistered_namespaces;

        for (namespace, rule) in &gate.namespaces {
            if let Some(module) = &rule.module {
                if !catalog.is_managed(module) {
                    return Err(ConfigError::UnmanagedModule {
                        namespace: namespace.clone(),
                        module: module.clone(),
                    });
                }
            }
        }

        let mut scopes = ScopeRegistry::builtin();
        for (entity_type, settings) in &self.entities {
            scopes = scopes.register(entity_type.clone(), build_chain(entity_type, settings)?);
        }

        Ok(AccessPolicy {
            matrix,
            gate,
            catalog,
            scopes,
        })
    }

    /// The `[[routes]]` table, validated.
    pub fn routes(&self) -> Result<&[RouteSettings], ConfigError> {
        if let Some(index) = self
            .routes
            .iter()
            .position(|route| route.pattern.trim().is_empty())
        {
            return Err(ConfigError::EmptyRoutePattern(index));
        }
        Ok(&self.routes)
    }
}

fn permission(context: impl Into<String>, raw: &str) -> Result<PermissionKey, ConfigError> {
    PermissionKey::parse(raw.to_string()).map_err(|source| ConfigError::InvalidPermission {
        context: context.into(),
        source,
    })
}

fn build_matrix(roles: &BTreeMap<String, Vec<String>>) -> Result<PermissionMatrix, ConfigError> {
    let mut entries = Vec::with_capacity(roles.len());
    for (name, keys) in roles {
        let role: Role = name.parse()?;
        let set = keys
            .iter()
            .map(|key| permission(format!("[matrix].{name}"), key))
            .collect::<Result<PermissionSet, _>>()?;
        entries.push((role, set));
    }

    for role in Role::ALL {
        if !entries.iter().any(|(r, _)| *r == role) {
            tracing::warn!(role = %role, "[matrix] has no entry for role; it grants nothing");
        }
    }

    Ok(PermissionMatrix::new(entries))
}

fn build_namespace(name: &str, settings: &NamespaceSettings) -> Result<NamespaceRule, ConfigError> {
    if !settings.report_actions.is_empty() && settings.report_permission.is_none() {
        return Err(ConfigError::ReportActionsWithoutPermission(name.to_string()));
    }

    let Some(base) = &settings.base_permission else {
        if !settings.edit_rules.is_empty()
            || settings.report_permission.is_some()
            || settings.module.is_some()
        {
            return Err(ConfigError::RulesWithoutBasePermission(name.to_string()));
        }
        return Ok(NamespaceRule::unmanaged());
    };

    let context = |field: &str| format!("[namespaces.{name}].{field}");
    let mut rule = NamespaceRule::managed(permission(context("base_permission"), base)?);

    if let Some(module) = &settings.module {
        rule = rule.with_module(normalize_module_key(module));
    }
    for (action, key) in &settings.edit_rules {
        rule = rule.with_edit_rule(
            action.clone(),
            permission(context(&format!("edit_rules.{action}")), key)?,
        );
    }
    if let Some(key) = &settings.report_permission {
        rule = rule.with_reports(
            permission(context("report_permission"), key)?,
            settings.report_actions.iter().cloned(),
        );
    }

    Ok(rule)
}

fn build_chain(entity_type: &str, settings: &EntitySettings) -> Result<OwnershipChain, ConfigError> {
    let levels = [
        (OrgLevel::Municipality, &settings.municipality),
        (OrgLevel::Department, &settings.department),
        (OrgLevel::Unit, &settings.unit),
        (OrgLevel::Sector, &settings.sector),
    ];

    let chain = levels
        .into_iter()
        .filter_map(|(level, path)| {
            path.as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| (level, p))
        })
        .fold(OwnershipChain::new(), |chain, (level, path)| chain.at(level, path));

    if chain.is_empty() {
        return Err(ConfigError::EmptyOwnershipChain(entity_type.to_string()));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use civgate_observability::LogFormat;

    const FULL: &str = r#"
        [log]
        filter = "civgate=debug"
        format = "pretty"

        [matrix]
        ADMIN = ["finance.view", "finance.edit", "finance.reports"]
        MUNICIPAL = ["finance.view", "finance.edit"]
        unit = ["finance.view"]

        [gate]
        bypass_prefixes = ["/assets/"]
        unregistered_namespaces = "deny"

        [namespaces.finance]
        base_permission = "finance.view"
        module = " Finance "
        report_permission = "finance.reports"
        report_actions = ["ledger_summary"]

        [namespaces.finance.edit_rules]
        invoice_create = "finance.edit"

        [namespaces.help]

        [catalog]
        managed_modules = ["finance", "fleet"]

        [catalog.aliases]
        fleet = ["fleet", "finance"]

        [entities.invoice]
        department = "department_id"
        unit = "issuing_unit_id"

        [[routes]]
        pattern = "/finance/invoices/:id/edit"
        namespace = "finance"
        action = "invoice_update"
    "#;

    #[test]
    fn full_file_builds_a_policy() {
        let settings = Settings::from_toml_str(FULL).unwrap();
        assert_eq!(settings.log.format, LogFormat::Pretty);

        let policy = settings.policy().unwrap();
        assert!(
            policy
                .matrix
                .permissions_for(Role::Unit)
                .contains("finance.view")
        );
        assert!(policy.matrix.permissions_for(Role::EndUser).is_empty());
        assert_eq!(policy.gate.bypass_prefixes, vec!["/assets/".to_string()]);
        assert_eq!(policy.gate.unregistered, UnregisteredNamespaces::Deny);
        // Public routes were not configured, so the defaults stay.
        assert!(policy.gate.public_routes.contains("accounts:login"));

        let finance = &policy.gate.namespaces["finance"];
        assert_eq!(finance.module.as_deref(), Some("finance"));
        assert_eq!(
            finance.edit_rules["invoice_create"],
            PermissionKey::from_static("finance.edit")
        );
        assert_eq!(policy.gate.namespaces["help"], NamespaceRule::unmanaged());

        assert!(policy.catalog.candidates("fleet").contains("finance"));

        let invoice = policy.scopes.chain("invoice").unwrap();
        assert_eq!(invoice.path(OrgLevel::Unit), Some("issuing_unit_id"));
        assert_eq!(invoice.path(OrgLevel::Municipality), None);
        // Built-in hierarchy chains survive the merge.
        assert!(policy.scopes.chain("unit").is_some());

        assert_eq!(settings.routes().unwrap().len(), 1);
    }

    #[test]
    fn empty_file_is_the_builtin_policy() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.policy().unwrap(), AccessPolicy::builtin());
        assert_eq!(settings.log, LogSettings::default());
    }

    #[test]
    fn unknown_role_is_a_load_error() {
        let settings = Settings::from_toml_str(
            r#"
            [matrix]
            COORDINATOR = ["org.view"]
            "#,
        )
        .unwrap();

        assert!(matches!(settings.policy(), Err(ConfigError::UnknownRole(_))));
    }

    #[test]
    fn malformed_permission_key_names_its_location() {
        let settings = Settings::from_toml_str(
            r#"
            [namespaces.finance]
            base_permission = "finance"
            "#,
        )
        .unwrap();

        let err = settings.policy().unwrap_err();
        assert!(err.to_string().contains("[namespaces.finance].base_permission"), "{err}");
    }

    #[test]
    fn report_actions_need_a_report_permission() {
        let settings = Settings::from_toml_str(
            r#"
            [namespaces.finance]
            base_permission = "finance.view"
            report_actions = ["ledger_summary"]
            "#,
        )
        .unwrap();

        assert!(matches!(
            settings.policy(),
            Err(ConfigError::ReportActionsWithoutPermission(ns)) if ns == "finance"
        ));
    }

    #[test]
    fn rules_need_a_base_permission() {
        let settings = Settings::from_toml_str(
            r#"
            [namespaces.finance.edit_rules]
            invoice_create = "finance.edit"
            "#,
        )
        .unwrap();

        assert!(matches!(
            settings.policy(),
            Err(ConfigError::RulesWithoutBasePermission(_))
        ));
    }

    #[test]
    fn namespace_module_must_be_managed() {
        let settings = Settings::from_toml_str(
            r#"
            [namespaces.library]
            base_permission = "library.view"
            module = "library"
            "#,
        )
        .unwrap();

        assert!(matches!(
            settings.policy(),
            Err(ConfigError::UnmanagedModule { module, .. }) if module == "library"
        ));
    }

    #[test]
    fn entity_without_paths_is_rejected() {
        let settings = Settings::from_toml_str(
            r#"
            [entities.invoice]
            unit = "  "
            "#,
        )
        .unwrap();

        assert!(matches!(
            settings.policy(),
            Err(ConfigError::EmptyOwnershipChain(_))
        ));
    }

    #[test]
    fn unknown_entity_level_is_a_parse_error() {
        assert!(Settings::from_toml_str(
            r#"
            [entities.invoice]
            region = "region_id"
            "#,
        )
        .is_err());
    }

    #[test]
    fn empty_route_pattern_is_rejected() {
        let settings = Settings::from_toml_str(
            r#"
            [[routes]]
            pattern = "/finance/"
            namespace = "finance"
            action = "index"

            [[routes]]
            pattern = " "
            namespace = "finance"
            action = "broken"
            "#,
        )
        .unwrap();

        assert!(matches!(
            settings.routes(),
            Err(ConfigError::EmptyRoutePattern(1))
        ));
    }

    #[test]
    fn environment_overrides_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "civgate.toml",
                r#"
                [log]
                format = "pretty"

                [gate]
                unregistered_namespaces = "allow"
                "#,
            )?;
            jail.set_env("CIVGATE_GATE__UNREGISTERED_NAMESPACES", "deny");
            jail.set_env("CIVGATE_LOG__FILTER", "warn");

            let settings = Settings::load("civgate.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings.gate.unregistered_namespaces, UnregisteredNamespaces::Deny);
            assert_eq!(settings.log.filter, "warn");
            assert_eq!(settings.log.format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let settings = Settings::load("absent.toml").map_err(|e| e.to_string())?;
            assert!(settings.matrix.is_none());
            Ok(())
        });
    }
}
