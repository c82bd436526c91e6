//! Per-request enforcement point.
//!
//! Runs once per inbound request, before any handler, cheapest checks first:
//!
//! 1. static/bypass path → allow
//! 2. unauthenticated → allow (the handler demands authentication itself)
//! 3. unresolvable route → allow (normal 404 handling downstream)
//! 4. public route name → allow
//! 5. namespace base permission → reject if missing
//! 6. namespace module → reject if not active for the caller's scope
//! 7. edit rule for the action → reject if missing
//! 8. report action → reject if the report permission is missing
//!
//! Namespaces without a base permission are not managed here; handlers
//! remain responsible for their own checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checker::PermissionChecker;
use crate::directory::DirectoryError;
use crate::modules::ModuleCatalogResolver;
use crate::{PermissionKey, RequestContext};

/// A request path resolved to its route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoute {
    /// Empty for routes outside any namespace.
    pub namespace: String,
    pub action: String,
}

impl ResolvedRoute {
    pub fn new(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            action: action.into(),
        }
    }

    /// `namespace:action`, the form public route names are listed in.
    pub fn name(&self) -> String {
        format!("{}:{}", self.namespace, self.action)
    }
}

/// Maps a request path to its route.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Option<ResolvedRoute>;
}

/// Dedicated permission for a namespace's aggregate report actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRule {
    pub permission: PermissionKey,
    pub actions: BTreeSet<String>,
}

/// Access rules for one namespace: view, edit and report tiers plus an
/// optional module gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRule {
    pub base_permission: Option<PermissionKey>,
    pub module: Option<String>,
    pub edit_rules: BTreeMap<String, PermissionKey>,
    pub reports: Option<ReportRule>,
}

impl NamespaceRule {
    pub fn managed(base_permission: PermissionKey) -> Self {
        Self {
            base_permission: Some(base_permission),
            ..Self::default()
        }
    }

    /// Registered, but left to the handlers.
    pub fn unmanaged() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(crate::modules::normalize_module_key(&module.into()));
        self
    }

    pub fn with_edit_rule(mut self, action: impl Into<String>, permission: PermissionKey) -> Self {
        self.edit_rules.insert(action.into(), permission);
        self
    }

    pub fn with_reports<I, S>(mut self, permission: PermissionKey, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reports = Some(ReportRule {
            permission,
            actions: actions.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// What to do with routes whose namespace has no rule at all.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnregisteredNamespaces {
    /// Let them through (handlers are expected to check).
    #[default]
    Allow,
    /// Reject them: every namespace must be registered.
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub bypass_prefixes: Vec<String>,
    pub public_routes: BTreeSet<String>,
    pub namespaces: BTreeMap<String, NamespaceRule>,
    pub unregistered: UnregisteredNamespaces,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bypass_prefixes: vec![
                "/static/".to_string(),
                "/media/".to_string(),
                "/admin/".to_string(),
            ],
            public_routes: [
                "accounts:login",
                "accounts:logout",
                "accounts:change_password",
                "accounts:my_profile",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            namespaces: BTreeMap::new(),
            unregistered: UnregisteredNamespaces::Allow,
        }
    }
}

impl GateConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>, rule: NamespaceRule) -> Self {
        self.namespaces.insert(namespace.into(), rule);
        self
    }

    /// Namespaces for the modules the built-in matrix knows about.
    pub fn builtin() -> Self {
        let key = PermissionKey::from_static;
        Self::default()
            .with_namespace(
                "org",
                NamespaceRule::managed(key("org.view"))
                    .with_edit_rule("municipality_create", key("org.manage_municipality"))
                    .with_edit_rule("municipality_update", key("org.manage_municipality"))
                    .with_edit_rule("department_create", key("org.manage_department"))
                    .with_edit_rule("department_update", key("org.manage_department"))
                    .with_edit_rule("unit_create", key("org.manage_unit"))
                    .with_edit_rule("unit_update", key("org.manage_unit")),
            )
            .with_namespace(
                "education",
                NamespaceRule::managed(key("education.view"))
                    .with_module("education")
                    .with_edit_rule("class_create", key("education.manage"))
                    .with_edit_rule("class_update", key("education.manage"))
                    .with_edit_rule("enrollment_create", key("education.manage"))
                    .with_reports(key("reports.view"), ["class_report", "attendance_report"]),
            )
            .with_namespace(
                "special_needs",
                NamespaceRule::managed(key("special_needs.view"))
                    .with_module("special_needs")
                    .with_edit_rule("case_create", key("special_needs.manage"))
                    .with_edit_rule("case_update", key("special_needs.manage"))
                    .with_reports(key("reports.view"), ["case_report"]),
            )
            .with_namespace("reports", NamespaceRule::managed(key("reports.view")))
            .with_namespace(
                "accounts",
                NamespaceRule::managed(key("accounts.view"))
                    .with_edit_rule("user_create", key("accounts.manage_users"))
                    .with_edit_rule("user_update", key("accounts.manage_users")),
            )
            .with_namespace("portal", NamespaceRule::managed(key("portal.view")))
    }
}

/// Why a request was let through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllowReason {
    BypassPath,
    Unauthenticated,
    UnresolvedRoute,
    PublicRoute,
    UnmanagedNamespace,
    Granted,
}

/// Why a request was refused. Every variant maps to `403 Forbidden`.
///
/// Messages never reveal whether data was missing or access was explicitly
/// denied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoAreaPermission,
    ModuleInactive,
    NoActionPermission,
    NoReportPermission,
}

impl Rejection {
    pub fn status(&self) -> u16 {
        403
    }

    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NoAreaPermission => "You do not have permission to access this area.",
            Rejection::ModuleInactive => "This module is not active for your scope.",
            Rejection::NoActionPermission => "You do not have permission to perform this action.",
            Rejection::NoReportPermission => "You do not have permission to run this report.",
        }
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(AllowReason),
    Reject(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

#[derive(Clone)]
pub struct AccessGate {
    config: Arc<GateConfig>,
    routes: Arc<dyn RouteResolver>,
    checker: PermissionChecker,
    modules: ModuleCatalogResolver,
}

impl AccessGate {
    pub fn new(
        config: Arc<GateConfig>,
        routes: Arc<dyn RouteResolver>,
        checker: PermissionChecker,
        modules: ModuleCatalogResolver,
    ) -> Self {
        Self {
            config,
            routes,
            checker,
            modules,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide whether the request for `path` may reach its handler.
    pub async fn check(
        &self,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<Decision, DirectoryError> {
        if self
            .config
            .bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Ok(Decision::Allow(AllowReason::BypassPath));
        }

        if !ctx.is_authenticated() {
            return Ok(Decision::Allow(AllowReason::Unauthenticated));
        }

        let Some(route) = self.routes.resolve(path) else {
            return Ok(Decision::Allow(AllowReason::UnresolvedRoute));
        };

        if self.config.public_routes.contains(&route.name()) {
            return Ok(Decision::Allow(AllowReason::PublicRoute));
        }

        let decision = self.check_route(&route, ctx).await?;
        tracing::debug!(
            path,
            namespace = %route.namespace,
            action = %route.action,
            decision = ?decision,
            "access gate"
        );
        Ok(decision)
    }

    async fn check_route(
        &self,
        route: &ResolvedRoute,
        ctx: &RequestContext,
    ) -> Result<Decision, DirectoryError> {
        let Some(rule) = self.config.namespaces.get(&route.namespace) else {
            return Ok(match self.config.unregistered {
                UnregisteredNamespaces::Allow => {
                    tracing::warn!(
                        namespace = %route.namespace,
                        "namespace has no access rule; left to its handlers"
                    );
                    Decision::Allow(AllowReason::UnmanagedNamespace)
                }
                UnregisteredNamespaces::Deny => Decision::Reject(Rejection::NoAreaPermission),
            });
        };

        let Some(base) = &rule.base_permission else {
            return Ok(Decision::Allow(AllowReason::UnmanagedNamespace));
        };

        if !self.checker.can(ctx, base.as_str()).await? {
            return Ok(Decision::Reject(Rejection::NoAreaPermission));
        }

        if let Some(module) = &rule.module {
            if !self.modules.module_enabled(ctx, module).await? {
                return Ok(Decision::Reject(Rejection::ModuleInactive));
            }
        }

        if let Some(required) = rule.edit_rules.get(&route.action) {
            if !self.checker.can(ctx, required.as_str()).await? {
                return Ok(Decision::Reject(Rejection::NoActionPermission));
            }
        }

        if let Some(reports) = &rule.reports {
            if reports.actions.contains(&route.action)
                && !self.checker.can(ctx, reports.permission.as_str()).await?
            {
                return Ok(Decision::Reject(Rejection::NoReportPermission));
            }
        }

        Ok(Decision::Allow(AllowReason::Granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CatalogScope, InMemoryDirectory};
    use crate::modules::ModuleCatalogConfig;
    use crate::{Account, PermissionMatrix, PermissionSet, Profile, Role};
    use civgate_core::{AccountId, DepartmentId, MunicipalityId, OrgNode};

    /// `/<namespace>/<action>`; anything else is unresolved.
    struct TwoSegmentRoutes;

    impl RouteResolver for TwoSegmentRoutes {
        fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
            let mut parts = path.trim_matches('/').split('/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(ns), Some(action), None) if !ns.is_empty() => {
                    Some(ResolvedRoute::new(ns, action))
                }
                _ => None,
            }
        }
    }

    fn keys(list: &[&'static str]) -> PermissionSet {
        list.iter().copied().map(PermissionKey::from_static).collect()
    }

    fn finance_config() -> GateConfig {
        let key = PermissionKey::from_static;
        GateConfig::default()
            .with_namespace(
                "finance",
                NamespaceRule::managed(key("finance.view"))
                    .with_module("finance")
                    .with_edit_rule("invoice_create", key("finance.edit"))
                    .with_reports(key("finance.reports"), ["ledger_summary"]),
            )
            .with_namespace("help", NamespaceRule::unmanaged())
    }

    fn matrix() -> PermissionMatrix {
        PermissionMatrix::new([
            (
                Role::Admin,
                keys(&["finance.view", "finance.edit", "finance.reports"]),
            ),
            (Role::Municipal, keys(&["finance.view", "finance.edit"])),
            (Role::Unit, keys(&["finance.view"])),
        ])
    }

    struct World {
        dir: Arc<InMemoryDirectory>,
        gate: AccessGate,
        municipality: MunicipalityId,
        department: DepartmentId,
    }

    fn world(config: GateConfig) -> World {
        let dir = Arc::new(InMemoryDirectory::new());
        let municipality = MunicipalityId::new();
        let department = DepartmentId::new();
        dir.insert_node(OrgNode::municipality(municipality, "Riverside"))
            .unwrap();
        dir.insert_node(
            OrgNode::child(department.into(), municipality.into(), "Finance").unwrap(),
        )
        .unwrap();

        let checker = PermissionChecker::new(dir.clone(), Arc::new(matrix()));
        let modules = ModuleCatalogResolver::new(
            checker.clone(),
            Arc::new(ModuleCatalogConfig::new(
                ["finance"],
                Vec::<(String, Vec<String>)>::new(),
            )),
        );
        let gate = AccessGate::new(Arc::new(config), Arc::new(TwoSegmentRoutes), checker, modules);

        World {
            dir,
            gate,
            municipality,
            department,
        }
    }

    fn ctx_for(w: &World, profile: Profile) -> RequestContext {
        let account = Account::new(profile.account_id);
        w.dir.upsert_profile(profile);
        RequestContext::for_account(account)
    }

    fn view_only(w: &World) -> RequestContext {
        ctx_for(
            w,
            Profile::new(AccountId::new(), Role::Unit).in_department(w.department),
        )
    }

    #[tokio::test]
    async fn view_only_account_cannot_create_invoices() {
        let w = world(finance_config());
        let ctx = view_only(&w);

        assert_eq!(
            w.gate.check("/finance/invoice_create", &ctx).await.unwrap(),
            Decision::Reject(Rejection::NoActionPermission)
        );
        assert_eq!(
            w.gate.check("/finance/invoice_list", &ctx).await.unwrap(),
            Decision::Allow(AllowReason::Granted)
        );
    }

    #[tokio::test]
    async fn report_actions_need_the_report_permission() {
        let w = world(finance_config());
        let ctx = ctx_for(
            &w,
            Profile::new(AccountId::new(), Role::Municipal).in_municipality(w.municipality),
        );

        assert_eq!(
            w.gate.check("/finance/ledger_summary", &ctx).await.unwrap(),
            Decision::Reject(Rejection::NoReportPermission)
        );
        assert!(w.gate.check("/finance/invoice_create", &ctx).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn missing_base_permission_rejects_the_area() {
        let w = world(finance_config());
        let ctx = ctx_for(&w, Profile::new(AccountId::new(), Role::ReadOnly));

        assert_eq!(
            w.gate.check("/finance/invoice_list", &ctx).await.unwrap(),
            Decision::Reject(Rejection::NoAreaPermission)
        );
    }

    #[tokio::test]
    async fn inactive_module_rejects_even_with_permission() {
        let w = world(finance_config());
        w.dir
            .set_module(CatalogScope::Municipality(w.municipality), "finance", false);
        let ctx = ctx_for(
            &w,
            Profile::new(AccountId::new(), Role::Municipal).in_municipality(w.municipality),
        );

        assert_eq!(
            w.gate.check("/finance/invoice_list", &ctx).await.unwrap(),
            Decision::Reject(Rejection::ModuleInactive)
        );
    }

    #[tokio::test]
    async fn static_paths_and_anonymous_callers_pass() {
        let w = world(finance_config());
        let anonymous = RequestContext::anonymous();

        assert_eq!(
            w.gate.check("/static/app.css", &view_only(&w)).await.unwrap(),
            Decision::Allow(AllowReason::BypassPath)
        );
        assert_eq!(
            w.gate.check("/finance/invoice_create", &anonymous).await.unwrap(),
            Decision::Allow(AllowReason::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn unresolved_and_public_routes_pass() {
        let w = world(finance_config());
        let ctx = ctx_for(&w, Profile::new(AccountId::new(), Role::ReadOnly));

        assert_eq!(
            w.gate.check("/finance/invoices/7/edit", &ctx).await.unwrap(),
            Decision::Allow(AllowReason::UnresolvedRoute)
        );
        assert_eq!(
            w.gate.check("/accounts/login", &ctx).await.unwrap(),
            Decision::Allow(AllowReason::PublicRoute)
        );
    }

    #[tokio::test]
    async fn unregistered_namespaces_follow_the_configured_policy() {
        let w = world(finance_config());
        let ctx = ctx_for(&w, Profile::new(AccountId::new(), Role::ReadOnly));
        assert_eq!(
            w.gate.check("/fleet/vehicle_list", &ctx).await.unwrap(),
            Decision::Allow(AllowReason::UnmanagedNamespace)
        );

        let mut strict = finance_config();
        strict.unregistered = UnregisteredNamespaces::Deny;
        let w = world(strict);
        let ctx = ctx_for(&w, Profile::new(AccountId::new(), Role::ReadOnly));
        assert_eq!(
            w.gate.check("/fleet/vehicle_list", &ctx).await.unwrap(),
            Decision::Reject(Rejection::NoAreaPermission)
        );
        // Registered without a base permission: explicitly left to handlers.
        assert_eq!(
            w.gate.check("/help/index", &ctx).await.unwrap(),
            Decision::Allow(AllowReason::UnmanagedNamespace)
        );
    }

    #[tokio::test]
    async fn storage_failure_is_not_a_decision() {
        let w = world(finance_config());
        let ctx = view_only(&w);
        w.dir.set_unavailable(true);

        assert!(w.gate.check("/finance/invoice_list", &ctx).await.is_err());
    }

    #[test]
    fn builtin_rules_reference_builtin_permissions() {
        let matrix = PermissionMatrix::builtin();
        let admin = matrix.admin_set();
        for (ns, rule) in GateConfig::builtin().namespaces {
            let mut required: Vec<&PermissionKey> = rule.base_permission.iter().collect();
            required.extend(rule.edit_rules.values());
            required.extend(rule.reports.iter().map(|r| &r.permission));
            for key in required {
                assert!(admin.contains(key.as_str()), "{ns}: {key}");
            }
        }
    }
}
