//! Wiring of the authorization resolvers behind one handle.
//!
//! [`AccessPolicy`] is the static half (matrix, gate rules, module catalog
//! and scope registry), loaded once at startup. [`Authorizer`] binds a policy
//! to a directory and a route resolver and is what request handlers hold.

use std::sync::Arc;

use crate::directory::{DirectoryError, OrgDirectory};
use crate::gate::{AccessGate, Decision, GateConfig, RouteResolver};
use crate::modules::{ModuleCatalogConfig, ModuleCatalogResolver};
use crate::scope::{ScopeFilter, ScopeRegistry, ScopeResolver};
use crate::{PermissionChecker, PermissionMatrix, PermissionSet, RequestContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub matrix: PermissionMatrix,
    pub gate: GateConfig,
    pub catalog: ModuleCatalogConfig,
    pub scopes: ScopeRegistry,
}

impl AccessPolicy {
    pub fn builtin() -> Self {
        Self {
            matrix: PermissionMatrix::builtin(),
            gate: GateConfig::builtin(),
            catalog: ModuleCatalogConfig::builtin(),
            scopes: ScopeRegistry::builtin(),
        }
    }

    /// Log every permission some role holds but ADMIN lacks.
    ///
    /// ADMIN should be a superset of every other role; a gap is a policy
    /// mistake, not a reason to refuse startup.
    pub fn warn_admin_gaps(&self) -> usize {
        let gaps = self.matrix.admin_gaps();
        for (role, key) in &gaps {
            tracing::warn!(role = %role, permission = %key, "permission missing from ADMIN");
        }
        gaps.len()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

/// All four authorization capabilities sharing one directory and policy.
#[derive(Clone)]
pub struct Authorizer {
    checker: PermissionChecker,
    modules: ModuleCatalogResolver,
    scopes: ScopeResolver,
    gate: AccessGate,
}

impl Authorizer {
    pub fn new(
        directory: Arc<dyn OrgDirectory>,
        policy: AccessPolicy,
        routes: Arc<dyn RouteResolver>,
    ) -> Self {
        policy.warn_admin_gaps();

        let AccessPolicy {
            matrix,
            gate,
            catalog,
            scopes,
        } = policy;

        let checker = PermissionChecker::new(directory, Arc::new(matrix));
        let modules = ModuleCatalogResolver::new(checker.clone(), Arc::new(catalog));
        let scopes = ScopeResolver::new(checker.clone(), Arc::new(scopes));
        let gate = AccessGate::new(Arc::new(gate), routes, checker.clone(), modules.clone());

        Self {
            checker,
            modules,
            scopes,
            gate,
        }
    }

    pub fn checker(&self) -> &PermissionChecker {
        &self.checker
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub async fn can(&self, ctx: &RequestContext, key: &str) -> Result<bool, DirectoryError> {
        self.checker.can(ctx, key).await
    }

    pub async fn is_admin(&self, ctx: &RequestContext) -> Result<bool, DirectoryError> {
        self.checker.is_admin(ctx).await
    }

    pub async fn effective_permissions(
        &self,
        ctx: &RequestContext,
    ) -> Result<PermissionSet, DirectoryError> {
        self.checker.effective_permissions(ctx).await
    }

    pub async fn module_enabled(
        &self,
        ctx: &RequestContext,
        module_key: &str,
    ) -> Result<bool, DirectoryError> {
        self.modules.module_enabled(ctx, module_key).await
    }

    pub async fn scope_filter(
        &self,
        ctx: &RequestContext,
        entity_type: &str,
    ) -> Result<ScopeFilter, DirectoryError> {
        self.scopes.scope_filter(ctx, entity_type).await
    }

    pub async fn check_request(
        &self,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<Decision, DirectoryError> {
        self.gate.check(path, ctx).await
    }
}
