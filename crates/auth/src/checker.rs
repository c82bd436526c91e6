//! Effective permission resolution.

use std::sync::Arc;

use crate::directory::{DirectoryError, OrgDirectory};
use crate::{PermissionMatrix, PermissionSet, RequestContext, Role};

/// Resolves what a caller may do from its account, profile and the matrix.
///
/// - No side effects
/// - No process-wide caching (the request context memoizes the profile)
/// - Storage failures propagate as errors
#[derive(Clone)]
pub struct PermissionChecker {
    directory: Arc<dyn OrgDirectory>,
    matrix: Arc<PermissionMatrix>,
    empty: PermissionSet,
}

impl PermissionChecker {
    pub fn new(directory: Arc<dyn OrgDirectory>, matrix: Arc<PermissionMatrix>) -> Self {
        Self {
            directory,
            matrix,
            empty: PermissionSet::empty(),
        }
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    pub(crate) fn directory(&self) -> &dyn OrgDirectory {
        self.directory.as_ref()
    }

    async fn granted(&self, ctx: &RequestContext) -> Result<&PermissionSet, DirectoryError> {
        let Some(account) = ctx.account() else {
            return Ok(&self.empty);
        };

        if account.platform_admin {
            return Ok(self.matrix.admin_set());
        }

        let Some(profile) = ctx.active_profile(self.directory()).await? else {
            return Ok(&self.empty);
        };

        match profile.role {
            Some(role) => Ok(self.matrix.permissions_for(role)),
            None => {
                tracing::warn!(account = %account.id, "profile carries an unrecognised role");
                Ok(&self.empty)
            }
        }
    }

    /// Every permission key the caller holds.
    pub async fn effective_permissions(
        &self,
        ctx: &RequestContext,
    ) -> Result<PermissionSet, DirectoryError> {
        Ok(self.granted(ctx).await?.clone())
    }

    pub async fn can(&self, ctx: &RequestContext, key: &str) -> Result<bool, DirectoryError> {
        let granted = self.granted(ctx).await?.contains(key);
        tracing::debug!(
            account = ?ctx.account().map(|a| a.id),
            permission = key,
            granted,
            "permission check"
        );
        Ok(granted)
    }

    /// Platform operator bit, or an active profile with the ADMIN role.
    ///
    /// Admins bypass module catalogs and organizational scoping entirely.
    pub async fn is_admin(&self, ctx: &RequestContext) -> Result<bool, DirectoryError> {
        let Some(account) = ctx.account() else {
            return Ok(false);
        };

        if account.platform_admin {
            return Ok(true);
        }

        Ok(ctx
            .active_profile(self.directory())
            .await?
            .is_some_and(|p| p.has_role(Role::Admin)))
    }
}
