//! Request-scoped authorization context.
//!
//! One value per inbound request. It carries the caller and memoizes the
//! lookups the resolvers repeat within that request (profile, module scope).
//! It must be dropped with the request and never stored on a long-lived
//! identity object: profiles and catalogs change between requests.

use std::future::Future;

use tokio::sync::OnceCell;

use crate::directory::{DirectoryError, OrgDirectory};
use crate::modules::ModuleScope;
use crate::{Account, Profile};

#[derive(Debug, Default)]
pub struct RequestContext {
    account: Option<Account>,
    profile: OnceCell<Option<Profile>>,
    module_scope: OnceCell<ModuleScope>,
}

impl RequestContext {
    /// Context for a caller the authentication layer did not recognise.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_account(account: Account) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.account.is_some()
    }

    /// The caller's profile, loaded at most once per request.
    pub async fn profile(
        &self,
        directory: &dyn OrgDirectory,
    ) -> Result<Option<&Profile>, DirectoryError> {
        let Some(account) = &self.account else {
            return Ok(None);
        };

        let profile = self
            .profile
            .get_or_try_init(|| directory.profile(account.id))
            .await?;
        Ok(profile.as_ref())
    }

    /// The caller's profile if it exists and is active.
    ///
    /// Missing and inactive profiles are deliberately indistinguishable here.
    pub async fn active_profile(
        &self,
        directory: &dyn OrgDirectory,
    ) -> Result<Option<&Profile>, DirectoryError> {
        Ok(self.profile(directory).await?.filter(|p| p.active))
    }

    pub(crate) async fn module_scope<F, Fut>(&self, load: F) -> Result<&ModuleScope, DirectoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ModuleScope, DirectoryError>>,
    {
        self.module_scope.get_or_try_init(load).await
    }
}
