use std::borrow::{Borrow, Cow};
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use civgate_core::DomainError;

/// Permission identifier of the form `"<module>.<action>"` (e.g. `"org.view"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey(Cow<'static, str>);

impl PermissionKey {
    /// Build a key from a literal known to be well formed.
    ///
    /// Use [`PermissionKey::parse`] for anything that comes from configuration.
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    /// Parse and validate a key.
    pub fn parse(key: impl Into<Cow<'static, str>>) -> Result<Self, DomainError> {
        let key = key.into();
        let Some((module, action)) = key.split_once('.') else {
            return Err(DomainError::validation(format!(
                "permission '{key}' must look like '<module>.<action>'"
            )));
        };
        if module.is_empty() || action.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "permission '{key}' must look like '<module>.<action>'"
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first dot.
    pub fn module(&self) -> &str {
        self.as_str().split_once('.').map_or(self.as_str(), |(m, _)| m)
    }
}

impl Borrow<str> for PermissionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PermissionKey> for String {
    fn from(value: PermissionKey) -> Self {
        value.0.into_owned()
    }
}

impl core::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Effective permission set of a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionKey>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.0.iter()
    }

    /// Keys in sorted order, for diagnostics.
    pub fn to_sorted_strings(&self) -> Vec<String> {
        self.0.iter().map(|k| k.as_str().to_string()).collect()
    }
}

impl FromIterator<PermissionKey> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = PermissionKey>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PermissionKey> for PermissionSet {
    fn extend<T: IntoIterator<Item = PermissionKey>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}
