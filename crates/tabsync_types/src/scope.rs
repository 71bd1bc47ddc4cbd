//! Scope model and the scope multiplexer.
//!
//! A table is fetched once per [`ScopeContext`]. Which scopes apply is
//! decided by the table's [`ScopePolicy`] against a [`ScopeCatalog`] that
//! is loaded once per run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which scope dimensions apply to a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopePolicy {
    /// One scope for the whole run.
    Global,
    /// One scope per account.
    PerAccount,
    /// One scope per region where `service` is available.
    PerRegion {
        /// Service whose regional availability filters the regions.
        service: String,
    },
    /// One scope per (account, region) pair where `service` is available.
    PerAccountRegion {
        /// Service whose regional availability filters the regions.
        service: String,
    },
    /// Reuse the parent's scope. Treated as `Global` on a root table.
    #[default]
    Inherit,
}

impl ScopePolicy {
    /// Shorthand for [`ScopePolicy::PerAccountRegion`].
    pub fn per_account_region(service: impl Into<String>) -> Self {
        Self::PerAccountRegion {
            service: service.into(),
        }
    }

    /// Shorthand for [`ScopePolicy::PerRegion`].
    pub fn per_region(service: impl Into<String>) -> Self {
        Self::PerRegion {
            service: service.into(),
        }
    }
}

/// The coordinates of one execution: account and/or region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct ScopeContext {
    account: Option<String>,
    region: Option<String>,
}

impl ScopeContext {
    /// The scope of a global table.
    pub fn global() -> Self {
        Self::default()
    }

    /// A scope covering one account.
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: None,
        }
    }

    /// A scope covering one region.
    pub fn region(region: impl Into<String>) -> Self {
        Self {
            account: None,
            region: Some(region.into()),
        }
    }

    /// A scope covering one region of one account.
    pub fn account_region(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// Account identifier, if the scope has an account dimension.
    pub fn account_id(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Region identifier, if the scope has a region dimension.
    pub fn region_id(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns true for the global scope.
    pub fn is_global(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.account, &self.region) {
            (None, None) => f.write_str("global"),
            (Some(a), None) => write!(f, "account={a}"),
            (None, Some(r)) => write!(f, "region={r}"),
            (Some(a), Some(r)) => write!(f, "account={a}/region={r}"),
        }
    }
}

/// An account and the regions enabled for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Account identifier.
    pub id: String,
    /// Regions enabled for this account.
    #[serde(default)]
    pub regions: Vec<String>,
}

/// The static description of available scopes for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCatalog {
    /// Accounts to synchronize.
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    /// Regions in which each service is available.
    ///
    /// A service missing from this map is available everywhere.
    #[serde(default)]
    pub services: BTreeMap<String, BTreeSet<String>>,
}

impl ScopeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account with its enabled regions.
    pub fn with_account<I, S>(mut self, id: impl Into<String>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts.push(AccountEntry {
            id: id.into(),
            regions: regions.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Restricts a service to the given regions.
    pub fn with_service<I, S>(mut self, service: impl Into<String>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services
            .insert(service.into(), regions.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if `service` is available in `region`.
    pub fn is_available(&self, service: &str, region: &str) -> bool {
        self.services
            .get(service)
            .map_or(true, |regions| regions.contains(region))
    }

    /// Returns the ordered, duplicate-free scopes a policy expands to.
    ///
    /// The result depends only on the catalog and the policy.
    pub fn scopes_for(&self, policy: &ScopePolicy) -> Vec<ScopeContext> {
        let scopes: BTreeSet<ScopeContext> = match policy {
            ScopePolicy::Global | ScopePolicy::Inherit => {
                return vec![ScopeContext::global()];
            }
            ScopePolicy::PerAccount => self
                .accounts
                .iter()
                .map(|a| ScopeContext::account(a.id.clone()))
                .collect(),
            ScopePolicy::PerRegion { service } => self
                .accounts
                .iter()
                .flat_map(|a| a.regions.iter())
                .filter(|r| self.is_available(service, r))
                .map(|r| ScopeContext::region(r.clone()))
                .collect(),
            ScopePolicy::PerAccountRegion { service } => self
                .accounts
                .iter()
                .flat_map(|a| a.regions.iter().map(move |r| (a, r)))
                .filter(|(_, r)| self.is_available(service, r))
                .map(|(a, r)| ScopeContext::account_region(a.id.clone(), r.clone()))
                .collect(),
        };
        scopes.into_iter().collect()
    }
}
