use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::domain::{AppError, DependencyName, DependencyStatus};
use crate::host::Host;

/// Cached installed/missing state for every known tool.
pub struct DependencyRegistry {
    host: Arc<dyn Host>,
    statuses: BTreeMap<DependencyName, bool>,
}

impl DependencyRegistry {
    /// Starts with every tool marked missing until the first check.
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            statuses: DependencyName::ALL.iter().map(|name| (*name, false)).collect(),
        }
    }

    pub fn status(&self, name: DependencyName) -> DependencyStatus {
        DependencyStatus {
            name,
            installed: self.statuses.get(&name).copied().unwrap_or(false),
        }
    }

    pub fn statuses(&self) -> Vec<DependencyStatus> {
        DependencyName::ALL.iter().map(|name| self.status(*name)).collect()
    }

    pub fn missing(&self) -> Vec<DependencyName> {
        self.statuses()
            .into_iter()
            .filter(|status| !status.installed)
            .map(|status| status.name)
            .collect()
    }

    /// Queries the host without touching the cache.
    pub fn check(&self, name: DependencyName) -> BoxFuture<'static, DependencyStatus> {
        let probe = self.host.check_dependency(name);
        async move {
            DependencyStatus {
                name,
                installed: probe.await,
            }
        }
        .boxed()
    }

    pub fn check_all(&self) -> BoxFuture<'static, Vec<DependencyStatus>> {
        let probes: Vec<_> = DependencyName::ALL.iter().map(|name| self.check(*name)).collect();
        futures::future::join_all(probes).boxed()
    }

    /// Replaces the cached entry for one tool.
    pub fn apply(&mut self, status: DependencyStatus) {
        let previous = self.statuses.insert(status.name, status.installed);
        if previous != Some(status.installed) {
            tracing::info!(name = %status.name, installed = status.installed, "tool status changed");
        }
    }

    pub fn apply_all(&mut self, statuses: impl IntoIterator<Item = DependencyStatus>) {
        for status in statuses {
            self.apply(status);
        }
    }

    #[cfg(test)]
    pub async fn refresh(&mut self, name: DependencyName) -> bool {
        let status = self.check(name).await;
        self.apply(status);
        status.installed
    }

    #[cfg(test)]
    pub async fn refresh_all(&mut self) {
        let statuses = self.check_all().await;
        self.apply_all(statuses);
    }

    /// Installs or updates `name`, then re-checks it on the host.
    ///
    /// The returned status comes from that re-check, so a host that claims
    /// success without leaving the binary in place yields `installed: false`.
    pub fn install(
        &self,
        name: DependencyName,
        locale: &str,
    ) -> BoxFuture<'static, Result<DependencyStatus, AppError>> {
        let host = self.host.clone();
        let locale = locale.to_string();
        async move {
            host.install_dependency(name, locale)
                .await
                .map_err(|e| AppError::Install {
                    name,
                    cause: e.to_string(),
                })?;
            Ok(DependencyStatus {
                name,
                installed: host.check_dependency(name).await,
            })
        }
        .boxed()
    }
}
