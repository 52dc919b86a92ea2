use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;

use super::dependency_registry::DependencyRegistry;
use crate::domain::{AppError, DependencyName, DependencyStatus};

/// Identifies one in-flight operation; results carrying a stale token are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationToken(u64);

impl OperationToken {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        OperationToken(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// What currently holds the tool gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateHolder {
    Install(DependencyName),
    Download,
}

pub struct PendingInstall {
    pub token: OperationToken,
    pub name: DependencyName,
    pub future: BoxFuture<'static, Result<DependencyStatus, AppError>>,
}

/// Single-flight gate over operations that touch the tool directory.
///
/// A second request while the gate is held fails with [`AppError::Busy`].
/// The only queue is the one behind an install-all request, drained one
/// install at a time and dropped on the first failure.
#[derive(Debug, Default)]
pub struct InstallSequencer {
    current: Option<(OperationToken, GateHolder)>,
    queued: VecDeque<DependencyName>,
}

impl InstallSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn currently_installing(&self) -> Option<DependencyName> {
        match self.current {
            Some((_, GateHolder::Install(name))) => Some(name),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn acquire(&mut self, holder: GateHolder) -> Result<OperationToken, AppError> {
        if let Some((_, current)) = self.current {
            tracing::debug!(?holder, ?current, "gate busy");
            return Err(AppError::Busy);
        }
        let token = OperationToken::next();
        self.current = Some((token, holder));
        Ok(token)
    }

    pub(crate) fn release(&mut self, token: OperationToken) -> bool {
        match self.current {
            Some((held, _)) if held == token => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn begin(
        &mut self,
        registry: &DependencyRegistry,
        name: DependencyName,
        locale: &str,
    ) -> Result<PendingInstall, AppError> {
        let token = self.acquire(GateHolder::Install(name))?;
        tracing::info!(%name, "install started");
        Ok(PendingInstall {
            token,
            name,
            future: registry.install(name, locale),
        })
    }

    /// Starts installing `names` in order. Only the first install is issued
    /// here; each later one comes from [`continue_batch`](Self::continue_batch)
    /// after the previous one finished.
    pub fn begin_all(
        &mut self,
        registry: &DependencyRegistry,
        names: impl IntoIterator<Item = DependencyName>,
        locale: &str,
    ) -> Result<Option<PendingInstall>, AppError> {
        if self.is_busy() {
            return Err(AppError::Busy);
        }
        self.queued = names.into_iter().collect();
        self.continue_batch(registry, locale)
    }

    /// Issues the next queued install, or `None` once the batch is drained.
    pub fn continue_batch(
        &mut self,
        registry: &DependencyRegistry,
        locale: &str,
    ) -> Result<Option<PendingInstall>, AppError> {
        let Some(name) = self.queued.pop_front() else {
            return Ok(None);
        };
        match self.begin(registry, name, locale) {
            Ok(pending) => Ok(Some(pending)),
            Err(err) => {
                self.queued.clear();
                Err(err)
            }
        }
    }

    /// Releases the gate and records the re-checked status.
    ///
    /// An install the host reported as successful but whose binary is still
    /// absent is surfaced as an install error. Any error abandons the rest of
    /// an install-all batch; tools installed before it stay installed.
    pub fn finish(
        &mut self,
        registry: &mut DependencyRegistry,
        token: OperationToken,
        name: DependencyName,
        outcome: Result<DependencyStatus, AppError>,
    ) -> Result<DependencyStatus, AppError> {
        if !self.release(token) {
            tracing::warn!(%name, "install result arrived for a released gate");
        }

        let result = match outcome {
            Ok(status) => {
                registry.apply(status);
                if status.installed {
                    tracing::info!(%name, "install finished");
                    Ok(status)
                } else {
                    Err(AppError::Install {
                        name,
                        cause: "tool not found after install".to_string(),
                    })
                }
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            tracing::warn!(%name, error = %err, skipped = ?self.queued, "install failed");
            self.queued.clear();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use std::sync::Arc;

    async fn install(
        sequencer: &mut InstallSequencer,
        registry: &mut DependencyRegistry,
        name: DependencyName,
    ) -> Result<DependencyStatus, AppError> {
        let pending = sequencer.begin(registry, name, "en")?;
        let outcome = pending.future.await;
        sequencer.finish(registry, pending.token, pending.name, outcome)
    }

    /// Drives a batch the way the app does: finish one, then issue the next.
    async fn install_all(
        sequencer: &mut InstallSequencer,
        registry: &mut DependencyRegistry,
        names: &[DependencyName],
    ) -> Result<(), AppError> {
        let mut next = sequencer.begin_all(registry, names.iter().copied(), "en")?;
        while let Some(pending) = next {
            let outcome = pending.future.await;
            sequencer.finish(registry, pending.token, pending.name, outcome)?;
            next = sequencer.continue_batch(registry, "en")?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_status_is_installed_right_after_install() {
        let host = FakeHost::new();
        let mut registry = DependencyRegistry::new(Arc::new(host));
        let mut sequencer = InstallSequencer::new();

        install(&mut sequencer, &mut registry, DependencyName::YtDlp)
            .await
            .unwrap();
        assert!(registry.status(DependencyName::YtDlp).installed);
        assert!(registry.refresh(DependencyName::YtDlp).await);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test]
    async fn test_second_request_while_in_flight_is_busy() {
        let host = FakeHost::new();
        let mut registry = DependencyRegistry::new(Arc::new(host.clone()));
        let mut sequencer = InstallSequencer::new();

        let pending = sequencer
            .begin(&registry, DependencyName::YtDlp, "en")
            .unwrap();
        assert_eq!(sequencer.currently_installing(), Some(DependencyName::YtDlp));
        assert!(matches!(
            sequencer.begin(&registry, DependencyName::Ffmpeg, "en"),
            Err(AppError::Busy)
        ));
        assert!(matches!(
            sequencer.begin_all(&registry, [DependencyName::Ffmpeg], "en"),
            Err(AppError::Busy)
        ));

        let outcome = pending.future.await;
        sequencer
            .finish(&mut registry, pending.token, pending.name, outcome)
            .unwrap();
        assert_eq!(sequencer.currently_installing(), None);
        assert_eq!(host.install_calls().len(), 1);
        assert!(sequencer.continue_batch(&registry, "en").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_all_runs_in_order() {
        let host = FakeHost::new();
        let mut registry = DependencyRegistry::new(Arc::new(host.clone()));
        let mut sequencer = InstallSequencer::new();

        install_all(&mut sequencer, &mut registry, &DependencyName::ALL)
            .await
            .unwrap();

        let attempted: Vec<DependencyName> =
            host.install_calls().into_iter().map(|(name, _)| name).collect();
        assert_eq!(attempted, DependencyName::ALL.to_vec());
        assert!(registry.missing().is_empty());
        assert!(!sequencer.is_busy());
    }

    #[tokio::test]
    async fn test_install_all_stops_at_first_failure() {
        let host = FakeHost::new().failing_install(DependencyName::Ffmpeg);
        let mut registry = DependencyRegistry::new(Arc::new(host.clone()));
        let mut sequencer = InstallSequencer::new();

        let err = install_all(
            &mut sequencer,
            &mut registry,
            &[DependencyName::YtDlp, DependencyName::Ffmpeg],
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::Install { name: DependencyName::Ffmpeg, .. }
        ));
        assert!(registry.status(DependencyName::YtDlp).installed);
        assert!(!registry.status(DependencyName::Ffmpeg).installed);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test]
    async fn test_install_all_aborts_before_later_tools() {
        let host = FakeHost::new().failing_install(DependencyName::YtDlp);
        let mut registry = DependencyRegistry::new(Arc::new(host.clone()));
        let mut sequencer = InstallSequencer::new();

        let result = install_all(
            &mut sequencer,
            &mut registry,
            &[DependencyName::YtDlp, DependencyName::Ffmpeg],
        )
        .await;

        assert!(result.is_err());
        assert!(sequencer.continue_batch(&registry, "en").unwrap().is_none());
        let attempted: Vec<DependencyName> =
            host.install_calls().into_iter().map(|(name, _)| name).collect();
        assert_eq!(attempted, vec![DependencyName::YtDlp]);
    }

    #[tokio::test]
    async fn test_hollow_install_is_reported_as_failure() {
        let host = FakeHost::new().hollow_install(DependencyName::Ffmpeg);
        let mut registry = DependencyRegistry::new(Arc::new(host));
        let mut sequencer = InstallSequencer::new();

        let err = install(&mut sequencer, &mut registry, DependencyName::Ffmpeg)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Install { .. }));
        assert!(!registry.status(DependencyName::Ffmpeg).installed);
    }

    #[test]
    fn test_download_holds_the_gate() {
        let mut sequencer = InstallSequencer::new();
        let registry = DependencyRegistry::new(Arc::new(FakeHost::new()));

        let token = sequencer.acquire(GateHolder::Download).unwrap();
        assert_eq!(sequencer.currently_installing(), None);
        assert!(matches!(
            sequencer.begin(&registry, DependencyName::YtDlp, "en"),
            Err(AppError::Busy)
        ));
        assert!(sequencer.release(token));
        assert!(!sequencer.release(token));
    }
}
