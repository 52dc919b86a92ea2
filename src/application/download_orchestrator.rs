use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::dependency_registry::DependencyRegistry;
use super::history_store::HistoryStore;
use super::install_sequencer::{GateHolder, InstallSequencer, OperationToken};
use super::log_ring::LogRing;
use super::resolution::ResolutionSession;
use crate::domain::{
    AppError, DependencyStatus, DownloadRequest, FormatOption, HistoryEntry, OrchestratorState,
    VideoMetadata,
};
use crate::host::Host;
use crate::utils::get_timestamp;

pub struct PendingFetch {
    pub token: OperationToken,
    pub future: BoxFuture<'static, Result<VideoMetadata, AppError>>,
}

pub struct PendingCheck {
    pub token: OperationToken,
    pub future: BoxFuture<'static, Vec<DependencyStatus>>,
}

pub struct PendingDownload {
    pub token: OperationToken,
    pub future: BoxFuture<'static, Result<PathBuf, AppError>>,
}

/// Best-effort "show in folder" issued after a successful download.
pub type PendingReveal = BoxFuture<'static, Result<(), String>>;

/// Everything needed to run one download and record it afterwards.
#[derive(Debug, Clone)]
struct DownloadJob {
    title: String,
    source_url: String,
    format: FormatOption,
    destination: Option<PathBuf>,
    log_mark: u64,
}

impl DownloadJob {
    fn request(&self) -> DownloadRequest {
        DownloadRequest {
            url: self.source_url.clone(),
            format_id: self.format.format_id.clone(),
            extension: self.format.extension.clone(),
            height_class: self.format.height_class,
            destination: self.destination.clone(),
        }
    }

    fn into_entry(self, id: u64, saved_path: PathBuf) -> HistoryEntry {
        HistoryEntry {
            id,
            title: self.title,
            source_url: self.source_url,
            resolution: self.format.resolution,
            extension: self.format.extension,
            size_bytes: self.format.size_bytes,
            saved_path,
            completed_at: get_timestamp(),
        }
    }
}

enum Operation {
    Fetch { token: OperationToken, url: String },
    Download { token: OperationToken, job: DownloadJob },
}

/// Drives fetch → select → check → download → record for one URL at a time.
///
/// Each step is split into a `begin_*` call that validates and transitions
/// synchronously, returning the host future to await, and a `finish_*` call
/// that applies the result. Results tagged with a token that is no longer
/// current are dropped.
pub struct DownloadOrchestrator {
    host: Arc<dyn Host>,
    preferred_container: String,
    state: OrchestratorState,
    url: String,
    destination: Option<PathBuf>,
    session: Option<ResolutionSession>,
    operation: Option<Operation>,
    log: LogRing,
    status: String,
}

impl DownloadOrchestrator {
    pub fn new(host: Arc<dyn Host>, preferred_container: impl Into<String>, log: LogRing) -> Self {
        Self {
            host,
            preferred_container: preferred_container.into(),
            state: OrchestratorState::Idle,
            url: String::new(),
            destination: None,
            session: None,
            operation: None,
            log,
            status: String::new(),
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> Option<&PathBuf> {
        self.destination.as_ref()
    }

    pub fn session(&self) -> Option<&ResolutionSession> {
        self.session.as_ref()
    }

    pub fn log(&self) -> &LogRing {
        &self.log
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.operation.is_some()
    }

    /// True when the last download was refused for lack of tools.
    pub fn needs_dependencies(&self) -> bool {
        matches!(
            self.state,
            OrchestratorState::Failed(AppError::DependencyMissing(_))
        )
    }

    /// Completion percentage of the running download, from its own output only.
    pub fn progress(&self) -> Option<f32> {
        match (&self.state, &self.operation) {
            (OrchestratorState::Downloading, Some(Operation::Download { job, .. })) => {
                self.log.latest_progress_since(job.log_mark)
            }
            _ => None,
        }
    }

    pub fn on_log_line(&mut self, text: impl Into<String>) {
        self.log.append(text);
    }

    /// A changed URL invalidates the resolved session unless an operation
    /// is still running on it.
    pub fn set_url(&mut self, url: String) {
        if self.url == url {
            return;
        }
        self.url = url;
        if self.operation.is_some() {
            return;
        }
        let stale = self
            .session
            .as_ref()
            .is_some_and(|s| s.source_url() != self.url.trim());
        if stale {
            self.session = None;
        }
        self.settle();
    }

    pub fn set_destination(&mut self, destination: Option<PathBuf>) {
        self.destination = destination;
    }

    pub fn select_format(&mut self, format_id: &str) -> Result<(), AppError> {
        if self.operation.is_some() {
            return Err(AppError::Busy);
        }
        self.session
            .as_mut()
            .ok_or(AppError::NoFormatSelected)?
            .select(format_id)?;
        self.settle();
        Ok(())
    }

    /// Drops a terminal outcome once the user moves on.
    pub fn settle(&mut self) {
        if self.operation.is_some() {
            return;
        }
        self.state = if self.session.is_some() {
            OrchestratorState::AwaitingSelection
        } else {
            OrchestratorState::Idle
        };
        self.status.clear();
    }

    pub fn begin_fetch(&mut self) -> Result<PendingFetch, AppError> {
        if self.operation.is_some() {
            return Err(AppError::Busy);
        }
        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(AppError::EmptyUrl);
        }

        let token = OperationToken::next();
        self.session = None;
        self.state = OrchestratorState::ResolvingMetadata;
        self.status = "Fetching video info...".to_string();
        self.log.append(format!("Resolving {}", url));
        tracing::info!(%url, "resolving metadata");

        let future = self
            .host
            .fetch_metadata(url.clone())
            .map(|result| result.map_err(|e| AppError::Fetch(e.to_string())))
            .boxed();
        self.operation = Some(Operation::Fetch { token, url });
        Ok(PendingFetch { token, future })
    }

    pub fn finish_fetch(&mut self, token: OperationToken, result: Result<VideoMetadata, AppError>) {
        let url = match self.operation.take() {
            Some(Operation::Fetch { token: current, url }) if current == token => url,
            other => {
                self.operation = other;
                tracing::debug!(?token, "ignoring stale metadata result");
                return;
            }
        };

        match result {
            Ok(metadata) if metadata.formats.is_empty() => {
                self.fail(AppError::Fetch("no downloadable formats".to_string()));
            }
            Ok(metadata) => {
                let session = ResolutionSession::new(url, metadata, &self.preferred_container);
                self.status = format!("Found: {}", session.title());
                self.log.append(format!(
                    "Resolved \"{}\" with {} formats",
                    session.title(),
                    session.formats().len()
                ));
                self.session = Some(session);
                self.state = OrchestratorState::AwaitingSelection;
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn begin_download(
        &mut self,
        sequencer: &mut InstallSequencer,
        registry: &DependencyRegistry,
    ) -> Result<PendingCheck, AppError> {
        if self.operation.is_some() {
            return Err(AppError::Busy);
        }
        if self.url.trim().is_empty() {
            return Err(AppError::EmptyUrl);
        }
        let session = self.session.as_ref().ok_or(AppError::NoFormatSelected)?;
        let format = session.selected().ok_or(AppError::NoFormatSelected)?.clone();
        let token = sequencer.acquire(GateHolder::Download)?;

        let job = DownloadJob {
            title: session.title().to_string(),
            source_url: session.source_url().to_string(),
            format,
            destination: self.destination.clone(),
            log_mark: 0,
        };
        self.operation = Some(Operation::Download { token, job });
        self.state = OrchestratorState::CheckingDependencies;
        self.status = "Checking tools...".to_string();

        Ok(PendingCheck {
            token,
            future: registry.check_all(),
        })
    }

    /// Returns the download to run, or `None` when a tool is missing (or the
    /// token is stale).
    pub fn finish_dependency_check(
        &mut self,
        token: OperationToken,
        statuses: Vec<DependencyStatus>,
        registry: &mut DependencyRegistry,
        sequencer: &mut InstallSequencer,
    ) -> Option<PendingDownload> {
        if !self.holds_download(token) || self.state != OrchestratorState::CheckingDependencies {
            tracing::debug!(?token, "ignoring stale dependency check");
            return None;
        }

        registry.apply_all(statuses);
        let missing = registry.missing();
        if !missing.is_empty() {
            self.operation = None;
            sequencer.release(token);
            self.fail(AppError::DependencyMissing(missing));
            return None;
        }

        let log_mark = self.log.appended();
        let Some(Operation::Download { job, .. }) = self.operation.as_mut() else {
            return None;
        };
        job.log_mark = log_mark;
        let request = job.request();
        let label = format!("Downloading \"{}\" ({})", job.title, job.format);

        self.state = OrchestratorState::Downloading;
        self.status = "Downloading...".to_string();
        self.log.append(label);
        tracing::info!(url = %request.url, format = %request.format_id, "download started");

        let future = self
            .host
            .download(request)
            .map(|result| result.map_err(|e| AppError::Download(e.to_string())))
            .boxed();
        Some(PendingDownload { token, future })
    }

    /// Records a successful download and returns the reveal request for it.
    pub fn finish_download(
        &mut self,
        token: OperationToken,
        result: Result<PathBuf, AppError>,
        sequencer: &mut InstallSequencer,
        history: &mut HistoryStore,
    ) -> Option<PendingReveal> {
        if !self.holds_download(token) || self.state != OrchestratorState::Downloading {
            tracing::debug!(?token, "ignoring stale download result");
            return None;
        }
        let Some(Operation::Download { job, .. }) = self.operation.take() else {
            return None;
        };
        sequencer.release(token);

        match result {
            Ok(path) => {
                let entry = job.into_entry(history.next_id(), path.clone());
                tracing::info!(path = %path.display(), title = %entry.title, "download finished");
                history.record(entry);

                self.session = None;
                self.url.clear();
                self.status = format!("Saved: {}", path.display());
                self.log.append(format!("Saved to {}", path.display()));
                self.state = OrchestratorState::Succeeded(path.clone());

                Some(
                    self.host
                        .reveal_path(path)
                        .map(|result| result.map_err(|e| e.to_string()))
                        .boxed(),
                )
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    pub fn finish_reveal(&mut self, result: Result<(), String>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not reveal downloaded file");
            self.log.append(format!("Could not open file browser: {}", e));
        }
    }

    fn holds_download(&self, token: OperationToken) -> bool {
        matches!(&self.operation, Some(Operation::Download { token: current, .. }) if *current == token)
    }

    fn fail(&mut self, err: AppError) {
        tracing::warn!(error = %err, "operation failed");
        self.log.append(err.to_string());
        self.status = err.to_string();
        self.state = OrchestratorState::Failed(err);
    }
}
