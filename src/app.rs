use std::path::PathBuf;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use iced::Task;

use crate::application::install_sequencer::PendingInstall;
use crate::application::{
    DependencyRegistry, DownloadOrchestrator, GuidedSetup, HistoryStore, InstallSequencer,
    Language, LogRing, LogSubscription, OperationToken,
};
use crate::config::AppConfig;
use crate::domain::{AppError, DependencyName, DependencyStatus, VideoMetadata};
use crate::host::{Host, HostEvents, LocalHost};
use crate::storage::{JsonFileStore, KeyValueStore};
use crate::ui::{DownloadView, Screen, ViewContext, ViewMessage};

pub struct MeTool {
    view: DownloadView,
    host: Arc<dyn Host>,
    events: HostEvents,
    storage: Arc<dyn KeyValueStore>,
    registry: DependencyRegistry,
    sequencer: InstallSequencer,
    orchestrator: DownloadOrchestrator,
    history: HistoryStore,
    setup: Option<GuidedSetup>,
    language: Language,
    log_subscription: LogSubscription,
    install_dir: Option<PathBuf>,
    version: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(ViewMessage),
    /// One line from the host's download-log channel
    LogLine(String),
    DependenciesChecked(Vec<DependencyStatus>),
    InstallFinished(OperationToken, DependencyName, Result<DependencyStatus, AppError>),
    MetadataResolved(OperationToken, Result<VideoMetadata, AppError>),
    /// Pre-download tool check
    DependenciesVerified(OperationToken, Vec<DependencyStatus>),
    DownloadFinished(OperationToken, Result<PathBuf, AppError>),
    PathRevealed(Result<(), String>),
    DestinationPicked(Option<PathBuf>),
    InstallDirLoaded(PathBuf),
    VersionLoaded(Result<String, String>),
}

impl MeTool {
    pub fn new() -> (Self, Task<Message>) {
        let config = AppConfig::from_env();
        let events = HostEvents::new(config.host.event_capacity);
        let host: Arc<dyn Host> = Arc::new(LocalHost::new(config.host.clone(), events.clone()));
        let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(config.settings_path()));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            bin_dir = %config.host.bin_dir.display(),
            "starting"
        );
        Self::with_parts(&config, host, events, storage)
    }

    fn with_parts(
        config: &AppConfig,
        host: Arc<dyn Host>,
        events: HostEvents,
        storage: Arc<dyn KeyValueStore>,
    ) -> (Self, Task<Message>) {
        let registry = DependencyRegistry::new(host.clone());
        let language = Language::load(storage.as_ref());
        let setup = GuidedSetup::is_required(storage.as_ref())
            .then(|| GuidedSetup::new(&registry, language));

        let mut view = DownloadView::default();
        if setup.is_some() {
            view.screen = Screen::Setup;
        }

        let mut app = Self {
            view,
            orchestrator: DownloadOrchestrator::new(
                host.clone(),
                config.preferred_container.clone(),
                LogRing::new(config.log_capacity),
            ),
            history: HistoryStore::load(storage.clone(), config.history_capacity),
            sequencer: InstallSequencer::new(),
            host,
            events,
            storage,
            registry,
            setup,
            language,
            log_subscription: LogSubscription::default(),
            install_dir: None,
            version: None,
        };

        let boot = Task::batch([
            Task::perform(app.registry.check_all(), Message::DependenciesChecked),
            Task::perform(app.host.install_dir(), Message::InstallDirLoaded),
            Task::perform(
                app.host.app_version().map(|r| r.map_err(|e| e.to_string())),
                Message::VersionLoaded,
            ),
            app.attach_log(),
        ]);
        (app, boot)
    }

    fn attach_log(&mut self) -> Task<Message> {
        match self.log_subscription.attach(&self.events) {
            Some(lines) => Task::stream(lines.map(Message::LogLine)),
            None => Task::none(),
        }
    }

    fn start_install(&mut self, name: DependencyName) -> Task<Message> {
        let pending = self.sequencer.begin(&self.registry, name, self.language.code());
        self.run_install(pending.map(Some))
    }

    fn start_install_all(&mut self) -> Task<Message> {
        let pending = self.sequencer.begin_all(
            &self.registry,
            self.registry.missing(),
            self.language.code(),
        );
        self.run_install(pending)
    }

    fn run_install(&mut self, pending: Result<Option<PendingInstall>, AppError>) -> Task<Message> {
        match pending {
            Ok(Some(pending)) => {
                let (token, name) = (pending.token, pending.name);
                self.view.install_status = format!("Installing {}...", name);
                Task::perform(pending.future, move |outcome| {
                    Message::InstallFinished(token, name, outcome)
                })
            }
            Ok(None) => Task::none(),
            Err(e) => {
                self.view.install_status = e.to_string();
                Task::none()
            }
        }
    }

    fn finish_install(
        &mut self,
        token: OperationToken,
        name: DependencyName,
        outcome: Result<DependencyStatus, AppError>,
    ) -> Task<Message> {
        match self.sequencer.finish(&mut self.registry, token, name, outcome) {
            Ok(status) => {
                self.view.install_status = format!("{} installed", name);
                if let Some(setup) = self.setup.as_mut() {
                    setup.record_install(status);
                }
                let next = self.sequencer.continue_batch(&self.registry, self.language.code());
                self.run_install(next)
            }
            Err(e) => {
                self.view.install_status = e.to_string();
                if let Some(setup) = self.setup.as_mut() {
                    setup.sync(&self.registry);
                }
                Task::none()
            }
        }
    }

    fn finish_setup(&mut self) {
        let Some(setup) = self.setup.as_mut() else {
            return;
        };
        if setup.dismiss(self.storage.as_ref()) {
            self.setup = None;
            self.view.screen = Screen::Download;
        }
    }
}

impl Drop for MeTool {
    fn drop(&mut self) {
        self.log_subscription.detach();
    }
}

pub fn update(app: &mut MeTool, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(&ui_msg);
            return handle_view_message(app, ui_msg);
        }
        Message::LogLine(line) => app.orchestrator.on_log_line(line),
        Message::DependenciesChecked(statuses) => {
            app.registry.apply_all(statuses);
            if let Some(setup) = app.setup.as_mut() {
                setup.sync(&app.registry);
            }
        }
        Message::InstallFinished(token, name, outcome) => {
            return app.finish_install(token, name, outcome);
        }
        Message::MetadataResolved(token, result) => app.orchestrator.finish_fetch(token, result),
        Message::DependenciesVerified(token, statuses) => {
            let pending = app.orchestrator.finish_dependency_check(
                token,
                statuses,
                &mut app.registry,
                &mut app.sequencer,
            );
            match pending {
                Some(download) => {
                    let token = download.token;
                    return Task::perform(download.future, move |result| {
                        Message::DownloadFinished(token, result)
                    });
                }
                None => {
                    if app.orchestrator.needs_dependencies() {
                        app.view.screen = Screen::Dependencies;
                    }
                }
            }
        }
        Message::DownloadFinished(token, result) => {
            let reveal = app.orchestrator.finish_download(
                token,
                result,
                &mut app.sequencer,
                &mut app.history,
            );
            if let Some(reveal) = reveal {
                return Task::perform(reveal, Message::PathRevealed);
            }
        }
        Message::PathRevealed(result) => app.orchestrator.finish_reveal(result),
        Message::DestinationPicked(path) => {
            if let Some(path) = path {
                app.orchestrator.set_destination(Some(path));
            }
        }
        Message::InstallDirLoaded(dir) => app.install_dir = Some(dir),
        Message::VersionLoaded(result) => match result {
            Ok(version) => app.version = Some(version),
            Err(e) => tracing::warn!(error = %e, "version unavailable"),
        },
    }
    Task::none()
}

fn handle_view_message(app: &mut MeTool, message: ViewMessage) -> Task<Message> {
    match message {
        ViewMessage::UrlChanged(url) => app.orchestrator.set_url(url),
        ViewMessage::FetchPressed => match app.orchestrator.begin_fetch() {
            Ok(fetch) => {
                let token = fetch.token;
                return Task::perform(fetch.future, move |result| {
                    Message::MetadataResolved(token, result)
                });
            }
            Err(e) => app.view.notice = e.to_string(),
        },
        ViewMessage::FormatSelected(format_id) => {
            if let Err(e) = app.orchestrator.select_format(&format_id) {
                app.view.notice = e.to_string();
            }
        }
        ViewMessage::PickDestinationPressed => {
            return Task::perform(app.host.pick_destination(), Message::DestinationPicked);
        }
        ViewMessage::ResetDestinationPressed => app.orchestrator.set_destination(None),
        ViewMessage::DownloadPressed => {
            match app.orchestrator.begin_download(&mut app.sequencer, &app.registry) {
                Ok(check) => {
                    let token = check.token;
                    return Task::perform(check.future, move |statuses| {
                        Message::DependenciesVerified(token, statuses)
                    });
                }
                Err(e) => app.view.notice = e.to_string(),
            }
        }
        ViewMessage::Navigate(Screen::Dependencies) => {
            return Task::perform(app.registry.check_all(), Message::DependenciesChecked);
        }
        ViewMessage::InstallPressed(name) => return app.start_install(name),
        ViewMessage::InstallAllPressed => return app.start_install_all(),
        ViewMessage::ClearHistoryConfirmed(true) => app.history.clear(),
        ViewMessage::LanguageSelected(language) => {
            if let Some(setup) = app.setup.as_mut() {
                setup.choose_language(language, app.storage.as_ref());
                app.language = setup.language();
            }
        }
        ViewMessage::SetupNext => {
            if let Some(setup) = app.setup.as_mut() {
                setup.next();
            }
        }
        ViewMessage::SetupSkip => {
            if let Some(setup) = app.setup.as_mut() {
                setup.skip();
            }
        }
        ViewMessage::SetupFinish => app.finish_setup(),
        ViewMessage::Navigate(_)
        | ViewMessage::ClearHistoryPressed
        | ViewMessage::ClearHistoryConfirmed(false) => {}
    }
    Task::none()
}

pub fn view(app: &MeTool) -> iced::Element<'_, Message> {
    let ctx = ViewContext {
        orchestrator: &app.orchestrator,
        registry: &app.registry,
        sequencer: &app.sequencer,
        history: &app.history,
        setup: app.setup.as_ref(),
        version: app.version.as_deref(),
        install_dir: app.install_dir.as_deref(),
    };
    app.view.view(&ctx).map(Message::UiMessage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SetupStep;
    use crate::domain::HistoryEntry;
    use crate::host::fake::{sample_metadata, FakeHost};
    use crate::storage::{MemoryStore, ONBOARDING_KEY};

    fn boot(host: FakeHost, storage: Arc<MemoryStore>) -> MeTool {
        let (app, _) = MeTool::with_parts(
            &AppConfig::default(),
            Arc::new(host),
            HostEvents::new(16),
            storage,
        );
        app
    }

    fn ui(app: &mut MeTool, message: ViewMessage) {
        let _ = update(app, Message::UiMessage(message));
    }

    #[test]
    fn test_first_run_opens_setup() {
        let app = boot(FakeHost::new(), Arc::new(MemoryStore::new()));
        assert_eq!(app.view.screen, Screen::Setup);
        assert!(app.setup.is_some());
        assert!(app.log_subscription.is_attached());

        let storage = Arc::new(MemoryStore::new());
        storage.set(ONBOARDING_KEY, "1").unwrap();
        let app = boot(FakeHost::new(), storage);
        assert_eq!(app.view.screen, Screen::Download);
        assert!(app.setup.is_none());
    }

    #[test]
    fn test_setup_walkthrough_persists_choices() {
        let storage = Arc::new(MemoryStore::new());
        let mut app = boot(FakeHost::new(), storage.clone());

        ui(&mut app, ViewMessage::SetupNext);
        ui(&mut app, ViewMessage::LanguageSelected(Language::Portuguese));
        ui(&mut app, ViewMessage::SetupNext);
        assert_eq!(app.setup.as_ref().unwrap().step(), SetupStep::DependencyInstall);

        ui(&mut app, ViewMessage::SetupNext);
        assert_eq!(app.setup.as_ref().unwrap().step(), SetupStep::DependencyInstall);

        ui(&mut app, ViewMessage::SetupSkip);
        ui(&mut app, ViewMessage::SetupFinish);

        assert!(app.setup.is_none());
        assert_eq!(app.view.screen, Screen::Download);
        assert_eq!(app.language, Language::Portuguese);
        assert!(!GuidedSetup::is_required(storage.as_ref()));
        assert_eq!(Language::load(storage.as_ref()), Language::Portuguese);

        drop(app);
        let restarted = boot(FakeHost::new(), storage);
        assert_eq!(restarted.view.screen, Screen::Download);
        assert!(restarted.setup.is_none());
        assert_eq!(restarted.language, Language::Portuguese);
    }

    #[test]
    fn test_install_all_runs_one_after_another() {
        let mut app = boot(FakeHost::new(), Arc::new(MemoryStore::new()));

        let first = app
            .sequencer
            .begin_all(&app.registry, DependencyName::ALL, "en")
            .unwrap()
            .unwrap();
        assert_eq!(first.name, DependencyName::YtDlp);

        ui(&mut app, ViewMessage::InstallAllPressed);
        assert_eq!(app.view.install_status, AppError::Busy.to_string());

        let status = DependencyStatus {
            name: DependencyName::YtDlp,
            installed: true,
        };
        let _ = update(
            &mut app,
            Message::InstallFinished(first.token, first.name, Ok(status)),
        );

        assert!(app.setup.as_ref().unwrap().is_installed(DependencyName::YtDlp));
        assert_eq!(app.sequencer.currently_installing(), Some(DependencyName::Ffmpeg));
        assert_eq!(app.view.install_status, "Installing ffmpeg...");
    }

    #[test]
    fn test_failed_install_stops_the_batch() {
        let mut app = boot(FakeHost::new(), Arc::new(MemoryStore::new()));

        let first = app
            .sequencer
            .begin_all(&app.registry, DependencyName::ALL, "en")
            .unwrap()
            .unwrap();
        let err = AppError::Install {
            name: DependencyName::YtDlp,
            cause: "offline".to_string(),
        };
        let _ = update(
            &mut app,
            Message::InstallFinished(first.token, first.name, Err(err.clone())),
        );

        assert!(!app.sequencer.is_busy());
        assert!(app
            .sequencer
            .continue_batch(&app.registry, "en")
            .unwrap()
            .is_none());
        assert_eq!(app.view.install_status, err.to_string());
    }

    #[test]
    fn test_missing_tools_redirect_to_dependencies() {
        let host = FakeHost::new()
            .with_installed(&[DependencyName::YtDlp])
            .with_metadata(sample_metadata());
        let storage = Arc::new(MemoryStore::new());
        storage.set(ONBOARDING_KEY, "1").unwrap();
        let mut app = boot(host, storage);

        app.orchestrator.set_url("https://example.com/v".to_string());
        let fetch = app.orchestrator.begin_fetch().unwrap();
        let _ = update(&mut app, Message::MetadataResolved(fetch.token, Ok(sample_metadata())));

        let check = app
            .orchestrator
            .begin_download(&mut app.sequencer, &app.registry)
            .unwrap();
        let statuses = vec![
            DependencyStatus {
                name: DependencyName::YtDlp,
                installed: true,
            },
            DependencyStatus {
                name: DependencyName::Ffmpeg,
                installed: false,
            },
        ];
        let _ = update(&mut app, Message::DependenciesVerified(check.token, statuses));

        assert_eq!(app.view.screen, Screen::Dependencies);
        assert!(!app.sequencer.is_busy());
    }

    #[test]
    fn test_download_without_format_shows_notice() {
        let mut app = boot(FakeHost::new(), Arc::new(MemoryStore::new()));
        ui(&mut app, ViewMessage::UrlChanged("https://example.com/v".to_string()));
        ui(&mut app, ViewMessage::DownloadPressed);
        assert_eq!(app.view.notice, AppError::NoFormatSelected.to_string());
        assert!(!app.sequencer.is_busy());
    }

    #[test]
    fn test_clear_history_needs_confirmation() {
        let mut app = boot(FakeHost::new(), Arc::new(MemoryStore::new()));
        app.history.record(HistoryEntry {
            id: 1,
            title: "Sample clip".to_string(),
            source_url: "https://example.com/v".to_string(),
            resolution: "720p".to_string(),
            extension: "mp4".to_string(),
            size_bytes: None,
            saved_path: PathBuf::from("/tmp/clip.mp4"),
            completed_at: 0,
        });

        ui(&mut app, ViewMessage::ClearHistoryPressed);
        assert!(app.view.confirming_clear);
        ui(&mut app, ViewMessage::ClearHistoryConfirmed(false));
        assert_eq!(app.history.len(), 1);

        ui(&mut app, ViewMessage::ClearHistoryPressed);
        ui(&mut app, ViewMessage::ClearHistoryConfirmed(true));
        assert!(app.history.is_empty());
        assert!(!app.view.confirming_clear);
    }
}
