pub mod dependency_registry;
pub mod download_orchestrator;
pub mod history_store;
pub mod install_sequencer;
pub mod log_ring;
pub mod progress;
pub mod resolution;
pub mod setup;

pub use dependency_registry::DependencyRegistry;
pub use download_orchestrator::DownloadOrchestrator;
pub use history_store::HistoryStore;
pub use install_sequencer::{InstallSequencer, OperationToken};
pub use log_ring::{LogRing, LogSubscription};
pub use setup::{GuidedSetup, Language, SetupStep};
