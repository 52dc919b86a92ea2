pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    DependencyName, DependencyStatus, DownloadRequest, FormatOption, HistoryEntry, LogLine,
    OrchestratorState, VideoMetadata,
};
