use thiserror::Error;

use super::model::DependencyName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Could not resolve video: {0}")]
    Fetch(String),

    #[error("Failed to install {name}: {cause}")]
    Install { name: DependencyName, cause: String },

    #[error("Missing required tools: {}", join_names(.0))]
    DependencyMissing(Vec<DependencyName>),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Storage unavailable: {0}")]
    PersistenceDegraded(String),

    #[error("Unknown tool: {0}")]
    UnknownDependency(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Enter a video URL first")]
    EmptyUrl,

    #[error("Select a format first")]
    NoFormatSelected,
}

fn join_names(names: &[DependencyName]) -> String {
    names
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
