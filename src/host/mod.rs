//! Boundary to the privileged side of the app: tool management, process
//! execution, file browsing and dialogs.

pub mod events;
#[cfg(test)]
pub mod fake;
pub mod local;
pub mod models;

use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{DependencyName, DownloadRequest, VideoMetadata};

pub use events::HostEvents;
pub use local::LocalHost;
pub use models::HostConfig;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{0} is not installed")]
    MissingTool(DependencyName),

    #[error("{tool} exited with code {code:?}: {stderr}")]
    Process {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("{0} did not report a saved file")]
    NoOutputPath(DependencyName),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// Request/response commands served by the host.
///
/// Every call is independent and returns an owned future, so callers can
/// hand it to an executor without keeping a borrow on the issuing component.
pub trait Host: Send + Sync {
    /// Never fails: any probing error reports the tool as absent.
    fn check_dependency(&self, name: DependencyName) -> BoxFuture<'static, bool>;

    fn install_dependency(&self, name: DependencyName, locale: String)
        -> BoxFuture<'static, Result<()>>;

    fn fetch_metadata(&self, url: String) -> BoxFuture<'static, Result<VideoMetadata>>;

    /// Resolves to the path of the saved file.
    fn download(&self, request: DownloadRequest) -> BoxFuture<'static, Result<PathBuf>>;

    fn reveal_path(&self, path: PathBuf) -> BoxFuture<'static, Result<()>>;

    /// `None` when the user cancels the dialog.
    fn pick_destination(&self) -> BoxFuture<'static, Option<PathBuf>>;

    fn install_dir(&self) -> BoxFuture<'static, PathBuf>;

    fn app_version(&self) -> BoxFuture<'static, Result<String>>;
}
