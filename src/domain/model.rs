use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AppError;
use crate::utils::format_bytes;

/// External executables the download pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyName {
    #[serde(rename = "yt-dlp")]
    YtDlp,
    #[serde(rename = "ffmpeg")]
    Ffmpeg,
}

impl DependencyName {
    pub const ALL: [DependencyName; 2] = [DependencyName::YtDlp, DependencyName::Ffmpeg];

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyName::YtDlp => "yt-dlp",
            DependencyName::Ffmpeg => "ffmpeg",
        }
    }
}

impl fmt::Display for DependencyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DependencyName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| AppError::UnknownDependency(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyStatus {
    pub name: DependencyName,
    pub installed: bool,
}

/// One selectable resolution/container combination for a resolved video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    pub format_id: String,
    pub resolution: String,
    pub extension: String,
    /// Pixel height, used to rank candidates and as a download fallback.
    pub height_class: u32,
    pub size_bytes: Option<u64>,
}

impl fmt::Display for FormatOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} · {}", self.resolution, self.extension)?;
        if let Some(size) = self.size_bytes {
            write!(f, " · {}", format_bytes(size))?;
        }
        Ok(())
    }
}

/// Validated metadata for a URL, formats ordered best-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub formats: Vec<FormatOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    pub extension: String,
    pub height_class: u32,
    pub destination: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub title: String,
    pub source_url: String,
    pub resolution: String,
    pub extension: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    pub saved_path: PathBuf,
    pub completed_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    ResolvingMetadata,
    AwaitingSelection,
    CheckingDependencies,
    Downloading,
    Succeeded(PathBuf),
    Failed(AppError),
}
