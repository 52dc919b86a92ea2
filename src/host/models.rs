use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

use super::HostError;
use crate::domain::{FormatOption, VideoMetadata};

const YT_DLP_RELEASE_URL: &str = if cfg!(target_os = "windows") {
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
} else if cfg!(target_os = "macos") {
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
} else {
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
};

const FFMPEG_BUILD_URL: &str = if cfg!(target_os = "windows") {
    "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip"
} else {
    "https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-amd64-static.tar.xz"
};

/// Configuration for the local host
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory holding the managed tool binaries.
    pub bin_dir: PathBuf,
    /// Used when a download has no custom destination.
    pub download_dir: PathBuf,
    pub yt_dlp_url: String,
    pub ffmpeg_url: String,
    pub app_version: String,
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bin_dir: crate::config::default_data_dir().join("bin"),
            download_dir: crate::config::default_download_dir(),
            yt_dlp_url: YT_DLP_RELEASE_URL.to_string(),
            ffmpeg_url: FFMPEG_BUILD_URL.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            event_capacity: 1024,
        }
    }
}

/// Output of `yt-dlp -J`, reduced to the fields the core consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    fn is_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none") && self.height.unwrap_or(0) > 0
    }

    fn size_bytes(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|size| *size > 0.0)
            .map(|size| size as u64)
    }
}

impl RawMetadata {
    /// Validate the payload and order its video formats best-first.
    ///
    /// yt-dlp lists formats worst to best, so the list is walked in reverse
    /// before the stable height sort; the first entry per (height, ext) wins.
    pub fn narrow(self) -> Result<VideoMetadata, HostError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HostError::InvalidMetadata("missing title".to_string()))?;

        let mut candidates: Vec<RawFormat> =
            self.formats.into_iter().rev().filter(RawFormat::is_video).collect();
        candidates.sort_by(|a, b| b.height.cmp(&a.height));

        let mut seen = HashSet::new();
        let formats: Vec<FormatOption> = candidates
            .into_iter()
            .filter(|f| seen.insert((f.height, f.ext.clone())))
            .map(|f| {
                let height = f.height.unwrap_or(0);
                FormatOption {
                    size_bytes: f.size_bytes(),
                    format_id: f.format_id,
                    resolution: format!("{}p", height),
                    extension: f.ext,
                    height_class: height,
                }
            })
            .collect();

        if formats.is_empty() {
            return Err(HostError::InvalidMetadata(
                "no downloadable video formats".to_string(),
            ));
        }

        Ok(VideoMetadata { title, formats })
    }
}
