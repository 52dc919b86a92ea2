use std::env;
use std::path::PathBuf;

use directories::{ProjectDirs, UserDirs};

use crate::application::history_store::DEFAULT_HISTORY_CAPACITY;
use crate::application::log_ring::DEFAULT_LOG_CAPACITY;
use crate::application::resolution::DEFAULT_PREFERRED_CONTAINER;
use crate::host::HostConfig;

const SETTINGS_FILE: &str = "settings.json";

/// Per-user data directory, falling back to the working directory.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "metool", "app")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("metool-data"))
}

pub fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| default_data_dir().join("downloads"))
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub history_capacity: usize,
    pub log_capacity: usize,
    pub preferred_container: String,
    pub host: HostConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_capacity: DEFAULT_LOG_CAPACITY,
            preferred_container: DEFAULT_PREFERRED_CONTAINER.to_string(),
            host: HostConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with `METOOL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = AppConfig::default();

        if let Some(dir) = var("METOOL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.host.bin_dir = config.data_dir.join("bin");
        }
        if let Some(dir) = var("METOOL_DOWNLOAD_DIR") {
            config.host.download_dir = PathBuf::from(dir);
        }
        if let Some(container) = var("METOOL_PREFERRED_CONTAINER") {
            config.preferred_container = container;
        }
        if let Some(url) = var("METOOL_YT_DLP_URL") {
            config.host.yt_dlp_url = url;
        }
        if let Some(url) = var("METOOL_FFMPEG_URL") {
            config.host.ffmpeg_url = url;
        }

        config
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.log_capacity, 50);
        assert_eq!(config.preferred_container, "mp4");
        assert!(config.host.bin_dir.ends_with("bin"));
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("METOOL_DATA_DIR", "/srv/metool"),
            ("METOOL_PREFERRED_CONTAINER", "webm"),
            ("METOOL_YT_DLP_URL", "http://mirror.local/yt-dlp"),
        ]);
        let config = AppConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/srv/metool"));
        assert_eq!(config.host.bin_dir, PathBuf::from("/srv/metool/bin"));
        assert_eq!(config.settings_path(), PathBuf::from("/srv/metool/settings.json"));
        assert_eq!(config.preferred_container, "webm");
        assert_eq!(config.host.yt_dlp_url, "http://mirror.local/yt-dlp");
    }
}
