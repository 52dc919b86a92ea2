//! Scripted in-memory host for exercising the core without processes.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{Host, HostError, Result};
use crate::domain::{DependencyName, DownloadRequest, FormatOption, VideoMetadata};

#[derive(Default)]
struct FakeState {
    installed: BTreeSet<DependencyName>,
    failing_installs: BTreeSet<DependencyName>,
    /// Installs that report success without producing the binary.
    hollow_installs: BTreeSet<DependencyName>,
    metadata: Option<VideoMetadata>,
    download_path: Option<PathBuf>,
    reveal_fails: bool,
    install_calls: Vec<(DependencyName, String)>,
    download_calls: Vec<DownloadRequest>,
    reveal_calls: Vec<PathBuf>,
}

#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed(self, names: &[DependencyName]) -> Self {
        self.state.lock().unwrap().installed.extend(names.iter().copied());
        self
    }

    pub fn with_metadata(self, metadata: VideoMetadata) -> Self {
        self.state.lock().unwrap().metadata = Some(metadata);
        self
    }

    pub fn with_download_path(self, path: impl Into<PathBuf>) -> Self {
        self.state.lock().unwrap().download_path = Some(path.into());
        self
    }

    pub fn failing_install(self, name: DependencyName) -> Self {
        self.state.lock().unwrap().failing_installs.insert(name);
        self
    }

    pub fn hollow_install(self, name: DependencyName) -> Self {
        self.state.lock().unwrap().hollow_installs.insert(name);
        self
    }

    pub fn failing_reveal(self) -> Self {
        self.state.lock().unwrap().reveal_fails = true;
        self
    }

    pub fn uninstall(&self, name: DependencyName) {
        self.state.lock().unwrap().installed.remove(&name);
    }

    pub fn install_calls(&self) -> Vec<(DependencyName, String)> {
        self.state.lock().unwrap().install_calls.clone()
    }

    pub fn download_calls(&self) -> Vec<DownloadRequest> {
        self.state.lock().unwrap().download_calls.clone()
    }

    pub fn reveal_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().reveal_calls.clone()
    }
}

impl Host for FakeHost {
    fn check_dependency(&self, name: DependencyName) -> BoxFuture<'static, bool> {
        let state = self.state.clone();
        async move { state.lock().unwrap().installed.contains(&name) }.boxed()
    }

    fn install_dependency(
        &self,
        name: DependencyName,
        locale: String,
    ) -> BoxFuture<'static, Result<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().unwrap();
            state.install_calls.push((name, locale));
            if state.failing_installs.contains(&name) {
                return Err(HostError::Process {
                    tool: name.to_string(),
                    code: Some(1),
                    stderr: "network unreachable".to_string(),
                });
            }
            if !state.hollow_installs.contains(&name) {
                state.installed.insert(name);
            }
            Ok(())
        }
        .boxed()
    }

    fn fetch_metadata(&self, url: String) -> BoxFuture<'static, Result<VideoMetadata>> {
        let state = self.state.clone();
        async move {
            state
                .lock()
                .unwrap()
                .metadata
                .clone()
                .ok_or_else(|| HostError::InvalidMetadata(format!("unsupported source: {}", url)))
        }
        .boxed()
    }

    fn download(&self, request: DownloadRequest) -> BoxFuture<'static, Result<PathBuf>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().unwrap();
            state.download_calls.push(request);
            state.download_path.clone().ok_or_else(|| HostError::Process {
                tool: DependencyName::YtDlp.to_string(),
                code: Some(1),
                stderr: "ERROR: Requested format is not available".to_string(),
            })
        }
        .boxed()
    }

    fn reveal_path(&self, path: PathBuf) -> BoxFuture<'static, Result<()>> {
        let state = self.state.clone();
        async move {
            let mut state = state.lock().unwrap();
            state.reveal_calls.push(path);
            if state.reveal_fails {
                Err(HostError::Io(std::io::Error::other("no file browser")))
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn pick_destination(&self) -> BoxFuture<'static, Option<PathBuf>> {
        async { Some(PathBuf::from("/tmp/picked")) }.boxed()
    }

    fn install_dir(&self) -> BoxFuture<'static, PathBuf> {
        async { PathBuf::from("/opt/metool/bin") }.boxed()
    }

    fn app_version(&self) -> BoxFuture<'static, Result<String>> {
        async { Ok("0.0.0-test".to_string()) }.boxed()
    }
}

pub fn format(id: &str, ext: &str, height: u32) -> FormatOption {
    FormatOption {
        format_id: id.to_string(),
        resolution: format!("{}p", height),
        extension: ext.to_string(),
        height_class: height,
        size_bytes: None,
    }
}

pub fn sample_metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Sample clip".to_string(),
        formats: vec![
            format("a", "webm", 1080),
            format("b", "mp4", 1080),
            format("c", "mp4", 720),
        ],
    }
}
