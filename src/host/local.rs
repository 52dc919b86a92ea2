use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::Client;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use url::Url;

use super::models::{HostConfig, RawMetadata};
use super::{Host, HostError, HostEvents, Result};
use crate::domain::{DependencyName, DownloadRequest, VideoMetadata};
use crate::utils::executable_name;

const STDERR_TAIL_LINES: usize = 20;

/// Host backed by the local machine: managed binaries under `bin_dir`,
/// yt-dlp child processes, and native dialogs.
#[derive(Clone)]
pub struct LocalHost {
    config: Arc<HostConfig>,
    events: HostEvents,
    client: Client,
}

impl LocalHost {
    pub fn new(config: HostConfig, events: HostEvents) -> Self {
        Self {
            config: Arc::new(config),
            events,
            client: Client::new(),
        }
    }

    pub fn binary_path(&self, name: DependencyName) -> PathBuf {
        self.config.bin_dir.join(executable_name(name.as_str()))
    }

    async fn is_installed(&self, name: DependencyName) -> bool {
        match tokio::fs::metadata(self.binary_path(name)).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    async fn require(&self, name: DependencyName) -> Result<PathBuf> {
        if self.is_installed(name).await {
            Ok(self.binary_path(name))
        } else {
            Err(HostError::MissingTool(name))
        }
    }

    /// Streams `source` into `target` through a `.part` file, renamed once complete.
    async fn download_file(&self, source: &str, target: &Path, locale: &str) -> Result<u64> {
        let url = Url::parse(source)?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, locale)
            .send()
            .await?
            .error_for_status()?;

        let partial = target.with_extension("part");
        let saved = async {
            let written = write_body(response, &partial).await?;
            tokio::fs::rename(&partial, target).await?;
            Ok::<_, HostError>(written)
        }
        .await;

        if saved.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        saved
    }

    async fn install_yt_dlp(&self, locale: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.bin_dir).await?;
        let target = self.binary_path(DependencyName::YtDlp);
        let bytes = self
            .download_file(&self.config.yt_dlp_url, &target, locale)
            .await?;
        make_executable(&target).await?;
        tracing::info!(bytes, path = %target.display(), "yt-dlp installed");
        Ok(())
    }

    async fn install_ffmpeg(&self, locale: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.bin_dir).await?;
        let archive_name = if cfg!(target_os = "windows") {
            "ffmpeg.zip"
        } else {
            "ffmpeg.tar.xz"
        };
        let archive = self.config.bin_dir.join(archive_name);
        self.download_file(&self.config.ffmpeg_url, &archive, locale)
            .await?;

        let target = self.binary_path(DependencyName::Ffmpeg);
        let extracted = if cfg!(target_os = "windows") {
            let (archive, target) = (archive.clone(), target.clone());
            tokio::task::spawn_blocking(move || extract_zip_entry(&archive, "ffmpeg.exe", &target))
                .await
                .map_err(std::io::Error::other)?
        } else {
            extract_tarball(&archive, &self.config.bin_dir).await
        };

        let _ = tokio::fs::remove_file(&archive).await;
        extracted?;
        make_executable(&target).await?;
        tracing::info!(path = %target.display(), "ffmpeg installed");
        Ok(())
    }

    async fn resolve(&self, url: String) -> Result<VideoMetadata> {
        let yt_dlp = self.require(DependencyName::YtDlp).await?;
        let output = Command::new(&yt_dlp)
            .args(["-J", "--no-playlist", "--no-warnings"])
            .arg(&url)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(HostError::Process {
                tool: DependencyName::YtDlp.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw: RawMetadata = serde_json::from_slice(&output.stdout)
            .map_err(|e| HostError::InvalidMetadata(format!("JSON decode error: {}", e)))?;
        raw.narrow()
    }

    async fn run_download(&self, request: DownloadRequest) -> Result<PathBuf> {
        let yt_dlp = self.require(DependencyName::YtDlp).await?;
        let destination = request
            .destination
            .clone()
            .unwrap_or_else(|| self.config.download_dir.clone());
        tokio::fs::create_dir_all(&destination).await?;

        tracing::info!(url = %request.url, format = %request.format_id, dest = %destination.display(), "starting download");

        let mut child = Command::new(&yt_dlp)
            .args(download_args(&request))
            .arg("--ffmpeg-location")
            .arg(&self.config.bin_dir)
            .arg("-P")
            .arg(&destination)
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take();
        let events = self.events.clone();
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    events.emit(line.clone());
                    tail.push(line);
                    if tail.len() > STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                }
            }
            tail
        });

        let mut saved = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(path) = saved_path_from(&line) {
                    saved = Some(path);
                }
                self.events.emit(line);
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(HostError::Process {
                tool: DependencyName::YtDlp.to_string(),
                code: status.code(),
                stderr: stderr_tail.join("\n"),
            });
        }

        saved.ok_or(HostError::NoOutputPath(DependencyName::YtDlp))
    }
}

impl Host for LocalHost {
    fn check_dependency(&self, name: DependencyName) -> BoxFuture<'static, bool> {
        let host = self.clone();
        async move { host.is_installed(name).await }.boxed()
    }

    fn install_dependency(
        &self,
        name: DependencyName,
        locale: String,
    ) -> BoxFuture<'static, Result<()>> {
        let host = self.clone();
        async move {
            tracing::info!(%name, %locale, "installing tool");
            host.events.emit(format!("[setup] Installing {}", name));
            match name {
                DependencyName::YtDlp => host.install_yt_dlp(&locale).await,
                DependencyName::Ffmpeg => host.install_ffmpeg(&locale).await,
            }
        }
        .boxed()
    }

    fn fetch_metadata(&self, url: String) -> BoxFuture<'static, Result<VideoMetadata>> {
        let host = self.clone();
        async move { host.resolve(url).await }.boxed()
    }

    fn download(&self, request: DownloadRequest) -> BoxFuture<'static, Result<PathBuf>> {
        let host = self.clone();
        async move { host.run_download(request).await }.boxed()
    }

    fn reveal_path(&self, path: PathBuf) -> BoxFuture<'static, Result<()>> {
        async move { reveal(&path) }.boxed()
    }

    fn pick_destination(&self) -> BoxFuture<'static, Option<PathBuf>> {
        let start = self.config.download_dir.clone();
        async move {
            rfd::AsyncFileDialog::new()
                .set_title("Choose download folder")
                .set_directory(&start)
                .pick_folder()
                .await
                .map(|handle| handle.path().to_path_buf())
        }
        .boxed()
    }

    fn install_dir(&self) -> BoxFuture<'static, PathBuf> {
        let dir = self.config.bin_dir.clone();
        async move { dir }.boxed()
    }

    fn app_version(&self) -> BoxFuture<'static, Result<String>> {
        let version = self.config.app_version.clone();
        async move { Ok(version) }.boxed()
    }
}

fn download_args(request: &DownloadRequest) -> Vec<String> {
    let height = request.height_class;
    vec![
        "-f".to_string(),
        format!(
            "{}+bestaudio/bestvideo[height<={h}]+bestaudio/best[height<={h}]/best",
            request.format_id,
            h = height
        ),
        "--merge-output-format".to_string(),
        request.extension.clone(),
        "-o".to_string(),
        "%(title)s.%(ext)s".to_string(),
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
    ]
}

/// `--print after_move:filepath` writes the bare path; every other stdout
/// line carries a `[tag]` prefix.
fn saved_path_from(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('[') {
        return None;
    }
    Some(PathBuf::from(line))
}

fn extract_zip_entry(archive: &Path, entry_suffix: &str, target: &Path) -> Result<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.name().ends_with(entry_suffix) {
            let mut out = std::fs::File::create(target)?;
            std::io::copy(&mut entry, &mut out)?;
            return Ok(());
        }
    }

    Err(HostError::Archive(zip::result::ZipError::FileNotFound))
}

async fn extract_tarball(archive: &Path, into: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(into)
        .arg("--strip-components=1")
        .output()
        .await?;

    if !output.status.success() {
        return Err(HostError::Process {
            tool: "tar".to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.sync_all().await?;
    Ok(written)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn reveal(path: &Path) -> Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut command = Command::new("explorer");
        command.arg(format!("/select,{}", path.display()));
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg("-R").arg(path);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(path.parent().unwrap_or(path));
        command
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}
