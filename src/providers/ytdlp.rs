/*!
 * Remote videos through yt-dlp.
 *
 * Metadata comes from `yt-dlp --dump-json`. The media is downloaded into the
 * work directory as `<id>.<ext>` and reused on later runs.
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use url::Url;

use crate::app_config::Config;
use crate::encoding::ffmpeg::{run_tool, ToolError};
use crate::errors::AcquisitionError;
use crate::file_utils::FileManager;
use crate::providers::local::find_sidecar_subtitle;
use crate::providers::{chapters_or_whole, MediaProvider, SourceMedia};

// @const: Timeouts for the different yt-dlp calls
const VERSION_TIMEOUT_SECS: u64 = 10;
const METADATA_TIMEOUT_SECS: u64 = 60;
const DOWNLOAD_TIMEOUT_SECS: u64 = 1800;
const SUBTITLE_TIMEOUT_SECS: u64 = 180;

// @const: Hosts whose URLs must carry an 11 character video id
const YOUTUBE_HOSTS: [&str; 3] = ["youtube.com", "www.youtube.com", "m.youtube.com"];
const SHORT_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

/// Options for remote acquisition
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    pub ytdlp_bin: String,
    /// Where downloads land
    pub work_dir: PathBuf,
    /// Highest video height to request
    pub max_height: u32,
    /// Container passed to `--merge-output-format`
    pub merge_format: String,
    /// Download subtitles along with the video
    pub subtitles: bool,
    pub languages: Vec<String>,
    /// Explicit subtitle file, used instead of downloading one
    pub subtitle_file: Option<PathBuf>,
}

impl YtDlpOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdlp_bin: "yt-dlp".to_string(),
            work_dir: config.work_dir.clone(),
            max_height: config.max_height(),
            merge_format: config.video_format.extension().to_string(),
            subtitles: config.subtitles.enabled,
            languages: config.subtitles.languages.clone(),
            subtitle_file: None,
        }
    }
}

/// Metadata extracted from `--dump-json`
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub duration_s: f64,
    /// `(title, start_s, end_s)` as reported
    pub chapters: Vec<(String, f64, f64)>,
}

/// Provider backed by the yt-dlp command line tool
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    options: YtDlpOptions,
}

impl YtDlpProvider {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    async fn run(&self, args: Vec<String>, timeout_secs: u64) -> Result<std::process::Output, AcquisitionError> {
        run_tool(&self.options.ytdlp_bin, &args, timeout_secs)
            .await
            .map_err(|e| match e {
                ToolError::NotFound(msg) => AcquisitionError::ToolMissing(msg),
                ToolError::Io(msg) => AcquisitionError::Unavailable(msg),
                ToolError::Timeout(secs) => {
                    AcquisitionError::Unavailable(format!("yt-dlp did not finish within {}s", secs))
                }
            })
    }

    async fn check_tool(&self) -> Result<(), AcquisitionError> {
        let output = self.run(vec!["--version".to_string()], VERSION_TIMEOUT_SECS).await?;
        if !output.status.success() {
            return Err(AcquisitionError::ToolMissing(format!(
                "{} --version exited with {:?}",
                self.options.ytdlp_bin,
                output.status.code()
            )));
        }
        debug!("yt-dlp version {}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, AcquisitionError> {
        let args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];
        let output = self.run(args, METADATA_TIMEOUT_SECS).await?;
        if !output.status.success() {
            return Err(AcquisitionError::Unavailable(format!(
                "metadata extraction failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_metadata(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(&self, url: &str, id: &str) -> Result<PathBuf, AcquisitionError> {
        let work_dir = &self.options.work_dir;
        tokio::fs::create_dir_all(work_dir).await?;

        if let Some(existing) = find_download(work_dir, id, &self.options.merge_format) {
            if FileManager::is_non_empty_file(&existing) {
                info!("Reusing downloaded media {:?}", existing);
                return Ok(existing);
            }
        }

        let template = work_dir.join(format!("{}.%(ext)s", id));
        let mut last_error = String::new();
        for format in format_ladder(self.options.max_height) {
            info!("Downloading {} with format '{}'", url, format);
            let args = vec![
                "--format".to_string(),
                format,
                "--output".to_string(),
                template.to_string_lossy().to_string(),
                "--merge-output-format".to_string(),
                self.options.merge_format.clone(),
                "--no-warnings".to_string(),
                url.to_string(),
            ];
            let output = self.run(args, DOWNLOAD_TIMEOUT_SECS).await?;
            if output.status.success() {
                return find_download(work_dir, id, &self.options.merge_format).ok_or_else(|| {
                    AcquisitionError::Unavailable(format!("downloaded file for {} not found in {:?}", id, work_dir))
                });
            }
            last_error = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Download attempt failed: {}", last_error);
        }

        Err(AcquisitionError::Unavailable(format!("download failed: {}", last_error)))
    }

    async fn subtitles(&self, url: &str, media_path: &Path) -> Option<PathBuf> {
        if let Some(explicit) = &self.options.subtitle_file {
            return Some(explicit.clone());
        }
        if !self.options.subtitles {
            return None;
        }
        if let Some(existing) = find_sidecar_subtitle(media_path, &self.options.languages) {
            return Some(existing);
        }

        let stem = media_path.file_stem()?.to_string_lossy().to_string();
        let template = self.options.work_dir.join(format!("{}.%(ext)s", stem));
        let args = vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            self.options.languages.join(","),
            "--convert-subs".to_string(),
            "srt".to_string(),
            "--output".to_string(),
            template.to_string_lossy().to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];

        match self.run(args, SUBTITLE_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                warn!(
                    "Subtitle download failed, continuing without subtitles: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return None;
            }
            Err(e) => {
                warn!("Subtitle download failed, continuing without subtitles: {}", e);
                return None;
            }
        }

        let found = find_sidecar_subtitle(media_path, &self.options.languages);
        if found.is_none() {
            info!("No subtitles available in {:?}", self.options.languages);
        }
        found
    }
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn supports(&self, source: &str) -> bool {
        is_remote_source(source)
    }

    async fn fetch(&self, source: &str) -> Result<SourceMedia, AcquisitionError> {
        let url = Url::parse(source).map_err(|e| AcquisitionError::Unavailable(format!("invalid URL {}: {}", source, e)))?;
        let host = url.host_str().unwrap_or_default();
        if (YOUTUBE_HOSTS.contains(&host) || SHORT_HOSTS.contains(&host)) && youtube_video_id(source).is_none() {
            return Err(AcquisitionError::Unavailable(format!("{} does not name a single video", source)));
        }

        self.check_tool().await?;
        let metadata = self.fetch_metadata(source).await?;
        info!(
            "{} ({}): {} chapters",
            metadata.title,
            metadata.id,
            metadata.chapters.len()
        );

        let media_path = self.download(source, &metadata.id).await?;
        let subtitle_path = self.subtitles(source, &media_path).await;
        let chapters = chapters_or_whole(metadata.chapters, &metadata.title, metadata.duration_s);

        Ok(SourceMedia {
            media_path,
            duration_s: metadata.duration_s,
            chapters,
            subtitle_path,
            video_id: metadata.id,
            title: metadata.title,
            downloaded: true,
        })
    }
}

/// Whether `source` is an http(s) URL
pub fn is_remote_source(source: &str) -> bool {
    Url::parse(source)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extract the 11 character id from a YouTube watch or short URL
pub fn youtube_video_id(source: &str) -> Option<String> {
    let url = Url::parse(source).ok()?;
    let host = url.host_str()?;

    let candidate = if SHORT_HOSTS.contains(&host) {
        url.path().trim_start_matches('/').to_string()
    } else if YOUTUBE_HOSTS.contains(&host) {
        let mut ids = url.query_pairs().filter(|(key, _)| key == "v").map(|(_, value)| value.to_string());
        let id = ids.next()?;
        if ids.next().is_some() {
            return None;
        }
        id
    } else {
        return None;
    };

    (candidate.chars().count() == 11).then_some(candidate)
}

/// Format selectors tried in order, capped at `max_height`
pub fn format_ladder(max_height: u32) -> Vec<String> {
    vec![
        format!("bv*[height<={}][vcodec^=avc1]+ba/best", max_height),
        format!("bv*[height<={}]+ba/best", max_height),
        format!("bestvideo[height<={}]+bestaudio/best", max_height),
        "best".to_string(),
    ]
}

/// Parse `yt-dlp --dump-json` output
pub fn parse_metadata(json: &str) -> Result<VideoMetadata, AcquisitionError> {
    let info: Value = serde_json::from_str(json)
        .map_err(|e| AcquisitionError::InvalidMetadata(format!("metadata is not JSON: {}", e)))?;

    let id = info
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AcquisitionError::InvalidMetadata("missing video id".to_string()))?
        .to_string();

    let title = info
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Untitled")
        .to_string();

    let duration_s = info
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| AcquisitionError::InvalidMetadata("missing or invalid duration".to_string()))?;

    let chapters = info
        .get("chapters")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(position, entry)| {
                    let start = entry.get("start_time").and_then(Value::as_f64).unwrap_or(0.0);
                    let end = entry.get("end_time").and_then(Value::as_f64).unwrap_or(start);
                    let title = entry
                        .get("title")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Chapter {}", position + 1));
                    (end > start).then_some((title, start, end))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(VideoMetadata {
        id,
        title,
        duration_s,
        chapters,
    })
}

// `<id>.<ext>` first, then any other `<id>.*` media file
fn find_download(work_dir: &Path, id: &str, extension: &str) -> Option<PathBuf> {
    let expected = work_dir.join(format!("{}.{}", id, extension));
    if expected.is_file() {
        return Some(expected);
    }

    let prefix = format!("{}.", id);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(work_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map(|name| name.to_string_lossy().starts_with(&prefix))
                    .unwrap_or(false)
                && !matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("srt") | Some("vtt") | Some("part") | Some("json")
                )
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}
