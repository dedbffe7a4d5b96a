/*!
 * Local media files.
 *
 * Chapters come from, in order of preference:
 * 1. a chapter list file (`<timecode> <title>` per line)
 * 2. the chapters embedded in the container, read with ffprobe
 * 3. a single chapter covering the whole file
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

use crate::app_config::Config;
use crate::encoding::executor::EncodeExecutor;
use crate::encoding::ffmpeg::run_tool;
use crate::errors::AcquisitionError;
use crate::file_utils::{FileManager, FileType};
use crate::planning::Chapter;
use crate::providers::{chapters_or_whole, MediaProvider, SourceMedia};
use crate::timecode::parse_timecode;

// @const: Timeout for the chapter probe
const CHAPTER_PROBE_TIMEOUT_SECS: u64 = 60;

// @const: Sidecar subtitle extensions, by preference
const SIDECAR_EXTENSIONS: [&str; 2] = ["srt", "vtt"];

/// Options for local acquisition
#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Explicit chapter list file
    pub chapters_file: Option<PathBuf>,
    /// Explicit subtitle file; sidecars are searched when unset
    pub subtitle_file: Option<PathBuf>,
    /// Languages tried for `<stem>.<lang>.srt` sidecars
    pub subtitle_languages: Vec<String>,
    pub ffprobe_bin: String,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            chapters_file: None,
            subtitle_file: None,
            subtitle_languages: Vec::new(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl LocalOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            subtitle_languages: config.subtitles.languages.clone(),
            ..Self::default()
        }
    }
}

/// Provider for media files already on disk
#[derive(Debug)]
pub struct LocalFileProvider {
    prober: Arc<dyn EncodeExecutor>,
    options: LocalOptions,
}

impl LocalFileProvider {
    /// `prober` measures the media duration
    pub fn new(prober: Arc<dyn EncodeExecutor>, options: LocalOptions) -> Self {
        Self { prober, options }
    }

    async fn embedded_chapters(&self, path: &Path) -> Vec<(String, f64, f64)> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_chapters".to_string(),
            "-show_format".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let output = match run_tool(&self.options.ffprobe_bin, &args, CHAPTER_PROBE_TIMEOUT_SECS).await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!("Chapter probe exited with {:?}", output.status.code());
                return Vec::new();
            }
            Err(e) => {
                debug!("Chapter probe unavailable: {:?}", e);
                return Vec::new();
            }
        };

        match parse_ffprobe_chapters(&String::from_utf8_lossy(&output.stdout)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring embedded chapters: {}", e);
                Vec::new()
            }
        }
    }

    fn subtitle_for(&self, media: &Path) -> Option<PathBuf> {
        if let Some(explicit) = &self.options.subtitle_file {
            if explicit.is_file() {
                return Some(explicit.clone());
            }
            warn!("Subtitle file {:?} not found, continuing without subtitles", explicit);
            return None;
        }
        find_sidecar_subtitle(media, &self.options.subtitle_languages)
    }
}

#[async_trait]
impl MediaProvider for LocalFileProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports(&self, source: &str) -> bool {
        Path::new(source).is_file()
    }

    async fn fetch(&self, source: &str) -> Result<SourceMedia, AcquisitionError> {
        let media_path = PathBuf::from(source);
        if !media_path.is_file() {
            return Err(AcquisitionError::Unavailable(format!("{} is not a file", source)));
        }

        match FileManager::detect_file_type(&media_path) {
            Ok(FileType::Subtitle) | Ok(FileType::ChapterList) => {
                return Err(AcquisitionError::Unavailable(format!("{} is not a media file", source)));
            }
            _ => {}
        }

        let duration_s = self.prober.probe_duration(&media_path).await?;
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(AcquisitionError::InvalidMetadata(format!(
                "{} reports a duration of {}s",
                source, duration_s
            )));
        }

        let title = media_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());

        let chapters = match &self.options.chapters_file {
            Some(list) => {
                let text = tokio::fs::read_to_string(list).await?;
                let chapters = parse_chapter_list(&text, duration_s)?;
                info!("Loaded {} chapters from {:?}", chapters.len(), list);
                chapters
            }
            None => {
                let raw = self.embedded_chapters(&media_path).await;
                if raw.is_empty() {
                    info!("No chapters found in {}, cutting it as a single segment", source);
                }
                chapters_or_whole(raw, &title, duration_s)
            }
        };

        Ok(SourceMedia {
            subtitle_path: self.subtitle_for(&media_path),
            media_path,
            duration_s,
            chapters,
            video_id: title.clone(),
            title,
            downloaded: false,
        })
    }
}

/// Parse a chapter list: one `<timecode> <title>` per line.
///
/// Blank lines and `#` comments are ignored and an optional `-` may separate
/// the timecode from the title. Starts must be strictly increasing; each chapter
/// ends where the next one starts and the last one ends at `duration_s`.
pub fn parse_chapter_list(text: &str, duration_s: f64) -> Result<Vec<Chapter>, AcquisitionError> {
    let mut marks: Vec<(usize, f64, String)> = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line_no = number + 1;
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (timecode, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let start_s = parse_timecode(timecode).map_err(|e| AcquisitionError::InvalidChapterList {
            line: line_no,
            reason: e.to_string(),
        })?;

        if let Some((previous_line, previous_start, _)) = marks.last() {
            if start_s <= *previous_start {
                return Err(AcquisitionError::InvalidChapterList {
                    line: line_no,
                    reason: format!("start {} is not after the chapter on line {}", timecode, previous_line),
                });
            }
        }

        let title = rest.trim().trim_start_matches('-').trim().to_string();
        marks.push((line_no, start_s, title));
    }

    let Some((last_line, last_start, _)) = marks.last() else {
        return Err(AcquisitionError::InvalidChapterList {
            line: 1,
            reason: "no chapter entries".to_string(),
        });
    };
    if *last_start >= duration_s {
        return Err(AcquisitionError::InvalidChapterList {
            line: *last_line,
            reason: format!("chapter starts at or after the end of the media ({}s)", duration_s),
        });
    }

    let starts: Vec<f64> = marks.iter().map(|(_, start, _)| *start).collect();
    let mut chapters = Vec::with_capacity(marks.len());
    for (position, (line_no, start_s, title)) in marks.into_iter().enumerate() {
        let index = position + 1;
        let end_s = starts.get(position + 1).copied().unwrap_or(duration_s);
        let title = if title.is_empty() { format!("Chapter {}", index) } else { title };
        let chapter = Chapter::new(index, title, start_s, end_s).map_err(|e| AcquisitionError::InvalidChapterList {
            line: line_no,
            reason: e.to_string(),
        })?;
        chapters.push(chapter);
    }
    Ok(chapters)
}

/// Extract `(title, start_s, end_s)` from `ffprobe -show_chapters -of json` output
pub fn parse_ffprobe_chapters(json: &str) -> Result<Vec<(String, f64, f64)>, AcquisitionError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| AcquisitionError::InvalidMetadata(format!("chapter probe output is not JSON: {}", e)))?;

    let Some(entries) = root.get("chapters").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut chapters = Vec::with_capacity(entries.len());
    for entry in entries {
        let start = seconds_field(entry, "start_time");
        let end = seconds_field(entry, "end_time");
        let (Some(start_s), Some(end_s)) = (start, end) else {
            warn!("Skipping embedded chapter without timing: {}", entry);
            continue;
        };
        let title = entry
            .pointer("/tags/title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        chapters.push((title, start_s, end_s));
    }
    Ok(chapters)
}

// ffprobe prints times as strings; accept plain numbers too
fn seconds_field(entry: &Value, key: &str) -> Option<f64> {
    match entry.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Find `<stem>.<lang>.srt`, `<stem>.<lang>.vtt`, then `<stem>.srt` or `<stem>.vtt`
/// next to `media`
pub fn find_sidecar_subtitle(media: &Path, languages: &[String]) -> Option<PathBuf> {
    let stem = media.file_stem()?.to_string_lossy().to_string();
    let stem = stem.as_str();
    let dir = media.parent().unwrap_or_else(|| Path::new("."));

    let with_language = languages
        .iter()
        .flat_map(|lang| SIDECAR_EXTENSIONS.iter().map(move |ext| format!("{}.{}.{}", stem, lang, ext)));
    let plain = SIDECAR_EXTENSIONS.iter().map(|ext| format!("{}.{}", stem, ext));

    with_language
        .chain(plain)
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
