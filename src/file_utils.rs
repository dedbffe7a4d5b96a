use anyhow::{Context, Result};
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::naming;
use crate::subtitle_processor::SubtitleDialect;

// @module: File and directory utilities

// @const: Issue log written next to the segments of a run
pub const ISSUES_LOG_NAME: &str = "chapsplit.issues.log";

// @const: Extensions treated as video without probing
const VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @checks: Regular file with at least one byte
    pub fn is_non_empty_file<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(path.as_ref())
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    // @generates: Per-video output directory `<out_dir>/<safe title>-<video id>`
    pub fn video_output_dir<P: AsRef<Path>>(
        out_dir: P,
        video_title: &str,
        video_id: &str,
        replace_chars: &BTreeMap<char, String>,
    ) -> PathBuf {
        out_dir.as_ref().join(naming::output_dir_name(video_title, video_id, replace_chars))
    }

    // @generates: Final path of a segment, `<dir>/<stem>.<ext>`
    pub fn segment_output_path<P: AsRef<Path>>(dir: P, stem: &str, extension: &str) -> PathBuf {
        dir.as_ref().join(format!("{}.{}", stem, extension))
    }

    // @generates: In-progress path for `final_path`, `<stem>.partial.<ext>`
    pub fn partial_path<P: AsRef<Path>>(final_path: P) -> PathBuf {
        let final_path = final_path.as_ref();
        let stem = final_path.file_stem().unwrap_or_default().to_string_lossy();
        let name = match final_path.extension() {
            Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
            None => format!("{}.partial", stem),
        };
        final_path.with_file_name(name)
    }

    /// Move a finished partial file to its final name
    pub fn promote_partial<P1: AsRef<Path>, P2: AsRef<Path>>(partial: P1, final_path: P2) -> Result<()> {
        let (partial, final_path) = (partial.as_ref(), final_path.as_ref());
        fs::rename(partial, final_path)
            .with_context(|| format!("Failed to move {} to {}", partial.display(), final_path.display()))
    }

    /// Remove a file, ignoring a missing one
    pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
        }
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file through a temporary sibling, so readers never see half a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(parent)?;
        }

        let tmp = Self::partial_path(path);
        fs::write(&tmp, content).with_context(|| format!("Failed to write to file: {:?}", tmp))?;
        Self::promote_partial(&tmp, path)
    }

    /// Append content to a log file with timestamp
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path.as_ref()))?;

        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to log file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Detect whether a local file is a video, a subtitle track or a chapter list
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            match ext_str.as_str() {
                "srt" | "vtt" => return Ok(FileType::Subtitle),
                "txt" => return Ok(FileType::ChapterList),
                e if VIDEO_EXTENSIONS.contains(&e) => return Ok(FileType::Video),
                _ => {}
            }
        }

        // Unknown extension: sniff text content for cue timings
        if let Ok(content) = fs::read_to_string(path) {
            if content.contains("-->") && SubtitleDialect::sniff(&content).is_ok() {
                return Ok(FileType::Subtitle);
            }
        }

        Ok(FileType::Unknown)
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file (SRT or WebVTT)
    Subtitle,
    /// Video file supported by ffmpeg
    Video,
    /// Plain text chapter list
    ChapterList,
    /// Unknown file type
    Unknown,
}
