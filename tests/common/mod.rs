/*!
 * Common test utilities for the chapsplit test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use chapsplit::encoding::EncodeSettings;
use chapsplit::naming::NameSanitizer;
use chapsplit::planning::{Chapter, SegmentPlan, SegmentPlanner};

/// Route library logs through the test harness; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample SRT file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, SAMPLE_SRT)
}

pub const SAMPLE_SRT: &str = r#"1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:09,000
It contains multiple entries.

3
00:00:10,000 --> 00:00:14,000
For testing purposes.
"#;

pub const SAMPLE_VTT: &str = "WEBVTT - sample

NOTE this block is ignored

intro
00:01.000 --> 00:04.000 align:start
<v Host>Welcome</v> to the <i>show</i>

00:00:05.000 --> 00:00:09.000
Second cue
";

/// Chapters from `(title, start, end)` triples, indexed from 1
pub fn chapters(spec: &[(&str, f64, f64)]) -> Vec<Chapter> {
    spec.iter()
        .enumerate()
        .map(|(i, (title, start, end))| Chapter::new(i + 1, *title, *start, *end).unwrap())
        .collect()
}

/// Plan with the default naming template
pub fn plan_for(spec: &[(&str, f64, f64)], duration_s: f64) -> SegmentPlan {
    SegmentPlanner::new(&NameSanitizer::default())
        .plan(&chapters(spec), duration_s)
        .unwrap()
}

/// A placeholder media file; the mock executor never reads it
pub fn create_media_file(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, "not really a video")
}

/// Default settings with a given worker count and retry budget
pub fn settings(max_workers: usize, max_retries: u32) -> EncodeSettings {
    EncodeSettings {
        max_workers,
        max_retries,
        ..EncodeSettings::default()
    }
}
