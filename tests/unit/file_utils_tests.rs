/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use chapsplit::file_utils::{FileManager, FileType};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use crate::common;

#[test]
fn test_detect_file_type_withKnownExtensions_shouldClassify() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_media_file(temp_dir.path(), "talk.MKV")?;
    let subtitle = common::create_test_subtitle(temp_dir.path(), "talk.srt")?;
    let chapters = common::create_test_file(temp_dir.path(), "chapters.txt", "00:00 Intro\n")?;

    assert_eq!(FileManager::detect_file_type(&video)?, FileType::Video);
    assert_eq!(FileManager::detect_file_type(&subtitle)?, FileType::Subtitle);
    assert_eq!(FileManager::detect_file_type(&chapters)?, FileType::ChapterList);
    Ok(())
}

#[test]
fn test_detect_file_type_withUnknownExtension_shouldSniffContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let captions = common::create_test_file(temp_dir.path(), "captions.data", common::SAMPLE_VTT)?;
    let other = common::create_test_file(temp_dir.path(), "notes.data", "nothing to see")?;

    assert_eq!(FileManager::detect_file_type(&captions)?, FileType::Subtitle);
    assert_eq!(FileManager::detect_file_type(&other)?, FileType::Unknown);
    Ok(())
}

#[test]
fn test_detect_file_type_withMissingFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    assert!(FileManager::detect_file_type(temp_dir.path().join("gone.mp4")).is_err());
    Ok(())
}

#[test]
fn test_video_output_dir_withTitleAndId_shouldJoinUnderOutDir() {
    let replace: BTreeMap<char, String> = [('/', "-".to_string())].into_iter().collect();

    let dir = FileManager::video_output_dir("/out", "Rust / Async", "dQw4w9WgXcQ", &replace);

    assert_eq!(dir.parent(), Some(PathBuf::from("/out").as_path()));
    let name = dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.ends_with("-dQw4w9WgXcQ"), "{}", name);
    assert!(!name.contains('/'));
}

#[test]
fn test_segment_output_path_withStem_shouldAppendExtension() {
    assert_eq!(
        FileManager::segment_output_path("/out/talk", "03 - Q&A", "mkv"),
        PathBuf::from("/out/talk/03 - Q&A.mkv")
    );
}

#[test]
fn test_promote_partial_withFinishedFile_shouldReplaceFinal() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let final_path = temp_dir.path().join("01 - Intro.mp4");
    let partial = FileManager::partial_path(&final_path);
    fs::write(&final_path, "old")?;
    fs::write(&partial, "new")?;

    FileManager::promote_partial(&partial, &final_path)?;

    assert!(!partial.exists());
    assert_eq!(fs::read_to_string(&final_path)?, "new");
    Ok(())
}

#[test]
fn test_append_to_log_file_withTwoLines_shouldKeepBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let log = temp_dir.path().join("logs").join("issues.log");

    FileManager::append_to_log_file(&log, "first problem")?;
    FileManager::append_to_log_file(&log, "second problem")?;

    let content = FileManager::read_to_string(&log)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("first problem"));
    assert!(lines[1].ends_with("second problem"));
    Ok(())
}

#[test]
fn test_ensure_dir_withNestedPath_shouldCreateAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("a").join("b").join("c");

    FileManager::ensure_dir(&nested)?;
    FileManager::ensure_dir(&nested)?;

    assert!(FileManager::dir_exists(&nested));
    assert!(!FileManager::file_exists(&nested));
    Ok(())
}
