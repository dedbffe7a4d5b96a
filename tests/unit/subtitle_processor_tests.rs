/*!
 * Tests for subtitle parsing and writing
 */

use anyhow::Result;
use chapsplit::errors::SubtitleError;
use chapsplit::subtitle_processor::{SubtitleDialect, SubtitleEntry, SubtitleTrack};
use crate::common;

/// Test SRT file parsing
#[test]
fn test_parseFile_withSrtFile_shouldReadEveryEntry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "talk.en.srt")?;

    let track = SubtitleTrack::parse_file(&path)?;

    assert_eq!(track.dialect, SubtitleDialect::Srt);
    assert_eq!(track.language.as_deref(), Some("en"));
    assert_eq!(track.source_file.as_deref(), Some(path.as_path()));
    assert_eq!(track.entries.len(), 3);
    assert_eq!(track.entries[1], SubtitleEntry::new(2, 5000, 9000, "It contains multiple entries."));
    Ok(())
}

/// Test WebVTT parsing with header, notes, identifiers, settings and inline tags
#[test]
fn test_parseStr_withWebVtt_shouldNormalizeCues() -> Result<()> {
    let track = SubtitleTrack::parse_str(common::SAMPLE_VTT)?;

    assert_eq!(track.dialect, SubtitleDialect::WebVtt);
    assert_eq!(
        track.entries,
        vec![
            SubtitleEntry::new(1, 1000, 4000, "Welcome to the show"),
            SubtitleEntry::new(2, 5000, 9000, "Second cue"),
        ]
    );
    Ok(())
}

#[test]
fn test_parseStr_withWindowsLineEndings_shouldParse() -> Result<()> {
    let content = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\nThere\r\n";
    let track = SubtitleTrack::parse_str(content)?;
    assert_eq!(track.entries.len(), 2);
    assert_eq!(track.entries[1].text, "There");
    Ok(())
}

#[test]
fn test_parseStr_withMalformedTimingLine_shouldReportLine() {
    let content = "1\n00:00:01,000 --> 00:00:02,000\nFine\n\n2\n00:00:03,000 --> 00:0x:04,000\nBroken\n";
    let err = SubtitleTrack::parse_str(content).unwrap_err();
    match err {
        SubtitleError::InvalidTimestamp { line, text } => {
            assert_eq!(line, 6);
            assert!(text.contains("00:0x:04"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_parseStr_withInvertedCue_shouldSkipAndRenumber() -> Result<()> {
    let content = "1\n00:00:05,000 --> 00:00:04,000\nBackwards\n\n2\n00:00:06,000 --> 00:00:07,000\nForward\n";
    let track = SubtitleTrack::parse_str(content)?;
    assert_eq!(track.entries, vec![SubtitleEntry::new(1, 6000, 7000, "Forward")]);
    Ok(())
}

#[test]
fn test_parseFile_withMissingFile_shouldReturnIoError() {
    let err = SubtitleTrack::parse_file("/no/such/dir/file.srt").unwrap_err();
    assert!(matches!(err, SubtitleError::Io { .. }));
}

/// Test that a parsed WebVTT track is written back as SRT
#[test]
fn test_writeSrt_withWebVttSource_shouldWriteCommaBasedSrt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let track = SubtitleTrack::parse_str(common::SAMPLE_VTT)?;
    let out = temp_dir.path().join("nested").join("out.srt");

    track.write_srt(&out)?;

    let written = std::fs::read_to_string(&out)?;
    assert_eq!(
        written,
        "1\n00:00:01,000 --> 00:00:04,000\nWelcome to the show\n\n2\n00:00:05,000 --> 00:00:09,000\nSecond cue\n\n"
    );
    assert!(!written.contains('\r'));

    let reparsed = SubtitleTrack::parse_file(&out)?;
    assert_eq!(reparsed.entries, track.entries);
    Ok(())
}
