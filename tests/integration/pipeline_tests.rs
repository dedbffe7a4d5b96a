/*!
 * End-to-end tests through the controller, with the scripted executor in place of ffmpeg
 */

use anyhow::Result;
use chapsplit::app_config::{Config, ManifestFormat};
use chapsplit::app_controller::{render_plan, Controller, SourceOverrides};
use chapsplit::encoding::mock::MockExecutor;
use chapsplit::encoding::{CancellationToken, SegmentStatus};
use chapsplit::errors::{AcquisitionError, AppError};
use chapsplit::file_utils::ISSUES_LOG_NAME;
use chapsplit::subtitle_processor::SubtitleTrack;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use crate::common;

const CHAPTER_LIST: &str = "# lecture chapters\n00:00 Welcome\n\n00:30 - Main part\n01:30 Questions?\n";

struct Fixture {
    temp_dir: TempDir,
    media: PathBuf,
    chapters: PathBuf,
    subtitles: PathBuf,
}

impl Fixture {
    fn new() -> Result<Self> {
        common::init_test_logging();
        let temp_dir = common::create_temp_dir()?;
        let media = common::create_media_file(temp_dir.path(), "lecture.mp4")?;
        let chapters = common::create_test_file(temp_dir.path(), "chapters.txt", CHAPTER_LIST)?;
        let subtitles = common::create_test_subtitle(temp_dir.path(), "lecture.en.srt")?;
        Ok(Self {
            temp_dir,
            media,
            chapters,
            subtitles,
        })
    }

    fn out_dir(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.out_dir = self.out_dir();
        config.work_dir = self.temp_dir.path().join("cache");
        config
    }

    fn overrides(&self) -> SourceOverrides {
        SourceOverrides {
            chapters_file: Some(self.chapters.clone()),
            subtitle_file: Some(self.subtitles.clone()),
        }
    }

    fn controller(&self, config: Config, mock: &MockExecutor) -> Result<Controller> {
        mock.set_duration(self.media.clone(), 120.0);
        Controller::with_executor(config, self.overrides(), Arc::new(mock.clone()))
    }

    fn source(&self) -> String {
        self.media.to_string_lossy().to_string()
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn subtitle_names(dir: &Path) -> Vec<String> {
    list_names(dir).into_iter().filter(|n| n.ends_with(".srt")).collect()
}

#[tokio::test]
async fn test_run_withLocalMediaChaptersAndSubtitles_shouldWriteEveryArtifact() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;

    let outcome = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    let output_dir = fixture.out_dir().join("lecture");
    assert_eq!(outcome.preview.output_dir, output_dir);
    assert_eq!(outcome.preview.plan.len(), 3);
    assert!(!outcome.has_failures());

    let report = outcome.report.as_ref().expect("a real run produces a report");
    assert_eq!(report.success_count, 3);
    assert!(report.segments.iter().all(|s| s.status == SegmentStatus::Done));
    let expected: Vec<f64> = report.segments.iter().map(|s| s.expected_duration_s).collect();
    assert_eq!(expected, vec![30.0, 60.0, 30.0]);

    assert_eq!(
        list_names(&output_dir),
        vec![
            "01 - Welcome.mp4",
            "01 - Welcome.srt",
            "02 - Main part.mp4",
            "02 - Main part.srt",
            "03 - Questions？.mp4",
            "03 - Questions？.srt",
            "manifest.json",
            "manifest.md",
        ]
    );
    assert_eq!(outcome.subtitle_files.len(), 3);
    assert_eq!(
        outcome.manifests,
        vec![output_dir.join("manifest.json"), output_dir.join("manifest.md")]
    );

    let first = SubtitleTrack::parse_file(output_dir.join("01 - Welcome.srt"))?;
    assert_eq!(first.entries.len(), 3);
    assert_eq!(fs::read_to_string(output_dir.join("02 - Main part.srt"))?, "");

    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(output_dir.join("manifest.json"))?)?;
    assert_eq!(manifest["segments"].as_array().map(Vec::len), Some(3));
    assert_eq!(manifest["segments"][2]["title"], "Questions?");
    Ok(())
}

#[tokio::test]
async fn test_run_withDryRun_shouldPlanWithoutWriting() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::working();
    let mut config = fixture.config();
    config.dry_run = true;
    let controller = fixture.controller(config, &mock)?;

    let outcome = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    assert!(outcome.report.is_none());
    assert!(outcome.manifests.is_empty());
    assert!(!outcome.has_failures());
    assert!(!fixture.out_dir().exists());
    assert_eq!(mock.encode_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_renderPlan_withPreview_shouldListSegmentsAndEstimate() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;

    let preview = controller.preview(&fixture.source()).await?;
    let rendered = render_plan(&preview);

    assert!(rendered.starts_with("lecture (lecture)"));
    assert!(rendered.contains("01 - Welcome"));
    assert!(rendered.contains("00:00:30.000"));
    assert!(rendered.contains("00:01:30.000"));
    assert!(rendered.contains("03 - Questions？"));
    assert!(rendered.contains("3 segment(s)"));
    assert!(rendered.contains("'veryfast'"));
    assert_eq!(preview.estimate.workers, 2);
    Ok(())
}

#[tokio::test]
async fn test_run_withMissingSource_shouldFailAcquisition() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;
    let missing = fixture.temp_dir.path().join("nope.mp4");

    let result = controller
        .run(&missing.to_string_lossy(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AppError::Acquisition(AcquisitionError::Unavailable(_)))
    ));
    assert_eq!(mock.encode_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_withBrokenChapterList_shouldReportLine() -> Result<()> {
    let fixture = Fixture::new()?;
    fs::write(&fixture.chapters, "00:00 Welcome\n00:20 Middle\n00:10 Backwards\n")?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;

    let result = controller.run(&fixture.source(), &CancellationToken::new()).await;

    match result {
        Err(AppError::Acquisition(AcquisitionError::InvalidChapterList { line, .. })) => assert_eq!(line, 3),
        other => panic!("unexpected result {:?}", other.map(|o| o.preview.plan.len())),
    }
    Ok(())
}

#[tokio::test]
async fn test_run_withUnreadableSubtitles_shouldStillEncodeAndLogIssue() -> Result<()> {
    let fixture = Fixture::new()?;
    fs::write(&fixture.subtitles, "this is not a caption file")?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;

    let outcome = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    let output_dir = fixture.out_dir().join("lecture");
    assert!(outcome.subtitle_files.is_empty());
    assert_eq!(outcome.report.as_ref().map(|r| r.success_count), Some(3));
    let issues = fs::read_to_string(output_dir.join(ISSUES_LOG_NAME))?;
    assert!(issues.contains("subtitles:"));
    Ok(())
}

#[tokio::test]
async fn test_run_withFailingEncoder_shouldReportFailuresAndLogThem() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::failing();
    let mut config = fixture.config();
    config.validation.max_retries = 0;
    config.manifest.export = vec![ManifestFormat::Json];
    let controller = fixture.controller(config, &mock)?;

    let outcome = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    assert!(outcome.has_failures());
    assert_eq!(outcome.report.as_ref().map(|r| r.failure_count), Some(3));
    assert_eq!(mock.encode_count(), 3);

    let output_dir = fixture.out_dir().join("lecture");
    let issues = fs::read_to_string(output_dir.join(ISSUES_LOG_NAME))?;
    assert_eq!(issues.lines().filter(|l| l.contains("encode failed")).count(), 3);
    assert!(output_dir.join("manifest.json").exists());
    assert!(!output_dir.join("manifest.md").exists());
    assert!(outcome.subtitle_files.is_empty());
    assert!(subtitle_names(&output_dir).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_run_withFailingEncoderAndStaleSubtitle_shouldRemoveIt() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::failing();
    let mut config = fixture.config();
    config.validation.max_retries = 0;
    let controller = fixture.controller(config, &mock)?;
    let output_dir = fixture.out_dir().join("lecture");
    fs::create_dir_all(&output_dir)?;
    fs::write(output_dir.join("02 - Main part.srt"), "stale")?;

    let outcome = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    assert_eq!(outcome.report.as_ref().map(|r| r.failure_count), Some(3));
    assert!(outcome.subtitle_files.is_empty());
    assert!(subtitle_names(&output_dir).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_run_withCancellationDuringEncode_shouldLeaveNoSegmentFiles() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::slow(2_000);
    let controller = fixture.controller(fixture.config(), &mock)?;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    let source = fixture.source();
    let (result, _) = tokio::join!(controller.run(&source, &cancel), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let outcome = result?;

    let report = outcome.report.as_ref().expect("a real run produces a report");
    assert_eq!(report.cancelled_count, 3);
    assert!(outcome.subtitle_files.is_empty());

    let output_dir = fixture.out_dir().join("lecture");
    let names = list_names(&output_dir);
    assert!(names.iter().all(|n| !n.ends_with(".srt") && !n.ends_with(".mp4")), "{:?}", names);
    assert!(names.iter().all(|n| !n.ends_with(".partial")), "{:?}", names);
    Ok(())
}

#[tokio::test]
async fn test_run_twice_shouldSkipSegmentsFromFirstRun() -> Result<()> {
    let fixture = Fixture::new()?;
    let mock = MockExecutor::working();
    let controller = fixture.controller(fixture.config(), &mock)?;
    let output_dir = fixture.out_dir().join("lecture");

    controller.run(&fixture.source(), &CancellationToken::new()).await?;
    // The mock remembers durations by path; record them under the final names
    for (stem, duration) in [("01 - Welcome", 30.0), ("02 - Main part", 60.0), ("03 - Questions？", 30.0)] {
        mock.set_duration(output_dir.join(format!("{}.mp4", stem)), duration);
    }
    let second = controller.run(&fixture.source(), &CancellationToken::new()).await?;

    assert_eq!(second.report.as_ref().map(|r| r.skipped_count), Some(3));
    assert_eq!(mock.encode_count(), 3);
    Ok(())
}
