use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::encoding::{
    CancellationToken, EncodeExecutor, EncodeOrchestrator, EncodeSettings, FfmpegExecutor, RunReport, SegmentStatus,
};
use crate::errors::{AcquisitionError, AppError};
use crate::file_utils::{FileManager, ISSUES_LOG_NAME};
use crate::naming::NameSanitizer;
use crate::planning::{ProcessingEstimate, SegmentEntry, SegmentPlan, SegmentPlanner};
use crate::providers::local::{LocalFileProvider, LocalOptions};
use crate::providers::ytdlp::{YtDlpOptions, YtDlpProvider};
use crate::providers::{MediaProvider, SourceMedia};
use crate::subtitle_processor::SubtitleTrack;
use crate::subtitle_slicer::{write_sliced_tracks, SliceOptions, SlicedTrack, SubtitleSlicer};
use crate::timecode::{format_duration, format_timecode};

// @module: Application controller for chapter splitting

/// Per-invocation inputs that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct SourceOverrides {
    // @field: Chapter list file for local sources
    pub chapters_file: Option<PathBuf>,
    // @field: Subtitle file to slice instead of a discovered one
    pub subtitle_file: Option<PathBuf>,
}

/// A planned source, before any encode
#[derive(Debug, Clone)]
pub struct PlanPreview {
    pub media: SourceMedia,
    pub plan: SegmentPlan,
    pub output_dir: PathBuf,
    pub estimate: ProcessingEstimate,
}

/// What one source produced
#[derive(Debug)]
pub struct RunOutcome {
    pub preview: PlanPreview,
    /// `None` for dry runs
    pub report: Option<RunReport>,
    pub subtitle_files: Vec<PathBuf>,
    pub manifests: Vec<PathBuf>,
}

impl RunOutcome {
    pub fn has_failures(&self) -> bool {
        self.report.as_ref().map(RunReport::has_failures).unwrap_or(false)
    }
}

/// Main application controller: fetch, plan, slice subtitles, encode, report
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Encode executor shared by providers and the orchestrator
    executor: Arc<dyn EncodeExecutor>,
    // @field: Providers, tried in order
    providers: Vec<Box<dyn MediaProvider>>,
}

impl Controller {
    // @method: Create a controller running ffmpeg
    pub fn with_config(config: Config, overrides: SourceOverrides) -> anyhow::Result<Self> {
        let executor: Arc<dyn EncodeExecutor> = Arc::new(FfmpegExecutor::from_config(&config));
        Self::with_executor(config, overrides, executor)
    }

    // @method: Create a controller around a given executor
    pub fn with_executor(
        config: Config,
        overrides: SourceOverrides,
        executor: Arc<dyn EncodeExecutor>,
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;

        let local_options = LocalOptions {
            chapters_file: overrides.chapters_file.clone(),
            subtitle_file: overrides.subtitle_file.clone(),
            ..LocalOptions::from_config(&config)
        };
        let remote_options = YtDlpOptions {
            subtitle_file: overrides.subtitle_file,
            ..YtDlpOptions::from_config(&config)
        };
        if overrides.chapters_file.is_some() {
            debug!("Chapter list files only apply to local sources");
        }

        let providers: Vec<Box<dyn MediaProvider>> = vec![
            Box::new(YtDlpProvider::new(remote_options)),
            Box::new(LocalFileProvider::new(executor.clone(), local_options)),
        ];

        Ok(Self {
            config,
            executor,
            providers,
        })
    }

    /// Replace the providers, mostly for tests
    pub fn with_providers(mut self, providers: Vec<Box<dyn MediaProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn provider_for(&self, source: &str) -> Result<&dyn MediaProvider, AppError> {
        self.providers
            .iter()
            .find(|p| p.supports(source))
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                AppError::Acquisition(AcquisitionError::Unavailable(format!(
                    "{} is neither an existing file nor a supported URL",
                    source
                )))
            })
    }

    /// Fetch `source` and build its segment plan
    pub async fn preview(&self, source: &str) -> Result<PlanPreview, AppError> {
        let provider = self.provider_for(source)?;
        info!("Fetching {} with the {} provider", source, provider.name());
        let media = provider.fetch(source).await?;

        let namer = NameSanitizer::new(&self.config.naming);
        let plan = SegmentPlanner::new(&namer).plan(&media.chapters, media.duration_s)?;

        let output_dir = FileManager::video_output_dir(
            &self.config.out_dir,
            &media.title,
            &media.video_id,
            &self.config.naming.replace_chars,
        );
        let preset = if self.config.gpu.enabled {
            &self.config.gpu.preset
        } else {
            &self.config.encode.preset
        };
        let estimate = plan.estimate_processing(preset, self.config.parallel.max_workers);

        Ok(PlanPreview {
            media,
            plan,
            output_dir,
            estimate,
        })
    }

    /// Process one source end to end
    pub async fn run(&self, source: &str, cancel: &CancellationToken) -> Result<RunOutcome, AppError> {
        let preview = self.preview(source).await?;
        info!(
            "{}: {} segment(s), {} of media",
            preview.media.title,
            preview.plan.len(),
            format_duration(preview.plan.total_duration_s())
        );

        if self.config.dry_run {
            info!("Dry run, nothing will be written");
            info!("\n{}", render_plan(&preview));
            return Ok(RunOutcome {
                preview,
                report: None,
                subtitle_files: Vec::new(),
                manifests: Vec::new(),
            });
        }

        FileManager::ensure_dir(&preview.output_dir)?;
        let issues_log = preview.output_dir.join(ISSUES_LOG_NAME);
        for warning in &preview.plan.warnings {
            self.log_issue(&issues_log, &format!("plan: {}", warning));
        }

        let sliced = self.slice_subtitles(&preview, &issues_log);

        let progress_bar = segment_progress_bar(preview.plan.len() as u64);
        let bar = progress_bar.clone();
        let orchestrator = EncodeOrchestrator::new(self.executor.clone(), EncodeSettings::from_config(&self.config))
            .with_progress(Arc::new(move |done, _total| bar.set_position(done as u64)));

        let result = orchestrator
            .run(&preview.media.media_path, &preview.plan, &preview.output_dir, cancel)
            .await;
        progress_bar.finish_and_clear();
        let report = result?;

        for segment in report.failures() {
            if let Some(failure) = &segment.error {
                let line = format!("segment {} '{}': {}", segment.index, segment.title, failure);
                error!("Segment failed: {}", line);
                self.log_issue(&issues_log, &line);
            }
        }

        let subtitle_files = match &sliced {
            Some(sliced) => self.write_subtitles(sliced, &preview, &report, &issues_log),
            None => Vec::new(),
        };

        let manifests = report
            .write_manifests(&preview.output_dir, &self.config.manifest.export)
            .map_err(AppError::from)?;

        info!(
            "Done: {} encoded, {} skipped, {} failed, {} cancelled in {}",
            report.success_count,
            report.skipped_count,
            report.failure_count,
            report.cancelled_count,
            format_duration(report.total_processing_time_s)
        );

        if preview.media.downloaded && !self.config.keep_source && !cancel.is_cancelled() {
            match FileManager::remove_if_exists(&preview.media.media_path) {
                Ok(()) => debug!("Removed downloaded source {:?}", preview.media.media_path),
                Err(e) => warn!("Could not remove downloaded source: {}", e),
            }
        }

        Ok(RunOutcome {
            preview,
            report: Some(report),
            subtitle_files,
            manifests,
        })
    }

    // Subtitle problems never stop the encode
    fn slice_subtitles(&self, preview: &PlanPreview, issues_log: &Path) -> Option<BTreeMap<usize, SlicedTrack>> {
        if !self.config.subtitles.enabled {
            return None;
        }
        let Some(path) = &preview.media.subtitle_path else {
            debug!("No subtitle track for {}", preview.media.title);
            return None;
        };

        let track = match SubtitleTrack::parse_file(path) {
            Ok(track) => track,
            Err(e) => {
                warn!("Skipping subtitles: {}", e);
                self.log_issue(issues_log, &format!("subtitles: {}", e));
                return None;
            }
        };
        info!("Slicing {} {} cue(s) from {:?}", track.entries.len(), track.dialect, path);

        let options = SliceOptions::from_seconds(self.config.subtitles.offset_s, self.config.subtitles.min_entry_ms);
        let sliced = SubtitleSlicer::new(options).slice(&track, &preview.plan);
        let dropped: usize = sliced.values().map(|p| p.dropped_count).sum();
        if dropped > 0 {
            self.log_issue(issues_log, &format!("subtitles: {} cue(s) dropped at segment ends", dropped));
        }
        Some(sliced)
    }

    // Only segments with a video output get a subtitle file; stale ones from
    // earlier runs are removed for the others
    fn write_subtitles(
        &self,
        sliced: &BTreeMap<usize, SlicedTrack>,
        preview: &PlanPreview,
        report: &RunReport,
        issues_log: &Path,
    ) -> Vec<PathBuf> {
        let produced = |index: usize| {
            report
                .segments
                .iter()
                .any(|s| s.index == index && matches!(s.status, SegmentStatus::Done | SegmentStatus::Skipped))
        };

        let (kept, dropped): (Vec<SegmentEntry>, Vec<SegmentEntry>) =
            preview.plan.entries.iter().cloned().partition(|entry| produced(entry.index));
        for entry in &dropped {
            let stale = preview.output_dir.join(format!("{}.srt", entry.output_stem));
            if let Err(e) = FileManager::remove_if_exists(&stale) {
                warn!("{:#}", e);
            }
        }

        let produced_plan = SegmentPlan {
            entries: kept,
            ..preview.plan.clone()
        };
        match write_sliced_tracks(sliced, &produced_plan, &preview.output_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not write sliced subtitles: {}", e);
                self.log_issue(issues_log, &format!("subtitles: {}", e));
                Vec::new()
            }
        }
    }

    fn log_issue(&self, issues_log: &Path, line: &str) {
        if let Err(e) = FileManager::append_to_log_file(issues_log, line) {
            warn!("Could not write to {:?}: {}", issues_log, e);
        }
    }
}

fn segment_progress_bar(total: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar
}

/// Plan table with estimates, as printed by `chapsplit plan`
pub fn render_plan(preview: &PlanPreview) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({})  {}  -> {}\n",
        preview.media.title,
        preview.media.video_id,
        format_duration(preview.media.duration_s),
        preview.output_dir.display()
    ));
    out.push_str(&format!("{:>3}  {:<12}  {:<12}  {:>9}  {}\n", "#", "start", "end", "duration", "output"));
    for entry in &preview.plan.entries {
        out.push_str(&format!(
            "{:>3}  {:<12}  {:<12}  {:>9}  {}\n",
            entry.index,
            format_timecode(entry.clamped_start_s),
            format_timecode(entry.clamped_end_s),
            format_duration(entry.expected_duration_s()),
            entry.output_stem
        ));
    }
    for warning in &preview.plan.warnings {
        out.push_str(&format!("warning: {}\n", warning));
    }
    out.push_str(&format!("{}\n", preview.estimate));
    out
}
