/*!
 * Encode orchestration.
 *
 * Drives every plan segment through
 * `Pending -> Encoding -> Validating -> {Done, Retrying -> Encoding, Failed}`
 * on a bounded pool of workers.
 *
 * Run-level rules:
 * - the executor must be available before anything starts
 * - the backend is decided once (`CapabilitySnapshot`) and shared by all workers
 * - a crop that leaves too small a frame fails each segment without an attempt
 * - segment failures are reported, never fatal; losing the executor mid-run is fatal
 * - cancellation stops dispatching and aborts in-flight encodes, finished outputs stay
 */

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::app_config::Config;
use crate::encoding::cancel::CancellationToken;
use crate::encoding::capability::CapabilitySnapshot;
use crate::encoding::crop::{CropBox, CropRect};
use crate::encoding::executor::{Backend, EncodeExecutor, EncodeRequest};
use crate::encoding::presets::PresetLadder;
use crate::encoding::report::{RunReport, SegmentReport, SegmentStatus};
use crate::errors::{ExecutorError, OrchestratorError, SegmentFailure};
use crate::file_utils::FileManager;
use crate::planning::{SegmentEntry, SegmentPlan};

/// Progress callback: `(finished segments, total segments)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Orchestrator settings, usually derived from `Config`
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// Output container extension, without the dot
    pub video_extension: String,
    /// First-attempt preset for the CPU backend
    pub cpu_preset: String,
    /// First-attempt preset for the GPU backend
    pub gpu_preset: String,
    pub gpu_requested: bool,
    pub fallback_to_cpu: bool,
    pub crop: Option<CropRect>,
    /// Absolute tolerance in seconds between expected and probed durations
    pub tolerance_s: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub max_workers: usize,
    pub skip_existing: bool,
}

impl EncodeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            video_extension: config.video_format.extension().to_string(),
            cpu_preset: config.encode.preset.clone(),
            gpu_preset: config.gpu.preset.clone(),
            gpu_requested: config.gpu.enabled,
            fallback_to_cpu: config.gpu.fallback_to_cpu,
            crop: CropRect::from_config(&config.crop),
            tolerance_s: config.validation.tolerance_s,
            max_retries: config.validation.max_retries,
            max_workers: config.parallel.max_workers.max(1),
            skip_existing: config.skip_existing,
        }
    }

    /// Total executor calls allowed per segment
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one executor attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Pending,
    Success,
    /// The output exists but failed validation
    SoftFailure(String),
    /// The executor reported an error
    HardFailure(String),
}

/// One executor call for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeAttempt {
    pub segment_index: usize,
    pub preset_tier: u32,
    pub backend: Backend,
    pub outcome: AttemptOutcome,
}

// Why the last attempt did not succeed
#[derive(Debug, Clone)]
enum LastFailure {
    Executor(String),
    Duration { actual_s: f64 },
}

#[derive(Debug)]
enum SegmentState {
    Pending,
    Encoding { tier: u32 },
    Validating { tier: u32 },
    Retrying { next_tier: u32 },
    Done { actual_s: f64 },
    Failed(SegmentFailure),
    Cancelled,
}

// How the crop applies to this run
#[derive(Debug, Clone)]
enum CropPlan {
    Disabled,
    Window(CropBox),
    Rejected(SegmentFailure),
}

// Everything a worker needs, shared by reference across the pool
struct WorkerContext<'a> {
    executor: &'a dyn EncodeExecutor,
    settings: &'a EncodeSettings,
    capability: &'a CapabilitySnapshot,
    crop: CropPlan,
    source: &'a Path,
    output_dir: &'a Path,
    cancel: &'a CancellationToken,
    abort: CancellationToken,
    fatal: Mutex<Option<String>>,
}

impl WorkerContext<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.abort.is_cancelled()
    }

    async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {},
            _ = self.abort.cancelled() => {},
        }
    }

    fn preset_for(&self, backend: Backend) -> &str {
        match backend {
            Backend::Cpu => &self.settings.cpu_preset,
            Backend::Gpu => &self.settings.gpu_preset,
        }
    }

    fn record_fatal(&self, message: String) {
        let mut fatal = self.fatal.lock();
        if fatal.is_none() {
            *fatal = Some(message);
        }
        self.abort.cancel();
    }
}

/// Runs a segment plan through an `EncodeExecutor`
pub struct EncodeOrchestrator {
    executor: Arc<dyn EncodeExecutor>,
    settings: EncodeSettings,
    capability: OnceCell<Arc<CapabilitySnapshot>>,
    progress: Option<ProgressCallback>,
}

impl EncodeOrchestrator {
    pub fn new(executor: Arc<dyn EncodeExecutor>, settings: EncodeSettings) -> Self {
        Self {
            executor,
            settings,
            capability: OnceCell::new(),
            progress: None,
        }
    }

    /// Call `callback(done, total)` every time a segment finishes
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Backend decision, probed on first use and cached for the orchestrator's lifetime
    pub async fn capability(&self) -> Result<Arc<CapabilitySnapshot>, OrchestratorError> {
        self.capability
            .get_or_try_init(|| async {
                CapabilitySnapshot::detect(
                    self.executor.as_ref(),
                    self.settings.gpu_requested,
                    self.settings.fallback_to_cpu,
                )
                .await
                .map(Arc::new)
            })
            .await
            .cloned()
    }

    /// Encode every segment of `plan` from `source` into `output_dir`
    pub async fn run(
        &self,
        source: &Path,
        plan: &SegmentPlan,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        let started = Instant::now();

        self.executor
            .check_available()
            .await
            .map_err(|e| OrchestratorError::ExecutorUnavailable(e.to_string()))?;

        let capability = self.capability().await?;
        std::fs::create_dir_all(output_dir)?;

        let crop = self.resolve_crop(source).await;
        let workers = self.settings.max_workers.max(1);
        info!(
            "Encoding {} segment(s) with {} worker(s) on the {} backend",
            plan.len(),
            workers,
            capability.backend
        );

        let context = WorkerContext {
            executor: self.executor.as_ref(),
            settings: &self.settings,
            capability: capability.as_ref(),
            crop,
            source,
            output_dir,
            cancel,
            abort: CancellationToken::new(),
            fatal: Mutex::new(None),
        };

        let total = plan.len();
        let finished = AtomicUsize::new(0);
        let context_ref = &context;
        let finished_ref = &finished;

        let mut segments = stream::iter(plan.entries.iter())
            .map(|entry| async move {
                let report = process_segment(context_ref, entry).await;
                let done = finished_ref.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &self.progress {
                    progress(done, total);
                }
                report
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        if let Some(message) = context.fatal.lock().take() {
            error!("Run aborted: {}", message);
            return Err(OrchestratorError::ExecutorUnavailable(message));
        }

        segments.sort_by_key(|s| s.index);
        Ok(RunReport::new(
            source.to_path_buf(),
            output_dir.to_path_buf(),
            capability.backend,
            capability.downgraded,
            segments,
            plan.warnings.clone(),
            started.elapsed().as_secs_f64(),
        ))
    }

    async fn resolve_crop(&self, source: &Path) -> CropPlan {
        let Some(rect) = self.settings.crop else {
            return CropPlan::Disabled;
        };

        match self.executor.probe_resolution(source).await {
            Ok((width, height)) => match rect.apply(width, height) {
                Ok(window) => {
                    debug!("Cropping {}x{} to {}", width, height, window.filter());
                    CropPlan::Window(window)
                }
                Err(failure) => {
                    warn!("Crop rejected for {}x{} source: {}", width, height, failure);
                    CropPlan::Rejected(failure)
                }
            },
            Err(e) => {
                warn!("Could not read the source resolution ({}), cropping disabled", e);
                CropPlan::Disabled
            }
        }
    }
}

async fn process_segment(ctx: &WorkerContext<'_>, entry: &SegmentEntry) -> SegmentReport {
    let started = Instant::now();
    let backend = ctx.capability.backend;
    let final_path =
        FileManager::segment_output_path(ctx.output_dir, &entry.output_stem, &ctx.settings.video_extension);

    let mut report = SegmentReport {
        index: entry.index,
        title: entry.title().to_string(),
        stem: entry.output_stem.clone(),
        start_s: entry.clamped_start_s,
        end_s: entry.clamped_end_s,
        output_path: None,
        status: SegmentStatus::Cancelled,
        expected_duration_s: entry.expected_duration_s(),
        actual_duration_s: None,
        attempts: 0,
        final_tier: 0,
        final_preset: None,
        backend,
        error: None,
        processing_time_s: 0.0,
    };

    // The stream only polls a segment once a worker slot is free
    if ctx.is_cancelled() {
        return report;
    }

    if ctx.settings.skip_existing {
        if let Some(actual_s) = existing_output_duration(ctx, entry, &final_path).await {
            info!("Segment {} '{}': valid output already exists, skipping", entry.index, entry.title());
            report.status = SegmentStatus::Skipped;
            report.output_path = Some(final_path);
            report.actual_duration_s = Some(actual_s);
            report.processing_time_s = started.elapsed().as_secs_f64();
            return report;
        }
    }

    let crop = match &ctx.crop {
        CropPlan::Disabled => None,
        CropPlan::Window(window) => Some(*window),
        CropPlan::Rejected(failure) => {
            error!("Segment {} '{}' failed: {}", entry.index, entry.title(), failure);
            report.status = SegmentStatus::Failed;
            report.error = Some(failure.clone());
            report.processing_time_s = started.elapsed().as_secs_f64();
            return report;
        }
    };

    let ladder = PresetLadder::new(backend, ctx.preset_for(backend));
    let partial_path = FileManager::partial_path(&final_path);
    let max_attempts = ctx.settings.max_attempts();
    let expected_s = entry.expected_duration_s();
    let mut attempts: Vec<EncodeAttempt> = Vec::new();
    let mut last_failure = LastFailure::Executor(String::new());
    let mut state = SegmentState::Pending;

    let terminal = loop {
        if ctx.is_cancelled() && !matches!(state, SegmentState::Done { .. } | SegmentState::Failed(_)) {
            discard(&partial_path);
            break SegmentState::Cancelled;
        }

        state = match state {
            SegmentState::Pending => SegmentState::Encoding { tier: 1 },

            SegmentState::Encoding { tier } => {
                let request = EncodeRequest {
                    source: ctx.source.to_path_buf(),
                    output: partial_path.clone(),
                    start_s: entry.clamped_start_s,
                    end_s: entry.clamped_end_s,
                    backend,
                    preset_tier: tier,
                    preset: ladder.preset_for_tier(tier).to_string(),
                    crop,
                };
                debug!(
                    "Segment {}: attempt {} with preset '{}' on {}",
                    entry.index, tier, request.preset, backend
                );
                attempts.push(EncodeAttempt {
                    segment_index: entry.index,
                    preset_tier: tier,
                    backend,
                    outcome: AttemptOutcome::Pending,
                });

                let result = tokio::select! {
                    result = ctx.executor.encode(&request) => Some(result),
                    _ = ctx.cancelled() => None,
                };

                match result {
                    None | Some(Err(ExecutorError::Cancelled)) => {
                        discard(&partial_path);
                        SegmentState::Cancelled
                    }
                    Some(Ok(())) => SegmentState::Validating { tier },
                    Some(Err(ExecutorError::Unavailable(message))) => {
                        discard(&partial_path);
                        set_outcome(&mut attempts, AttemptOutcome::HardFailure(message.clone()));
                        ctx.record_fatal(message);
                        SegmentState::Cancelled
                    }
                    Some(Err(e)) => {
                        warn!("Segment {} '{}': attempt {} failed: {}", entry.index, entry.title(), tier, e);
                        discard(&partial_path);
                        set_outcome(&mut attempts, AttemptOutcome::HardFailure(e.to_string()));
                        last_failure = LastFailure::Executor(e.to_string());
                        next_after_failure(tier, max_attempts, expected_s, &last_failure)
                    }
                }
            }

            SegmentState::Validating { tier } => {
                let measured = tokio::select! {
                    measured = ctx.executor.probe_duration(&partial_path) => Some(measured),
                    _ = ctx.cancelled() => None,
                };
                match measured {
                    None => {
                        discard(&partial_path);
                        SegmentState::Cancelled
                    }
                    Some(Ok(actual_s)) if (actual_s - expected_s).abs() <= ctx.settings.tolerance_s => {
                        match FileManager::promote_partial(&partial_path, &final_path) {
                            Ok(()) => {
                                set_outcome(&mut attempts, AttemptOutcome::Success);
                                SegmentState::Done { actual_s }
                            }
                            Err(e) => {
                                discard(&partial_path);
                                set_outcome(&mut attempts, AttemptOutcome::HardFailure(e.to_string()));
                                last_failure = LastFailure::Executor(format!("{:#}", e));
                                next_after_failure(tier, max_attempts, expected_s, &last_failure)
                            }
                        }
                    }
                    Some(Ok(actual_s)) => {
                        warn!(
                            "Segment {} '{}': duration {:.3}s differs from expected {:.3}s by more than {:.3}s",
                            entry.index,
                            entry.title(),
                            actual_s,
                            expected_s,
                            ctx.settings.tolerance_s
                        );
                        discard(&partial_path);
                        set_outcome(
                            &mut attempts,
                            AttemptOutcome::SoftFailure(format!("duration {:.3}s, expected {:.3}s", actual_s, expected_s)),
                        );
                        last_failure = LastFailure::Duration { actual_s };
                        next_after_failure(tier, max_attempts, expected_s, &last_failure)
                    }
                    Some(Err(e)) => {
                        warn!("Segment {} '{}': could not probe output: {}", entry.index, entry.title(), e);
                        discard(&partial_path);
                        set_outcome(&mut attempts, AttemptOutcome::SoftFailure(e.to_string()));
                        last_failure = LastFailure::Executor(format!("output probe failed: {}", e));
                        next_after_failure(tier, max_attempts, expected_s, &last_failure)
                    }
                }
            }

            SegmentState::Retrying { next_tier } => {
                info!("Segment {} '{}': retrying at preset tier {}", entry.index, entry.title(), next_tier);
                SegmentState::Encoding { tier: next_tier }
            }

            terminal @ (SegmentState::Done { .. } | SegmentState::Failed(_) | SegmentState::Cancelled) => {
                break terminal;
            }
        };
    };

    if let Some(last) = attempts.last() {
        report.final_tier = last.preset_tier;
        report.final_preset = Some(ladder.preset_for_tier(last.preset_tier).to_string());
    }
    report.attempts = attempts.len() as u32;
    report.processing_time_s = started.elapsed().as_secs_f64();

    match terminal {
        SegmentState::Done { actual_s } => {
            info!(
                "Segment {} '{}' done after {} attempt(s)",
                entry.index,
                entry.title(),
                report.attempts
            );
            report.status = SegmentStatus::Done;
            report.output_path = Some(final_path);
            report.actual_duration_s = Some(actual_s);
        }
        SegmentState::Failed(failure) => {
            error!("Segment {} '{}' failed: {}", entry.index, entry.title(), failure);
            report.status = SegmentStatus::Failed;
            if let LastFailure::Duration { actual_s } = last_failure {
                report.actual_duration_s = Some(actual_s);
            }
            report.error = Some(failure);
        }
        _ => {
            debug!("Segment {} cancelled", entry.index);
            report.status = SegmentStatus::Cancelled;
        }
    }
    report
}

// Tier only grows. Exhaustion reports the kind of the last failure.
fn next_after_failure(tier: u32, max_attempts: u32, expected_s: f64, last: &LastFailure) -> SegmentState {
    if tier < max_attempts {
        return SegmentState::Retrying { next_tier: tier + 1 };
    }

    SegmentState::Failed(match last {
        LastFailure::Executor(message) => SegmentFailure::SegmentEncodeFailed {
            attempts: tier,
            last_error: message.clone(),
        },
        LastFailure::Duration { actual_s } => SegmentFailure::DurationMismatch {
            attempts: tier,
            expected_s,
            actual_s: *actual_s,
        },
    })
}

fn set_outcome(attempts: &mut [EncodeAttempt], outcome: AttemptOutcome) {
    if let Some(last) = attempts.last_mut() {
        last.outcome = outcome;
    }
}

fn discard(path: &Path) {
    if let Err(e) = FileManager::remove_if_exists(path) {
        warn!("{:#}", e);
    }
}

// Duration of a reusable existing output, if there is one
async fn existing_output_duration(ctx: &WorkerContext<'_>, entry: &SegmentEntry, final_path: &Path) -> Option<f64> {
    if !FileManager::is_non_empty_file(final_path) {
        return None;
    }
    match ctx.executor.probe_duration(final_path).await {
        Ok(actual_s) if (actual_s - entry.expected_duration_s()).abs() <= ctx.settings.tolerance_s => Some(actual_s),
        Ok(actual_s) => {
            info!(
                "Segment {}: existing output lasts {:.3}s instead of {:.3}s, encoding again",
                entry.index,
                actual_s,
                entry.expected_duration_s()
            );
            None
        }
        Err(e) => {
            debug!("Segment {}: existing output unreadable ({}), encoding again", entry.index, e);
            None
        }
    }
}
