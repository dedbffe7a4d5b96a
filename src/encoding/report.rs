/*!
 * Run report and manifest export.
 *
 * The report is built from one `SegmentReport` per plan entry, always in plan
 * order, and can be written next to the segments as `manifest.json` and
 * `manifest.md`.
 */

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::app_config::ManifestFormat;
use crate::encoding::executor::Backend;
use crate::errors::SegmentFailure;
use crate::file_utils::FileManager;
use crate::planning::PlanWarning;
use crate::timecode::{format_duration, format_timecode};

/// Final state of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Encoded and validated in this run
    Done,
    /// A valid output already existed
    Skipped,
    /// Every attempt failed, or the segment could not be attempted
    Failed,
    /// The run was cancelled before the segment finished
    Cancelled,
}

impl SegmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one plan segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub index: usize,
    pub title: String,
    pub stem: String,
    pub start_s: f64,
    pub end_s: f64,
    pub output_path: Option<PathBuf>,
    pub status: SegmentStatus,
    pub expected_duration_s: f64,
    pub actual_duration_s: Option<f64>,
    /// Executor calls made for this segment
    pub attempts: u32,
    /// Preset tier of the last attempt, 0 when no attempt was made
    pub final_tier: u32,
    pub final_preset: Option<String>,
    pub backend: Backend,
    pub error: Option<SegmentFailure>,
    pub processing_time_s: f64,
}

/// Summary of a whole orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub backend: Backend,
    pub gpu_downgraded: bool,
    pub segments: Vec<SegmentReport>,
    pub plan_warnings: Vec<PlanWarning>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub cancelled_count: usize,
    pub total_processing_time_s: f64,
    pub generated_at: String,
}

impl RunReport {
    /// Build the report; segments are sorted by plan index
    pub fn new(
        source: PathBuf,
        output_dir: PathBuf,
        backend: Backend,
        gpu_downgraded: bool,
        mut segments: Vec<SegmentReport>,
        plan_warnings: Vec<PlanWarning>,
        total_processing_time_s: f64,
    ) -> Self {
        segments.sort_by_key(|s| s.index);
        let count = |status: SegmentStatus| segments.iter().filter(|s| s.status == status).count();

        Self {
            success_count: count(SegmentStatus::Done),
            failure_count: count(SegmentStatus::Failed),
            skipped_count: count(SegmentStatus::Skipped),
            cancelled_count: count(SegmentStatus::Cancelled),
            source,
            output_dir,
            backend,
            gpu_downgraded,
            segments,
            plan_warnings,
            total_processing_time_s,
            generated_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &SegmentReport> {
        self.segments.iter().filter(|s| s.status == SegmentStatus::Failed)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    /// Markdown summary with one table row per segment
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Split report\n");
        let _ = writeln!(md, "- Source: `{}`", self.source.display());
        let _ = writeln!(
            md,
            "- Backend: {}{}",
            self.backend,
            if self.gpu_downgraded { " (GPU unavailable, CPU fallback)" } else { "" }
        );
        let _ = writeln!(
            md,
            "- Segments: {} done, {} skipped, {} failed, {} cancelled",
            self.success_count, self.skipped_count, self.failure_count, self.cancelled_count
        );
        let _ = writeln!(md, "- Processing time: {}\n", format_duration(self.total_processing_time_s));

        let _ = writeln!(md, "| # | Title | Start | End | Duration | Status | Attempts | Error |");
        let _ = writeln!(md, "|---|-------|-------|-----|----------|--------|----------|-------|");
        for segment in &self.segments {
            let error = segment.error.as_ref().map(ToString::to_string).unwrap_or_default();
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                segment.index,
                segment.title.replace('|', "\\|"),
                format_timecode(segment.start_s),
                format_timecode(segment.end_s),
                format_duration(segment.expected_duration_s),
                segment.status.label(),
                segment.attempts,
                error.replace('|', "\\|"),
            );
        }

        if !self.plan_warnings.is_empty() {
            let _ = writeln!(md, "\n## Plan warnings\n");
            for warning in &self.plan_warnings {
                let _ = writeln!(md, "- {}", warning);
            }
        }
        md
    }

    /// Write the selected manifest formats into `dir`
    pub fn write_manifests(&self, dir: &Path, formats: &[ManifestFormat]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for format in formats {
            let (name, content) = match format {
                ManifestFormat::Json => ("manifest.json", self.to_json()?),
                ManifestFormat::Md => ("manifest.md", self.to_markdown()),
            };
            let path = dir.join(name);
            FileManager::write_to_file(&path, &content)?;
            written.push(path);
        }
        Ok(written)
    }
}
