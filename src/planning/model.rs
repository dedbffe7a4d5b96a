/*!
 * Plan data model.
 */

use std::fmt;

use serde::Serialize;

use crate::app_config::X264_PRESETS;
use crate::errors::PlanError;
use crate::timecode::format_duration;

/// A named time range reported by the source metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    /// 1-based position in the source chapter list
    pub index: usize,
    pub title: String,
    pub start_s: f64,
    pub end_s: f64,
}

impl Chapter {
    // @creates: Validated chapter, `0 <= start_s < end_s`
    pub fn new(index: usize, title: impl Into<String>, start_s: f64, end_s: f64) -> Result<Self, PlanError> {
        let title = title.into();
        let valid = start_s.is_finite() && end_s.is_finite() && start_s >= 0.0 && end_s > start_s;
        if !valid {
            return Err(PlanError::InvalidChapter {
                index,
                title,
                start_s,
                end_s,
            });
        }
        Ok(Self {
            index,
            title,
            start_s,
            end_s,
        })
    }

    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// A chapter after validation, clamping and naming
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentEntry {
    /// Dense 1-based position in the plan
    pub index: usize,
    /// The source chapter, unmodified
    pub chapter: Chapter,
    /// Output file name without extension
    pub output_stem: String,
    pub clamped_start_s: f64,
    pub clamped_end_s: f64,
}

impl SegmentEntry {
    /// Length the encoded output is expected to have
    pub fn expected_duration_s(&self) -> f64 {
        self.clamped_end_s - self.clamped_start_s
    }

    pub fn title(&self) -> &str {
        &self.chapter.title
    }
}

/// Non-fatal adjustments made while planning
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The chapter ended past the media duration
    EndClamped {
        chapter_index: usize,
        original_end_s: f64,
        clamped_end_s: f64,
    },
    /// The chapter started at or after the media duration and was dropped
    StartClamped { chapter_index: usize, start_s: f64 },
    /// The chapter's end was pulled back to the next chapter's start
    OverlapTrimmed {
        chapter_index: usize,
        original_end_s: f64,
        trimmed_end_s: f64,
    },
    /// Nothing was left of the chapter after trimming
    DroppedZeroLength { chapter_index: usize },
    /// The chapter's stem collided with an earlier one and was suffixed
    NameCollisionResolved {
        chapter_index: usize,
        original_stem: String,
        resolved_stem: String,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndClamped {
                chapter_index,
                original_end_s,
                clamped_end_s,
            } => write!(
                f,
                "Chapter {} end {:.3}s clamped to media duration {:.3}s",
                chapter_index, original_end_s, clamped_end_s
            ),
            Self::StartClamped { chapter_index, start_s } => write!(
                f,
                "Chapter {} starts at {:.3}s, at or past the end of the media; dropped",
                chapter_index, start_s
            ),
            Self::OverlapTrimmed {
                chapter_index,
                original_end_s,
                trimmed_end_s,
            } => write!(
                f,
                "Chapter {} end {:.3}s trimmed to {:.3}s to remove an overlap",
                chapter_index, original_end_s, trimmed_end_s
            ),
            Self::DroppedZeroLength { chapter_index } => {
                write!(f, "Chapter {} has zero length after trimming; dropped", chapter_index)
            }
            Self::NameCollisionResolved {
                chapter_index,
                original_stem,
                resolved_stem,
            } => write!(
                f,
                "Chapter {} name '{}' already used, renamed to '{}'",
                chapter_index, original_stem, resolved_stem
            ),
        }
    }
}

/// Rough wall-clock estimate for encoding a plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingEstimate {
    pub total_media_s: f64,
    pub estimated_processing_s: f64,
    pub preset: String,
    pub workers: usize,
    pub segment_count: usize,
}

impl fmt::Display for ProcessingEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segment(s), {} of media, about {} with preset '{}' on {} worker(s)",
            self.segment_count,
            format_duration(self.total_media_s),
            format_duration(self.estimated_processing_s),
            self.preset,
            self.workers
        )
    }
}

/// The validated, ordered list of segments to cut
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPlan {
    pub entries: Vec<SegmentEntry>,
    pub media_duration_s: f64,
    pub warnings: Vec<PlanWarning>,
}

impl SegmentPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with the given plan index
    pub fn get(&self, index: usize) -> Option<&SegmentEntry> {
        self.entries.iter().find(|e| e.index == index)
    }

    /// Sum of the expected segment durations
    pub fn total_duration_s(&self) -> f64 {
        self.entries.iter().map(SegmentEntry::expected_duration_s).sum()
    }

    /// Estimate the encode time from x264 preset speed multipliers
    pub fn estimate_processing(&self, preset: &str, max_workers: usize) -> ProcessingEstimate {
        let multiplier = match X264_PRESETS.iter().position(|p| *p == preset) {
            Some(0) => 0.3,
            Some(1) => 0.4,
            Some(2) => 0.5,
            Some(3) => 0.8,
            Some(4) => 1.0,
            Some(5) => 1.5,
            Some(6) => 2.0,
            Some(7) => 3.0,
            Some(_) => 5.0,
            None => 1.0,
        };

        let total = self.total_duration_s();
        let workers = max_workers.clamp(1, self.len().max(1));

        ProcessingEstimate {
            total_media_s: total,
            estimated_processing_s: total * multiplier / workers as f64,
            preset: preset.to_string(),
            workers,
            segment_count: self.len(),
        }
    }
}
