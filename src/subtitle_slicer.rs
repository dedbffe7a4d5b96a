/*!
 * Per-segment subtitle slicing.
 *
 * Every plan segment `[T0, T1)` gets its own track holding the source entries
 * that overlap it, truncated to the segment and rebased so the segment starts
 * at zero. Very short results are stretched to a minimum duration, but never
 * past the end of the segment.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::errors::SubtitleError;
use crate::planning::SegmentPlan;
use crate::subtitle_processor::{SubtitleEntry, SubtitleTrack};

/// Slicing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceOptions {
    /// Constant shift applied to every source entry, in milliseconds
    pub offset_ms: i64,
    /// Entries shorter than this are extended, in milliseconds
    pub min_entry_ms: u64,
}

impl SliceOptions {
    /// Build options from an offset in seconds, rounded to the millisecond
    pub fn from_seconds(offset_s: f64, min_entry_ms: u64) -> Self {
        Self {
            offset_ms: (offset_s * 1000.0).round() as i64,
            min_entry_ms,
        }
    }
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            offset_ms: 0,
            min_entry_ms: 300,
        }
    }
}

/// Subtitle entries for one segment, rebased to the segment start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicedTrack {
    pub segment_index: usize,
    pub entries: Vec<SubtitleEntry>,
    /// Entries extended to reach the minimum duration
    pub stretched_count: usize,
    /// Entries that could not keep a positive duration
    pub dropped_count: usize,
}

impl SlicedTrack {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a standalone track
    pub fn to_track(&self) -> SubtitleTrack {
        SubtitleTrack::new(self.entries.clone())
    }
}

// Source entry after the global offset, in signed-free milliseconds
struct ShiftedEntry<'a> {
    start_ms: u64,
    end_ms: u64,
    text: &'a str,
}

/// Cuts a full subtitle track along a segment plan
pub struct SubtitleSlicer {
    options: SliceOptions,
}

impl SubtitleSlicer {
    pub fn new(options: SliceOptions) -> Self {
        Self { options }
    }

    /// Slice `track` into one sliced track per plan segment, keyed by segment index
    pub fn slice(&self, track: &SubtitleTrack, plan: &SegmentPlan) -> BTreeMap<usize, SlicedTrack> {
        let shifted = self.apply_offset(track);

        let mut sliced = BTreeMap::new();
        for segment in &plan.entries {
            let t0 = seconds_to_ms(segment.clamped_start_s);
            let t1 = seconds_to_ms(segment.clamped_end_s);
            let result = self.slice_segment(&shifted, segment.index, t0, t1);

            if result.stretched_count > 0 {
                warn!(
                    "Segment {}: {} subtitle entr{} stretched to the {}ms minimum",
                    segment.index,
                    result.stretched_count,
                    if result.stretched_count == 1 { "y" } else { "ies" },
                    self.options.min_entry_ms
                );
            }
            sliced.insert(segment.index, result);
        }
        sliced
    }

    // The offset is applied once for the whole track. Entries pushed entirely
    // before zero are discarded, the others have their start clamped at zero.
    fn apply_offset<'t>(&self, track: &'t SubtitleTrack) -> Vec<ShiftedEntry<'t>> {
        let offset = self.options.offset_ms;
        let mut discarded = 0usize;

        let shifted: Vec<ShiftedEntry<'t>> = track
            .entries
            .iter()
            .filter_map(|entry| {
                let start = (entry.start_time_ms as i64).saturating_add(offset);
                let end = (entry.end_time_ms as i64).saturating_add(offset);
                if end <= 0 {
                    discarded += 1;
                    return None;
                }
                Some(ShiftedEntry {
                    start_ms: start.max(0) as u64,
                    end_ms: end as u64,
                    text: entry.text.as_str(),
                })
            })
            .collect();

        if discarded > 0 {
            warn!("{} subtitle entr{} fell before zero after the offset and were discarded",
                discarded, if discarded == 1 { "y" } else { "ies" });
        }
        shifted
    }

    fn slice_segment(&self, shifted: &[ShiftedEntry<'_>], segment_index: usize, t0: u64, t1: u64) -> SlicedTrack {
        let segment_len = t1.saturating_sub(t0);
        let mut stretched_count = 0;
        let mut dropped_count = 0;
        let mut kept: Vec<(u64, u64, &str)> = Vec::new();

        // Half-open overlap: touching T1 is out, starting at T0 is in
        for entry in shifted.iter().filter(|e| e.end_ms > t0 && e.start_ms < t1) {
            let start = entry.start_ms.max(t0) - t0;
            let mut end = entry.end_ms.min(t1) - t0;

            if end - start < self.options.min_entry_ms {
                let stretched = (start + self.options.min_entry_ms).min(segment_len);
                if stretched <= start {
                    debug!("Segment {}: dropping entry at {}ms, no room left before the segment end", segment_index, start);
                    dropped_count += 1;
                    continue;
                }
                if stretched != end {
                    debug!("Segment {}: entry at {}ms stretched from {}ms to {}ms", segment_index, start, end, stretched);
                    stretched_count += 1;
                    end = stretched;
                }
            }

            kept.push((start, end, entry.text));
        }

        // Stable, so entries sharing a start keep their source order
        kept.sort_by_key(|(start, _, _)| *start);

        let entries = kept
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, text))| SubtitleEntry::new(i + 1, start, end, text))
            .collect();

        SlicedTrack {
            segment_index,
            entries,
            stretched_count,
            dropped_count,
        }
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Write `<stem>.srt` for every plan segment into `dir`; segments without entries get an empty file
pub fn write_sliced_tracks(
    sliced: &BTreeMap<usize, SlicedTrack>,
    plan: &SegmentPlan,
    dir: &Path,
) -> Result<Vec<PathBuf>, SubtitleError> {
    let mut written = Vec::with_capacity(plan.len());
    for segment in &plan.entries {
        let path = dir.join(format!("{}.srt", segment.output_stem));
        let track = sliced
            .get(&segment.index)
            .map(SlicedTrack::to_track)
            .unwrap_or_else(|| SubtitleTrack::new(Vec::new()));

        track.write_srt(&path)?;
        debug!("Wrote {} subtitle entries to {}", track.entries.len(), path.display());
        written.push(path);
    }
    Ok(written)
}
