/*!
 * Tests for slicing subtitle tracks along a plan
 */

use anyhow::Result;
use chapsplit::subtitle_processor::{SubtitleEntry, SubtitleTrack};
use chapsplit::subtitle_slicer::{write_sliced_tracks, SliceOptions, SubtitleSlicer};
use crate::common;

fn track(entries: &[(u64, u64, &str)]) -> SubtitleTrack {
    SubtitleTrack::new(
        entries
            .iter()
            .enumerate()
            .map(|(i, (start, end, text))| SubtitleEntry::new(i + 1, *start, *end, *text))
            .collect(),
    )
}

fn spans(entries: &[SubtitleEntry]) -> Vec<(u64, u64)> {
    entries.iter().map(|e| (e.start_time_ms, e.end_time_ms)).collect()
}

#[test]
fn test_slice_withEntryAcrossBoundary_shouldSplitIntoBothSegments() {
    let plan = common::plan_for(&[("One", 0.0, 100.0), ("Two", 100.0, 250.0)], 250.0);
    let source = track(&[(95_000, 105_000, "hello")]);

    let sliced = SubtitleSlicer::new(SliceOptions::default()).slice(&source, &plan);

    let first = &sliced[&1];
    let second = &sliced[&2];
    assert_eq!(spans(&first.entries).last(), Some(&(95_000, 100_000)));
    assert_eq!(spans(&second.entries).first(), Some(&(0, 5_000)));
    assert_eq!(second.entries[0].text, "hello");
}

#[test]
fn test_slice_withShortEntryAtSegmentTail_shouldStretchToBoundaryNotDrop() {
    // The stretch is clamped at the segment end, so a cue in the last 300ms
    // keeps its start and ends exactly at the boundary.
    let plan = common::plan_for(&[("Only", 0.0, 50.0)], 50.0);
    let source = track(&[(49_800, 49_900, "tail")]);

    let sliced = SubtitleSlicer::new(SliceOptions::default()).slice(&source, &plan);

    assert_eq!(spans(&sliced[&1].entries), vec![(49_800, 50_000)]);
    assert_eq!(sliced[&1].stretched_count, 1);
    assert_eq!(sliced[&1].dropped_count, 0);
}

#[test]
fn test_slice_withEveryEntry_shouldStayInsideSegmentBounds() {
    let plan = common::plan_for(&[("A", 0.0, 10.0), ("B", 10.0, 20.5), ("C", 20.5, 30.0)], 30.0);
    let source = track(&[
        (0, 150, "blink"),
        (9_900, 10_100, "edge"),
        (10_000, 20_600, "long"),
        (20_400, 20_500, "just before"),
        (29_990, 31_000, "past the end"),
    ]);

    let sliced = SubtitleSlicer::new(SliceOptions::default()).slice(&source, &plan);

    for entry in &plan.entries {
        let segment_len = ((entry.clamped_end_s - entry.clamped_start_s) * 1000.0).round() as u64;
        for cue in &sliced[&entry.index].entries {
            assert!(cue.start_time_ms < cue.end_time_ms, "{:?}", cue);
            assert!(cue.end_time_ms <= segment_len, "{:?} exceeds {}", cue, segment_len);
        }
    }
}

#[test]
fn test_slice_withAlreadyRebasedTrack_shouldBeIdempotent() {
    let plan = common::plan_for(&[("Intro", 0.0, 100.0), ("Body", 100.0, 250.0)], 250.0);
    let source = track(&[
        (95_000, 105_000, "across"),
        (120_000, 121_000, "inside"),
        (249_900, 250_000, "tail"),
    ]);
    let slicer = SubtitleSlicer::new(SliceOptions::default());
    let once = slicer.slice(&source, &plan)[&2].to_track();

    let own_bounds = common::plan_for(&[("Body", 0.0, 150.0)], 150.0);
    let twice = slicer.slice(&once, &own_bounds)[&1].to_track();

    assert_eq!(twice.entries, once.entries);
}

#[test]
fn test_slice_withNegativeOffset_shouldShiftOnceAndDiscardEarlyCues() {
    let plan = common::plan_for(&[("A", 0.0, 10.0), ("B", 10.0, 20.0)], 20.0);
    let source = track(&[(500, 1_500, "gone"), (3_000, 4_000, "early"), (12_000, 13_000, "late")]);

    let sliced = SubtitleSlicer::new(SliceOptions::from_seconds(-2.0, 300)).slice(&source, &plan);

    assert_eq!(spans(&sliced[&1].entries), vec![(1_000, 2_000)]);
    assert_eq!(sliced[&1].entries[0].text, "early");
    // 12s shifted to 10s starts exactly on the second segment
    assert_eq!(spans(&sliced[&2].entries), vec![(0, 1_000)]);
    assert_eq!(sliced[&2].entries[0].text, "late");
}

#[test]
fn test_slice_withPositiveOffset_shouldMoveCueIntoNextSegment() {
    let plan = common::plan_for(&[("A", 0.0, 10.0), ("B", 10.0, 20.0)], 20.0);
    let source = track(&[(8_000, 9_000, "moved")]);

    let sliced = SubtitleSlicer::new(SliceOptions::from_seconds(2.5, 300)).slice(&source, &plan);

    assert!(sliced[&1].is_empty());
    assert_eq!(spans(&sliced[&2].entries), vec![(500, 1_500)]);
}

#[test]
fn test_writeSlicedTracks_withPlan_shouldWriteOneSrtPerSegment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let plan = common::plan_for(&[("Intro", 0.0, 5.0), ("Second", 5.0, 10.0)], 10.0);
    let source = SubtitleTrack::parse_str(common::SAMPLE_SRT)?;

    let sliced = SubtitleSlicer::new(SliceOptions::default()).slice(&source, &plan);
    let written = write_sliced_tracks(&sliced, &plan, temp_dir.path())?;

    assert_eq!(
        written,
        vec![
            temp_dir.path().join("01 - Intro.srt"),
            temp_dir.path().join("02 - Second.srt")
        ]
    );
    let first = SubtitleTrack::parse_file(&written[0])?;
    assert_eq!(first.entries.len(), 1);
    assert_eq!(spans(&first.entries), vec![(1_000, 4_000)]);

    let second = SubtitleTrack::parse_file(&written[1])?;
    assert_eq!(spans(&second.entries), vec![(0, 4_000)]);
    Ok(())
}
