/*!
 * Segment planner.
 *
 * Steps, in order:
 * 1. stable sort by start time (ties keep the source order)
 * 2. clamp every range to `[0, media duration]`
 * 3. pull each end back to the next start so ranges never overlap
 * 4. drop what became empty and re-index the survivors densely from 1
 * 5. name every segment and resolve case-insensitive name collisions
 *
 * The planner is pure: the same chapters and duration always give the same plan.
 */

use std::cmp::Ordering;
use std::collections::HashMap;

use log::{debug, warn};

use crate::errors::PlanError;
use crate::naming::StemNamer;
use crate::planning::model::{Chapter, PlanWarning, SegmentEntry, SegmentPlan};

// Working copy of a chapter while it is being clamped and trimmed
struct Candidate<'a> {
    chapter: &'a Chapter,
    start_s: f64,
    end_s: f64,
}

/// Builds a `SegmentPlan` from raw chapters
pub struct SegmentPlanner<'a> {
    namer: &'a dyn StemNamer,
}

impl<'a> SegmentPlanner<'a> {
    pub fn new(namer: &'a dyn StemNamer) -> Self {
        Self { namer }
    }

    /// Build the plan for `chapters` cut from media lasting `duration_s` seconds
    pub fn plan(&self, chapters: &[Chapter], duration_s: f64) -> Result<SegmentPlan, PlanError> {
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(PlanError::InvalidDuration(duration_s));
        }

        // Chapters built outside `Chapter::new` are checked again here
        for chapter in chapters {
            Chapter::new(chapter.index, chapter.title.as_str(), chapter.start_s, chapter.end_s)?;
        }

        let mut ordered: Vec<&Chapter> = chapters.iter().collect();
        ordered.sort_by(|a, b| {
            a.start_s
                .partial_cmp(&b.start_s)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });

        let mut warnings = Vec::new();
        let clamped = Self::clamp_to_duration(&ordered, duration_s, &mut warnings);
        let survivors = Self::remove_overlaps(clamped, &mut warnings);

        if survivors.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let entries = self.assign_names(survivors, &mut warnings)?;

        for warning in &warnings {
            warn!("{}", warning);
        }
        debug!("Planned {} segment(s) over {:.3}s of media", entries.len(), duration_s);

        Ok(SegmentPlan {
            entries,
            media_duration_s: duration_s,
            warnings,
        })
    }

    fn clamp_to_duration<'c>(
        ordered: &[&'c Chapter],
        duration_s: f64,
        warnings: &mut Vec<PlanWarning>,
    ) -> Vec<Candidate<'c>> {
        let mut clamped = Vec::with_capacity(ordered.len());
        for &chapter in ordered {
            if chapter.start_s >= duration_s {
                warnings.push(PlanWarning::StartClamped {
                    chapter_index: chapter.index,
                    start_s: chapter.start_s,
                });
                continue;
            }

            let mut end_s = chapter.end_s;
            if end_s > duration_s {
                warnings.push(PlanWarning::EndClamped {
                    chapter_index: chapter.index,
                    original_end_s: end_s,
                    clamped_end_s: duration_s,
                });
                end_s = duration_s;
            }

            clamped.push(Candidate {
                chapter,
                start_s: chapter.start_s,
                end_s,
            });
        }
        clamped
    }

    fn remove_overlaps<'c>(clamped: Vec<Candidate<'c>>, warnings: &mut Vec<PlanWarning>) -> Vec<Candidate<'c>> {
        let mut survivors: Vec<Candidate<'c>> = Vec::with_capacity(clamped.len());
        for candidate in clamped {
            if let Some(previous) = survivors.last_mut() {
                if previous.end_s > candidate.start_s {
                    warnings.push(PlanWarning::OverlapTrimmed {
                        chapter_index: previous.chapter.index,
                        original_end_s: previous.end_s,
                        trimmed_end_s: candidate.start_s,
                    });
                    previous.end_s = candidate.start_s;

                    if previous.end_s <= previous.start_s {
                        warnings.push(PlanWarning::DroppedZeroLength {
                            chapter_index: previous.chapter.index,
                        });
                        survivors.pop();
                    }
                }
            }
            survivors.push(candidate);
        }
        survivors
    }

    fn assign_names(
        &self,
        survivors: Vec<Candidate<'_>>,
        warnings: &mut Vec<PlanWarning>,
    ) -> Result<Vec<SegmentEntry>, PlanError> {
        // lowercase stem -> chapter index that owns it
        let mut taken: HashMap<String, usize> = HashMap::with_capacity(survivors.len());
        let mut entries = Vec::with_capacity(survivors.len());

        for (position, candidate) in survivors.into_iter().enumerate() {
            let index = position + 1;
            let chapter = candidate.chapter;
            let stem = self.namer.safe_name(&chapter.title, index);

            let output_stem = match taken.get(&stem.to_lowercase()) {
                None => stem,
                Some(_) => {
                    let resolved = format!("{} ({})", stem, chapter.index);
                    if let Some(&owner) = taken.get(&resolved.to_lowercase()) {
                        return Err(PlanError::DuplicateOutputName {
                            stem: resolved,
                            first_index: owner,
                            second_index: chapter.index,
                        });
                    }
                    warnings.push(PlanWarning::NameCollisionResolved {
                        chapter_index: chapter.index,
                        original_stem: stem,
                        resolved_stem: resolved.clone(),
                    });
                    resolved
                }
            };

            taken.insert(output_stem.to_lowercase(), chapter.index);
            entries.push(SegmentEntry {
                index,
                chapter: chapter.clone(),
                output_stem,
                clamped_start_s: candidate.start_s,
                clamped_end_s: candidate.end_s,
            });
        }

        Ok(entries)
    }
}
