/*!
 * Segment planning.
 *
 * Turns the raw chapter list reported by a provider into a `SegmentPlan`:
 * sorted, clamped to the media duration, free of overlaps and uniquely named.
 *
 * - `model`: `Chapter`, `SegmentEntry`, `SegmentPlan` and `PlanWarning`
 * - `planner`: `SegmentPlanner`, the algorithm building a plan
 */

pub use self::model::{Chapter, PlanWarning, ProcessingEstimate, SegmentEntry, SegmentPlan};
pub use self::planner::SegmentPlanner;

pub mod model;
pub mod planner;
