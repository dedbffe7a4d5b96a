/*!
 * Segment encoding.
 *
 * - `executor`: the `EncodeExecutor` trait and the request it receives
 * - `ffmpeg`: executor shelling out to ffmpeg/ffprobe
 * - `mock`: scripted executor for tests
 * - `capability`: run-wide backend decision
 * - `crop`: crop window computation and limits
 * - `presets`: preset ladders used by retries
 * - `cancel`: cancellation token
 * - `orchestrator`: the per-segment state machine and worker pool
 * - `report`: run report and manifests
 */

pub use self::cancel::CancellationToken;
pub use self::capability::CapabilitySnapshot;
pub use self::crop::{CropBox, CropRect};
pub use self::executor::{Backend, EncodeExecutor, EncodeRequest};
pub use self::ffmpeg::FfmpegExecutor;
pub use self::orchestrator::{AttemptOutcome, EncodeAttempt, EncodeOrchestrator, EncodeSettings, ProgressCallback};
pub use self::presets::PresetLadder;
pub use self::report::{RunReport, SegmentReport, SegmentStatus};

pub mod cancel;
pub mod capability;
pub mod crop;
pub mod executor;
pub mod ffmpeg;
pub mod mock;
pub mod orchestrator;
pub mod presets;
pub mod report;
