/*!
 * # chapsplit - cut chaptered videos into one file per chapter
 *
 * A Rust library that turns a chaptered video (a local file or a URL handled by
 * yt-dlp) into one re-encoded clip per chapter, with matching subtitle files.
 *
 * ## Features
 *
 * - Chapters from source metadata, container chapters or a chapter list file
 * - Plan validation: clamping, overlap trimming, stable file names
 * - Frame-accurate re-encode with ffmpeg on CPU (x264) or GPU (NVENC)
 * - Automatic retries on slower presets, duration validation of every output
 * - Bounded parallel encoding with cancellation
 * - SRT/WebVTT subtitle slicing, rebased to each segment
 * - JSON and Markdown run manifests
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `timecode`: Human timecode parsing and formatting
 * - `naming`: Filesystem-safe output names
 * - `planning`: Chapter validation and the segment plan
 * - `subtitle_processor`: SRT/WebVTT parsing and SRT writing
 * - `subtitle_slicer`: Per-segment subtitle tracks
 * - `encoding`: Executor trait, ffmpeg backend and the encode orchestrator:
 *   - `encoding::orchestrator`: Per-segment state machine and worker pool
 *   - `encoding::ffmpeg`: ffmpeg/ffprobe executor
 *   - `encoding::report`: Run report and manifests
 * - `providers`: Source acquisition:
 *   - `providers::local`: Local media files
 *   - `providers::ytdlp`: Remote videos through yt-dlp
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod encoding;
pub mod errors;
pub mod file_utils;
pub mod naming;
pub mod planning;
pub mod providers;
pub mod subtitle_processor;
pub mod subtitle_slicer;
pub mod timecode;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome, SourceOverrides};
pub use encoding::{CancellationToken, EncodeExecutor, EncodeOrchestrator, RunReport};
pub use errors::{AcquisitionError, AppError, PlanError, SegmentFailure, SubtitleError};
pub use planning::{Chapter, SegmentPlan, SegmentPlanner};
pub use subtitle_processor::{SubtitleEntry, SubtitleTrack};
