/*!
 * The external encode/probe collaborator.
 */

use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::encoding::crop::CropBox;
use crate::errors::{ExecutorError, ProbeError};

/// Encode execution path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Software encoder (libx264)
    Cpu,
    /// Hardware encoder (NVENC)
    Gpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// One encode invocation for one segment attempt
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub source: PathBuf,
    /// Where the executor must write; the orchestrator renames it on success
    pub output: PathBuf,
    pub start_s: f64,
    pub end_s: f64,
    pub backend: Backend,
    /// 1-based tier, grows with every retry
    pub preset_tier: u32,
    /// Encoder preset resolved from the tier
    pub preset: String,
    pub crop: Option<CropBox>,
}

impl EncodeRequest {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// Encoder and prober used by the orchestrator
///
/// Implementations shell out to real tools (`FfmpegExecutor`) or script the
/// results (`MockExecutor`). Every method may be called concurrently.
#[async_trait]
pub trait EncodeExecutor: Send + Sync + Debug {
    /// Fail when the encode tool is missing or unusable
    async fn check_available(&self) -> Result<(), ExecutorError>;

    /// Whether the hardware encode path works on this machine
    async fn probe_gpu(&self) -> bool;

    /// Encode `request.start_s..request.end_s` of the source into `request.output`
    async fn encode(&self, request: &EncodeRequest) -> Result<(), ExecutorError>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError>;

    /// Width and height of the first video stream
    async fn probe_resolution(&self, path: &Path) -> Result<(u32, u32), ProbeError>;
}
