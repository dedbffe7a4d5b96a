/*!
 * Hardware capability snapshot.
 *
 * The backend decision is made once, before any segment is dispatched, and
 * handed to every worker as an immutable value.
 */

use log::{info, warn};

use crate::encoding::executor::{Backend, EncodeExecutor};
use crate::errors::OrchestratorError;

/// Backend decision shared by all workers of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    pub gpu_requested: bool,
    /// `None` when the GPU was not requested and therefore never probed
    pub gpu_available: Option<bool>,
    /// Backend every segment and attempt uses
    pub backend: Backend,
    /// The GPU was requested but the run fell back to the CPU
    pub downgraded: bool,
}

impl CapabilitySnapshot {
    /// Decide the backend for a run, probing the GPU only when it was requested
    pub async fn detect(
        executor: &dyn EncodeExecutor,
        gpu_requested: bool,
        fallback_to_cpu: bool,
    ) -> Result<Self, OrchestratorError> {
        if !gpu_requested {
            return Ok(Self::cpu_only());
        }

        if executor.probe_gpu().await {
            info!("Hardware encoding available, using the GPU backend");
            return Ok(Self {
                gpu_requested,
                gpu_available: Some(true),
                backend: Backend::Gpu,
                downgraded: false,
            });
        }

        if fallback_to_cpu {
            warn!("Hardware encoding requested but unavailable, falling back to the CPU backend");
            Ok(Self {
                gpu_requested,
                gpu_available: Some(false),
                backend: Backend::Cpu,
                downgraded: true,
            })
        } else {
            Err(OrchestratorError::ExecutorUnavailable(
                "hardware encoding requested but unavailable and CPU fallback is disabled".to_string(),
            ))
        }
    }

    pub fn cpu_only() -> Self {
        Self {
            gpu_requested: false,
            gpu_available: None,
            backend: Backend::Cpu,
            downgraded: false,
        }
    }
}
