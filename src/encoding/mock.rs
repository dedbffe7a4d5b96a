/*!
 * Mock executor for testing.
 *
 * This module provides a scripted executor that simulates different behaviors:
 * - `MockExecutor::working()` - Always encodes with the exact expected duration
 * - `MockExecutor::fail_until_tier(n)` - Fails every attempt below preset tier `n`
 * - `MockExecutor::failing()` - Every encode fails
 * - `MockExecutor::wrong_duration(delta)` - Outputs are `delta` seconds off
 * - `MockExecutor::slow(ms)` - Encodes after a delay
 * - `MockExecutor::unavailable()` - The tool is missing
 *
 * Outputs are small placeholder files; their "duration" is remembered per path
 * and returned by `probe_duration`.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::encoding::executor::{EncodeExecutor, EncodeRequest};
use crate::errors::{ExecutorError, ProbeError};

/// Behavior mode for the mock executor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Every encode succeeds with the expected duration
    Working,
    /// Encodes below this preset tier fail
    FailUntilTier { tier: u32 },
    /// Every encode fails
    Failing,
    /// Outputs are off by `delta_s` seconds
    WrongDuration { delta_s: f64 },
    /// Every encode takes `delay_ms` before succeeding
    Slow { delay_ms: u64 },
    /// `check_available` fails
    Unavailable,
    /// The tool disappears after `after` successful encodes
    VanishesAfter { after: usize },
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<EncodeRequest>,
    durations: HashMap<PathBuf, f64>,
}

/// Scripted `EncodeExecutor`
#[derive(Debug, Clone)]
pub struct MockExecutor {
    behavior: MockBehavior,
    gpu_available: bool,
    resolution: Option<(u32, u32)>,
    duration_delay_ms: u64,
    state: Arc<Mutex<MockState>>,
    gpu_probe_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockExecutor {
    /// Create a new mock executor with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            gpu_available: false,
            resolution: Some((1920, 1080)),
            duration_delay_ms: 0,
            state: Arc::new(Mutex::new(MockState::default())),
            gpu_probe_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn fail_until_tier(tier: u32) -> Self {
        Self::new(MockBehavior::FailUntilTier { tier })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn wrong_duration(delta_s: f64) -> Self {
        Self::new(MockBehavior::WrongDuration { delta_s })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn unavailable() -> Self {
        Self::new(MockBehavior::Unavailable)
    }

    pub fn vanishes_after(after: usize) -> Self {
        Self::new(MockBehavior::VanishesAfter { after })
    }

    /// Report the hardware path as working
    pub fn with_gpu(mut self, available: bool) -> Self {
        self.gpu_available = available;
        self
    }

    /// Resolution returned by `probe_resolution`; `None` makes the probe fail
    pub fn with_resolution(mut self, resolution: Option<(u32, u32)>) -> Self {
        self.resolution = resolution;
        self
    }

    /// Make every duration lookup of an existing file take `delay_ms`
    pub fn with_duration_delay(mut self, delay_ms: u64) -> Self {
        self.duration_delay_ms = delay_ms;
        self
    }

    /// Pretend the file at `path` lasts `duration_s` seconds
    pub fn set_duration(&self, path: impl Into<PathBuf>, duration_s: f64) {
        self.state.lock().durations.insert(path.into(), duration_s);
    }

    /// Every encode request received, in call order
    pub fn requests(&self) -> Vec<EncodeRequest> {
        self.state.lock().requests.clone()
    }

    pub fn encode_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn gpu_probe_count(&self) -> usize {
        self.gpu_probe_count.load(Ordering::SeqCst)
    }

    /// Highest number of encodes observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn produce(&self, request: &EncodeRequest, duration_s: f64) -> Result<(), ExecutorError> {
        tokio::fs::write(&request.output, b"mock media")
            .await
            .map_err(|e| ExecutorError::Failed {
                code: None,
                message: e.to_string(),
            })?;
        self.set_duration(request.output.clone(), duration_s);
        Ok(())
    }

    async fn run_encode(&self, request: &EncodeRequest, call_number: usize) -> Result<(), ExecutorError> {
        let expected = request.duration_s();
        match self.behavior {
            MockBehavior::Working | MockBehavior::Unavailable => self.produce(request, expected).await,
            MockBehavior::FailUntilTier { tier } => {
                if request.preset_tier < tier {
                    Err(ExecutorError::Failed {
                        code: Some(1),
                        message: format!("simulated failure at tier {}", request.preset_tier),
                    })
                } else {
                    self.produce(request, expected).await
                }
            }
            MockBehavior::Failing => Err(ExecutorError::Failed {
                code: Some(1),
                message: "simulated failure".to_string(),
            }),
            MockBehavior::WrongDuration { delta_s } => self.produce(request, expected + delta_s).await,
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                self.produce(request, expected).await
            }
            MockBehavior::VanishesAfter { after } => {
                if call_number >= after {
                    Err(ExecutorError::Unavailable("simulated tool loss".to_string()))
                } else {
                    self.produce(request, expected).await
                }
            }
        }
    }
}

// Decrements the in-flight counter even when the encode future is dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EncodeExecutor for MockExecutor {
    async fn check_available(&self) -> Result<(), ExecutorError> {
        match self.behavior {
            MockBehavior::Unavailable => Err(ExecutorError::Unavailable("mock tool missing".to_string())),
            _ => Ok(()),
        }
    }

    async fn probe_gpu(&self) -> bool {
        self.gpu_probe_count.fetch_add(1, Ordering::SeqCst);
        self.gpu_available
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<(), ExecutorError> {
        let call_number = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            state.requests.len() - 1
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        // Let other workers interleave
        tokio::task::yield_now().await;
        self.run_encode(request, call_number).await
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }
        if self.duration_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.duration_delay_ms)).await;
        }
        self.state
            .lock()
            .durations
            .get(path)
            .copied()
            .ok_or_else(|| ProbeError::InvalidOutput(format!("no duration recorded for {}", path.display())))
    }

    async fn probe_resolution(&self, _path: &Path) -> Result<(u32, u32), ProbeError> {
        self.resolution
            .ok_or_else(|| ProbeError::Failed("simulated resolution probe failure".to_string()))
    }
}
