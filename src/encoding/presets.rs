/*!
 * Preset ladders.
 *
 * Tier 1 is the configured preset. Each following tier moves one step towards
 * the slowest preset of the backend and stays there once reached.
 */

use log::warn;

use crate::app_config::{NVENC_PRESETS, X264_PRESETS};
use crate::encoding::executor::Backend;

const X264_LADDER: &[&str] = &X264_PRESETS;
const NVENC_LADDER: &[&str] = &NVENC_PRESETS;

/// Ordered presets for one backend, starting from the configured one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetLadder {
    presets: &'static [&'static str],
    base: usize,
}

impl PresetLadder {
    /// Ladder for `backend` starting at `configured`. An unknown name starts at
    /// the backend default.
    pub fn new(backend: Backend, configured: &str) -> Self {
        let (presets, fallback): (&'static [&'static str], usize) = match backend {
            Backend::Cpu => (X264_LADDER, 2),
            Backend::Gpu => (NVENC_LADDER, 4),
        };

        let base = presets.iter().position(|p| *p == configured).unwrap_or_else(|| {
            warn!("Unknown {} preset '{}', using '{}'", backend, configured, presets[fallback]);
            fallback
        });

        Self { presets, base }
    }

    /// Preset for the 1-based `tier`
    pub fn preset_for_tier(&self, tier: u32) -> &'static str {
        let step = tier.saturating_sub(1) as usize;
        let position = self.base.saturating_add(step).min(self.presets.len() - 1);
        self.presets[position]
    }
}
