//! Sync pattern correlation

use arraydeque::{ArrayDeque, Wrapping};

use std::f32::consts::FRAC_PI_4;

/// The 48-bit P25 frame sync word, most significant bit transmitted first
#[allow(dead_code)]
pub(crate) const SYNC_PATTERN: u64 = 0x5575_F5FF_77FF;

/// Length of the sync pattern, in symbols
pub(crate) const SYNC_SYMBOL_LENGTH: usize = 24;

/// Soft symbols are clamped to the outermost ideal phases for correlation
pub(crate) const MAX_POSITIVE_SOFT_SYMBOL: f32 = 3.0 * FRAC_PI_4;
pub(crate) const MAX_NEGATIVE_SOFT_SYMBOL: f32 = -3.0 * FRAC_PI_4;

const P3: f32 = 3.0 * FRAC_PI_4;
const M3: f32 = -3.0 * FRAC_PI_4;

/// The sync word as ideal symbol phases; the standard builds it entirely
/// from ±3 symbols:
/// +3 +3 +3 +3 +3 −3 +3 +3 −3 −3 +3 +3 −3 −3 −3 −3 +3 −3 +3 −3 −3 −3 −3 −3
pub(crate) const SYNC_PATTERN_SYMBOLS: [f32; SYNC_SYMBOL_LENGTH] = [
    P3, P3, P3, P3, P3, M3, P3, P3, M3, M3, P3, P3, M3, M3, M3, M3, P3, M3, P3, M3, M3, M3, M3, M3,
];

/// Sliding dot product of the last 24 soft symbols against the sync pattern
///
/// Three independent instances run in parallel in the symbol processor, one
/// at the decision point and two lagging by thirds of a symbol, so that a
/// sync whose coarse timing is off by up to half a symbol still correlates
/// on at least one of them.
#[derive(Clone, Debug)]
pub(crate) struct SyncCorrelator {
    window: ArrayDeque<f32, SYNC_SYMBOL_LENGTH, Wrapping>,
}

impl SyncCorrelator {
    pub fn new() -> Self {
        let mut out = Self {
            window: ArrayDeque::new(),
        };
        out.reset();
        out
    }

    pub fn reset(&mut self) {
        self.window.clear();
        for _ in 0..self.window.capacity() {
            self.window.push_back(0.0f32);
        }
    }

    /// Shift in a soft symbol and return the updated correlation score
    ///
    /// An ideal noiseless sync scores about 133; a window of nothing but
    /// low symbols is bounded near 44.
    pub fn process(&mut self, soft_symbol: f32) -> f32 {
        self.window.push_back(clamp_soft(soft_symbol));
        self.window
            .iter()
            .zip(SYNC_PATTERN_SYMBOLS.iter())
            .map(|(symbol, ideal)| symbol * ideal)
            .sum()
    }
}

/// Clamp a phase to the correlation range [−3π/4, 3π/4]
#[inline]
pub(crate) fn clamp_soft(soft_symbol: f32) -> f32 {
    soft_symbol.clamp(MAX_NEGATIVE_SOFT_SYMBOL, MAX_POSITIVE_SOFT_SYMBOL)
}
