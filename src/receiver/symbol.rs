//! Soft symbol recovery, sync tracking, and timing optimization
//!
//! The symbol processor turns batches of demodulated phase samples into
//! decided dibits while continuously refining its estimate of where, and
//! how often, to sample. Sync patterns are hunted by three correlators
//! offset by thirds of a symbol; a candidate detection is confirmed by a
//! ternary search that fine tunes the sampling offset against the sync
//! correlation score, and confirmed detections steer the observed symbol
//! rate.

#[cfg(not(test))]
use log::{debug, trace, warn};

#[cfg(test)]
use std::{println as debug, println as trace, println as warn};

use crate::message::DataUnitId;

use super::bch;
use super::correlator::{clamp_soft, SyncCorrelator, SYNC_PATTERN_SYMBOLS, SYNC_SYMBOL_LENGTH};
use super::dibit::{Dibit, DibitByteAssembler, DibitDelayLine, NID_DIBIT_LENGTH};
use super::framing::MessageFramer;
use super::nid;

/// Sync (24 dibits) plus two dibits of margin for the optimizer window
const BUFFER_PROTECTED_REGION_DIBITS: usize = 26;

/// Samples consumed between buffer compactions; sized for efficiency
const BUFFER_WORKSPACE_DIBITS: usize = 25;

const BUFFER_LENGTH_DIBITS: usize = BUFFER_PROTECTED_REGION_DIBITS + BUFFER_WORKSPACE_DIBITS;

/// Length of the longest messages, LDU1 and LDU2, in symbols: sync lock is
/// surrendered when no sync arrives within this span
const MAX_SYMBOLS_FOR_FINE_SYNC: u64 = 890;

/// Minimum symbols between syncs for a meaningful timing-drift measurement
const MIN_SYMBOLS_FOR_TIMING_ADJUST: u64 = 72;

/// Non-standard DUID warnings logged before going quiet
const MAX_DUID_WARNINGS: u32 = 3;

/// Decision-feedback symbol processor
///
/// Owns everything downstream of the demodulator: the sample buffer, the
/// correlator bank, the sync-plus-NID delay line, the BCH decode of the
/// NID, and the message framer fed by its symbol decisions.
#[derive(Clone, Debug)]
pub(crate) struct SymbolProcessor {
    framer: MessageFramer,
    sync_primary: SyncCorrelator,
    sync_lag1: SyncCorrelator,
    sync_lag2: SyncCorrelator,
    delay_line: DibitDelayLine,
    byte_assembler: DibitByteAssembler,
    sync_lock: bool,
    lag_offset1: f32,
    lag_offset2: f32,
    samples_per_symbol: f32,
    observed_sps: f32,
    sample_point: f32,
    buffer: Vec<f32>,
    load_pointer: usize,
    buffer_pointer: usize,
    workspace_length: usize,
    previous_symbol_length: u64,
    symbols_since_sync: u64,
    previous_duid: DataUnitId,
    previous_nac: u16,
    detect_threshold: f32,
    accept_threshold: f32,
    duid_warnings: u32,
}

impl SymbolProcessor {
    pub fn new(
        samples_per_symbol: f32,
        detect_threshold: f32,
        accept_threshold: f32,
        bitstream_enabled: bool,
    ) -> Self {
        let mut out = Self {
            framer: MessageFramer::new(),
            sync_primary: SyncCorrelator::new(),
            sync_lag1: SyncCorrelator::new(),
            sync_lag2: SyncCorrelator::new(),
            delay_line: DibitDelayLine::new(),
            byte_assembler: DibitByteAssembler::new(bitstream_enabled),
            sync_lock: false,
            lag_offset1: 0.0,
            lag_offset2: 0.0,
            samples_per_symbol: 0.0,
            observed_sps: 0.0,
            sample_point: 0.0,
            buffer: Vec::new(),
            load_pointer: 0,
            buffer_pointer: 0,
            workspace_length: 0,
            previous_symbol_length: 0,
            // one past the NID span, so the delay-line prefill is never
            // mistaken for a fresh NID
            symbols_since_sync: (NID_DIBIT_LENGTH + 1) as u64,
            previous_duid: DataUnitId::Unknown,
            previous_nac: 0,
            detect_threshold,
            accept_threshold,
            duid_warnings: 0,
        };
        out.set_samples_per_symbol(samples_per_symbol);
        out
    }

    /// Set or update the nominal samples per symbol
    ///
    /// Reallocates the sample buffer and resets all timing state.
    pub fn set_samples_per_symbol(&mut self, samples_per_symbol: f32) {
        self.samples_per_symbol = samples_per_symbol;
        self.observed_sps = samples_per_symbol;
        self.sample_point = samples_per_symbol;
        self.lag_offset1 = samples_per_symbol / 3.0;
        self.lag_offset2 = 2.0 * samples_per_symbol / 3.0;
        self.workspace_length = (BUFFER_WORKSPACE_DIBITS as f32 * samples_per_symbol).ceil() as usize;
        let buffer_length = (BUFFER_LENGTH_DIBITS as f32 * samples_per_symbol).ceil() as usize;
        self.buffer = vec![0.0; buffer_length];
        self.load_pointer = (BUFFER_PROTECTED_REGION_DIBITS as f32 * samples_per_symbol).ceil() as usize;
        self.buffer_pointer = self.load_pointer;
    }

    pub fn framer(&mut self) -> &mut MessageFramer {
        &mut self.framer
    }

    pub fn observed_samples_per_symbol(&self) -> f32 {
        self.observed_sps
    }

    pub fn sync_locked(&self) -> bool {
        self.sync_lock
    }

    pub fn set_bitstream_enabled(&mut self, enabled: bool) {
        self.byte_assembler.set_enabled(enabled);
    }

    pub fn take_bitstream(&mut self) -> Vec<Vec<u8>> {
        self.byte_assembler.take()
    }

    /// Process a batch of demodulated phase samples into symbols
    pub fn receive(&mut self, samples: &[f32]) {
        let mut samples_pointer = 0;

        while samples_pointer < samples.len() {
            if self.load_pointer == self.buffer.len() {
                self.buffer.copy_within(self.workspace_length.., 0);
                self.load_pointer -= self.workspace_length;
                self.buffer_pointer -= self.workspace_length;
            }

            let copy_length =
                (self.buffer.len() - self.load_pointer).min(samples.len() - samples_pointer);
            self.buffer[self.load_pointer..self.load_pointer + copy_length]
                .copy_from_slice(&samples[samples_pointer..samples_pointer + copy_length]);
            samples_pointer += copy_length;
            self.load_pointer += copy_length;

            // the interpolator needs 1 sample of lookahead and the
            // optimizer probes up to 6 more
            while self.buffer_pointer + 7 < self.load_pointer {
                self.buffer_pointer += 1;
                self.sample_point -= 1.0;

                if self.sample_point < 1.0 {
                    self.process_symbol();
                    self.sample_point += self.observed_sps;
                }
            }
        }
    }

    /// Emit one symbol at the current sample point
    fn process_symbol(&mut self) {
        self.symbols_since_sync += 1;

        if self.symbols_since_sync > MAX_SYMBOLS_FOR_FINE_SYNC {
            if self.sync_lock {
                debug!(
                    "sync lock surrendered after {} symbols without a sync",
                    self.symbols_since_sync
                );
            }
            self.sync_lock = false;
            self.previous_duid = DataUnitId::Unknown;
            self.previous_nac = 0;
        }

        // sub-sample position stays in [0, 1); allow a hair of float dust
        debug_assert!(self.sample_point > -0.01 && self.sample_point < 1.0);

        let soft_symbol = interpolate(
            self.buffer[self.buffer_pointer],
            self.buffer[self.buffer_pointer + 1],
            self.sample_point,
        );

        let symbol = Dibit::from_phase(soft_symbol);
        self.framer.receive(symbol);

        // symbols dwell in the delay line until the NID has been examined,
        // then fall through to the raw bitstream recorder
        let ejected = self.delay_line.push(symbol);
        self.byte_assembler.receive(ejected);

        // the lagging correlators see the same stream interpolated a third
        // and two thirds of a symbol earlier
        let lag1 = self.buffer_pointer as f32 + self.sample_point - self.lag_offset1;
        let lag2 = self.buffer_pointer as f32 + self.sample_point - self.lag_offset2;
        let lag1_integral = lag1.floor() as usize;
        let lag2_integral = lag2.floor() as usize;
        let soft_lag1 = interpolate(
            self.buffer[lag1_integral],
            self.buffer[lag1_integral + 1],
            lag1 - lag1_integral as f32,
        );
        let soft_lag2 = interpolate(
            self.buffer[lag2_integral],
            self.buffer[lag2_integral + 1],
            lag2 - lag2_integral as f32,
        );

        let score_lag1 = self.sync_lag1.process(soft_lag1);
        let score_lag2 = self.sync_lag2.process(soft_lag2);
        let score_primary = self.sync_primary.process(soft_symbol);

        // under sync lock the primary correlator alone is trusted; in
        // acquisition the strongest of the three candidates is tried
        if self.sync_lock && score_primary > self.detect_threshold && self.optimize(0.0) {
            self.accept_sync(score_primary);
        } else if self.symbols_since_sync > 1
            && score_lag1 > score_primary
            && score_lag1 > score_lag2
            && score_lag1 > self.detect_threshold
            && self.optimize(-self.lag_offset1)
        {
            self.accept_sync(score_lag1);
        } else if self.symbols_since_sync > 1
            && score_lag2 > score_primary
            && score_lag2 > self.detect_threshold
            && self.optimize(-self.lag_offset2)
        {
            self.accept_sync(score_lag2);
        } else if score_primary > self.detect_threshold && self.optimize(0.0) {
            self.accept_sync(score_primary);
        }

        // the NID trails the sync by 33 dibits: 32 of data plus the
        // interleaved status symbol
        if self.symbols_since_sync == (NID_DIBIT_LENGTH - SYNC_SYMBOL_LENGTH) as u64 {
            self.process_nid();
        }
    }

    fn accept_sync(&mut self, score: f32) {
        self.previous_symbol_length = self.symbols_since_sync;
        trace!(
            "sync accepted: score {:.1} after {} symbols",
            score,
            self.previous_symbol_length
        );
        self.symbols_since_sync = 0;
    }

    /// Refine the sampling offset against the sync correlation score
    ///
    /// Evaluates the score over the 24-symbol window ending at the current
    /// sample point plus `additional_offset`, descending by ternary search.
    /// Returns false, leaving all timing untouched, when the best found
    /// score stays below the acceptance threshold.
    fn optimize(&mut self, additional_offset: f32) -> bool {
        // start of the first symbol of the sync window
        let offset = self.buffer_pointer as f32 + self.sample_point + additional_offset
            - self.observed_sps * (SYNC_SYMBOL_LENGTH - 1) as f32;

        let mut step = if self.sync_lock {
            self.observed_sps / 40.0
        } else {
            self.observed_sps / 10.0
        };
        let step_min = 0.03f32;
        let adjustment_max = self.observed_sps / 2.0;
        let mut adjustment = 0.0f32;

        let mut score_center = self.score(offset);
        let mut score_left = self.score(offset - step);
        let mut score_right = self.score(offset + step);

        while step > step_min && adjustment.abs() <= adjustment_max {
            if score_left > score_right && score_left > score_center {
                adjustment -= step;
                score_right = score_center;
                score_center = score_left;
                score_left = self.score(offset + adjustment - step);
            } else if score_right > score_left && score_right > score_center {
                adjustment += step;
                score_left = score_center;
                score_center = score_right;
                score_right = self.score(offset + adjustment + step);
            } else {
                step *= 0.5;

                if step > step_min {
                    score_left = self.score(offset + adjustment - step);
                    score_right = self.score(offset + adjustment + step);
                }
            }
        }

        if score_center < self.accept_threshold {
            return false;
        }

        if additional_offset != 0.0 {
            adjustment += additional_offset;
        }

        if self.sync_lock && adjustment.abs() > 0.5 {
            trace!("sync lock adjustment [{}] constrained to +/- 0.5", adjustment);
            adjustment = adjustment.clamp(-0.5, 0.5);
        }

        self.sample_point += adjustment;

        while self.sample_point < 0.0 {
            self.sample_point += 1.0;
            self.buffer_pointer -= 1;
        }

        while self.sample_point > 1.0 {
            self.sample_point -= 1.0;
            self.buffer_pointer += 1;
        }

        // steer the observed symbol rate by a fifth of the per-symbol
        // drift measured across the message just ended
        if self.sync_lock
            && adjustment.abs() < 0.5
            && self.symbols_since_sync >= MIN_SYMBOLS_FOR_TIMING_ADJUST
            && self.symbols_since_sync <= MAX_SYMBOLS_FOR_FINE_SYNC
        {
            self.observed_sps +=
                (adjustment as f64 / self.symbols_since_sync as f64 * 0.2) as f32;
        }

        true
    }

    /// Sync correlation score for a window starting at the given buffer
    /// offset, striding at the observed symbol spacing
    fn score(&self, offset: f32) -> f32 {
        let mut pointer = offset.floor() as isize;
        let mut fractional = offset - pointer as f32;
        let mut score = 0.0f32;

        for ideal in SYNC_PATTERN_SYMBOLS {
            if pointer < 0 || pointer as usize + 1 >= self.buffer.len() {
                // probe fell outside the buffered samples
                return f32::MIN;
            }

            let soft_symbol = interpolate(
                self.buffer[pointer as usize],
                self.buffer[pointer as usize + 1],
                fractional,
            );
            score += clamp_soft(soft_symbol) * ideal;

            fractional += self.observed_sps;
            let carry = fractional.floor();
            pointer += carry as isize;
            fractional -= carry;
        }

        score
    }

    /// Examine the delay line for a valid NID behind the detected sync
    fn process_nid(&mut self) {
        let word = nid::extract(&self.delay_line);

        match bch::decode(word) {
            Some((corrected, errors)) => {
                let nac = nid::nac(corrected);
                let duid = DataUnitId::from_value(nid::duid_value(corrected));

                trace!(
                    "NID decoded: NAC {:#05x} {} ({} bits corrected)",
                    nac,
                    duid,
                    errors
                );

                self.previous_nac = nac;
                self.previous_duid = duid;
                self.sync_lock = true;

                if !duid.is_primary() && self.duid_warnings < MAX_DUID_WARNINGS {
                    self.duid_warnings += 1;
                    warn!(
                        "non-standard data unit ID value detected [{}]",
                        nid::duid_value(corrected)
                    );
                }

                self.framer.sync_detected(nac, duid, true);
            }
            None => {
                // solid sync but no confirmable NID: hand the framer a
                // placeholder, sized to be resolved at the next sync
                debug!(
                    "NID unrecoverable; raw DUID reads {}",
                    DataUnitId::from_value(nid::duid_value(word))
                );

                self.previous_duid = DataUnitId::Placeholder;
                self.framer
                    .sync_detected(self.previous_nac, DataUnitId::Placeholder, false);
            }
        }
    }
}

/// Linear interpolation between two phase values, in radians
///
/// When the endpoints straddle the ±π discontinuity, the smaller is
/// unwrapped by 2π before blending and the result wrapped back into
/// (−π, π].
pub(crate) fn interpolate(a: f32, b: f32, mu: f32) -> f32 {
    use std::f32::consts::{PI, TAU};

    if (a - b).abs() > PI {
        let (a, b) = if a < b { (a + TAU, b) } else { (a, b + TAU) };
        let blended = a + (b - a) * mu;

        if blended > PI {
            blended - TAU
        } else {
            blended
        }
    } else {
        a + (b - a) * mu
    }
}
