//! Dibit symbols and the fixed delay plumbing around them

use std::collections::VecDeque;

use arraydeque::{ArrayDeque, Wrapping};

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

/// Length of the delay line: 24 sync dibits plus 33 NID dibits
///
/// The NID region spans 32 data dibits and the one status dibit interleaved
/// into it.
pub(crate) const NID_DIBIT_LENGTH: usize = 57;

/// One four-level symbol, two bits transmitted b1 then b2
///
/// The C4FM deviation levels map to DQPSK phase angles: ±1 symbols sit at
/// ±π/4 and ±3 symbols at ±3π/4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dibit {
    /// Bits 00, ideal phase π/4
    #[default]
    P1,
    /// Bits 01, ideal phase 3π/4
    P3,
    /// Bits 10, ideal phase −π/4
    M1,
    /// Bits 11, ideal phase −3π/4
    M3,
}

#[allow(dead_code)]
impl Dibit {
    /// Decide a symbol from a demodulated phase sample, in radians
    ///
    /// Positive phase selects the positive symbols and magnitude beyond π/2
    /// selects the ±3 symbols. The boundaries are deterministic: exactly
    /// ±π/2 decides ±1 and exactly zero decides −1.
    pub fn from_phase(sample: f32) -> Dibit {
        if sample > 0.0 {
            if sample > std::f32::consts::FRAC_PI_2 {
                Dibit::P3
            } else {
                Dibit::P1
            }
        } else if sample < -std::f32::consts::FRAC_PI_2 {
            Dibit::M3
        } else {
            Dibit::M1
        }
    }

    /// Construct from the transmitted bit pair
    pub fn from_bits(b1: bool, b2: bool) -> Dibit {
        match (b1, b2) {
            (false, false) => Dibit::P1,
            (false, true) => Dibit::P3,
            (true, false) => Dibit::M1,
            (true, true) => Dibit::M3,
        }
    }

    /// First transmitted bit
    pub fn bit1(&self) -> bool {
        matches!(self, Dibit::M1 | Dibit::M3)
    }

    /// Second transmitted bit
    pub fn bit2(&self) -> bool {
        matches!(self, Dibit::P3 | Dibit::M3)
    }

    /// Nominal DQPSK phase for this symbol, in radians
    pub fn ideal_phase(&self) -> f32 {
        use std::f32::consts::FRAC_PI_4;

        match self {
            Dibit::P1 => FRAC_PI_4,
            Dibit::P3 => 3.0 * FRAC_PI_4,
            Dibit::M1 => -FRAC_PI_4,
            Dibit::M3 => -3.0 * FRAC_PI_4,
        }
    }
}

/// Delay line holding the most recent sync plus NID dibits
///
/// Symbols pass through here before being recorded to the raw bitstream so
/// that the NID can be examined while its final dibit is still the newest
/// entry.
#[derive(Clone, Debug)]
pub(crate) struct DibitDelayLine {
    line: ArrayDeque<Dibit, NID_DIBIT_LENGTH, Wrapping>,
}

impl DibitDelayLine {
    pub fn new() -> Self {
        let mut out = Self {
            line: ArrayDeque::new(),
        };
        out.reset();
        out
    }

    /// Reset to an idle fill
    pub fn reset(&mut self) {
        self.line.clear();
        for _ in 0..self.line.capacity() {
            self.line.push_back(Dibit::default());
        }
    }

    /// Push the newest dibit, ejecting the oldest
    pub fn push(&mut self, dibit: Dibit) -> Dibit {
        self.line
            .push_back(dibit)
            .expect("wrapping delay line is kept full")
    }

    /// Index from the oldest entry: 0 is oldest, 56 is newest
    pub fn get(&self, index: usize) -> Dibit {
        self.line[index]
    }
}

/// Packs ejected dibits into bytes for external bitstream recording
///
/// Four dibits form one byte, most significant pair first. Completed
/// buffers accumulate until drained; the queue is bounded so an undrained
/// tap cannot grow without limit.
#[derive(Clone, Debug)]
pub(crate) struct DibitByteAssembler {
    enabled: bool,
    current: Vec<u8>,
    accumulator: u8,
    bit_count: u8,
    ready: VecDeque<Vec<u8>>,
    overflow_warned: bool,
}

impl DibitByteAssembler {
    /// Bytes per emitted buffer
    const BUFFER_LENGTH: usize = 300;

    /// Undrained buffers retained before the oldest are discarded
    const MAX_READY: usize = 64;

    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: Vec::with_capacity(Self::BUFFER_LENGTH),
            accumulator: 0,
            bit_count: 0,
            ready: VecDeque::new(),
            overflow_warned: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.current.clear();
            self.accumulator = 0;
            self.bit_count = 0;
            self.ready.clear();
        }
    }

    pub fn receive(&mut self, dibit: Dibit) {
        if !self.enabled {
            return;
        }

        self.accumulator = self.accumulator << 2 | (dibit.bit1() as u8) << 1 | dibit.bit2() as u8;
        self.bit_count += 2;

        if self.bit_count == 8 {
            self.current.push(self.accumulator);
            self.accumulator = 0;
            self.bit_count = 0;

            if self.current.len() == Self::BUFFER_LENGTH {
                if self.ready.len() == Self::MAX_READY {
                    if !self.overflow_warned {
                        warn!("bitstream tap not being drained; discarding oldest buffer");
                        self.overflow_warned = true;
                    }
                    self.ready.pop_front();
                }
                self.ready
                    .push_back(std::mem::replace(&mut self.current, Vec::with_capacity(Self::BUFFER_LENGTH)));
            }
        }
    }

    /// Remove and return all completed buffers
    pub fn take(&mut self) -> Vec<Vec<u8>> {
        self.ready.drain(..).collect()
    }
}
