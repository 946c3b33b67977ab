//! Full receiver chain

mod assembler;
mod bch;
mod correlator;
mod dibit;
mod framing;
mod nid;
mod symbol;

#[cfg(test)]
pub(crate) mod testsig;

use crate::builder::P25ReceiverBuilder;
use crate::message::{ConfigError, Message, SYMBOL_RATE};

use self::symbol::SymbolProcessor;

/// A complete P25 Phase 1 receiver core
///
/// The receiver takes batches of demodulated phase samples, in radians,
/// and performs the following operations:
///
/// 1. Symbol timing recovery with decision feedback from a bank of three
///    sync correlators offset by thirds of a symbol
/// 2. Sync confirmation and fine timing optimization by ternary search
///    over the sync correlation score
/// 3. BCH(63,16) decoding of the Network Identifier behind each sync
/// 4. Length-driven message framing, with fuzzy data unit resolution when
///    the NID cannot be corrected
///
/// To create the receiver, first create its builder:
///
/// ```
/// use p25p1::P25ReceiverBuilder;
///
/// let receiver = P25ReceiverBuilder::new(48000.0)
///     .build()
///     .expect("supported sample rate");
/// assert_eq!(receiver.input_rate(), 48000.0);
/// ```
///
/// Processing is push driven: each call to
/// [`receive()`](P25Receiver::receive) runs to completion on the caller's
/// thread and yields the messages framed along the way, in channel order.
#[derive(Clone, Debug)]
pub struct P25Receiver {
    symbols: SymbolProcessor,
    input_rate: f64,
}

impl P25Receiver {
    pub(crate) fn from_builder(cfg: &P25ReceiverBuilder) -> Result<Self, ConfigError> {
        let (detect, accept) = cfg.sync_thresholds();
        let mut out = Self {
            symbols: SymbolProcessor::new(1.0, detect, accept, cfg.bitstream_tap()),
            input_rate: 0.0,
        };
        out.set_sample_rate(cfg.sample_rate())?;
        Ok(out)
    }

    /// Input sampling rate, in Hz
    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    /// Set or update the input sampling rate
    ///
    /// The rate must exceed twice the 4800 Hz symbol rate. All timing
    /// state is reset; any message under assembly is unaffected and will
    /// be resolved at the next sync.
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), ConfigError> {
        if sample_rate <= (2 * SYMBOL_RATE) as f64 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }

        self.input_rate = sample_rate;
        self.symbols
            .set_samples_per_symbol((sample_rate / SYMBOL_RATE as f64) as f32);
        Ok(())
    }

    /// Process a batch of demodulated phase samples
    ///
    /// `timestamp_ms` is the wall-clock time of the first sample of the
    /// batch; emitted messages are stamped from it at dibit resolution.
    /// Returns the messages framed while consuming the batch, in order.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn receive(
        &mut self,
        samples: &[f32],
        timestamp_ms: i64,
    ) -> impl Iterator<Item = Message> + '_ {
        self.symbols.framer().set_timestamp(timestamp_ms);
        self.symbols.receive(samples);
        self.symbols.framer().drain()
    }

    /// Push one second of silence through the chain
    ///
    /// Useful at the end of a recording to drive out symbols still
    /// buffered ahead of the sample pointer.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn flush(&mut self) -> impl Iterator<Item = Message> + '_ {
        let silence = vec![0.0f32; self.input_rate as usize];
        self.symbols.receive(&silence);
        self.symbols.framer().drain()
    }

    /// True while the most recent NID decoded cleanly and timing is being
    /// tracked in fine mode
    pub fn sync_locked(&self) -> bool {
        self.symbols.sync_locked()
    }

    /// Current estimate of input samples per symbol
    ///
    /// Starts at `input_rate / 4800` and is steered by the measured
    /// timing drift while sync lock is held.
    pub fn observed_samples_per_symbol(&self) -> f32 {
        self.symbols.observed_samples_per_symbol()
    }

    /// Resume dispatching messages
    pub fn start(&mut self) {
        self.symbols.framer().start();
    }

    /// Stop dispatching messages; sample processing continues
    pub fn stop(&mut self) {
        self.symbols.framer().stop();
    }

    /// Enable or disable the raw bitstream tap
    pub fn set_bitstream_enabled(&mut self, enabled: bool) {
        self.symbols.set_bitstream_enabled(enabled);
    }

    /// Drain byte-aligned buffers of every decided dibit, for external
    /// recording
    pub fn take_bitstream(&mut self) -> Vec<Vec<u8>> {
        self.symbols.take_bitstream()
    }
}
