//! Receiver configuration

use crate::message::ConfigError;
use crate::receiver::P25Receiver;

/// Builds a P25 Phase 1 receiver
///
/// The builder comes with a sensible set of default options. All you
/// really need to provide is the input sampling rate.
///
/// ```
/// use p25p1::P25ReceiverBuilder;
///
/// let receiver = P25ReceiverBuilder::new(50000.0)
///     .with_bitstream_tap(true)
///     .build()
///     .expect("supported sample rate");
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct P25ReceiverBuilder {
    sample_rate: f64,
    sync_detect_threshold: f32,
    sync_accept_threshold: f32,
    bitstream_tap: bool,
}

impl P25ReceiverBuilder {
    /// New receiver with defaults at the given input sampling rate, in Hz
    ///
    /// The rate must exceed twice the 4800 Hz symbol rate; common choices
    /// are 25000 and 50000. The rate is validated at
    /// [`build()`](Self::build).
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            sync_detect_threshold: 65.0,
            sync_accept_threshold: 95.0,
            bitstream_tap: false,
        }
    }

    /// Sync correlation thresholds
    ///
    /// `detect` is the score a correlator must reach before a candidate
    /// sync is examined at all; `accept` is the score the optimized
    /// alignment must reach for the sync to be taken. The defaults of 65
    /// and 95 suit signals with ordinary C4FM pulse shaping; lowering
    /// `accept` trades false syncs for sensitivity.
    pub fn with_sync_thresholds(&mut self, detect: f32, accept: f32) -> &mut Self {
        self.sync_detect_threshold = detect;
        self.sync_accept_threshold = accept.max(detect);
        self
    }

    /// Record every decided dibit to a byte-aligned bitstream tap
    ///
    /// Drain the tap with
    /// [`take_bitstream()`](crate::P25Receiver::take_bitstream).
    pub fn with_bitstream_tap(&mut self, enabled: bool) -> &mut Self {
        self.bitstream_tap = enabled;
        self
    }

    /// Build the receiver
    ///
    /// Fails if the sampling rate cannot support symbol recovery.
    pub fn build(&self) -> Result<P25Receiver, ConfigError> {
        P25Receiver::from_builder(self)
    }

    pub(crate) fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub(crate) fn sync_thresholds(&self) -> (f32, f32) {
        (self.sync_detect_threshold, self.sync_accept_threshold)
    }

    pub(crate) fn bitstream_tap(&self) -> bool {
        self.bitstream_tap
    }
}
