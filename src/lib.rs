//! # p25p1: APCO Project 25 Phase 1 receiver core
//!
//! This crate turns a stream of demodulated baseband phase samples into
//! framed P25 Phase 1 messages with validated Network Identifiers. It is
//! built for software-defined radio monitoring: it tolerates noisy
//! channels, tracks symbol timing drift, recovers from sync loss, and
//! still produces useful output when the network header arrives corrupted.
//!
//! ## Example
//!
//! You will first need demodulated *phase samples* in radians, one per
//! baseband sample, from a DQPSK demodulator fed with channelized I/Q at
//! your capture rate. Producing those samples is beyond the scope of this
//! crate.
//!
//! ```
//! use p25p1::{Message, P25ReceiverBuilder};
//!
//! // create a receiver at your baseband sampling rate
//! let mut receiver = P25ReceiverBuilder::new(48000.0)
//!     .build()
//!     .expect("supported sample rate");
//!
//! // phase samples from the demodulator, with the wall-clock time of
//! // the first sample of the batch
//! let samples = vec![0.0f32; 19200];
//! for message in receiver.receive(&samples, 0) {
//!     match message {
//!         Message::Frame(payload) => println!("{}", payload),
//!         Message::SyncLoss(loss) => println!("{}", loss),
//!     }
//! }
//! ```
//!
//! ## Operation
//!
//! The receiver performs the following steps, all on the caller's thread:
//!
//! 1. **Symbol recovery**: phase samples collect in a sliding buffer and
//!    symbols are taken by phase-aware linear interpolation at the tracked
//!    symbol spacing.
//! 2. **Sync detection**: three correlators, offset by thirds of a symbol,
//!    slide the 24-symbol frame sync pattern over the soft symbols.
//!    Candidate detections are confirmed by a ternary search that fine
//!    tunes the sampling offset against the correlation score, and
//!    confirmed timing error steers the observed symbol rate.
//! 3. **NID validation**: the 64-bit Network Identifier behind each sync
//!    carries its NAC and DUID under a BCH(63,16,23) code, corrected for
//!    up to 11 bit errors.
//! 4. **Framing**: message payloads are delimited by their data unit's
//!    nominal length, with interleaved status symbols removed. When a NID
//!    cannot be corrected the message is assembled anyway and its type
//!    resolved from the observed length at the next sync.
//!
//! Messages are [`FramedPayload`] events; a [`SyncLoss`] event is reported
//! for every second of channel time that passes without a sync.

mod builder;
mod message;
mod receiver;

pub use builder::P25ReceiverBuilder;
pub use message::{
    BitBuffer, ConfigError, DataUnitId, FramedPayload, Message, Protocol, SyncLoss, SYMBOL_RATE,
};
pub use receiver::P25Receiver;
