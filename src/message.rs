//! Framed message outputs and the P25 data unit model

use std::fmt;

use arrayvec::ArrayVec;
use thiserror::Error;

/// P25 Phase 1 channel rate, in symbols (dibits) per second
pub const SYMBOL_RATE: u32 = 4800;

/// Error raised for an unusable receiver configuration
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The sample rate cannot support symbol recovery
    ///
    /// The symbol processor interpolates between adjacent samples and
    /// requires more than two samples per 4800 Hz symbol.
    #[error("sample rate [{0}] must be greater than {min} (2 x {rate} symbol rate)", min = 2 * SYMBOL_RATE, rate = SYMBOL_RATE)]
    InvalidSampleRate(f64),
}

/// Air interface protocol tag carried by framing events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// APCO Project 25 Phase 1
    Apco25,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Apco25 => write!(f, "APCO25"),
        }
    }
}

/// Data Unit ID: the four-bit message type selector carried in the NID
///
/// Each variant knows its nominal payload length, which the framer treats
/// as authoritative for message completion. The derived variants are never
/// transmitted on the air; they exist so the framer can size messages it
/// could not positively identify.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum DataUnitId {
    /// Header Data Unit: begins a voice call
    #[strum(serialize = "HDU")]
    Hdu,
    /// Terminator Data Unit: ends a call
    #[strum(serialize = "TDU")]
    Tdu,
    /// Logical Link Data Unit 1: voice frames plus link control
    #[strum(serialize = "LDU1")]
    Ldu1,
    /// Trunking Signaling Block, single block
    #[strum(serialize = "TSBK1")]
    Tsbk1,
    /// Logical Link Data Unit 2: voice frames plus encryption sync
    #[strum(serialize = "LDU2")]
    Ldu2,
    /// Packet Data Unit
    #[strum(serialize = "PDU1")]
    Pdu1,
    /// Terminator Data Unit with Link Control
    #[strum(serialize = "TDULC")]
    Tdulc,
    /// Trunking Signaling Block, two blocks (derived from observed length)
    #[strum(serialize = "TSBK2")]
    Tsbk2,
    /// Trunking Signaling Block, three blocks (derived from observed length)
    #[strum(serialize = "TSBK3")]
    Tsbk3,
    /// Stand-in while the true data unit is undetermined
    ///
    /// Sized to outlast the longest standard message so the next sync
    /// detection can reassign it from the observed bit count.
    #[strum(serialize = "PLACEHOLDER")]
    Placeholder,
    /// No information available
    #[strum(serialize = "UNKNOWN")]
    Unknown,
}

impl DataUnitId {
    /// Lookup from the four-bit DUID value in the NID
    pub fn from_value(value: u8) -> DataUnitId {
        match value {
            0 => DataUnitId::Hdu,
            3 => DataUnitId::Tdu,
            5 => DataUnitId::Ldu1,
            7 => DataUnitId::Tsbk1,
            10 => DataUnitId::Ldu2,
            12 => DataUnitId::Pdu1,
            15 => DataUnitId::Tdulc,
            _ => DataUnitId::Unknown,
        }
    }

    /// The on-air DUID value, if this variant has one
    pub fn value(&self) -> Option<u8> {
        match self {
            DataUnitId::Hdu => Some(0),
            DataUnitId::Tdu => Some(3),
            DataUnitId::Ldu1 => Some(5),
            DataUnitId::Tsbk1 | DataUnitId::Tsbk2 | DataUnitId::Tsbk3 => Some(7),
            DataUnitId::Ldu2 => Some(10),
            DataUnitId::Pdu1 => Some(12),
            DataUnitId::Tdulc => Some(15),
            _ => None,
        }
    }

    /// Nominal payload length in bits, following the NID
    pub fn payload_length(&self) -> usize {
        match self {
            DataUnitId::Hdu => 678,
            DataUnitId::Tdu => 30,
            DataUnitId::Ldu1 => 1568,
            DataUnitId::Tsbk1 => 248,
            DataUnitId::Ldu2 => 1568,
            DataUnitId::Pdu1 => 1200,
            DataUnitId::Tdulc => 432,
            DataUnitId::Tsbk2 => 464,
            DataUnitId::Tsbk3 => 720,
            DataUnitId::Placeholder => 1800,
            DataUnitId::Unknown => 0,
        }
    }

    /// Whether the message is followed by a trailing status dibit
    pub fn has_trailing_status_dibit(&self) -> bool {
        matches!(
            self,
            DataUnitId::Hdu
                | DataUnitId::Tdu
                | DataUnitId::Ldu1
                | DataUnitId::Ldu2
                | DataUnitId::Tdulc
        )
    }

    /// Whether this is a standard DUID that can be carried by the NID
    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            DataUnitId::Hdu
                | DataUnitId::Tdu
                | DataUnitId::Ldu1
                | DataUnitId::Tsbk1
                | DataUnitId::Ldu2
                | DataUnitId::Pdu1
                | DataUnitId::Tdulc
        )
    }
}

/// Storage behind a [`BitBuffer`]: every message fits in the stand-in
/// data unit's 1800 bits
const MAX_PAYLOAD_BYTES: usize = 225;

/// Byte-packed bit store with a logical size and a write pointer
///
/// Bits are stored most-significant first within each byte. Storage is a
/// fixed inline array sized for the longest message, and the logical size
/// tracks the data unit's nominal length; reassigning the data unit while
/// a message is under assembly resizes the buffer without moving any
/// stored bits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitBuffer {
    bytes: ArrayVec<u8, MAX_PAYLOAD_BYTES>,
    size: usize,
    pointer: usize,
}

impl BitBuffer {
    /// New buffer sized for `size` bits, at most 1800
    pub fn with_size(size: usize) -> Self {
        assert!(size <= 8 * MAX_PAYLOAD_BYTES);

        let mut bytes = ArrayVec::new();
        for _ in 0..(size + 7) / 8 {
            bytes.push(0u8);
        }

        Self {
            bytes,
            size,
            pointer: 0,
        }
    }

    /// Logical size, in bits
    pub fn size(&self) -> usize {
        self.size
    }

    /// Count of bits written so far
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// True when no further bits can be appended
    pub fn is_full(&self) -> bool {
        self.pointer >= self.size
    }

    /// Append one bit; the caller must check [`is_full()`](Self::is_full) first
    pub fn push(&mut self, bit: bool) {
        if bit {
            self.bytes[self.pointer / 8] |= 0x80 >> (self.pointer % 8);
        }
        self.pointer += 1;
    }

    /// Read the bit at `index`
    pub fn get(&self, index: usize) -> bool {
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Resize the logical bit length, at most 1800 bits
    ///
    /// Growing past the occupied storage extends it with zeros. The write
    /// pointer is clamped to the new size.
    pub fn resize(&mut self, size: usize) {
        assert!(size <= 8 * MAX_PAYLOAD_BYTES);

        while self.bytes.len() < (size + 7) / 8 {
            self.bytes.push(0u8);
        }
        self.size = size;
        self.pointer = self.pointer.min(size);
    }

    /// Packed bytes backing the buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[0..(self.size + 7) / 8]
    }
}

/// A framed P25 message delimited by sync detections
#[derive(Clone, Debug, PartialEq)]
pub struct FramedPayload {
    /// Network Access Code from the NID, or the last good NAC when the NID
    /// could not be corrected
    pub nac: u16,
    /// Data unit type, possibly reassigned from the observed length
    pub duid: DataUnitId,
    /// True if the NID passed BCH error detection and correction
    pub valid_nid: bool,
    /// Payload bits collected between sync events, status dibits removed
    pub bits: BitBuffer,
    /// Milliseconds, extrapolated from the reference timestamp at dibit
    /// resolution
    pub timestamp: i64,
}

impl FramedPayload {
    /// Nominal message length in bits for the resolved data unit
    pub fn bit_count(&self) -> usize {
        self.bits.size()
    }
}

impl fmt::Display for FramedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} NAC:{:#05x} bits:{} {}",
            self.duid,
            self.nac,
            self.bit_count(),
            if self.valid_nid { "valid" } else { "fuzzy" }
        )
    }
}

/// Reported once per second of channel time with no sync detection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SyncLoss {
    /// Milliseconds, extrapolated from the reference timestamp
    pub timestamp: i64,
    /// Quantity of bits that elapsed without a sync
    pub bit_count: u32,
    /// Protocol of the monitored channel
    pub protocol: Protocol,
}

impl fmt::Display for SyncLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SYNC LOSS {} bits:{}", self.protocol, self.bit_count)
    }
}

/// Receiver output event
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A message payload delimited by sync detections
    Frame(FramedPayload),
    /// One second of channel time elapsed without a sync detection
    SyncLoss(SyncLoss),
}

impl Message {
    /// The framed payload, if this event carries one
    pub fn frame(&self) -> Option<&FramedPayload> {
        match self {
            Message::Frame(payload) => Some(payload),
            Message::SyncLoss(_) => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Frame(payload) => payload.fmt(f),
            Message::SyncLoss(loss) => loss.fmt(f),
        }
    }
}
