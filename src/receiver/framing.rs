//! Sync-event driven message framing

use std::collections::VecDeque;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::message::{DataUnitId, Message, Protocol, SyncLoss, SYMBOL_RATE};

use super::assembler::MessageAssembler;
use super::dibit::Dibit;

/// Idle-counter credit applied at each sync detection: sync (48) plus NID
/// (64) plus status (2) plus the initial dibit (2) already received
const SYNC_AND_NID_DIBITS: i64 = 116;

/// Glues sync detections to assembler lifecycle
///
/// Every decided dibit flows through here. Between sync events an idle
/// counter emits a sync-loss report once per second of channel time; a sync
/// detection closes out any message still in assembly and starts the next
/// one. Completed messages queue in arrival order for the receiver to
/// drain.
#[derive(Clone, Debug)]
pub(crate) struct MessageFramer {
    running: bool,
    dibit_counter: i64,
    dibits_since_timestamp: u64,
    reference_timestamp: i64,
    assembler: Option<MessageAssembler>,
    previous_duid: DataUnitId,
    queue: VecDeque<Message>,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self {
            running: true,
            dibit_counter: 0,
            dibits_since_timestamp: 0,
            reference_timestamp: 0,
            assembler: None,
            previous_duid: DataUnitId::Placeholder,
            queue: VecDeque::new(),
        }
    }

    /// Process one demodulated dibit
    pub fn receive(&mut self, dibit: Dibit) {
        self.dibits_since_timestamp += 1;

        match self.assembler.as_mut() {
            Some(assembler) => {
                assembler.receive(dibit);

                if assembler.is_complete() {
                    let assembler = self.assembler.take().expect("assembler just observed");
                    self.complete(assembler);
                }
            }
            None => {
                self.dibit_counter += 1;

                if self.dibit_counter >= SYMBOL_RATE as i64 {
                    self.dibit_counter -= SYMBOL_RATE as i64;
                    let loss = SyncLoss {
                        timestamp: self.timestamp(),
                        bit_count: 2 * SYMBOL_RATE,
                        protocol: Protocol::Apco25,
                    };
                    self.broadcast(Message::SyncLoss(loss));
                }
            }
        }
    }

    /// A sync pattern was detected and its NID examined; the next dibit is
    /// the first of the message body
    ///
    /// `valid_nid` is false when NID error correction failed, in which case
    /// `duid` is a placeholder and `nac` is the last good value.
    pub fn sync_detected(&mut self, nac: u16, duid: DataUnitId, valid_nid: bool) {
        // the sync and NID dibits landed on the idle counter while they
        // were in flight; anything left over was genuinely unframed
        self.dibit_counter -= SYNC_AND_NID_DIBITS;

        if self.dibit_counter > 0 {
            let loss = SyncLoss {
                timestamp: self.timestamp(),
                bit_count: 2 * self.dibit_counter as u32,
                protocol: Protocol::Apco25,
            };
            self.broadcast(Message::SyncLoss(loss));
        }
        self.dibit_counter = 0;

        // a residual assembler means the previous message ran short; make
        // a final length-based resolution and send it on
        if let Some(mut assembler) = self.assembler.take() {
            assembler.force_completion(self.previous_duid);
            self.complete(assembler);
        }

        let duid = if !duid.is_primary() {
            DataUnitId::Placeholder
        } else if duid == DataUnitId::Tsbk1 {
            // assume the longest trunking variant; completion walks it back
            DataUnitId::Tsbk3
        } else {
            duid
        };

        debug!(
            "sync detected: NAC {:#05x} {} valid:{}",
            nac, duid, valid_nid
        );
        self.assembler = Some(MessageAssembler::new(nac, duid, valid_nid));
    }

    /// Close out an assembler and queue its message
    fn complete(&mut self, mut assembler: MessageAssembler) {
        if assembler.duid() == DataUnitId::Placeholder {
            assembler.force_completion(self.previous_duid);
        }

        self.previous_duid = assembler.duid();
        let timestamp = self.timestamp();
        self.broadcast(Message::Frame(assembler.into_payload(timestamp)));
    }

    /// Begin dispatching messages
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop dispatching messages; processing continues
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Reference time for the most recent input batch, in milliseconds
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.reference_timestamp = timestamp;
        self.dibits_since_timestamp = 0;
    }

    /// Drain queued messages in arrival order
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, Message> {
        self.queue.drain(..)
    }

    fn broadcast(&mut self, message: Message) {
        if self.running {
            self.queue.push_back(message);
        }
    }

    /// Millisecond timestamp extrapolated to the current dibit
    fn timestamp(&self) -> i64 {
        self.reference_timestamp + (1000 * self.dibits_since_timestamp / SYMBOL_RATE as u64) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_loss_cadence() {
        let mut framer = MessageFramer::new();
        framer.set_timestamp(10_000);

        for _ in 0..(2 * SYMBOL_RATE + 100) {
            framer.receive(Dibit::P1);
        }

        let messages: Vec<Message> = framer.drain().collect();
        assert_eq!(messages.len(), 2);

        for (index, message) in messages.iter().enumerate() {
            match message {
                Message::SyncLoss(loss) => {
                    assert_eq!(loss.bit_count, 9600);
                    assert_eq!(loss.protocol, Protocol::Apco25);
                    assert_eq!(loss.timestamp, 10_000 + 1000 * (index as i64 + 1));
                }
                other => panic!("expected sync loss, got {}", other),
            }
        }
    }

    #[test]
    fn test_residual_idle_time_is_reported() {
        let mut framer = MessageFramer::new();

        for _ in 0..1000 {
            framer.receive(Dibit::P1);
        }
        framer.sync_detected(0x123, DataUnitId::Tdu, true);

        let messages: Vec<Message> = framer.drain().collect();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::SyncLoss(loss) => {
                assert_eq!(loss.bit_count, 2 * (1000 - SYNC_AND_NID_DIBITS as u32));
            }
            other => panic!("expected sync loss, got {}", other),
        }
    }

    #[test]
    fn test_short_idle_is_absorbed() {
        let mut framer = MessageFramer::new();

        for _ in 0..SYNC_AND_NID_DIBITS {
            framer.receive(Dibit::P1);
        }
        framer.sync_detected(0x123, DataUnitId::Tdu, true);
        assert!(framer.drain().next().is_none());
    }

    #[test]
    fn test_frame_completion() {
        let mut framer = MessageFramer::new();
        framer.sync_detected(0x293, DataUnitId::Tdu, true);

        // TDU: 30 bits, complete after 15 dibits
        for _ in 0..15 {
            framer.receive(Dibit::M1);
        }

        let messages: Vec<Message> = framer.drain().collect();
        assert_eq!(messages.len(), 1);
        let payload = messages[0].frame().expect("framed payload");
        assert_eq!(payload.nac, 0x293);
        assert_eq!(payload.duid, DataUnitId::Tdu);
        assert!(payload.valid_nid);
        assert_eq!(payload.bit_count(), 30);
    }

    #[test]
    fn test_residual_assembler_resolved_by_length() {
        let mut framer = MessageFramer::new();

        // a valid TDU establishes the previous data unit
        framer.sync_detected(0x293, DataUnitId::Tdu, true);
        for _ in 0..15 {
            framer.receive(Dibit::M1);
        }

        // an unknown message runs for 500 dibits before the next sync;
        // 972 stored bits falls in the voice band of the ladder
        framer.sync_detected(0x293, DataUnitId::Unknown, false);
        for _ in 0..500 {
            framer.receive(Dibit::P3);
        }
        framer.sync_detected(0x293, DataUnitId::Tdu, true);

        let messages: Vec<Message> = framer.drain().collect();
        assert_eq!(messages.len(), 2);

        let fuzzy = messages[1].frame().expect("framed payload");
        assert!(!fuzzy.valid_nid);
        assert_eq!(fuzzy.duid, DataUnitId::Ldu1);
    }

    #[test]
    fn test_tsbk1_starts_as_tsbk3() {
        let mut framer = MessageFramer::new();
        framer.sync_detected(0x001, DataUnitId::Tsbk1, true);

        // a single-block TSBK: the next sync arrives after only 110 dibits
        for _ in 0..110 {
            framer.receive(Dibit::P1);
        }
        framer.sync_detected(0x001, DataUnitId::Tdu, true);

        let messages: Vec<Message> = framer.drain().collect();
        assert_eq!(messages.len(), 1);
        let payload = messages[0].frame().expect("framed payload");
        assert_eq!(payload.duid, DataUnitId::Tsbk1);
        assert!(payload.valid_nid);
    }

    #[test]
    fn test_stopped_framer_is_silent() {
        let mut framer = MessageFramer::new();
        framer.stop();

        for _ in 0..2 * SYMBOL_RATE {
            framer.receive(Dibit::P1);
        }
        assert!(framer.drain().next().is_none());

        framer.start();
        for _ in 0..SYMBOL_RATE {
            framer.receive(Dibit::P1);
        }
        assert_eq!(framer.drain().count(), 1);
    }
}
