//! Synthetic phase-sample streams for exercising the receiver chain

use std::f32::consts::FRAC_PI_4;

use super::bch;
use super::correlator::{SYNC_PATTERN, SYNC_SYMBOL_LENGTH};
use super::dibit::Dibit;

/// Status symbols carry channel housekeeping the receiver discards, so any
/// value will do
const STATUS_DIBIT: Dibit = Dibit::M1;

/// The sync pattern as transmitted dibits
pub fn sync_dibits() -> Vec<Dibit> {
    (0..SYNC_SYMBOL_LENGTH)
        .map(|index| {
            let b1 = SYNC_PATTERN >> (47 - 2 * index) & 1 == 1;
            let b2 = SYNC_PATTERN >> (46 - 2 * index) & 1 == 1;
            Dibit::from_bits(b1, b2)
        })
        .collect()
}

/// Phases for one complete frame: sync, NID, and payload, with status
/// dibits interleaved where the standard puts them
///
/// `corrupt_bits` lists BCH codeword bit positions to flip within the NID.
pub fn frame_phases(
    nac: u16,
    duid_value: u8,
    payload: &[Dibit],
    corrupt_bits: &[usize],
) -> Vec<f32> {
    let mut phases: Vec<f32> = sync_dibits()
        .iter()
        .map(|dibit| dibit.ideal_phase())
        .collect();

    let mut nid = bch::encode(nac << 4 | duid_value as u16);
    for &bit in corrupt_bits {
        nid ^= 1u64 << (bit + 1);
    }

    // 32 NID dibits with the status symbol 70 bits into the frame
    for index in 0..32 {
        let b1 = nid >> (63 - 2 * index) & 1 == 1;
        let b2 = nid >> (62 - 2 * index) & 1 == 1;
        phases.push(Dibit::from_bits(b1, b2).ideal_phase());

        if index == 10 {
            phases.push(STATUS_DIBIT.ideal_phase());
        }
    }

    // payload with a status dibit after every 35 data dibits
    let mut counter = 42;
    let mut remaining = payload.iter();
    let mut next = remaining.next();
    while let Some(&dibit) = next {
        counter += 2;

        if counter == 70 {
            phases.push(STATUS_DIBIT.ideal_phase());
            counter = 0;
        } else {
            phases.push(dibit.ideal_phase());
            next = remaining.next();
        }
    }

    phases
}

/// Alternating ±1 payload filler
///
/// A window of nothing but low symbols correlates far below the sync
/// detection threshold, so filler can never fire a false sync.
pub fn payload_dibits(bits: usize) -> Vec<Dibit> {
    (0..bits / 2)
        .map(|index| if index % 2 == 0 { Dibit::P1 } else { Dibit::M1 })
        .collect()
}

/// Idle channel phases: alternating ±1 symbols
pub fn idle_phases(count: usize) -> Vec<f32> {
    (0..count)
        .map(|index| if index % 2 == 0 { FRAC_PI_4 } else { -FRAC_PI_4 })
        .collect()
}

/// Expand per-symbol phases into a sample stream
///
/// With `shaped` set, samples ramp linearly between symbol instants,
/// approximating band-limited transitions with a single sharp timing peak;
/// otherwise each phase is held flat for a full symbol.
pub fn to_samples(phases: &[f32], samples_per_symbol: f64, shaped: bool) -> Vec<f32> {
    let total = (phases.len() as f64 * samples_per_symbol) as usize;
    let mut out = Vec::with_capacity(total);

    for sample in 0..total {
        let position = sample as f64 / samples_per_symbol;
        let symbol = position.floor() as usize;
        let fraction = (position - symbol as f64) as f32;

        let current = phases[symbol];
        let value = if shaped && symbol + 1 < phases.len() {
            current + (phases[symbol + 1] - current) * fraction
        } else {
            current
        };
        out.push(value);
    }

    out
}
