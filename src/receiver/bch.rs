//! BCH(63,16,23) error detection and correction for the Network Identifier
//!
//! The NID carries its 16 information bits (NAC and DUID) in a shortened
//! binary BCH codeword with minimum distance 23, correcting up to 11 bit
//! errors. A 64th overall parity bit rides along but takes no part in
//! decoding.
//!
//! The decoder is flat and table driven: syndrome evaluation over GF(2^6),
//! Berlekamp-Massey for the error locator, and a Chien search for the error
//! positions. Binary codes need no error magnitudes, so there is no Forney
//! stage.

/// Correctable errors: t in BCH(n, k, 2t+1)
pub(crate) const MAX_ERRORS: usize = 11;

/// Number of syndromes computed: 2t
const SYNDROME_COUNT: usize = 2 * MAX_ERRORS;

/// Codeword length in bits
const CODEWORD_LENGTH: usize = 63;

/// Parity-check columns for the reference encoder, from the P25 standard
///
/// One 48-bit column per information bit, most significant information bit
/// first. Each column carries 47 BCH parity bits and the trailing overall
/// parity bit. The parity of a NID is the XOR of the columns selected by
/// its set information bits.
const PARITY_COLUMNS: [u64; 16] = [
    0o6331141367235452,
    0o5265521614723276,
    0o4603711461164164,
    0o2301744630472072,
    0o7271623073000466,
    0o5605650752635660,
    0o2702724365316730,
    0o1341352172547354,
    0o0560565075263566,
    0o6141333751704220,
    0o3060555764742110,
    0o1430266772361044,
    0o0614133375170422,
    0o6037114611641642,
    0o5326507063515373,
    0o4662302756473127,
];

// GF(2^6) tables for the field generated by x^6 + x + 1. EXP covers two
// periods so products of logs never need a modulo.
const EXP: [u8; 126] = exp_table();
const LOG: [u8; 64] = log_table();

const fn exp_table() -> [u8; 126] {
    let mut table = [0u8; 126];
    let mut power = 0;
    let mut element: u8 = 1;

    while power < 126 {
        table[power] = element;
        element = if element & 0x20 != 0 {
            (element << 1) ^ 0x43
        } else {
            element << 1
        };
        power += 1;
    }

    table
}

const fn log_table() -> [u8; 64] {
    let exp = exp_table();
    let mut table = [0u8; 64];
    let mut power = 0;

    while power < 63 {
        table[exp[power] as usize] = power as u8;
        power += 1;
    }

    table
}

#[inline]
fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        0
    } else {
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }
}

#[inline]
fn gf_div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0);

    if a == 0 {
        0
    } else {
        EXP[63 + LOG[a as usize] as usize - LOG[b as usize] as usize]
    }
}

/// Encode 16 information bits into the full 64-bit NID
///
/// Bit 63 of the result is the first transmitted bit (the NAC's most
/// significant bit); bit 0 is the trailing overall parity bit.
pub(crate) fn encode(data: u16) -> u64 {
    let mut parity = 0u64;

    for bit in 0..16 {
        if data >> (15 - bit) & 1 == 1 {
            parity ^= PARITY_COLUMNS[bit];
        }
    }

    (data as u64) << 48 | parity
}

/// Decode a 63-bit codeword, correcting up to 11 bit errors
///
/// `word` holds the codeword with bit i as the coefficient of x^i, so bit 62
/// is the first transmitted bit and bits 62..47 are the information bits.
/// Returns the corrected codeword and the number of bits corrected, or
/// `None` when the word is unrecoverable.
pub(crate) fn decode(word: u64) -> Option<(u64, usize)> {
    // syndromes s_p = r(alpha^p) for p = 1..2t
    let mut syndromes = [0u8; SYNDROME_COUNT + 1];
    let mut nonzero = false;

    for power in 1..=SYNDROME_COUNT {
        let mut sum = 0u8;
        for bit in 0..CODEWORD_LENGTH {
            if word >> bit & 1 == 1 {
                sum ^= EXP[bit * power % 63];
            }
        }
        syndromes[power] = sum;
        nonzero |= sum != 0;
    }

    if !nonzero {
        return Some((word, 0));
    }

    let sigma = error_locator(&syndromes);

    let degree = match sigma.iter().rposition(|&coef| coef != 0) {
        Some(degree) => degree,
        None => return None,
    };
    if degree > MAX_ERRORS {
        return None;
    }

    // Chien search: sigma has roots at the inverses of the error locators
    let mut corrected = word;
    let mut roots = 0;

    for power in 0..CODEWORD_LENGTH {
        let mut sum = 0u8;
        for (term, &coef) in sigma.iter().enumerate().take(degree + 1) {
            if coef != 0 {
                sum ^= EXP[(LOG[coef as usize] as usize + term * power) % 63];
            }
        }

        if sum == 0 {
            let location = (CODEWORD_LENGTH - power) % 63;
            corrected ^= 1 << location;
            roots += 1;
        }
    }

    if roots != degree {
        return None;
    }

    Some((corrected, degree))
}

/// Berlekamp-Massey: fit the shortest LFSR generating the syndrome sequence
///
/// The connection polynomial is the error locator. Its storage is sized for
/// the runaway degrees an undecodable word can produce; the caller rejects
/// anything of degree greater than t.
fn error_locator(syndromes: &[u8; SYNDROME_COUNT + 1]) -> [u8; SYNDROME_COUNT + 2] {
    let mut sigma = [0u8; SYNDROME_COUNT + 2];
    let mut saved = [0u8; SYNDROME_COUNT + 2];
    sigma[0] = 1;
    saved[0] = 1;

    let mut length: usize = 0;
    let mut gap: usize = 1;
    let mut saved_discrepancy: u8 = 1;

    for n in 0..SYNDROME_COUNT {
        let mut discrepancy = syndromes[n + 1];
        for i in 1..=length.min(n) {
            discrepancy ^= gf_mul(sigma[i], syndromes[n + 1 - i]);
        }

        if discrepancy == 0 {
            gap += 1;
        } else if 2 * length <= n {
            let previous = sigma;
            let scale = gf_div(discrepancy, saved_discrepancy);
            for i in 0..sigma.len() - gap {
                sigma[i + gap] ^= gf_mul(scale, saved[i]);
            }
            length = n + 1 - length;
            saved = previous;
            saved_discrepancy = discrepancy;
            gap = 1;
        } else {
            let scale = gf_div(discrepancy, saved_discrepancy);
            for i in 0..sigma.len() - gap {
                sigma[i + gap] ^= gf_mul(scale, saved[i]);
            }
            gap += 1;
        }
    }

    sigma
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Strip the overall parity bit from an encoded NID
    fn codeword(data: u16) -> u64 {
        encode(data) >> 1
    }

    /// Re-encoding the decoded information bits must reproduce the codeword
    fn assert_reencode(corrected: u64) {
        let data = (corrected >> 47) as u16;
        assert_eq!(codeword(data), corrected);
    }

    #[test]
    fn test_field_tables() {
        assert_eq!(EXP[0], 1);
        assert_eq!(EXP[1], 2);
        assert_eq!(EXP[6], 0b000011);
        assert_eq!(EXP[63], 1);

        for power in 0..63 {
            assert_eq!(LOG[EXP[power] as usize] as usize, power);
            assert_eq!(EXP[power + 63], EXP[power]);
        }

        // every nonzero element appears exactly once per period
        let mut seen = [false; 64];
        for power in 0..63 {
            assert!(!seen[EXP[power] as usize]);
            seen[EXP[power] as usize] = true;
        }
    }

    #[test]
    fn test_field_arithmetic() {
        for a in 1..64u8 {
            assert_eq!(gf_mul(a, 1), a);
            assert_eq!(gf_mul(a, 0), 0);
            assert_eq!(gf_div(a, a), 1);
            assert_eq!(gf_div(0, a), 0);
            for b in 1..64u8 {
                assert_eq!(gf_div(gf_mul(a, b), b), a);
                assert_eq!(gf_mul(a, b), gf_mul(b, a));
            }
        }
    }

    #[test]
    fn test_encode_columns() {
        // a single set information bit selects exactly its column
        for bit in 0..16 {
            let nid = encode(1 << (15 - bit));
            assert_eq!(nid & 0xFFFF_FFFF_FFFF, PARITY_COLUMNS[bit]);
            assert_eq!(nid >> 48, 1 << (15 - bit));
        }

        assert_eq!(encode(0), 0);
    }

    #[test]
    fn test_encode_produces_codewords() {
        // every encoded word must have all-zero syndromes
        for data in [0x0000u16, 0xFFFF, 0x1230, 0x293A, 0xA5C3, 0x0001, 0x8000] {
            let word = codeword(data);
            assert_eq!(decode(word), Some((word, 0)));
        }
    }

    #[test]
    fn test_decode_single_errors() {
        let word = codeword(0x1234);
        for bit in 0..63 {
            let (corrected, count) = decode(word ^ 1 << bit).expect("single error");
            assert_eq!(corrected, word);
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_decode_up_to_eleven_errors() {
        let mut rng = StdRng::seed_from_u64(0x3551_25f5);

        for _ in 0..200 {
            let data: u16 = rng.gen();
            let word = codeword(data);

            let errors = rng.gen_range(1..=MAX_ERRORS);
            let mut corrupted = word;
            let mut flipped = 0;
            while flipped < errors {
                let bit = rng.gen_range(0..63);
                if corrupted >> bit & 1 == word >> bit & 1 {
                    corrupted ^= 1 << bit;
                    flipped += 1;
                }
            }

            let (corrected, count) = decode(corrupted).expect("within correction capability");
            assert_eq!(corrected, word);
            assert_eq!(count, errors);
            assert_reencode(corrected);
        }
    }

    #[test]
    fn test_decode_beyond_capability() {
        let mut rng = StdRng::seed_from_u64(0x0bc4_63cc);

        let mut failures = 0;
        let trials = 200;
        for _ in 0..trials {
            let word = codeword(rng.gen());

            let mut corrupted = word;
            let mut flipped = 0;
            while flipped < 15 {
                let bit = rng.gen_range(0..63);
                if corrupted >> bit & 1 == word >> bit & 1 {
                    corrupted ^= 1 << bit;
                    flipped += 1;
                }
            }

            match decode(corrupted) {
                None => failures += 1,
                // a miscorrection must still land on a valid codeword
                Some((corrected, count)) => {
                    assert!(count <= MAX_ERRORS);
                    assert_reencode(corrected);
                }
            }
        }

        // nearly every 15-error pattern is flagged unrecoverable
        assert!(failures > trials * 9 / 10);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        // far from any codeword: decoding must not claim success with a
        // word that fails re-encoding
        let mut rng = StdRng::seed_from_u64(0x7fff_0001);
        for _ in 0..100 {
            let noise: u64 = rng.gen::<u64>() >> 1;
            if let Some((corrected, _)) = decode(noise) {
                assert_reencode(corrected);
            }
        }
    }
}
