//! Modified-Baudot Character Decoding
//!
//! Radio call signs in T.001 user protocols are packed as 6-bit
//! modified-Baudot characters: a letters/figures marker bit on top of the
//! 5-bit ITA2 code. The decoder emits uppercase A-Z, digits, space, dash,
//! slash, and `_` for codes outside the table.

use crate::frame::bit_field;

/// Decode one 6-bit modified-Baudot code.
pub fn baudot_char(code: u8) -> char {
    match code {
        56 => 'A',
        51 => 'B',
        46 => 'C',
        50 => 'D',
        48 => 'E',
        54 => 'F',
        43 => 'G',
        37 => 'H',
        44 => 'I',
        58 => 'J',
        62 => 'K',
        41 => 'L',
        39 => 'M',
        38 => 'N',
        35 => 'O',
        45 => 'P',
        61 => 'Q',
        42 => 'R',
        52 => 'S',
        33 => 'T',
        60 => 'U',
        47 => 'V',
        57 => 'W',
        55 => 'X',
        53 => 'Y',
        49 => 'Z',
        36 => ' ',
        24 => '-',
        23 => '/',
        13 => '0',
        29 => '1',
        25 => '2',
        16 => '3',
        10 => '4',
        1 => '5',
        21 => '6',
        28 => '7',
        12 => '8',
        3 => '9',
        _ => '_',
    }
}

/// Encode a character to its 6-bit code, if representable.
pub fn baudot_code(c: char) -> Option<u8> {
    let code = match c.to_ascii_uppercase() {
        'A' => 56,
        'B' => 51,
        'C' => 46,
        'D' => 50,
        'E' => 48,
        'F' => 54,
        'G' => 43,
        'H' => 37,
        'I' => 44,
        'J' => 58,
        'K' => 62,
        'L' => 41,
        'M' => 39,
        'N' => 38,
        'O' => 35,
        'P' => 45,
        'Q' => 61,
        'R' => 42,
        'S' => 52,
        'T' => 33,
        'U' => 60,
        'V' => 47,
        'W' => 57,
        'X' => 55,
        'Y' => 53,
        'Z' => 49,
        ' ' => 36,
        '-' => 24,
        '/' => 23,
        '0' => 13,
        '1' => 29,
        '2' => 25,
        '3' => 16,
        '4' => 10,
        '5' => 1,
        '6' => 21,
        '7' => 28,
        '8' => 12,
        '9' => 3,
        _ => return None,
    };
    Some(code)
}

/// Decode `count` consecutive 6-bit characters starting at bit index `start`.
pub fn decode_string(bits: &[u8], start: usize, count: usize) -> String {
    (0..count)
        .map(|i| baudot_char(bit_field(bits, start + i * 6, 6) as u8))
        .collect()
}
