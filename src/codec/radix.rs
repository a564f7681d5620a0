//! Radix-91 text encoding
//!
//! Packs arbitrary bytes into a printable 91-symbol alphabet so binary
//! records can sit inside text documents. Works on a bit accumulator: 13 or
//! 14 bits per symbol pair, whichever keeps the value inside 91 * 91.

use crate::error::DecodeError;

/// The standard basE91 alphabet with `"` swapped for `-`.
const ALPHABET: &[u8; 91] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~-";

const INVALID: u8 = 0xFF;

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

static DECODE: [u8; 256] = build_decode_table();

/// Encode bytes into radix-91 text.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 16 / 13 + 2);
    let mut queue: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        queue |= (byte as u32) << bits;
        bits += 8;
        if bits > 13 {
            let mut value = queue & 8191;
            if value > 88 {
                queue >>= 13;
                bits -= 13;
            } else {
                value = queue & 16383;
                queue >>= 14;
                bits -= 14;
            }
            out.push(ALPHABET[(value % 91) as usize] as char);
            out.push(ALPHABET[(value / 91) as usize] as char);
        }
    }

    // Flush: one symbol always, a second when the tail needs it
    if bits > 0 {
        out.push(ALPHABET[(queue % 91) as usize] as char);
        if bits > 7 || queue > 90 {
            out.push(ALPHABET[(queue / 91) as usize] as char);
        }
    }

    out
}

/// Decode radix-91 text back into bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::with_capacity(text.len() * 14 / 16 + 1);
    let mut queue: u32 = 0;
    let mut bits: u32 = 0;
    let mut pending: Option<u32> = None;

    for (pos, ch) in text.chars().enumerate() {
        let symbol = if ch.is_ascii() {
            DECODE[ch as usize]
        } else {
            INVALID
        };
        if symbol == INVALID {
            return Err(DecodeError::InvalidEncodingSymbol(ch, pos));
        }
        let symbol = symbol as u32;

        match pending.take() {
            None => pending = Some(symbol),
            Some(low) => {
                let value = low + symbol * 91;
                queue |= value << bits;
                bits += if (value & 8191) > 88 { 13 } else { 14 };
                while bits > 7 {
                    out.push((queue & 0xFF) as u8);
                    queue >>= 8;
                    bits -= 8;
                }
            }
        }
    }

    if let Some(low) = pending {
        out.push(((queue | (low << bits)) & 0xFF) as u8);
    }

    Ok(out)
}
