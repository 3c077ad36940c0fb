//! Code 39 barcode decoder
//!
//! Characters are 9 elements (5 bars, 4 spaces), 3 of them wide, separated
//! by a narrow inter-character gap. Symbols are framed by `*` and may be read
//! in either direction.

use crate::{
    color::Color, config::Config, decoder::decode_e, symbol::Configs, Decoder, SymbolType,
};
use tracing::trace;

const NUM_CHARS: usize = 0x2c;
const START_REV: i8 = 0x19;
const STOP: u8 = 0x2b;

static CODE39_HI: [u8; 32] = [
    0x80,        // 2 next
    0x40 | 0x02, // 4
    0x80 | 0x06, // 2 next
    0xc0 | 0x08, // 2 skip
    0x40 | 0x0a, // 4
    0x80 | 0x0e, // 2 next
    0xc0 | 0x10, // 2 skip
    0x12,        // direct
    0x80 | 0x13, // 2 next
    0xc0 | 0x15, // 2 skip
    0x80 | 0x17, // 2 next
    0xff,
    0xc0 | 0x19, // 2 skip
    0x1b,        // direct
    0xff,
    0xff,
    0x40 | 0x1c, // 4
    0x80 | 0x20, // 2 next
    0xc0 | 0x22, // 2 skip
    0x24,        // direct
    0x80 | 0x25, // 2 next
    0xff,
    0x27, // direct
    0xff,
    0xc0 | 0x28, // 2 skip
    0x2a,        // direct
    0xff,
    0xff,
    0x2b, // direct
    0xff,
    0xff,
    0xff,
];

/// (check pattern, character read in reverse, character read forward)
static CODE39_ENCODINGS: [(u8, u8, u8); NUM_CHARS] = [
    (0x07, 0x1a, 0x20), // 00
    (0x0d, 0x10, 0x03), // 01
    (0x13, 0x17, 0x22), // 02
    (0x16, 0x1d, 0x23), // 03
    (0x19, 0x0d, 0x05), // 04
    (0x1c, 0x13, 0x06), // 05
    (0x25, 0x07, 0x0c), // 06
    (0x2a, 0x2a, 0x27), // 07
    (0x31, 0x04, 0x0e), // 08
    (0x34, 0x00, 0x0f), // 09
    (0x43, 0x15, 0x25), // 0a
    (0x46, 0x1c, 0x26), // 0b
    (0x49, 0x0b, 0x08), // 0c
    (0x4c, 0x12, 0x09), // 0d
    (0x52, 0x19, 0x2b), // 0e
    (0x58, 0x0f, 0x00), // 0f
    (0x61, 0x02, 0x11), // 10
    (0x64, 0x09, 0x12), // 11
    (0x70, 0x06, 0x13), // 12
    (0x85, 0x24, 0x16), // 13
    (0x8a, 0x29, 0x28), // 14
    (0x91, 0x21, 0x18), // 15
    (0x94, 0x2b, 0x19), // 16
    (0xa2, 0x28, 0x29), // 17
    (0xa8, 0x27, 0x2a), // 18
    (0xc1, 0x1f, 0x1b), // 19
    (0xc4, 0x26, 0x1c), // 1a
    (0xd0, 0x23, 0x1d), // 1b
    (0x03, 0x14, 0x1e), // 1c
    (0x06, 0x1b, 0x1f), // 1d
    (0x09, 0x0a, 0x01), // 1e
    (0x0c, 0x11, 0x02), // 1f
    (0x12, 0x18, 0x21), // 20
    (0x18, 0x0e, 0x04), // 21
    (0x21, 0x01, 0x0a), // 22
    (0x24, 0x08, 0x0b), // 23
    (0x30, 0x05, 0x0d), // 24
    (0x42, 0x16, 0x24), // 25
    (0x48, 0x0c, 0x07), // 26
    (0x60, 0x03, 0x10), // 27
    (0x81, 0x1e, 0x14), // 28
    (0x84, 0x25, 0x15), // 29
    (0x90, 0x22, 0x17), // 2a
    (0xc0, 0x20, 0x1a), // 2b
];

static CODE39_CHARACTERS: &[u8; NUM_CHARS] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%*";

#[derive(Debug, Clone, Default)]
pub(crate) struct Code39Decoder {
    /// symbol is being read in reverse
    direction: bool,
    /// element offset within the current character
    element: u8,
    /// characters decoded so far, -1 when idle
    character: i32,
    /// running sum of the last 9 widths
    s9: u32,
    /// width of the last decoded character
    width: u32,

    pub(crate) config: Configs,
    pub(crate) configs: [i32; 2],
}

impl Code39Decoder {
    pub(crate) fn reset(&mut self) {
        self.direction = false;
        self.element = 0;
        self.character = -1;
        self.s9 = 0;
    }
}

/// Shift one element onto the wide/narrow pattern
fn decode1(enc: u8, e: u32, s: u32) -> Option<u8> {
    let e = decode_e(e, s, 72);
    if !(0..=18).contains(&e) {
        return None;
    }
    Some((enc << 1) | (e > 6) as u8)
}

/// Decode the last 9 widths as one character index
fn decode9(dcode: &mut Decoder) -> Option<u8> {
    let s9 = dcode.code39.s9;
    if s9 < 9 {
        return None;
    }

    // threshold bar width ratios
    let mut enc = 0;
    for i in 0..5 {
        enc = decode1(enc, dcode.get_width(i), s9)?;
    }

    // lookup first 5 encoded widths for coarse decode
    let mut idx = CODE39_HI[enc as usize];
    if idx == 0xff {
        return None;
    }

    // encode remaining widths (NB first encoded width is lost)
    for i in 5..9 {
        enc = decode1(enc, dcode.get_width(i), s9)?;
    }

    idx = match idx & 0xc0 {
        0x80 => (idx & 0x3f) + ((enc >> 3) & 1),
        0xc0 => (idx & 0x3f) + ((enc >> 2) & 1),
        0x40 => (idx & 0x3f) + ((enc >> 2) & 3),
        _ => idx,
    };

    let &(chk, rev, fwd) = CODE39_ENCODINGS.get(idx as usize)?;
    if enc != chk {
        return None;
    }

    dcode.code39.width = s9;
    Some(if dcode.code39.direction { rev } else { fwd })
}

fn decode_start(dcode: &mut Decoder) -> SymbolType {
    let c = decode9(dcode).map_or(-1, |c| c as i8);
    if c != START_REV && c != STOP as i8 {
        return SymbolType::None;
    }
    dcode.code39.direction ^= c == START_REV;

    // check leading quiet zone - nominally 10x
    let quiet = dcode.get_width(9);
    if quiet != 0 && quiet < dcode.code39.s9 / 2 {
        trace!("code39: invalid leading quiet zone");
        return SymbolType::None;
    }

    dcode.code39.element = 9;
    dcode.code39.character = 0;
    SymbolType::Partial
}

/// Expand `$`, `%`, `/` and `+` shift pairs to full ASCII
fn full_ascii(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter().copied();
    while let Some(c) = iter.next() {
        if !matches!(c, b'$' | b'%' | b'/' | b'+') {
            out.push(c);
            continue;
        }
        let n = iter.next()?;
        if !n.is_ascii_uppercase() {
            return None;
        }
        let k = n - b'A';
        out.push(match (c, n) {
            (b'$', _) => k + 1,
            (b'+', _) => b'a' + k,
            (b'/', b'A'..=b'O') => b'!' + k,
            (b'/', b'Z') => b':',
            (b'%', b'A'..=b'E') => 0x1b + k,
            (b'%', b'F'..=b'J') => b';' + (n - b'F'),
            (b'%', b'K'..=b'O') => b'[' + (n - b'K'),
            (b'%', b'P'..=b'T') => b'{' + (n - b'P'),
            (b'%', b'U') => 0,
            (b'%', b'V') => b'@',
            (b'%', b'W') => b'`',
            (b'%', b'X'..=b'Z') => 0x7f,
            _ => return None,
        });
    }
    Some(out)
}

/// Convert the collected character indices into the result
fn postprocess(dcode: &mut Decoder) -> bool {
    let n = dcode.code39.character.max(0) as usize;
    let reverse = dcode.code39.direction;
    let config = dcode.code39.config;

    let mut chars = dcode.buf()[..n].to_vec();
    if reverse {
        chars.reverse();
    }

    if config.contains(Config::AddCheck) {
        let Some((&chk, body)) = chars.split_last() else {
            return false;
        };
        let sum: u32 = body.iter().map(|&c| c as u32).sum();
        if sum % 43 != chk as u32 {
            trace!(sum, chk, "code39: check character mismatch");
            return false;
        }
        if !config.contains(Config::EmitCheck) {
            chars.pop();
        }
    }

    let mut text: Vec<u8> = chars
        .iter()
        .map(|&c| {
            if (c as usize) < NUM_CHARS - 1 {
                CODE39_CHARACTERS[c as usize]
            } else {
                b'?'
            }
        })
        .collect();

    if config.contains(Config::Ascii) {
        match full_ascii(&text) {
            Some(expanded) => text = expanded,
            None => {
                trace!("code39: invalid full ASCII shift pair");
                return false;
            }
        }
    }

    if !dcode.size_buf(text.len() + 1) {
        return false;
    }
    dcode.buf_mut()[..text.len()].copy_from_slice(&text);
    dcode.set_buffer_len(text.len());
    dcode.direction = 1 - 2 * reverse as i32;
    dcode.modifiers = Default::default();
    true
}

/// Character width stays within 1/4 of the reference
fn check_width(reference: u32, w: u32) -> bool {
    let dref = reference;
    let reference = reference * 4;
    let w = w * 4;
    reference - dref <= w && w <= reference + dref
}

/// Abandon the symbol in progress, releasing the buffer if it was claimed
fn abort(dcode: &mut Decoder) {
    if dcode.code39.character > 0 {
        dcode.release_lock(SymbolType::Code39);
    }
    dcode.code39.character = -1;
}

pub(crate) fn decode_code39(dcode: &mut Decoder) -> SymbolType {
    // update latest character width
    dcode.code39.s9 = dcode
        .code39
        .s9
        .wrapping_sub(dcode.get_width(9))
        .wrapping_add(dcode.get_width(0));

    if dcode.code39.character < 0 {
        if dcode.color() != Color::Bar {
            return SymbolType::None;
        }
        return decode_start(dcode);
    }

    dcode.code39.element += 1;
    if dcode.code39.element < 9 {
        return SymbolType::None;
    }

    if dcode.code39.element == 10 {
        let space = dcode.get_width(0);
        let character = dcode.code39.character;

        if character > 0 && dcode.buf()[(character - 1) as usize] == STOP {
            // trim STOP character
            dcode.code39.character -= 1;
            let character = dcode.code39.character;
            let (min, max) = dcode.length_limits(SymbolType::Code39);
            let mut sym = SymbolType::None;

            if space != 0 && space < dcode.code39.width / 2 {
                trace!("code39: invalid trailing quiet zone");
            } else if character < min || (max > 0 && character > max) {
                trace!(character, min, max, "code39: length out of range");
            } else if postprocess(dcode) {
                sym = SymbolType::Code39;
            }

            dcode.code39.character = -1;
            if sym == SymbolType::None {
                dcode.release_lock(SymbolType::Code39);
            }
            return sym;
        }

        if space > dcode.code39.width / 2 {
            // inter-character space check failure
            abort(dcode);
        }
        dcode.code39.element = 0;
        return SymbolType::None;
    }

    if !check_width(dcode.code39.width, dcode.code39.s9) {
        abort(dcode);
        return SymbolType::None;
    }

    let c = decode9(dcode);
    let character = dcode.code39.character;

    // lock shared resources
    if character == 0 && !dcode.acquire_lock(SymbolType::Code39) {
        dcode.code39.character = -1;
        return SymbolType::Partial;
    }

    let Some(c) = c.filter(|_| dcode.size_buf(character as usize + 1)) else {
        dcode.release_lock(SymbolType::Code39);
        dcode.code39.character = -1;
        return SymbolType::None;
    };

    dcode.buf_mut()[character as usize] = c;
    dcode.code39.character += 1;
    SymbolType::None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Standard wide/narrow patterns, bar first
    fn pattern(c: char) -> &'static str {
        match c {
            '*' => "010010100",
            '3' => "101100000",
            '9' => "001100100",
            'A' => "100001001",
            'B' => "001001001",
            'C' => "101001000",
            'D' => "000011001",
            'E' => "100011000",
            'O' => "100010010",
            'W' => "111000000",
            '+' => "010001010",
            _ => panic!("no pattern for {c:?}"),
        }
    }

    fn encode(text: &str) -> Vec<u32> {
        let mut widths = vec![40];
        for (i, c) in text.chars().enumerate() {
            if i > 0 {
                widths.push(2);
            }
            widths.extend(pattern(c).bytes().map(|b| if b == b'1' { 6 } else { 2 }));
        }
        widths.push(40);
        widths
    }

    fn code39_only() -> Decoder {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        dcode
            .set_config(Some(SymbolType::Code39), Config::Enable, 1)
            .unwrap();
        dcode
    }

    fn decode(dcode: &mut Decoder, widths: &[u32]) -> Option<(Vec<u8>, i32)> {
        let mut found = None;
        dcode.new_scan();
        for &w in widths {
            if dcode.decode_width(w) == SymbolType::Code39 {
                found = Some((dcode.data().to_vec(), dcode.direction()));
            }
        }
        found
    }

    #[test]
    fn test_decode_forward() {
        let mut dcode = code39_only();
        let got = decode(&mut dcode, &encode("*CODE39*"));
        assert_eq!(got, Some((b"CODE39".to_vec(), 1)));
        assert_eq!(dcode.lock, SymbolType::None);
    }

    #[test]
    fn test_decode_reverse() {
        let mut dcode = code39_only();
        let mut widths = encode("*CODE39*");
        widths.reverse();
        let got = decode(&mut dcode, &widths);
        assert_eq!(got, Some((b"CODE39".to_vec(), -1)));
    }

    #[test]
    fn test_min_length_rejects() {
        let mut dcode = code39_only();
        dcode
            .set_config(Some(SymbolType::Code39), Config::MinLen, 7)
            .unwrap();
        assert_eq!(decode(&mut dcode, &encode("*CODE39*")), None);
        assert_eq!(dcode.lock, SymbolType::None);
    }

    #[test]
    fn test_check_character() {
        let mut dcode = code39_only();
        dcode
            .set_config(Some(SymbolType::Code39), Config::AddCheck, 1)
            .unwrap();
        dcode
            .set_config(Some(SymbolType::Code39), Config::EmitCheck, 0)
            .unwrap();
        let got = decode(&mut dcode, &encode("*CODE39W*"));
        assert_eq!(got.map(|(d, _)| d), Some(b"CODE39".to_vec()));

        // wrong check character
        assert_eq!(decode(&mut dcode, &encode("*CODE39A*")), None);
    }

    #[test]
    fn test_full_ascii() {
        let mut dcode = code39_only();
        dcode
            .set_config(Some(SymbolType::Code39), Config::Ascii, 1)
            .unwrap();
        let got = decode(&mut dcode, &encode("*+A+B*"));
        assert_eq!(got.map(|(d, _)| d), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_full_ascii_table() {
        assert_eq!(full_ascii(b"$A%U/Z%V"), Some(vec![1, 0, b':', b'@']));
        assert_eq!(full_ascii(b"%F%K%P"), Some(b";[{".to_vec()));
        assert_eq!(full_ascii(b"AB"), Some(b"AB".to_vec()));
        assert_eq!(full_ascii(b"/P"), None);
        assert_eq!(full_ascii(b"A+"), None);
    }
}
