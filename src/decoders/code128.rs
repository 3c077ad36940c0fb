//! Code 128 barcode decoder
//!
//! Characters are 3 bars and 3 spaces spanning 11 modules, decoded from the
//! four bar+space edge sums. The start character selects code set A, B or C;
//! a weighted modulo-103 check character precedes the stop pattern.

use crate::{
    color::Color,
    decoder::decode_e,
    symbol::{Configs, Modifier, Modifiers},
    Decoder, SymbolType,
};
use tracing::trace;

const SHIFT: u8 = 0x62;
const CODE_C: u8 = 0x63;
const CODE_A: u8 = 0x65;
const FNC1: u8 = 0x66;
const START_A: u8 = 0x67;
const START_C: u8 = 0x69;
const STOP_FWD: u8 = 0x6a;
const STOP_REV: u8 = 0x6b;

/// ASCII group separator, emitted for FNC1 inside the data
const GS: u8 = 0x1d;

// character values indexed by edge signature; the high bit selects the
// expected bar width sum
static CHARACTERS: [u8; 108] = [
    0x5c, 0xbf, 0xa1, // [00] 00
    0x2a, 0xc5, 0x0c, 0xa4, // [03] 01
    0x2d, 0xe3, 0x0f, // [07] 02
    0x5f, 0xe4, // [0a] 03
    0x6b, 0xe8, 0x69, 0xa7, 0xe7, // [0c] 10
    0xc1, 0x51, 0x1e, 0x83, 0xd9, 0x00, 0x84, 0x1f, // [11] 11
    0xc7, 0x0d, 0x33, 0x86, 0xb5, 0x0e, 0x15, 0x87, // [19] 12
    0x10, 0xda, 0x11, // [21] 13
    0x36, 0xe5, 0x18, 0x37, // [24] 20
    0xcc, 0x13, 0x39, 0x89, 0x97, 0x14, 0x1b, 0x8a, 0x3a, 0xbd, // [28] 21
    0xa2, 0x5e, 0x01, 0x85, 0xb0, 0x02, 0xa3, // [32] 22
    0xa5, 0x2c, 0x16, 0x88, 0xbc, 0x12, 0xa6, // [39] 23
    0x61, 0xe6, 0x56, 0x62, // [40] 30
    0x19, 0xdb, 0x1a, // [44] 31
    0xa8, 0x32, 0x1c, 0x8b, 0xcd, 0x1d, 0xa9, // [47] 32
    0xc3, 0x20, 0xc4, // [4e] 33
    0x50, 0x5d, 0xc0, // [51] 0014 0025 0034
    0x2b, 0xc6, // [54] 0134 0143
    0x2e, // [56] 0243
    0x53, 0x60, // [57] 0341 0352
    0x31, // [59] 1024
    0x52, 0xc2, // [5a] 1114 1134
    0x34, 0xc8, // [5c] 1242 1243
    0x55, // [5e] 1441
    0x57, 0x3e, 0xce, // [5f] 4100 5200 4300
    0x3b, 0xc9, // [62] 4310 3410
    0x6a, // [64] 3420
    0x54, 0x4f, // [65] 1430 2530
    0x38, // [67] 4201
    0x58, 0xcb, // [68] 4111 4311
    0x2f, 0xca, // [6a] 2421 3421
];

static LO_BASE: [u8; 8] = [0x00, 0x07, 0x0c, 0x19, 0x24, 0x32, 0x40, 0x47];

static LO_OFFSET: [u8; 0x80] = [
    0xff, 0xf0, 0xff, 0x1f, 0xff, 0xf2, 0xff, 0xff, // 00 [00]
    0xff, 0xff, 0xff, 0x3f, 0xf4, 0xf5, 0xff, 0x6f, // 01
    0xff, 0xff, 0xff, 0xff, 0xf0, 0xf1, 0xff, 0x2f, // 02 [07]
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x3f, 0x4f, // 03
    0xff, 0x0f, 0xf1, 0xf2, 0xff, 0x3f, 0xff, 0xf4, // 10 [0c]
    0xf5, 0xf6, 0xf7, 0x89, 0xff, 0xab, 0xff, 0xfc, // 11
    0xff, 0xff, 0x0f, 0x1f, 0x23, 0x45, 0xf6, 0x7f, // 12 [19]
    0xff, 0xff, 0xff, 0xff, 0xf8, 0xff, 0xf9, 0xaf, // 13
    0xf0, 0xf1, 0xff, 0x2f, 0xff, 0xf3, 0xff, 0xff, // 20 [24]
    0x4f, 0x5f, 0x67, 0x89, 0xfa, 0xbf, 0xff, 0xcd, // 21
    0xf0, 0xf1, 0xf2, 0x3f, 0xf4, 0x56, 0xff, 0xff, // 22 [32]
    0xff, 0xff, 0x7f, 0x8f, 0x9a, 0xff, 0xbc, 0xdf, // 23
    0x0f, 0x1f, 0xf2, 0xff, 0xff, 0x3f, 0xff, 0xff, // 30 [40]
    0xf4, 0xff, 0xf5, 0x6f, 0xff, 0xff, 0xff, 0xff, // 31
    0x0f, 0x1f, 0x23, 0xff, 0x45, 0x6f, 0xff, 0xff, // 32 [47]
    0xf7, 0xff, 0xf8, 0x9f, 0xff, 0xff, 0xff, 0xff, // 33
];

#[derive(Debug, Clone, Default)]
pub(crate) struct Code128Decoder {
    /// symbol is being read in reverse
    direction: bool,
    /// element offset within the current character, modulo 8
    element: u8,
    /// characters decoded so far, -1 when idle
    character: i32,
    /// start (or reversed stop) character, held until the lock is taken
    start: u8,
    /// running sum of the last 6 widths
    s6: u32,
    /// width of the last character
    width: u32,

    pub(crate) config: Configs,
    pub(crate) configs: [i32; 2],
}

impl Code128Decoder {
    pub(crate) fn reset(&mut self) {
        self.direction = false;
        self.element = 0;
        self.character = -1;
        self.s6 = 0;
    }
}

/// Look up a signature with no element sum wider than 4 modules
fn decode_lo(sig: i32) -> Option<u8> {
    let offset =
        ((sig >> 1) & 0x01) | ((sig >> 3) & 0x06) | ((sig >> 5) & 0x18) | ((sig >> 7) & 0x60);
    let packed = LO_OFFSET[offset as usize];
    let idx = if sig & 1 != 0 { packed & 0xf } else { packed >> 4 };
    if idx == 0xf {
        return None;
    }

    let base = ((sig >> 11) | ((sig >> 9) & 1)) as usize;
    let idx = idx as usize + *LO_BASE.get(base)? as usize;
    if idx > 0x50 {
        return None;
    }
    Some(CHARACTERS[idx])
}

/// Look up a signature containing a 5 or 6 module edge sum
fn decode_hi(mut sig: i32) -> Option<u8> {
    let mut rev = (sig & 0x4400) != 0;
    if rev {
        sig = ((sig >> 12) & 0x000f)
            | ((sig >> 4) & 0x00f0)
            | ((sig << 4) & 0x0f00)
            | ((sig << 12) & 0xf000);
    }

    let idx = match sig {
        0x0014 => 0x0,
        0x0025 => 0x1,
        0x0034 => 0x2,
        0x0134 => 0x3,
        0x0143 => 0x4,
        0x0243 => 0x5,
        0x0341 => 0x6,
        0x0352 => 0x7,
        0x1024 => 0x8,
        0x1114 => 0x9,
        0x1134 => 0xa,
        0x1242 => 0xb,
        0x1243 => 0xc,
        0x1441 => {
            // palindrome
            rev = false;
            0xd
        }
        _ => return None,
    };
    Some(CHARACTERS[0x51 + idx + if rev { 0xe } else { 0 }])
}

/// Expected bar width sum of a character, in quarter modules
fn calc_check(c: u8) -> u32 {
    if c & 0x80 == 0 {
        return 0x18;
    }
    let c = c & 0x7f;
    if c < 0x3d {
        return if c < 0x30 && c != 0x17 { 0x10 } else { 0x20 };
    }
    if c < 0x50 {
        return if c == 0x4d { 0x20 } else { 0x10 };
    }
    if c < 0x67 {
        0x20
    } else {
        0x10
    }
}

/// Decode the last 6 elements as one character value
fn decode6(dcode: &Decoder) -> Option<u8> {
    let s = dcode.code128.s6;
    if s < 5 {
        return None;
    }

    // build edge signature of character
    let bar = dcode.color() == Color::Bar;
    let offsets: [u8; 4] = if bar { [0, 1, 2, 3] } else { [4, 3, 2, 1] };
    let mut sig = 0;
    for off in offsets {
        let e = decode_e(dcode.pair_width(off), s, 11);
        if e < 0 {
            return None;
        }
        sig = (sig << 4) | e;
    }

    let c = if sig & 0x4444 != 0 {
        decode_hi(sig)
    } else {
        decode_lo(sig)
    }?;

    // character validation
    let bars = if bar {
        dcode.get_width(0) + dcode.get_width(2) + dcode.get_width(4)
    } else {
        dcode.get_width(1) + dcode.get_width(3) + dcode.get_width(5)
    };
    let bars = bars.wrapping_mul(11 * 4) / s;
    let chk = calc_check(c);
    if chk.abs_diff(bars) > 7 {
        trace!(c, bars, "code128: bar width sum mismatch");
        return None;
    }
    Some(c & 0x7f)
}

/// Verify the modulo-103 check character
///
/// `chars` holds the symbol in scan order, start through stop.
fn validate_checksum(chars: &[u8], reverse: bool) -> bool {
    let n = chars.len();
    if n < 3 {
        return false;
    }
    let at = |i: usize| chars[if reverse { n - 1 - i } else { i }] as u32;

    // irregularly weighted start character
    let mut sum = at(0);
    if sum >= 103 {
        sum -= 103;
    }

    // accumulate in reverse to avoid multiplies
    let mut acc = 0;
    for i in (1..n - 2).rev() {
        acc += at(i);
        if acc >= 103 {
            acc -= 103;
        }
        sum += acc;
        if sum >= 103 {
            sum -= 103;
        }
    }

    if sum != at(n - 2) {
        trace!(expected = sum, "code128: check mismatch");
        return false;
    }
    true
}

fn push_digits(text: &mut Vec<u8>, code: u8) {
    text.push(b'0' + code / 10);
    text.push(b'0' + code % 10);
}

/// Resolve scan direction and convert to ASCII
fn postprocess(dcode: &mut Decoder) -> bool {
    let n = dcode.code128.character as usize;
    let reverse = dcode.code128.direction;

    let mut chars = dcode.buf()[..n].to_vec();
    if reverse {
        chars.reverse();
    }
    let stop = if reverse { STOP_REV } else { STOP_FWD };
    if chars[n - 1] != stop || !(START_A..=START_C).contains(&chars[0]) {
        return false;
    }

    let mut modifiers = Modifiers::empty();
    let mut text = Vec::with_capacity(n * 2);
    // bit 1 selects set C, bit 7 marks a one-character shift
    let mut charset = chars[0] - START_A;

    for (i, &code) in chars.iter().enumerate().take(n - 2).skip(1) {
        if code & 0x80 != 0 {
            return false;
        }
        if charset & 0x2 != 0 && code < 100 {
            push_digits(&mut text, code);
        } else if code < 0x60 {
            // set B, or set A for control characters
            let mut c = code + 0x20;
            if (charset == 0 || charset == 0x81) && c >= 0x60 {
                c -= 0x60;
            }
            text.push(c);
            charset &= 0x7f;
        } else if code < CODE_C {
            // FNC2 (message append) and FNC3 (reader init) are ignored
            if code == SHIFT {
                charset |= 0x80;
            }
        } else if code == FNC1 {
            match i {
                1 => modifiers.insert(Modifier::Gs1),
                2 => modifiers.insert(Modifier::Aim),
                // trailing FNC1 is dropped
                _ if i < n - 3 => text.push(GS),
                _ => {}
            }
        } else if code >= START_A {
            return false;
        } else {
            let newset = CODE_A - code;
            // a repeated code set character is FNC4, not supported
            if newset != charset {
                charset = newset;
            }
        }
    }

    let (min, max) = dcode.length_limits(SymbolType::Code128);
    let len = text.len() as i32;
    if len < min || (max > 0 && len > max) {
        trace!(len, "code128: invalid length");
        return false;
    }
    if !dcode.size_buf(text.len() + 1) {
        return false;
    }

    dcode.buf_mut()[..text.len()].copy_from_slice(&text);
    dcode.set_buffer_len(text.len());
    dcode.direction = 1 - 2 * reverse as i32;
    dcode.modifiers = modifiers;
    true
}

fn decode_abort(dcode: &mut Decoder) -> SymbolType {
    if dcode.code128.character > 1 {
        dcode.release_lock(SymbolType::Code128);
    }
    dcode.code128.character = -1;
    SymbolType::None
}

pub(crate) fn decode_code128(dcode: &mut Decoder) -> SymbolType {
    // update latest character width
    dcode.code128.s6 = dcode
        .code128
        .s6
        .wrapping_sub(dcode.get_width(6))
        .wrapping_add(dcode.get_width(0));

    let color = dcode.color();
    if dcode.code128.character < 0 {
        if color != Color::Space {
            return SymbolType::None;
        }
    } else {
        dcode.code128.element = (dcode.code128.element + 1) & 7;
        if dcode.code128.element != 6 || (color == Color::Bar) != dcode.code128.direction {
            return SymbolType::None;
        }
    }
    dcode.code128.element = 0;

    let c = decode6(dcode);

    if dcode.code128.character < 0 {
        let Some(c) = c else {
            return SymbolType::None;
        };
        if !(START_A..=STOP_REV).contains(&c) || c == STOP_FWD {
            return SymbolType::None;
        }
        let qz = dcode.get_width(6);
        if qz != 0 && qz < dcode.code128.s6 * 3 / 4 {
            trace!("code128: invalid quiet zone");
            return SymbolType::None;
        }

        // decoded valid start/stop - initialize state
        let code128 = &mut dcode.code128;
        code128.character = 1;
        code128.direction = c == STOP_REV;
        if code128.direction {
            code128.element = 7;
        }
        code128.start = c;
        code128.width = code128.s6;
        return SymbolType::None;
    }

    let Some(c) = c else {
        return decode_abort(dcode);
    };
    let character = dcode.code128.character as usize;
    if !dcode.size_buf(character + 1) {
        return decode_abort(dcode);
    }
    if dcode.code128.width.abs_diff(dcode.code128.s6) * 4 > dcode.code128.width {
        trace!("code128: character width changed");
        return decode_abort(dcode);
    }
    dcode.code128.width = dcode.code128.s6;

    if character == 1 {
        // lock shared resources
        if !dcode.acquire_lock(SymbolType::Code128) {
            dcode.code128.character = -1;
            return SymbolType::None;
        }
        let start = dcode.code128.start;
        dcode.buf_mut()[0] = start;
    }

    dcode.buf_mut()[character] = c;
    dcode.code128.character += 1;

    let reverse = dcode.code128.direction;
    if dcode.code128.character > 2
        && ((reverse && (START_A..=START_C).contains(&c)) || (!reverse && c == STOP_FWD))
    {
        let n = dcode.code128.character as usize;
        let valid = validate_checksum(&dcode.buf()[..n], reverse) && postprocess(dcode);
        dcode.code128.character = -1;
        if !valid {
            dcode.release_lock(SymbolType::Code128);
            return SymbolType::None;
        }
        return SymbolType::Code128;
    }
    SymbolType::None
}
