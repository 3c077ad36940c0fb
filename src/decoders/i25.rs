//! Interleaved 2 of 5 barcode decoder
//!
//! Digits are encoded in pairs: the first digit in the five bars and the
//! second in the five interleaved spaces, two of each five elements wide.

use crate::{color::Color, decoder::decode_e, symbol::Configs, Decoder, SymbolType};
use tracing::trace;

/// Digits held locally before the shared buffer is locked
const NIBUF: usize = 4;

#[derive(Debug, Clone, Default)]
pub(crate) struct I25Decoder {
    /// symbol is being read in reverse
    direction: bool,
    /// elements left until the next character pair boundary
    element: u8,
    /// digits decoded so far, -1 when idle
    character: i32,
    /// running sum of the last 10 widths
    s10: u32,
    /// width of the last character pair
    width: u32,
    buf: [u8; NIBUF],

    pub(crate) config: Configs,
    pub(crate) configs: [i32; 2],
}

impl I25Decoder {
    pub(crate) fn reset(&mut self) {
        self.direction = false;
        self.element = 0;
        self.character = -1;
        self.s10 = 0;
    }
}

/// Shift one narrow (0) or wide (1) element into `enc`
#[inline]
fn decode1(enc: u8, e: u32, s: u32) -> Option<u8> {
    let e = decode_e(e, s, 45);
    if !(0..=7).contains(&e) {
        return None;
    }
    Some((enc << 1) | (e > 2) as u8)
}

/// Narrow element: at most 2 of 45 units
#[inline]
fn is_narrow(e: u32, s: u32) -> bool {
    (0..=2).contains(&decode_e(e, s, 45))
}

/// Decode one digit from 5 like-colored elements starting at `offset`
fn decode10(dcode: &Decoder, offset: u8) -> Option<u8> {
    let i25 = &dcode.i25;
    if i25.s10 < 10 {
        return None;
    }

    // threshold bar width ratios
    let mut enc = 0;
    let mut par = 0;
    for i in (0..=8u8).rev().step_by(2) {
        let j = offset + if i25.direction { i } else { 8 - i };
        enc = decode1(enc, dcode.get_width(j), i25.s10)?;
        if enc & 1 != 0 {
            par += 1;
        }
    }

    if par != 2 {
        trace!(enc, "i25: bad parity");
        return None;
    }

    // decode binary weights
    let enc = enc & 0xf;
    if enc & 8 == 0 {
        return Some(enc);
    }
    match enc {
        12 => Some(0),
        _ if enc - 1 > 9 => None,
        _ => Some(enc - 1),
    }
}

fn decode_start(dcode: &mut Decoder) -> SymbolType {
    let s10 = dcode.i25.s10;
    if s10 < 10 {
        return SymbolType::None;
    }

    let head = [10, 11, 12]
        .into_iter()
        .try_fold(0, |enc, i| decode1(enc, dcode.get_width(i), s10));

    // forward start is 4 narrow elements, reversed stop is narrow, narrow, wide
    let color = dcode.color();
    let (valid, quiet_at) = if color == Color::Bar {
        (head == Some(4), 13)
    } else {
        let enc = head.and_then(|enc| decode1(enc, dcode.get_width(13), s10));
        (enc == Some(0), 14)
    };
    if !valid {
        return SymbolType::None;
    }

    // check leading quiet zone
    let quiet = dcode.get_width(quiet_at);
    if quiet != 0 && quiet < s10 * 3 / 8 {
        trace!(quiet, "i25: invalid quiet zone");
        return SymbolType::None;
    }

    let i25 = &mut dcode.i25;
    i25.direction = color == Color::Bar;
    i25.element = 1;
    i25.character = 0;
    SymbolType::Partial
}

/// Lock the shared buffer and move the held digits into it
fn acquire_lock(dcode: &mut Decoder) -> bool {
    if !dcode.acquire_lock(SymbolType::I25) {
        dcode.i25.character = -1;
        return false;
    }
    let held = dcode.i25.buf;
    dcode.buf_mut()[..NIBUF].copy_from_slice(&held);
    true
}

fn decode_abort(dcode: &mut Decoder) -> SymbolType {
    if dcode.i25.character >= NIBUF as i32 {
        dcode.release_lock(SymbolType::I25);
    }
    dcode.i25.character = -1;
    SymbolType::None
}

fn decode_end(dcode: &mut Decoder) -> SymbolType {
    let width = dcode.i25.width;
    let reverse = dcode.i25.direction;
    let n = dcode.i25.character;

    // check trailing quiet zone
    let quiet = dcode.get_width(0);
    if (quiet != 0 && quiet < width * 3 / 8)
        || !is_narrow(dcode.get_width(1), width)
        || !is_narrow(dcode.get_width(2), width)
    {
        return SymbolType::None;
    }

    // check exit condition
    let valid = if reverse {
        is_narrow(dcode.get_width(3), width) && is_narrow(dcode.get_width(4), width)
    } else {
        (3..=7).contains(&decode_e(dcode.get_width(3), width, 45))
    };
    if !valid {
        return SymbolType::None;
    }

    if n <= NIBUF as i32 && !acquire_lock(dcode) {
        return SymbolType::Partial;
    }

    let (min, max) = dcode.length_limits(SymbolType::I25);
    if n < min || (max > 0 && n > max) {
        trace!(n, "i25: invalid length");
        dcode.release_lock(SymbolType::I25);
        dcode.i25.character = -1;
        return SymbolType::None;
    }

    let n = n as usize;
    if reverse {
        dcode.buf_mut()[..n].reverse();
    }
    dcode.set_buffer_len(n);
    dcode.direction = 1 - 2 * reverse as i32;
    dcode.modifiers = Default::default();
    dcode.i25.character = -1;
    SymbolType::I25
}

/// Store one decoded digit in the held or shared buffer
fn push_digit(dcode: &mut Decoder, c: u8) {
    let character = dcode.i25.character as usize;
    if character < NIBUF {
        dcode.i25.buf[character] = b'0' + c;
    } else {
        dcode.buf_mut()[character] = b'0' + c;
    }
    dcode.i25.character += 1;
}

pub(crate) fn decode_i25(dcode: &mut Decoder) -> SymbolType {
    // update latest character width
    dcode.i25.s10 = dcode
        .i25
        .s10
        .wrapping_sub(dcode.get_width(10))
        .wrapping_add(dcode.get_width(0));

    if dcode.i25.character < 0 && decode_start(dcode) == SymbolType::None {
        return SymbolType::None;
    }

    dcode.i25.element = dcode.i25.element.wrapping_sub(1) & 0xf;
    if dcode.i25.element == 6 - dcode.i25.direction as u8 {
        return decode_end(dcode);
    } else if dcode.i25.element != 0 {
        return SymbolType::None;
    }

    dcode.i25.width = dcode.i25.s10;

    if dcode.i25.character == NIBUF as i32 && !acquire_lock(dcode) {
        return SymbolType::Partial;
    }

    let Some(c) = decode10(dcode, 1) else {
        return decode_abort(dcode);
    };
    if !dcode.size_buf(dcode.i25.character as usize + 3) {
        return decode_abort(dcode);
    }
    push_digit(dcode, c);

    let Some(c) = decode10(dcode, 0) else {
        return decode_abort(dcode);
    };
    push_digit(dcode, c);

    dcode.i25.element = 10;
    if dcode.i25.character == 2 {
        SymbolType::Partial
    } else {
        SymbolType::None
    }
}
