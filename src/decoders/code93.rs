//! Code 93 barcode decoder
//!
//! Characters are 3 bars and 3 spaces spanning 9 modules. Two modulo-47
//! check characters precede the stop pattern; both are verified and removed,
//! and the four shift characters expand the result to full ASCII.

use crate::{color::Color, decoder::decode_e, symbol::Configs, Decoder, SymbolType};
use tracing::trace;

const CHKMOD: u32 = 47;
const STOP: i32 = 0x2f;

static CODE93_HASH: [i8; 0x40] = [
    0x0f, 0x2b, 0x30, 0x38, 0x13, 0x1b, 0x11, 0x2a, 0x0a, -1, 0x2f, 0x0f, 0x38, 0x38, 0x2f, 0x37,
    0x24, 0x3a, 0x1b, 0x36, 0x18, 0x26, 0x02, 0x2c, 0x2b, 0x05, 0x21, 0x3b, 0x04, 0x15, 0x12, 0x0c,
    0x00, 0x26, 0x23, 0x00, -1, 0x2e, 0x3f, 0x13, 0x2e, 0x36, -1, 0x08, 0x09, -1, 0x15, 0x14, -1,
    0x00, 0x21, 0x3b, -1, 0x33, 0x00, -1, 0x2d, 0x0c, 0x1b, 0x0a, 0x3f, 0x3f, 0x29, 0x1c,
];

static CODE93_GRAPH: &[u8; 7] = b"-. $/+%";
static CODE93_S2: &[u8; 26] = b"\x1b\x1c\x1d\x1e\x1f;<=>?[\\]^_{|}~\x7f\x00\x40`\x7f\x7f\x7f";

#[derive(Debug, Clone, Default)]
pub(crate) struct Code93Decoder {
    /// symbol is being read in reverse
    direction: bool,
    /// element offset within the current character, modulo 8
    element: u8,
    /// characters decoded so far, -1 when idle
    character: i32,
    /// width of the last character
    width: u32,
    /// first character, held until the buffer lock is taken
    held: u8,

    pub(crate) config: Configs,
    pub(crate) configs: [i32; 2],
}

impl Code93Decoder {
    pub(crate) fn reset(&mut self) {
        self.direction = false;
        self.element = 0;
        self.character = -1;
    }
}

/// Character width differs from the previous one by more than 1/4
#[inline]
fn width_changed(cur: u32, prev: u32) -> bool {
    prev.abs_diff(cur) * 4 > prev
}

/// Build the edge signature of the last 6 elements
fn encode6(dcode: &Decoder) -> Option<i32> {
    let s = dcode.s6;
    if s < 9 {
        return None;
    }

    let mut sig = 0;
    for i in (1..6).rev() {
        let c = decode_e(dcode.pair_width(i), s, 9);
        if !(0..=3).contains(&c) {
            return None;
        }
        sig = (sig << 2) | c;
    }
    Some(sig)
}

/// Nonzero when the signature cannot come from valid element widths
fn validate_sig(mut sig: i32) -> i32 {
    let mut sum = 0;
    let mut emin = 0;
    let mut sig0 = 0;
    let mut sig1 = 0;

    for i in (0..3).rev() {
        let e = sig & 3;
        sig >>= 2;
        sum = e - sum;
        sig1 <<= 4;
        sig1 += sum;
        if i == 0 {
            break;
        }

        let e = sig & 3;
        sig >>= 2;
        sum = e - sum;
        sig0 <<= 4;
        emin = emin.min(sum);
        sig0 += sum;
    }

    emin = emin + (emin << 4) + (emin << 8);
    sig0 -= emin;
    sig1 += emin;
    (sig0 | sig1) & 0x888
}

fn decode6(dcode: &Decoder) -> Option<i32> {
    let mut sig = encode6(dcode)?;

    if (sig & 0x3) + ((sig >> 4) & 0x3) + ((sig >> 8) & 0x3) != 3 || validate_sig(sig) != 0 {
        return None;
    }

    if dcode.code93.direction {
        // reverse signature
        let tmp = sig & 0x030;
        sig = ((sig & 0x3c0) >> 6) | ((sig & 0x00f) << 6);
        sig = ((sig & 0x30c) >> 2) | ((sig & 0x0c3) << 2) | tmp;
    }

    let g0 = CODE93_HASH[((sig - (sig >> 4)) & 0x3f) as usize];
    let g1 = CODE93_HASH[(((sig >> 2) - (sig >> 7)) & 0x3f) as usize];
    if g0 < 0 || g1 < 0 {
        trace!(sig, "code93: signature outside hash");
        return None;
    }

    Some(((g0 + g1) & 0x3f) as i32)
}

fn decode_start(dcode: &mut Decoder) -> SymbolType {
    let s = dcode.s6;
    let Some(c) = encode6(dcode) else {
        return SymbolType::None;
    };
    if c != 0x00f && c != 0x0f0 {
        return SymbolType::None;
    }

    let dir = (c >> 7) != 0;
    let qz = if dir {
        if decode_e(dcode.pair_width(0), s, 9) != 0 {
            return SymbolType::None;
        }
        dcode.get_width(8)
    } else {
        dcode.get_width(7)
    };

    if qz != 0 && qz < s * 3 / 4 {
        trace!("code93: invalid quiet zone");
        return SymbolType::None;
    }

    // decoded valid start/stop - initialize state
    let code93 = &mut dcode.code93;
    code93.direction = dir;
    code93.element = if dir { 7 } else { 0 };
    code93.character = 0;
    code93.width = s;
    SymbolType::Partial
}

fn decode_abort(dcode: &mut Decoder) -> SymbolType {
    if dcode.code93.character > 1 {
        dcode.release_lock(SymbolType::Code93);
    }
    dcode.code93.character = -1;
    SymbolType::None
}

fn check_stop(dcode: &Decoder) -> bool {
    let n = dcode.code93.character;
    let s = dcode.s6;
    let (min, max) = dcode.length_limits(SymbolType::Code93);

    if n < 2 || n < min || (max != 0 && n > max) {
        return false;
    }

    if dcode.code93.direction {
        let qz = dcode.get_width(0);
        qz == 0 || qz >= s * 3 / 4
    } else {
        decode_e(dcode.pair_width(0), s, 9) == 0
    }
}

#[inline]
fn plusmod47(acc: u32, add: u32) -> u32 {
    let acc = acc + add;
    if acc >= CHKMOD {
        acc - CHKMOD
    } else {
        acc
    }
}

/// Verify the C and K check characters
fn validate_checksums(dcode: &Decoder) -> bool {
    let n = dcode.code93.character as usize;
    let reverse = dcode.code93.direction;
    let buf = &dcode.buf()[..n];
    let at = |i: usize| buf[if reverse { n - 1 - i } else { i }] as u32;

    let (mut sum_c, mut acc_c, mut i_c) = (0, 0, (n - 2) % 20);
    let (mut sum_k, mut acc_k, mut i_k) = (0, 0, (n - 1) % 15);

    for i in 0..n - 2 {
        let d = at(i);

        if i_c == 0 {
            acc_c = 0;
            i_c = 20;
        }
        i_c -= 1;
        acc_c = plusmod47(acc_c, d);
        sum_c = plusmod47(sum_c, acc_c);

        if i_k == 0 {
            acc_k = 0;
            i_k = 15;
        }
        i_k -= 1;
        acc_k = plusmod47(acc_k, d);
        sum_k = plusmod47(sum_k, acc_k);
    }

    if at(n - 2) != sum_c {
        trace!(expected = sum_c, "code93: C check mismatch");
        return false;
    }

    acc_k = plusmod47(acc_k, sum_c);
    sum_k = plusmod47(sum_k, acc_k);
    if at(n - 1) != sum_k {
        trace!(expected = sum_k, "code93: K check mismatch");
        return false;
    }
    true
}

/// Resolve scan direction and convert to ASCII
fn postprocess(dcode: &mut Decoder) -> bool {
    let n = dcode.code93.character as usize;
    let reverse = dcode.code93.direction;

    let mut chars = dcode.buf()[..n].to_vec();
    if reverse {
        chars.reverse();
    }
    // drop the check characters
    chars.truncate(n - 2);

    let mut text = Vec::with_capacity(chars.len());
    let mut iter = chars.into_iter();
    while let Some(d) = iter.next() {
        let c = match d {
            0x00..=0x09 => b'0' + d,
            0x0a..=0x23 => b'A' + d - 0x0a,
            0x24..=0x2a => CODE93_GRAPH[(d - 0x24) as usize],
            0x2b..=0x2e => {
                let shift = d;
                let d = match iter.next() {
                    Some(d @ 0x0a..=0x23) => d - 0x0a,
                    _ => return false,
                };
                match shift {
                    0x2b => d + 1,
                    0x2c => CODE93_S2[d as usize],
                    0x2d => d + 0x21,
                    _ => d + 0x61,
                }
            }
            _ => return false,
        };
        text.push(c);
    }

    dcode.buf_mut()[..text.len()].copy_from_slice(&text);
    dcode.set_buffer_len(text.len());
    dcode.direction = 1 - 2 * reverse as i32;
    dcode.modifiers = Default::default();
    true
}

pub(crate) fn decode_code93(dcode: &mut Decoder) -> SymbolType {
    if dcode.code93.character < 0 {
        if dcode.color() != Color::Bar {
            return SymbolType::None;
        }
        return decode_start(dcode);
    }

    // process every 6th element of active symbol
    dcode.code93.element = (dcode.code93.element + 1) & 7;
    if dcode.code93.element != 6 || (dcode.color() == Color::Bar) == dcode.code93.direction {
        return SymbolType::None;
    }
    dcode.code93.element = 0;

    if width_changed(dcode.s6, dcode.code93.width) {
        return decode_abort(dcode);
    }

    let Some(c) = decode6(dcode) else {
        return decode_abort(dcode);
    };

    if c == STOP {
        if !check_stop(dcode) {
            return SymbolType::None;
        }
        if !validate_checksums(dcode) || !postprocess(dcode) {
            return decode_abort(dcode);
        }
        dcode.code93.character = -1;
        return SymbolType::Code93;
    }

    let character = dcode.code93.character as usize;
    if !dcode.size_buf(character + 1) {
        return decode_abort(dcode);
    }

    dcode.code93.width = dcode.s6;

    if character == 1 {
        // lock shared resources
        if !dcode.acquire_lock(SymbolType::Code93) {
            return decode_abort(dcode);
        }
        let held = dcode.code93.held;
        dcode.buf_mut()[0] = held;
    }

    if character == 0 {
        dcode.code93.held = c as u8;
    } else {
        dcode.buf_mut()[character] = c as u8;
    }
    dcode.code93.character += 1;
    SymbolType::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const START_STOP: &str = "111141";

    /// Module widths of the characters used below, by value
    fn pattern(value: u8) -> &'static str {
        match value {
            3 => "111411",
            6 => "121311",
            9 => "141111",
            14 => "221211",
            28 => "211122",
            29 => "211221",
            41 => "113121",
            _ => panic!("no pattern for {value}"),
        }
    }

    fn encode(values: &[u8]) -> Vec<u32> {
        let mut widths = vec![30];
        let mut push = |p: &str| widths.extend(p.bytes().map(|b| (b - b'0') as u32 * 3));
        push(START_STOP);
        for &v in values {
            push(pattern(v));
        }
        push(START_STOP);
        push("1");
        widths.push(30);
        widths
    }

    fn decode(widths: &[u32]) -> Option<(Vec<u8>, i32)> {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        dcode
            .set_config(Some(SymbolType::Code93), Config::Enable, 1)
            .unwrap();
        let mut found = None;
        for &w in widths {
            if dcode.decode_width(w) == SymbolType::Code93 {
                found = Some((dcode.data().to_vec(), dcode.direction()));
            }
        }
        found
    }

    // T E S T 9 3, C = '+' (41), K = 6
    const TEST93: [u8; 8] = [29, 14, 28, 29, 9, 3, 41, 6];

    #[test]
    fn test_decode_forward() {
        let got = decode(&encode(&TEST93));
        assert_eq!(got, Some((b"TEST93".to_vec(), 1)));
    }

    #[test]
    fn test_decode_reverse() {
        let mut widths = encode(&TEST93);
        widths.reverse();
        assert_eq!(decode(&widths), Some((b"TEST93".to_vec(), -1)));
    }

    #[test]
    fn test_bad_check_rejected() {
        let mut values = TEST93;
        values[7] = 3;
        assert_eq!(decode(&encode(&values)), None);
    }

    #[test]
    fn test_shift_expands_to_lowercase() {
        // (+)A
        let values = [46, 10];
        let (c, k) = checks(&values);
        let mut full = values.to_vec();
        full.extend([c, k]);
        assert_eq!(expand(&full), Some(b"a".to_vec()));
    }

    /// Weighted modulo-47 check characters
    fn checks(values: &[u8]) -> (u8, u8) {
        let weighted = |vals: &[u8], max: usize| {
            vals.iter()
                .rev()
                .enumerate()
                .map(|(i, &v)| (i % max + 1) as u32 * v as u32)
                .sum::<u32>()
                % 47
        };
        let c = weighted(values, 20) as u8;
        let mut with_c = values.to_vec();
        with_c.push(c);
        (c, weighted(&with_c, 15) as u8)
    }

    fn expand(values: &[u8]) -> Option<Vec<u8>> {
        let mut dcode = Decoder::new();
        dcode.size_buf(values.len() + 1);
        dcode.buf_mut()[..values.len()].copy_from_slice(values);
        dcode.code93.character = values.len() as i32;
        if !validate_checksums(&dcode) || !postprocess(&mut dcode) {
            return None;
        }
        Some(dcode.data().to_vec())
    }

    #[test]
    fn test_checks_match_fixture() {
        assert_eq!(checks(&TEST93[..6]), (41, 6));
        assert_eq!(expand(&TEST93), Some(b"TEST93".to_vec()));
    }
}
