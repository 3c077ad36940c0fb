//! Codabar barcode decoder
//!
//! Characters are 4 bars and 3 spaces separated by a narrow gap. Elements
//! are classified by ranking like-colored widths rather than measuring
//! module counts, which tolerates the wide range of wide:narrow ratios in
//! printed Codabar. The start and stop characters (A-D) are reported with
//! the data.

use crate::{color::Color, config::Config, symbol::Configs, Decoder, SymbolType};
use tracing::trace;

/// Characters held locally before the shared buffer is locked
const NIBUF: usize = 6;

static CODABAR_LO: [u8; 12] = [0x0, 0x1, 0x4, 0x5, 0x2, 0xa, 0xb, 0x9, 0x6, 0x7, 0x8, 0x3];
static CODABAR_HI: [u8; 8] = [0x1, 0x4, 0x7, 0x6, 0x2, 0x3, 0x0, 0x5];
static CODABAR_CHARACTERS: &[u8; 20] = b"0123456789-$:/.+ABCD";

#[derive(Debug, Clone, Default)]
pub(crate) struct CodabarDecoder {
    /// symbol is being read in reverse
    direction: bool,
    /// elements left until the next character boundary
    element: u8,
    /// characters decoded so far, -1 when idle
    character: i32,
    /// running sum of the last 7 widths
    s7: u32,
    /// width of the last character
    width: u32,
    buf: [u8; NIBUF],

    pub(crate) config: Configs,
    pub(crate) configs: [i32; 2],
}

impl CodabarDecoder {
    pub(crate) fn reset(&mut self) {
        self.direction = false;
        self.element = 0;
        self.character = -1;
        self.s7 = 0;
    }
}

/// `w` is within 1/4 of `reference`
#[inline]
fn check_width(reference: u32, w: u32) -> bool {
    let dref = reference;
    let reference = reference * 4;
    let w = w * 4;
    reference - dref <= w && w <= reference + dref
}

/// Rank 3 like-colored elements starting at `i0`
///
/// Returns the offsets packed as nibbles, narrowest in bits 8..12 and
/// widest in bits 0..4.
fn sort3(dcode: &Decoder, i0: u8) -> u32 {
    let w0 = dcode.get_width(i0);
    let w2 = dcode.get_width(i0 + 2);
    let w4 = dcode.get_width(i0 + 4);
    let (a, b, c) = (i0 as u32, i0 as u32 + 2, i0 as u32 + 4);
    let pack = |lo: u32, mid: u32, hi: u32| (lo << 8) | (mid << 4) | hi;

    if w0 < w2 {
        if w2 < w4 {
            pack(a, b, c)
        } else if w0 < w4 {
            pack(a, c, b)
        } else {
            pack(c, a, b)
        }
    } else if w4 < w2 {
        pack(c, b, a)
    } else if w0 < w4 {
        pack(b, a, c)
    } else {
        pack(b, c, a)
    }
}

/// Rank `n` like-colored elements starting at `i0`, narrowest first
fn sortn(dcode: &Decoder, n: u8, i0: u8) -> u32 {
    let mut mask = 0u32;
    let mut sort = 0u32;
    for _ in 0..n {
        let mut wmin = u32::MAX;
        let mut jmin = 0;
        for j in (0..n).rev() {
            if (mask >> j) & 1 != 0 {
                continue;
            }
            let w = dcode.get_width(i0 + j * 2);
            if wmin >= w {
                wmin = w;
                jmin = j;
            }
        }
        sort = (sort << 4) | (i0 + jmin * 2) as u32;
        mask |= 1 << jmin;
    }
    sort
}

fn decode7(dcode: &Decoder) -> Option<u8> {
    let codabar = &dcode.codabar;
    let s = codabar.s7;
    if s < 7 {
        return None;
    }

    if !check_width(codabar.width, s) {
        trace!("codabar: character width changed");
        return None;
    }

    // extract min/max bar
    let mut ibar = sortn(dcode, 4, 1);
    let wbmax = dcode.get_width((ibar & 0xf) as u8);
    let wbmin = dcode.get_width((ibar >> 12) as u8);
    if 8 * wbmin < wbmax || 8 * wbmin > 5 * wbmax {
        return None;
    }

    if 8 * dcode.get_width(((ibar >> 4) & 0xf) as u8) < 5 * wbmax {
        // single wide bar combinations
        ibar = (ibar >> 1) & 0x3;
    } else if 8 * dcode.get_width(((ibar >> 8) & 0xf) as u8) >= 5 * wbmax {
        // three wide bars, no wide spaces
        ibar = (ibar >> 13) + 4;
    } else {
        return None;
    }

    let ispc = sort3(dcode, 2);
    let wsmax = dcode.get_width((ispc & 0xf) as u8);
    let wsmid = dcode.get_width(((ispc >> 4) & 0xf) as u8);
    let wsmin = dcode.get_width(((ispc >> 8) & 0xf) as u8);

    if ibar >> 2 != 0 {
        // verify no wide spaces
        if wsmin * 8 < wsmax * 3 {
            return None;
        }
        let mut ibar = ibar & 0x3;
        if codabar.direction {
            ibar = 3 - ibar;
        }
        Some(((0xfcde >> (ibar << 2)) & 0xf) as u8)
    } else if 8 * wsmin > 5 * wsmax {
        None
    } else if 8 * wsmid < 5 * wsmax {
        // single wide space
        let ispc = ((ispc & 0xf) >> 1) - 1;
        let mut ic = (ispc << 2) | ibar;
        if codabar.direction {
            ic = 11 - ic;
        }
        CODABAR_LO.get(ic as usize).copied()
    } else if 8 * wsmin < 5 * wsmid {
        // two wide spaces, check start/stop
        let ic = (ispc >> 10) * 4 + ibar;
        let c = *CODABAR_HI.get(ic as usize)?;
        if (c >> 2 != 0) != codabar.direction {
            trace!("codabar: invalid stop");
            return None;
        }
        Some((c & 0x3) | 0x10)
    } else {
        None
    }
}

fn decode_start(dcode: &mut Decoder) -> SymbolType {
    let s = dcode.codabar.s7;
    if s < 8 {
        return SymbolType::None;
    }

    // check leading quiet zone - nominally 10x
    let qz = dcode.get_width(8);
    if (qz != 0 && qz * 2 < s) || 4 * dcode.get_width(0) > 3 * s {
        return SymbolType::None;
    }

    // check space ratios first
    let ispc = sort3(dcode, 2);
    if ispc >> 8 == 4 {
        return SymbolType::None;
    }

    // require 2 wide and 1 narrow spaces
    let wsmax = dcode.get_width((ispc & 0xf) as u8);
    let wsmid = dcode.get_width(((ispc >> 4) & 0xf) as u8);
    let wsmin = dcode.get_width((ispc >> 8) as u8);
    if 8 * wsmin < wsmax || 8 * wsmin > 5 * wsmax || 8 * wsmid < 5 * wsmax {
        return SymbolType::None;
    }
    let ispc = ispc >> 10;

    // require 1 wide and 3 narrow bars
    let ibar = sortn(dcode, 4, 1);
    let wbmax = dcode.get_width((ibar & 0xf) as u8);
    let wbmin = dcode.get_width((ibar >> 12) as u8);
    if 8 * wbmin < wbmax || 8 * wbmin > 5 * wbmax {
        return SymbolType::None;
    }
    let wbmid = dcode.get_width(((ibar >> 4) & 0xf) as u8);
    if 8 * wbmid > 5 * wbmax {
        return SymbolType::None;
    }
    let ibar = ((ibar & 0xf) - 1) >> 1;

    let Some(&c) = CODABAR_HI.get((ispc * 4 + ibar) as usize) else {
        return SymbolType::None;
    };

    let codabar = &mut dcode.codabar;
    codabar.buf[0] = (c & 0x3) | 0x10;
    codabar.direction = c >> 2 != 0;
    codabar.element = 4;
    codabar.character = 1;
    codabar.width = codabar.s7;
    trace!(direction = codabar.direction, "codabar: valid start");
    SymbolType::Partial
}

/// Resolve scan direction and map to characters
fn postprocess(dcode: &mut Decoder) -> SymbolType {
    let reverse = dcode.codabar.direction;
    let mut n = dcode.codabar.character as usize;
    let held = dcode.codabar.buf;
    let config = dcode.codabar.config;

    let held_len = n.min(NIBUF);
    dcode.buf_mut()[..held_len].copy_from_slice(&held[..held_len]);
    let buf = &mut dcode.buf_mut()[..n];
    if reverse {
        buf.reverse();
    }

    if config.contains(Config::AddCheck) {
        // modulo 16 over every character, start and stop included
        let sum: u32 = buf.iter().map(|&c| c as u32).sum();
        if sum & 0xf != 0 {
            trace!(sum, "codabar: check mismatch");
            return SymbolType::None;
        }
        if !config.contains(Config::EmitCheck) {
            buf[n - 2] = buf[n - 1];
            n -= 1;
        }
    }

    for c in &mut buf[..n] {
        *c = CODABAR_CHARACTERS.get(*c as usize).copied().unwrap_or(b'?');
    }
    dcode.set_buffer_len(n);
    dcode.direction = 1 - 2 * reverse as i32;
    dcode.modifiers = Default::default();
    dcode.codabar.character = -1;
    SymbolType::Codabar
}

fn decode_abort(dcode: &mut Decoder) -> SymbolType {
    if dcode.codabar.character >= NIBUF as i32 {
        dcode.release_lock(SymbolType::Codabar);
    }
    dcode.codabar.character = -1;
    SymbolType::None
}

pub(crate) fn decode_codabar(dcode: &mut Decoder) -> SymbolType {
    // update latest character width
    dcode.codabar.s7 = dcode
        .codabar
        .s7
        .wrapping_sub(dcode.get_width(8))
        .wrapping_add(dcode.get_width(1));

    if dcode.color() != Color::Space {
        return SymbolType::None;
    }
    if dcode.codabar.character < 0 {
        return decode_start(dcode);
    }
    if dcode.codabar.character < 2 && decode_start(dcode) != SymbolType::None {
        return SymbolType::Partial;
    }
    dcode.codabar.element -= 1;
    if dcode.codabar.element != 0 {
        return SymbolType::None;
    }
    dcode.codabar.element = 4;

    let Some(c) = decode7(dcode) else {
        return decode_abort(dcode);
    };

    let character = dcode.codabar.character as usize;
    if character < NIBUF {
        dcode.codabar.buf[character] = c;
    } else {
        if !dcode.size_buf(character + 1) {
            trace!("codabar: buffer overflow");
            return decode_abort(dcode);
        }
        dcode.buf_mut()[character] = c;
    }
    dcode.codabar.character += 1;
    let n = dcode.codabar.character;

    // lock shared resources
    if n == NIBUF as i32 && !dcode.acquire_lock(SymbolType::Codabar) {
        dcode.codabar.character = -1;
        return SymbolType::Partial;
    }

    let s = dcode.codabar.s7;
    if c & 0x10 != 0 {
        let qz = dcode.get_width(0);
        if qz != 0 && qz * 2 < s {
            trace!("codabar: invalid quiet zone");
            return decode_abort(dcode);
        }
        let (min, max) = dcode.length_limits(SymbolType::Codabar);
        if n < min || (max > 0 && n > max) {
            trace!(n, "codabar: invalid length");
            return decode_abort(dcode);
        }
        if n < NIBUF as i32 && !dcode.acquire_lock(SymbolType::Codabar) {
            dcode.codabar.character = -1;
            return SymbolType::Partial;
        }

        let sym = postprocess(dcode);
        if sym <= SymbolType::Partial {
            dcode.release_lock(SymbolType::Codabar);
            dcode.codabar.character = -1;
        }
        return sym;
    } else if 4 * dcode.get_width(0) > 3 * s {
        // inter-character space too wide
        return decode_abort(dcode);
    }

    SymbolType::None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wide elements, bars and spaces interleaved starting with a bar
    fn pattern(c: char) -> &'static str {
        match c {
            '0' => "0000011",
            '1' => "0000110",
            '2' => "0001001",
            '3' => "1100000",
            '4' => "0010010",
            '5' => "1000010",
            '6' => "0100001",
            '-' => "0001100",
            '$' => "0011000",
            'A' => "0011010",
            'B' => "0101001",
            'C' => "0001011",
            'D' => "0001110",
            _ => panic!("no pattern for {c}"),
        }
    }

    fn encode(text: &str) -> Vec<u32> {
        let mut widths = vec![20];
        for (i, c) in text.chars().enumerate() {
            if i > 0 {
                widths.push(2);
            }
            widths.extend(pattern(c).bytes().map(|b| if b == b'1' { 5 } else { 2 }));
        }
        widths.push(20);
        widths
    }

    fn decode_with(dcode: &mut Decoder, widths: &[u32]) -> Option<(String, i32)> {
        dcode.new_scan();
        let mut found = None;
        for &w in widths {
            if dcode.decode_width(w) == SymbolType::Codabar {
                found = Some((
                    dcode.data_string().unwrap().to_string(),
                    dcode.direction(),
                ));
            }
        }
        found
    }

    fn decoder() -> Decoder {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        dcode
            .set_config(Some(SymbolType::Codabar), Config::Enable, 1)
            .unwrap();
        dcode
    }

    #[test]
    fn test_check_width() {
        assert!(check_width(40, 40));
        assert!(check_width(40, 50));
        assert!(!check_width(40, 51));
        assert!(!check_width(40, 29));
    }

    #[test]
    fn test_decode_forward_and_reverse() {
        let mut dcode = decoder();
        let widths = encode("A1234B");
        assert_eq!(
            decode_with(&mut dcode, &widths),
            Some(("A1234B".to_string(), 1))
        );

        let mut reversed = widths;
        reversed.reverse();
        assert_eq!(
            decode_with(&mut dcode, &reversed),
            Some(("A1234B".to_string(), -1))
        );
    }

    #[test]
    fn test_long_symbol_uses_shared_buffer() {
        let mut dcode = decoder();
        assert_eq!(
            decode_with(&mut dcode, &encode("A40156B")),
            Some(("A40156B".to_string(), 1))
        );
        assert_eq!(dcode.lock, SymbolType::None);
    }

    #[test]
    fn test_min_length() {
        let mut dcode = decoder();
        dcode
            .set_config(Some(SymbolType::Codabar), Config::MinLen, 7)
            .unwrap();
        assert_eq!(decode_with(&mut dcode, &encode("A1234B")), None);
    }

    #[test]
    fn test_add_check() {
        let mut dcode = decoder();
        dcode
            .set_config(Some(SymbolType::Codabar), Config::AddCheck, 1)
            .unwrap();
        // C + 1 + - + 2 + $ + 3 + D is a multiple of 16
        assert_eq!(
            decode_with(&mut dcode, &encode("C1-2$3D")),
            Some(("C1-2$D".to_string(), 1))
        );
        assert_eq!(decode_with(&mut dcode, &encode("A1234B")), None);

        dcode
            .set_config(Some(SymbolType::Codabar), Config::EmitCheck, 1)
            .unwrap();
        assert_eq!(
            decode_with(&mut dcode, &encode("C1-2$3D")),
            Some(("C1-2$3D".to_string(), 1))
        );
    }
}
