//! EAN/UPC barcode decoder
//!
//! Decodes EAN-8, EAN-13, UPC-A, UPC-E, ISBN-10, ISBN-13 and the EAN-2 and
//! EAN-5 add-ons. Four passes run in parallel, one per width phase, and each
//! decodes a half symbol between guard patterns. Halves are collected in a
//! holding buffer until both sides of the same symbol agree.

use crate::{
    color::Color, config::Config, decoder::decode_e, symbol::Configs, Decoder, SymbolType,
};
use tracing::trace;

// pass state bits
const STATE_REV: i8 = i8::MIN;
const STATE_ADDON: i8 = 0x40;
const STATE_IDX: i8 = 0x3f;

// partial decode symbol location
const EAN_LEFT: i32 = 0x0000;
const EAN_RIGHT: i32 = 0x1000;
const SYMBOL_MASK: i32 = 0xff;

const NONE: i32 = SymbolType::None as i32;
const PARTIAL: i32 = SymbolType::Partial as i32;
const EAN2: i32 = SymbolType::Ean2 as i32;
const EAN5: i32 = SymbolType::Ean5 as i32;
const EAN8: i32 = SymbolType::Ean8 as i32;
const UPCE: i32 = SymbolType::Upce as i32;
const ISBN10: i32 = SymbolType::Isbn10 as i32;
const UPCA: i32 = SymbolType::Upca as i32;
const EAN13: i32 = SymbolType::Ean13 as i32;
const ISBN13: i32 = SymbolType::Isbn13 as i32;

/// Convert compact encoded D2E1E2 to character (bit4 is parity)
static DIGITS: [u8; 20] = [
    // E1   E2
    0x06, 0x10, 0x04, 0x13, //  2  2-5
    0x19, 0x08, 0x11, 0x05, //  3  2-5 (d2 <= thr)
    0x09, 0x12, 0x07, 0x15, //  4  2-5 (d2 <= thr)
    0x16, 0x00, 0x14, 0x03, //  5  2-5
    0x18, 0x01, 0x02, 0x17, // E1E2=43,44,33,34 (d2 > thr)
];

/// Parity decoding for UPC-E check digit and EAN-13 leading digit
static PARITY_DECODE: [u8; 32] = [
    0xf0, // [00] BBBBBB = RIGHT half EAN-13
    // UPC-E check digit encoding
    0xff, 0xff, 0x0f, // [07] BBBAAA = 0
    0xff, 0x1f, // [0b] BBABAA = 1
    0x2f, // [0d] BBAABA = 2
    0xf3, // [0e] BBAAAB = 3
    0xff, 0x4f, // [13] BABBAA = 4
    0x7f, // [15] BABABA = 7
    0xf8, // [16] BABAAB = 8
    0x5f, // [19] BAABBA = 5
    0xf9, // [1a] BAABAB = 9
    0xf6, // [1c] BAAABB = 6
    0xff, //
    // LEFT half EAN-13 leading digit
    0xff, 0x6f, // [23] ABBBAA = 6
    0x9f, // [25] ABBABA = 9
    0xf5, // [26] ABBAAB = 5
    0x8f, // [29] ABABBA = 8
    0xf7, // [2a] ABABAB = 7
    0xf4, // [2c] ABAABB = 4
    0xff, 0x3f, // [31] AABBBA = 3
    0xf2, // [32] AABBAB = 2
    0xf1, // [34] AABABB = 1
    0xff, 0xff, 0xff, 0xff, 0x0f, // [3f] AAAAAA = 0
];

/// One of the four parallel decode attempts
#[derive(Debug, Clone, Copy)]
pub(crate) struct EanPass {
    /// module position of the current width within the symbol
    state: i8,
    /// running character width
    width: u32,
    raw: [u8; 7],
}

impl Default for EanPass {
    fn default() -> Self {
        Self {
            state: -1,
            width: 0,
            raw: [0; 7],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EanDecoder {
    pass: [EanPass; 4],
    /// holding buffer contents
    left: i32,
    right: i32,
    /// 0 forward, 1 reverse
    direction: i32,
    /// running sum of the last 4 widths
    s4: u32,
    /// character width of the held halves
    width: u32,
    buf: [i8; 18],

    pub(crate) enable: bool,
    pub(crate) ean13_config: Configs,
    pub(crate) ean2_config: Configs,
    pub(crate) ean5_config: Configs,
    pub(crate) ean8_config: Configs,
    pub(crate) upca_config: Configs,
    pub(crate) upce_config: Configs,
    pub(crate) isbn10_config: Configs,
    pub(crate) isbn13_config: Configs,
}

impl Default for EanDecoder {
    fn default() -> Self {
        Self {
            pass: [EanPass::default(); 4],
            left: NONE,
            right: NONE,
            direction: 0,
            s4: 0,
            width: 0,
            buf: [-1; 18],
            enable: false,
            ean13_config: Configs::empty(),
            ean2_config: Configs::empty(),
            ean5_config: Configs::empty(),
            ean8_config: Configs::empty(),
            upca_config: Configs::empty(),
            upce_config: Configs::empty(),
            isbn10_config: Configs::empty(),
            isbn13_config: Configs::empty(),
        }
    }
}

impl EanDecoder {
    pub(crate) fn new_scan(&mut self) {
        for pass in &mut self.pass {
            pass.state = -1;
        }
        self.s4 = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.new_scan();
        self.left = NONE;
        self.right = NONE;
    }

    /// Recompute the family-wide enable after a config change
    pub(crate) fn update_enable(&mut self) {
        self.enable = [
            self.ean13_config,
            self.ean2_config,
            self.ean5_config,
            self.ean8_config,
            self.upca_config,
            self.upce_config,
            self.isbn10_config,
            self.isbn13_config,
        ]
        .iter()
        .any(|c| c.contains(Config::Enable));
    }

    fn config(&self, sym: i32) -> Configs {
        match sym & SYMBOL_MASK {
            EAN2 => self.ean2_config,
            EAN5 => self.ean5_config,
            EAN8 => self.ean8_config,
            UPCE => self.upce_config,
            ISBN10 => self.isbn10_config,
            UPCA => self.upca_config,
            EAN13 => self.ean13_config,
            ISBN13 => self.isbn13_config,
            _ => Configs::empty(),
        }
    }

    fn clear_halves(&mut self) {
        self.left = NONE;
        self.right = NONE;
    }
}

/// Two character widths agree within 1/8
#[inline]
fn check_width(w0: u32, w1: u32) -> bool {
    let dw0 = w0;
    let w0 = w0.wrapping_mul(8);
    let w1 = w1.wrapping_mul(8);
    w0.wrapping_sub(dw0) <= w1 && w1 <= w0.wrapping_add(dw0)
}

/// Evaluate previous N (>= 2) widths as an auxiliary pattern,
/// using the preceding 4 as character width
fn aux_end(dcode: &Decoder, fwd: u8) -> i32 {
    // reference width from previous character
    let s = dcode.calc_s(4 + fwd, 4);

    // check quiet zone
    let qz = dcode.get_width(0);
    if fwd == 0 && qz != 0 && qz <= s.wrapping_mul(3) / 4 {
        trace!("ean: invalid quiet zone");
        return -1;
    }

    let mut code = 0;
    for i in (1 - fwd)..(3 + fwd) {
        let e = decode_e(dcode.pair_width(i), s, 7);
        if e < 0 {
            return -1;
        }
        code = (code << 2) | e;
    }
    code
}

/// Determine possible auxiliary pattern using the current 4 as a character
fn aux_start(dcode: &Decoder) -> i8 {
    let s4 = dcode.ean.s4;
    if s4 < 6 {
        return -1;
    }

    // add-on has no guard in reverse, so reverse add-ons are not recognized
    if decode_e(dcode.pair_width(5), s4, 7) != 0 {
        return -1;
    }

    let e1 = decode_e(dcode.pair_width(4), s4, 7);

    if dcode.color() == Color::Bar {
        // check for quiet-zone
        let qz = dcode.get_width(7);
        if qz == 0 || qz > s4.wrapping_mul(3) / 4 {
            match e1 {
                0 => return 0,
                1 => return STATE_ADDON,
                _ => {}
            }
        }
        return -1;
    }

    // attempting decode from SPACE => validate center guard
    if e1 == 0
        && decode_e(dcode.pair_width(6), s4, 7) == 0
        && decode_e(dcode.pair_width(7), s4, 7) == 0
    {
        return 0;
    }
    -1
}

/// Check the add-on delimiter using the current 4 as a character
#[inline]
fn aux_mid(dcode: &Decoder) -> i32 {
    decode_e(dcode.pair_width(4), dcode.ean.s4, 7)
}

/// Attempt to decode the previous 4 widths (2 bars and 2 spaces) as a character
fn decode4(dcode: &Decoder) -> i32 {
    let s4 = dcode.ean.s4;
    let bar = dcode.color() == Color::Bar;

    // calculate similar edge measurements
    let e1 = if bar { dcode.pair_width(0) } else { dcode.pair_width(2) };
    let e2 = dcode.pair_width(1);

    if s4 < 6 {
        return -1;
    }

    let (e1, e2) = (decode_e(e1, s4, 7), decode_e(e2, s4, 7));
    if e1 < 0 || e2 < 0 {
        return -1;
    }
    let mut code = (e1 << 2) | e2;

    // E1E2 in 34, 43, 33, 44 needs the bar sum as a determinant
    if (1 << code) & 0x0660 != 0 {
        let d2 = if bar {
            dcode.get_width(0).wrapping_add(dcode.get_width(2))
        } else {
            dcode.get_width(1).wrapping_add(dcode.get_width(3))
        }
        .wrapping_mul(7);
        let mid: u32 = if (1 << code) & 0x0420 != 0 { 3 } else { 4 };
        if d2 > mid.wrapping_mul(s4) {
            // compress code space
            code = ((code >> 1) & 3) | 0x10;
        }
    }
    code
}

/// Parity-coded digit for a UPC-E / EAN-13 parity pattern
#[inline]
fn parity_digit(par: u8) -> u8 {
    let mut d = PARITY_DECODE[(par >> 1) as usize];
    if par & 1 != 0 {
        d >>= 4;
    }
    d & 0xf
}

fn part_end2(ean: &EanDecoder, pass: &EanPass) -> i32 {
    if !ean.ean2_config.contains(Config::Enable) {
        return NONE;
    }

    let par = ((pass.raw[1] & 0x10) >> 3) | ((pass.raw[2] & 0x10) >> 4);
    let chk = !((pass.raw[1] & 0xf) * 10 + (pass.raw[2] & 0xf)) & 0x3;
    if par != chk {
        return NONE;
    }
    EAN2
}

fn part_end4(pass: &mut EanPass, fwd: u8) -> i32 {
    let par = ((pass.raw[1] & 0x10) >> 1)
        | ((pass.raw[2] & 0x10) >> 2)
        | ((pass.raw[3] & 0x10) >> 3)
        | ((pass.raw[4] & 0x10) >> 4);

    if par != 0 && par != 0xf {
        return NONE;
    }

    if (par == 0) == (fwd != 0) {
        // reverse sampled digits
        pass.state |= STATE_REV;
        pass.raw.swap(1, 4);
        pass.raw.swap(2, 3);
    }

    if par == 0 {
        EAN8 | EAN_RIGHT
    } else {
        EAN8 | EAN_LEFT
    }
}

fn part_end5(ean: &EanDecoder, pass: &EanPass) -> i32 {
    if !ean.ean5_config.contains(Config::Enable) {
        return NONE;
    }

    let par = (pass.raw[1] & 0x10)
        | ((pass.raw[2] & 0x10) >> 1)
        | ((pass.raw[3] & 0x10) >> 2)
        | ((pass.raw[4] & 0x10) >> 3)
        | ((pass.raw[5] & 0x10) >> 4);

    let d = |i: usize| (pass.raw[i] & 0xf) as u32;
    let chk = ((d(1) + d(2) * 3 + d(3) + d(4) * 3 + d(5)) * 3 % 10) as u8;

    if parity_digit(par) != chk {
        return NONE;
    }
    EAN5
}

fn part_end7(ean: &EanDecoder, pass: &mut EanPass, fwd: u8) -> i32 {
    let r = |i: usize| pass.raw[i] & 0x10;
    let par = if fwd != 0 {
        (r(1) << 1) | r(2) | (r(3) >> 1) | (r(4) >> 2) | (r(5) >> 3) | (r(6) >> 4)
    } else {
        (r(1) >> 4) | (r(2) >> 3) | (r(3) >> 2) | (r(4) >> 1) | r(5) | (r(6) << 1)
    };

    pass.raw[0] = parity_digit(par);
    if pass.raw[0] == 0xf {
        return NONE;
    }

    if (par == 0) == (fwd != 0) {
        pass.state |= STATE_REV;
        for i in 1..4 {
            pass.raw.swap(i, 7 - i);
        }
    }

    if ean.ean13_config.contains(Config::Enable) {
        if par == 0 {
            return EAN13 | EAN_RIGHT;
        }
        if par & 0x20 != 0 {
            return EAN13 | EAN_LEFT;
        }
    }
    if par != 0 && par & 0x20 == 0 {
        return UPCE;
    }
    NONE
}

/// Verify the modulo-10 check digit at `buf[n]`
fn verify_checksum(ean: &EanDecoder, n: usize) -> bool {
    let mut chk: u8 = 0;
    for i in 0..n {
        let d = ean.buf[i] as u8;
        if d >= 10 {
            return false;
        }
        chk += d;
        if (i ^ n) & 1 != 0 {
            chk += d << 1;
            if chk >= 20 {
                chk -= 20;
            }
        }
        if chk >= 10 {
            chk -= 10;
        }
    }
    if chk != 0 {
        chk = 10 - chk;
    }
    let d = ean.buf[n] as u8;
    if chk != d {
        trace!(expected = chk, got = d, "ean: checksum mismatch");
        return false;
    }
    true
}

fn isbn10_check_digit(ean: &EanDecoder) -> u8 {
    let chk: u32 = (2..=10u32)
        .rev()
        .map(|w| ean.buf[13 - w as usize] as u32 * w)
        .sum::<u32>()
        % 11;
    match chk {
        0 => b'0',
        1 => b'X',
        c => (11 - c) as u8 + b'0',
    }
}

/// Expand a UPC-E payload to its UPC-A form for checksum verification
fn expand_upce(ean: &mut EanDecoder, pass: &EanPass) {
    let mut raw = pass.raw.iter().map(|r| (r & 0xf) as i8);
    let mut next = || raw.next().unwrap_or(0);

    // parity encoded digit is checksum
    ean.buf[12] = pass.raw[0] as i8;
    next();

    let decode = (pass.raw[6] & 0xf) as i8;
    ean.buf[0] = 0;
    ean.buf[1] = 0;
    ean.buf[2] = next();
    ean.buf[3] = next();
    ean.buf[4] = if decode < 3 { decode } else { next() };
    ean.buf[5] = if decode < 4 { 0 } else { next() };
    ean.buf[6] = if decode < 5 { 0 } else { next() };
    ean.buf[7] = 0;
    ean.buf[8] = 0;
    ean.buf[9] = if decode < 3 { next() } else { 0 };
    ean.buf[10] = if decode < 4 { next() } else { 0 };
    ean.buf[11] = if decode < 5 { next() } else { decode };
}

/// Merge a half-symbol into the holding buffer
fn integrate_partial(ean: &mut EanDecoder, pass: &EanPass, mut part: i32) -> i32 {
    // if same partial is not consistent, reset others
    if (ean.left != NONE && (part & SYMBOL_MASK) != ean.left)
        || (ean.right != NONE && (part & SYMBOL_MASK) != ean.right)
    {
        ean.clear_halves();
    }

    if (ean.left != NONE || ean.right != NONE) && !check_width(ean.width, pass.width) {
        trace!("ean: halves differ in width");
        ean.clear_halves();
    }

    if part & EAN_RIGHT != 0 {
        part &= SYMBOL_MASK;
        let mut j = (part - 1) as usize;
        for i in (1..=(part >> 1) as usize).rev() {
            let digit = (pass.raw[i] & 0xf) as i8;
            if ean.right != NONE && ean.buf[j] != digit {
                ean.clear_halves();
            }
            ean.buf[j] = digit;
            j = j.wrapping_sub(1);
        }
        ean.right = part;
        part &= ean.left;
    } else if part == EAN13 || part == EAN8 {
        let mut i = (part >> 1) as usize;
        for j in (0..=((part - 1) >> 1) as usize).rev() {
            let digit = (pass.raw[i] & 0xf) as i8;
            if ean.left != NONE && ean.buf[j] != digit {
                ean.clear_halves();
            }
            ean.buf[j] = digit;
            i = i.wrapping_sub(1);
        }
        ean.left = part;
        part &= ean.right;
    } else if part != UPCE {
        // add-ons
        for i in (1..=part as usize).rev() {
            ean.buf[i - 1] = (pass.raw[i] & 0xf) as i8;
        }
        ean.left = part;
    } else {
        expand_upce(ean, pass);
    }

    ean.width = pass.width;

    if part == NONE {
        part = PARTIAL;
    }

    if ((part == EAN13 || part == UPCE) && !verify_checksum(ean, 12))
        || (part == EAN8 && !verify_checksum(ean, 7))
    {
        if ean.right != NONE {
            ean.left = NONE;
        } else {
            ean.right = NONE;
        }
        part = NONE;
    }

    if part == EAN13 {
        // special case EAN-13 subsets
        if ean.buf[0] == 0 && ean.upca_config.contains(Config::Enable) {
            part = UPCA;
        } else if ean.buf[0] == 9 && ean.buf[1] == 7 {
            if ean.buf[2] == 8 && ean.isbn10_config.contains(Config::Enable) {
                part = ISBN10;
            } else if (ean.buf[2] == 8 || ean.buf[2] == 9)
                && ean.isbn13_config.contains(Config::Enable)
            {
                part = ISBN13;
            }
        }
    } else if part == UPCE {
        if ean.upce_config.contains(Config::Enable) {
            // report the compressed form
            ean.buf[0] = 0;
            ean.buf[1] = 0;
            for i in 2..8 {
                ean.buf[i] = (pass.raw[i - 1] & 0xf) as i8;
            }
            ean.buf[8] = (pass.raw[0] & 0xf) as i8;
        } else if ean.upca_config.contains(Config::Enable) {
            part = UPCA;
        } else if ean.ean13_config.contains(Config::Enable) {
            part = EAN13;
        } else {
            part = NONE;
        }
    }

    part
}

/// Copy the held digits to the decoder's result buffer
fn postprocess(dcode: &mut Decoder, sym: i32) {
    let ean = &dcode.ean;
    let mut out = [0u8; 18];
    let mut len = 0;

    if sym > PARTIAL {
        let mut i = match sym {
            UPCA | UPCE => 1,
            ISBN10 => 3,
            _ => 0,
        };
        let mut base = match sym {
            ISBN13 => EAN13,
            UPCE => UPCE - 1,
            s => s,
        };
        if sym == ISBN10 || (base > EAN5 && !ean.config(sym).contains(Config::EmitCheck)) {
            base -= 1;
        }

        while len < base as usize && i < ean.buf.len() && ean.buf[i] >= 0 {
            out[len] = ean.buf[i] as u8 + b'0';
            i += 1;
            len += 1;
        }

        if sym == ISBN10 && len == 9 && ean.isbn10_config.contains(Config::EmitCheck) {
            out[len] = isbn10_check_digit(ean);
            len += 1;
        }
    }

    let direction = 1 - 2 * ean.direction;
    if dcode.size_buf(len + 1) {
        dcode.buf_mut()[..len].copy_from_slice(&out[..len]);
        dcode.set_buffer_len(len);
    } else {
        dcode.set_buffer_len(0);
    }
    dcode.direction = direction;
    dcode.modifiers = Default::default();
}

/// Advance one pass by the current width
fn decode_pass(dcode: &mut Decoder, pass: &mut EanPass) -> i32 {
    pass.state = pass.state.wrapping_add(1);
    let mut idx = pass.state & STATE_IDX;
    let fwd = (pass.state & 1) as u8;

    if dcode.color() == Color::Space {
        if pass.state & STATE_ADDON != 0 {
            if idx == 0x09 || idx == 0x21 {
                let qz = dcode.get_width(0);
                let s = dcode.calc_s(1, 4);
                let part = if qz == 0 || qz >= s * 3 / 4 {
                    if idx == 0x09 {
                        part_end2(&dcode.ean, pass)
                    } else {
                        part_end5(&dcode.ean, pass)
                    }
                } else {
                    NONE
                };

                if part != NONE || idx == 0x21 {
                    dcode.ean.direction = 0;
                    pass.state = -1;
                    return part;
                }
            }
            if idx & 7 == 1 {
                pass.state = pass.state.wrapping_add(2);
                idx += 2;
            }
        } else if (idx == 0x10 || idx == 0x11)
            && dcode.ean.ean8_config.contains(Config::Enable)
            && aux_end(dcode, fwd) == 0
        {
            let part = part_end4(pass, fwd);
            if part != NONE {
                dcode.ean.direction = (pass.state & STATE_REV != 0) as i32;
            }
            pass.state = -1;
            return part;
        } else if idx == 0x18 || idx == 0x19 {
            let mut part = NONE;
            if aux_end(dcode, fwd) == 0 && pass.raw[5] != 0xff {
                part = part_end7(&dcode.ean, pass, fwd);
            }
            if part != NONE {
                dcode.ean.direction = (pass.state & STATE_REV != 0) as i32;
            }
            pass.state = -1;
            return part;
        }
    }

    if pass.state & STATE_ADDON != 0 {
        idx >>= 1;
    }

    if idx & 0x03 == 0 && idx <= 0x14 {
        let s4 = dcode.ean.s4;
        if s4 == 0 {
            return NONE;
        }

        let mut code = -1;
        let mut width_ok = true;

        // validate guard bars before decoding first char of symbol
        if pass.state == 0 {
            pass.state = aux_start(dcode);
            pass.width = s4;
            if pass.state < 0 {
                return NONE;
            }
            idx = pass.state & STATE_IDX;
        } else {
            width_ok = check_width(pass.width, s4);
            if width_ok {
                pass.width = (pass.width + s4 * 3) / 4;
            }
        }

        if width_ok {
            code = decode4(dcode);
        } else {
            trace!("ean: bad character width");
        }

        if (code < 0 && idx != 0x10)
            || (idx > 0 && pass.state & STATE_ADDON != 0 && aux_mid(dcode) != 0)
        {
            pass.state = -1;
        } else if code < 0 {
            pass.raw[5] = 0xff;
        } else {
            pass.raw[((idx >> 2) + 1) as usize] = DIGITS[code as usize];
        }
    }

    NONE
}

/// Feed the current width to the EAN/UPC passes
pub(crate) fn decode_ean(dcode: &mut Decoder) -> SymbolType {
    let mut sym = NONE;
    let pass_idx = (dcode.idx & 3) as usize;

    // update latest character width
    dcode.ean.s4 = dcode
        .ean
        .s4
        .wrapping_sub(dcode.get_width(4))
        .wrapping_add(dcode.get_width(0));

    for i in 0..4 {
        let mut pass = dcode.ean.pass[i];
        if pass.state < 0 && i != pass_idx {
            continue;
        }

        let part = decode_pass(dcode, &mut pass);
        dcode.ean.pass[i] = pass;
        if part == NONE {
            continue;
        }

        // update accumulated data from new partial decode
        sym = integrate_partial(&mut dcode.ean, &pass, part);
        if sym == NONE {
            continue;
        }

        // this pass valid => reset all passes
        for p in &mut dcode.ean.pass {
            p.state = -1;
        }
        if sym > PARTIAL {
            if dcode.acquire_lock(SymbolType::from(sym)) {
                postprocess(dcode, sym);
            } else {
                sym = PARTIAL;
            }
        }
    }

    SymbolType::from(sym)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::tests::feed;

    fn ean_only() -> Decoder {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        dcode
            .set_config(Some(SymbolType::Ean13), Config::Enable, 1)
            .unwrap();
        dcode
    }

    /// A decoder with only `syms` enabled
    fn enabled(syms: &[SymbolType]) -> Decoder {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        for &sym in syms {
            dcode.set_config(Some(sym), Config::Enable, 1).unwrap();
        }
        dcode
    }

    fn reversed(widths: &str) -> String {
        widths.chars().rev().collect()
    }

    const EAN13_WIDTHS: &str =
        "9 111 212241113121211311141132 11111 311213121312121332111132 111 9";
    const EAN8_WIDTHS: &str = "9 111 3112 1114 1411 1213 11111 1231 3211 1312 1132 111 9";
    const UPCE_WIDTHS: &str = "9 111 1222 2122 1411 2311 1321 1114 111111 9";
    const UPCA_WIDTHS: &str =
        "9 111 3211 2221 2122 1411 1132 1231 11111 3211 3211 3211 3211 1114 1231 111 9";
    // 978-0-306-40615-7
    const ISBN_WIDTHS: &str =
        "9 111 1312 3121 1123 1411 1123 1114 11111 1132 3211 1114 2221 1231 1312 111 9";
    const EAN5_WIDTHS: &str = "9 112 1321 11 2122 11 2311 11 3112 11 1231 9";
    const EAN2_WIDTHS: &str = "9 112 2221 11 2122 9";

    #[test]
    fn test_check_width_tolerance() {
        assert!(check_width(80, 80));
        assert!(check_width(80, 89));
        assert!(!check_width(80, 95));
        assert!(!check_width(80, 60));
    }

    #[test]
    fn test_parity_digit_lookup() {
        // AAAAAA is a leading zero
        assert_eq!(parity_digit(0x3f), 0);
        // ABABAB
        assert_eq!(parity_digit(0x2a), 7);
        // BBBBBB marks a right half
        assert_eq!(parity_digit(0), 0);
        assert_eq!(parity_digit(0x01), 0xf);
    }

    #[test]
    fn test_isbn10_check_digit() {
        let mut ean = EanDecoder::default();
        // 978-0-306-40615-?
        for (i, d) in [9, 7, 8, 0, 3, 0, 6, 4, 0, 6, 1, 5].iter().enumerate() {
            ean.buf[i] = *d;
        }
        assert_eq!(isbn10_check_digit(&ean), b'2');
    }

    #[test]
    fn test_verify_checksum_ean13() {
        let mut ean = EanDecoder::default();
        for (i, d) in [6, 2, 6, 8, 9, 6, 4, 9, 7, 7, 8, 0, 4].iter().enumerate() {
            ean.buf[i] = *d;
        }
        assert!(verify_checksum(&ean, 12));
        ean.buf[12] = 5;
        assert!(!verify_checksum(&ean, 12));
    }

    #[test]
    fn test_decode_ean13_reverse() {
        let mut dcode = ean_only();
        let reversed: String = EAN13_WIDTHS.chars().rev().collect();
        let results = feed(&mut dcode, &reversed);
        assert!(results.contains(&SymbolType::Ean13), "{results:?}");
        assert_eq!(dcode.data(), b"6268964977804");
        assert_eq!(dcode.direction(), -1);
    }

    #[test]
    fn test_decode_ean8() {
        let mut dcode = enabled(&[SymbolType::Ean13, SymbolType::Ean8]);
        let results = feed(&mut dcode, EAN8_WIDTHS);
        assert!(results.contains(&SymbolType::Ean8), "{results:?}");
        assert_eq!(dcode.data(), b"96385074");
        assert_eq!(dcode.direction(), 1);

        let results = feed(&mut dcode, &reversed(EAN8_WIDTHS));
        assert!(results.contains(&SymbolType::Ean8), "{results:?}");
        assert_eq!(dcode.data(), b"96385074");
        assert_eq!(dcode.direction(), -1);
    }

    #[test]
    fn test_upce_reporting() {
        // the same UPC-E symbol is reported as the most specific enabled type
        let cases = [
            (vec![SymbolType::Ean13], SymbolType::Ean13, "0012345000065"),
            (
                vec![SymbolType::Ean13, SymbolType::Upca],
                SymbolType::Upca,
                "012345000065",
            ),
            (
                vec![SymbolType::Ean13, SymbolType::Upce],
                SymbolType::Upce,
                "01234565",
            ),
        ];
        for (syms, expected, data) in cases {
            for widths in [UPCE_WIDTHS.to_string(), reversed(UPCE_WIDTHS)] {
                let mut dcode = enabled(&syms);
                let results = feed(&mut dcode, &widths);
                assert!(results.contains(&expected), "{syms:?}: {results:?}");
                assert_eq!(dcode.data_string(), Some(data), "{syms:?}");
            }
        }
    }

    #[test]
    fn test_decode_upca() {
        let mut dcode = enabled(&[SymbolType::Ean13, SymbolType::Upca]);
        let results = feed(&mut dcode, UPCA_WIDTHS);
        assert!(results.contains(&SymbolType::Upca), "{results:?}");
        assert_eq!(dcode.data_string(), Some("012345000065"));

        // without upca the leading zero stays
        let mut dcode = ean_only();
        let results = feed(&mut dcode, UPCA_WIDTHS);
        assert!(results.contains(&SymbolType::Ean13), "{results:?}");
        assert_eq!(dcode.data_string(), Some("0012345000065"));
    }

    #[test]
    fn test_isbn_variants() {
        let mut dcode = ean_only();
        let results = feed(&mut dcode, ISBN_WIDTHS);
        assert!(results.contains(&SymbolType::Ean13), "{results:?}");
        assert_eq!(dcode.data_string(), Some("9780306406157"));

        let mut dcode = enabled(&[SymbolType::Ean13, SymbolType::Isbn10]);
        let results = feed(&mut dcode, ISBN_WIDTHS);
        assert!(results.contains(&SymbolType::Isbn10), "{results:?}");
        assert_eq!(dcode.data_string(), Some("0306406152"));

        let mut dcode = enabled(&[SymbolType::Ean13, SymbolType::Isbn13]);
        let results = feed(&mut dcode, ISBN_WIDTHS);
        assert!(results.contains(&SymbolType::Isbn13), "{results:?}");
        assert_eq!(dcode.data_string(), Some("9780306406157"));
    }

    #[test]
    fn test_addons() {
        let mut dcode = enabled(&[SymbolType::Ean5]);
        let results = feed(&mut dcode, EAN5_WIDTHS);
        assert!(results.contains(&SymbolType::Ean5), "{results:?}");
        assert_eq!(dcode.data_string(), Some("52495"));
        assert_eq!(dcode.direction(), 1);

        let mut dcode = enabled(&[SymbolType::Ean2]);
        let results = feed(&mut dcode, EAN2_WIDTHS);
        assert!(results.contains(&SymbolType::Ean2), "{results:?}");
        assert_eq!(dcode.data_string(), Some("12"));
    }

    #[test]
    fn test_addons_off_by_default() {
        let mut dcode = Decoder::new();
        let results = feed(&mut dcode, EAN5_WIDTHS);
        assert!(!results.contains(&SymbolType::Ean5), "{results:?}");
    }

    #[test]
    fn test_reverse_addon_not_recognized() {
        let mut dcode = enabled(&[SymbolType::Ean5]);
        let results = feed(&mut dcode, &reversed(EAN5_WIDTHS));
        assert!(!results.contains(&SymbolType::Ean5), "{results:?}");

        let mut dcode = enabled(&[SymbolType::Ean2]);
        let results = feed(&mut dcode, &reversed(EAN2_WIDTHS));
        assert!(!results.contains(&SymbolType::Ean2), "{results:?}");
    }

    #[test]
    fn test_emit_check_disabled() {
        let mut dcode = ean_only();
        dcode
            .set_config(Some(SymbolType::Ean13), Config::EmitCheck, 0)
            .unwrap();
        feed(&mut dcode, EAN13_WIDTHS);
        assert_eq!(dcode.data(), b"626896497780");
    }

    #[test]
    fn test_new_scan_drops_passes() {
        let mut ean = EanDecoder::default();
        ean.pass[2].state = 5;
        ean.s4 = 40;
        ean.left = EAN13;
        ean.new_scan();
        assert!(ean.pass.iter().all(|p| p.state == -1));
        assert_eq!(ean.s4, 0);
        assert_eq!(ean.left, EAN13);
        ean.reset();
        assert_eq!(ean.left, NONE);
    }
}
