//! GS1 DataBar (RSS-14) and DataBar Expanded decoder
//!
//! DataBar characters are located relative to finder patterns. Every finder
//! found in the width stream yields up to two half-character *segments*
//! which are kept across scan lines; a symbol is reported once a consistent
//! set of segments with a valid checksum has been collected.

use crate::{
    config::Config,
    decoder::decode_e,
    symbol::{Configs, Modifier},
    Decoder, SymbolType,
};
use std::num::Wrapping;
use tracing::trace;

const MAX_SEGMENTS: usize = 32;
const INITIAL_SEGMENTS: usize = 4;
/// Longest DataBar Expanded symbol, in characters
const MAX_EXP_CHARS: usize = 22;
const GS: u8 = 0x1d;

static FINDER_HASH: [i8; 0x20] = [
    0x16, 0x1f, 0x02, 0x00, 0x03, 0x00, 0x06, 0x0b, 0x1f, 0x0e, 0x17, 0x0c, 0x0b, 0x14, 0x11, 0x0c,
    0x1f, 0x03, 0x13, 0x08, 0x00, 0x0a, -1, 0x16, 0x0c, 0x09, -1, 0x1a, 0x1f, 0x1c, 0x00, -1,
];

/// Finder sequences of DataBar Expanded, two finders per byte
static EXP_SEQUENCES: [u8; 30] = [
    0x01, 0x23, 0x25, 0x07, 0x29, 0x47, 0x29, 0x67, 0x0b, 0x29, 0x87, 0xab, 0x21, 0x43, 0x65, 0x07,
    0x21, 0x43, 0x65, 0x89, 0x21, 0x43, 0x65, 0xa9, 0x0b, 0x21, 0x43, 0x67, 0x89, 0xab,
];

static EXP_CHECKSUMS: [u32; 12] = [1, 189, 62, 113, 46, 43, 109, 134, 6, 79, 161, 45];

/// Character group: value offset, widest odd element and odd/even
/// combination counts
struct Group {
    sum: u16,
    wmax: u8,
    todd: u8,
    teven: u8,
}

const fn group(sum: u16, wmax: u8, todd: u8, teven: u8) -> Group {
    Group {
        sum,
        wmax,
        todd,
        teven,
    }
}

static GROUPS: [Group; 14] = [
    // (17,4) expanded
    group(0, 7, 87, 4),
    group(348, 5, 52, 20),
    group(1388, 4, 30, 52),
    group(2948, 3, 10, 104),
    group(3988, 1, 1, 204),
    // (16,4) outer
    group(0, 8, 161, 1),
    group(161, 6, 80, 10),
    group(961, 4, 31, 34),
    group(2015, 3, 10, 70),
    group(2715, 1, 1, 126),
    // (15,4) inner
    group(1516, 8, 81, 1),
    group(1036, 6, 48, 10),
    group(336, 4, 20, 35),
    group(0, 2, 4, 84),
];

/// One decoded half-character next to a finder pattern
#[derive(Debug, Clone, Copy)]
struct Segment {
    /// finder pattern index, -1 when the slot is free
    finder: i8,
    exp: bool,
    color: u8,
    side: u8,
    partial: bool,
    count: u8,
    epoch: u8,
    check: u8,
    data: u16,
    width: u32,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            finder: -1,
            exp: false,
            color: 0,
            side: 0,
            partial: false,
            count: 0,
            epoch: 0,
            check: 0,
            data: 0,
            width: 0,
        }
    }
}

impl Segment {
    /// Position of this segment within an expanded finder sequence
    fn index(&self) -> i32 {
        ((self.finder as i32) << 2) | ((self.color as i32) << 1) | ((self.color ^ self.side) as i32)
    }

    fn usable(&self) -> bool {
        !self.partial || self.count >= 4
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DatabarDecoder {
    segs: Vec<Segment>,
    /// segments waiting for their outer character, by width index
    chars: [i8; 16],
    epoch: u8,

    pub(crate) config: Configs,
    pub(crate) config_exp: Configs,
}

impl Default for DatabarDecoder {
    fn default() -> Self {
        Self {
            segs: vec![Segment::default(); INITIAL_SEGMENTS],
            chars: [-1; 16],
            epoch: 0,
            config: Configs::empty(),
            config_exp: Configs::empty(),
        }
    }
}

impl DatabarDecoder {
    /// Drop half-decoded characters; complete segments stay for matching
    /// against later scan lines
    pub(crate) fn new_scan(&mut self) {
        for c in self.chars.iter_mut() {
            if *c >= 0 {
                let seg = &mut self.segs[*c as usize];
                if seg.partial {
                    seg.finder = -1;
                }
            }
            *c = -1;
        }
    }

    pub(crate) fn reset(&mut self) {
        self.new_scan();
        for seg in self.segs.iter_mut() {
            seg.finder = -1;
        }
    }

    fn age(&self, seg: &Segment) -> u32 {
        self.epoch.wrapping_sub(seg.epoch) as u32
    }

    /// Pick a free slot, growing the table or evicting the stalest segment
    fn alloc_segment(&mut self) -> usize {
        let mut maxage = 0;
        let mut old = 0;
        for i in 0..self.segs.len() {
            let seg = self.segs[i];
            if seg.finder < 0 {
                return i;
            }
            let age = self.age(&seg);
            if age >= 128 && seg.count < 2 {
                self.segs[i].finder = -1;
                return i;
            }
            let age = if age > seg.count as u32 {
                age - seg.count as u32 + 1
            } else {
                1
            };
            if maxage < age {
                maxage = age;
                old = i;
            }
        }

        let csegs = self.segs.len();
        if csegs < MAX_SEGMENTS {
            self.segs
                .resize((csegs * 2).min(MAX_SEGMENTS), Segment::default());
            return csegs;
        }

        self.segs[old].finder = -1;
        old
    }

    /// Fold duplicates of `iseg` into it and expire stale segments
    fn merge_segment(&mut self, iseg: usize) {
        let mut seg = self.segs[iseg];
        for i in 0..self.segs.len() {
            if i == iseg {
                continue;
            }
            let s = self.segs[i];
            if s.finder == seg.finder
                && s.exp == seg.exp
                && s.color == seg.color
                && s.side == seg.side
                && s.data == seg.data
                && s.check == seg.check
                && check_width(seg.width, s.width, 14)
            {
                seg.count = if s.count < 0x7f { s.count + 1 } else { s.count };
                seg.partial &= s.partial;
                seg.width = (3 * seg.width + s.width + 2) / 4;
                self.segs[i].finder = -1;
            } else if s.finder >= 0 {
                let age = self.age(&s);
                if age >= 248 || (age >= 128 && s.count < 2) {
                    self.segs[i].finder = -1;
                }
            }
        }
        self.segs[iseg] = seg;
    }
}

/// `wd` matches `wf` to within 3/14 for a character of `n` modules
#[inline]
fn check_width(wf: u32, wd: u32, n: u32) -> bool {
    let dwf = wf.wrapping_mul(3);
    let wd = wd.wrapping_mul(14);
    let wf = wf.wrapping_mul(n);
    wf.wrapping_sub(dwf) <= wd && wd <= wf.wrapping_add(dwf)
}

/// Weighted checksum contribution of one character
fn calc_check(mut sig0: u32, mut sig1: u32, side: bool, modulo: u32) -> u32 {
    let mut chk = 0;
    for i in (0..4).rev() {
        chk = (chk * 3 + (sig1 & 0xf) + 1) * 3 + (sig0 & 0xf) + 1;
        sig1 >>= 4;
        sig0 >>= 4;
        if i & 1 == 0 {
            chk %= modulo;
        }
    }
    if side {
        chk = (chk * (6561 % modulo)) % modulo;
    }
    chk
}

/// Rank of a 4-element width signature among all combinations of `n`
/// modules with at most `wmax` per element
///
/// Returns `None` for signatures that are not valid characters.
fn calc_value4(sig: u32, n: u32, wmax: u32, nonarrow: bool) -> Option<u32> {
    let one = Wrapping(1u32);
    let two = Wrapping(2u32);
    let three = Wrapping(3u32);
    let wmax = Wrapping(wmax);
    let mut nonarrow = nonarrow;
    let mut v = Wrapping(0u32);
    let mut n = Wrapping(n) - one;

    let w0 = Wrapping((sig >> 12) & 0xf);
    if w0 > one {
        if w0 > wmax {
            return None;
        }
        let n0 = n - w0;
        let sk20 = (n - one) * n * (two * n - one);
        let sk21 = n0 * (n0 + one) * (two * n0 + one);
        v = sk20 - sk21 - three * (w0 - one) * (two * n - w0);

        if !nonarrow && w0 > two && n > Wrapping(4) {
            let mut k = (n - two) * (n - one) * (two * n - three) - sk21;
            k -= three * (w0 - two) * (Wrapping(14) * n - Wrapping(7) * w0 - Wrapping(31));
            v -= k;
        }

        if n - two > wmax {
            let wm20 = two * wmax * (wmax + one);
            let wm21 = two * wmax + one;
            let mut k = sk20;
            if n0 > wmax {
                k -= sk21;
                k += three * (w0 - one) * (wm20 - wm21 * (two * n - w0));
            } else {
                k -= (wmax + one) * (wmax + two) * (two * wmax + three);
                k += three * (n - wmax - two) * (wm20 - wm21 * (n + wmax + one));
            }
            v -= k * three;
        }
        v /= Wrapping(12);
    } else {
        nonarrow = true;
    }
    n -= w0;

    let w1 = Wrapping((sig >> 8) & 0xf);
    if w1 > one {
        if w1 > wmax {
            return None;
        }
        v += (two * n - w1) * (w1 - one) / two;
        if !nonarrow && w1 > two && n > three {
            v -= (two * n - w1 - Wrapping(5)) * (w1 - two) / two;
        }
        if n - one > wmax {
            if n - w1 > wmax {
                v -= (w1 - one) * (two * n - w1 - two * wmax);
            } else {
                v -= (n - wmax) * (n - wmax - one);
            }
        }
    } else {
        nonarrow = true;
    }
    n -= w1;

    let w2 = Wrapping((sig >> 4) & 0xf);
    if w2 > one {
        if w2 > wmax {
            return None;
        }
        v += w2 - one;
        if !nonarrow && w2 > two && n > two {
            v -= n - two;
        }
        if n > wmax {
            v -= n - wmax;
        }
    } else {
        nonarrow = true;
    }

    let w3 = Wrapping(sig & 0xf);
    if w3 == one {
        nonarrow = true;
    } else if w3 > wmax {
        return None;
    }

    nonarrow.then_some(v.0)
}

/// GTIN-14 check digit over 13 ASCII digits
fn gtin_check(digits: &[u8]) -> u8 {
    let chk = digits.iter().enumerate().fold(0u32, |chk, (i, &d)| {
        let d = (d - b'0') as u32;
        chk + if i & 1 == 0 { d * 3 } else { d }
    }) % 10;
    b'0' + if chk != 0 { 10 - chk as u8 } else { 0 }
}

/// Append `n` as exactly `width` decimal digits
fn push_decimal(out: &mut Vec<u8>, mut n: u32, width: usize) {
    let start = out.len();
    out.resize(start + width, b'0');
    for slot in out[start..].iter_mut().rev() {
        *slot = b'0' + (n % 10) as u8;
        n /= 10;
    }
}

/// Convert the four RSS-14 character values to the `01` GTIN element string
fn postprocess(d: [u32; 4], emit_check: bool) -> Vec<u8> {
    let mut d = d.map(u64::from);
    let mut digits = [0u8; 13];
    let mut pos = digits.len();
    let mut chk = 0;

    let mut emit = |r: &mut u64, count: usize, odd_weight: usize, digits: &mut [u8; 13]| {
        for i in (0..count).rev() {
            let c = (*r % 10) as u32;
            chk += c;
            if i & 1 == odd_weight {
                chk += c << 1;
            }
            pos -= 1;
            digits[pos] = b'0' + c as u8;
            if i != 0 {
                *r /= 10;
            }
        }
    };

    // mixed base {1597, 2841} to base 10000
    let mut r = d[0] * 1597 + d[1];
    d[1] = r / 10000;
    r %= 10000;
    r = r * 2841 + d[2];
    d[2] = r / 10000;
    r %= 10000;
    r = r * 1597 + d[3];
    d[3] = r / 10000;
    emit(&mut r, 4, 1, &mut digits);

    r = d[1] * 2841 + d[2];
    d[2] = r / 10000;
    r %= 10000;
    r = r * 1597 + d[3];
    d[3] = r / 10000;
    emit(&mut r, 4, 1, &mut digits);

    r = d[2] * 1597 + d[3];
    emit(&mut r, 5, 0, &mut digits);

    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(b"01");
    out.extend_from_slice(&digits);
    if emit_check {
        chk %= 10;
        if chk != 0 {
            chk = 10 - chk;
        }
        out.push(b'0' + chk as u8);
    }
    out
}

/// 12-bit symbol characters viewed as one continuous bit stream
struct BitReader<'a> {
    rest: &'a [u16],
    bits: u64,
    /// bits in `bits` not yet consumed; negative once exhausted
    avail: i32,
}

impl BitReader<'_> {
    /// Pull characters until at least `required` bits are available
    fn feed(&mut self, required: i32) {
        while self.avail < required {
            let Some((&next, rest)) = self.rest.split_first() else {
                break;
            };
            self.bits = (self.bits << 12) | (next & 0xfff) as u64;
            self.avail += 12;
            self.rest = rest;
        }
    }

    /// Consume `n` bits
    fn advance(&mut self, n: i32) -> Option<()> {
        self.avail -= n;
        (self.avail >= 0).then_some(())
    }

    /// The `width` bits ending at the current position
    fn peek(&self, width: u32) -> u32 {
        ((self.bits >> self.avail) & ((1 << width) - 1)) as u32
    }

    fn take(&mut self, n: i32) -> Option<u32> {
        self.advance(n)?;
        Some(self.peek(n as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scheme {
    Numeric,
    Alnum,
    Iso646,
}

/// Decode a DataBar Expanded character sequence to a GS1 element string
///
/// `data[0]` is the check character, whose value also encodes the symbol
/// length.
fn postprocess_exp(data: &[u16]) -> Option<Vec<u8>> {
    let (&first, rest) = data.split_first()?;
    let (&head, rest) = rest.split_first()?;
    let len = first as usize / 211 + 4;

    // encodation method
    let n = (head >> 4) & 0x7f;
    let (avail, enc) = if n >= 0x40 {
        (10, 1)
    } else if n >= 0x38 {
        (4, 6 + (n & 7))
    } else if n >= 0x30 {
        (6, 2 + ((n >> 2) & 1))
    } else if n >= 0x20 {
        (7, 4 + ((n >> 3) & 1))
    } else {
        (9, 0)
    };
    let mut rd = BitReader {
        rest,
        bits: head as u64,
        avail,
    };

    if enc < 4 {
        // variable length field: parity and size group
        let parity = rd.take(1)?;
        if (len as u32 ^ parity) & 1 != 0 {
            return None;
        }
        let large = rd.take(1)?;
        if large != (len > 14) as u32 {
            return None;
        }
    }

    let mut out = Vec::with_capacity(48);
    if enc != 0 {
        out.extend_from_slice(b"01");
        if enc == 1 {
            let digit = rd.take(4)?;
            if digit > 9 {
                return None;
            }
            out.push(b'0' + digit as u8);
        } else {
            out.push(b'9');
        }
        for _ in 0..4 {
            rd.feed(10);
            let n = rd.take(10)?;
            if n >= 1000 {
                return None;
            }
            push_decimal(&mut out, n, 3);
        }
        let chk = gtin_check(&out[out.len() - 13..]);
        out.push(chk);
    }

    match enc {
        2 => {
            rd.feed(2);
            let n = rd.take(2)?;
            out.extend_from_slice(b"392");
            out.push(b'0' + n as u8);
        }
        3 => {
            rd.feed(12);
            let n = rd.take(2)?;
            out.extend_from_slice(b"393");
            out.push(b'0' + n as u8);
            let n = rd.take(10)?;
            if n >= 1000 {
                return None;
            }
            push_decimal(&mut out, n, 3);
        }
        4 => {
            rd.feed(15);
            let n = rd.take(15)?;
            out.extend_from_slice(b"3103");
            push_decimal(&mut out, n, 6);
        }
        5 => {
            rd.feed(15);
            let n = rd.take(15)?;
            out.extend_from_slice(if n >= 10000 { b"3203" } else { b"3202" });
            push_decimal(&mut out, if n >= 10000 { n - 10000 } else { n }, 6);
        }
        6.. => {
            // weight with decimal point position, then optional date
            rd.feed(20);
            let n = rd.take(20)?;
            if n >= 1_000_000 {
                return None;
            }
            out.extend_from_slice(if enc & 1 != 0 { b"320" } else { b"310" });
            out.push(b'0' + (n / 100_000) as u8);
            push_decimal(&mut out, n % 100_000, 6);

            rd.feed(16);
            let n = rd.take(16)?;
            if n > 38400 {
                return None;
            }
            if n < 38400 {
                let day = n % 32;
                let month = (n / 32) % 12 + 1;
                let year = n / 32 / 12;
                out.push(b'1');
                out.push(b'0' + ((enc - 6) | 1) as u8);
                push_decimal(&mut out, year, 2);
                push_decimal(&mut out, month, 2);
                push_decimal(&mut out, day, 2);
            }
        }
        _ => {}
    }

    if enc < 4 {
        decode_general(&mut rd, &mut out)?;
    }

    if out.last() == Some(&GS) {
        out.pop();
    }
    Some(out)
}

/// General purpose data field: numeric, alphanumeric and ISO 646 runs
fn decode_general(rd: &mut BitReader<'_>, out: &mut Vec<u8>) -> Option<()> {
    let mut scheme = Scheme::Numeric;
    while rd.avail > 0 || !rd.rest.is_empty() {
        rd.feed(8);

        if scheme == Scheme::Numeric {
            if rd.advance(4).is_none() {
                break;
            }
            if rd.peek(4) == 0 {
                scheme = Scheme::Alnum;
                continue;
            }
            if rd.rest.is_empty() && rd.avail < 3 {
                // lone final digit
                let digit = rd.peek(4) - 1;
                if digit > 9 {
                    return None;
                }
                out.push(b'0' + digit as u8);
                break;
            }
            if rd.advance(3).is_none() {
                break;
            }
            let v = rd.peek(7) - 8;
            for d in [v / 11, v % 11] {
                out.push(if d < 10 { b'0' + d as u8 } else { GS });
            }
            continue;
        }

        if rd.advance(3).is_none() {
            break;
        }
        if rd.peek(3) == 0 {
            scheme = Scheme::Numeric;
            continue;
        }
        if rd.advance(2).is_none() {
            break;
        }
        let v = rd.peek(5);
        let c = match v {
            0x04 => {
                scheme = if scheme == Scheme::Alnum {
                    Scheme::Iso646
                } else {
                    Scheme::Alnum
                };
                continue;
            }
            0x0f => GS,
            0x00..=0x0e => 43 + v as u8,
            _ if scheme == Scheme::Alnum => {
                rd.advance(1)?;
                match rd.peek(5) {
                    v @ 0x00..=0x19 => b'A' + v as u8,
                    0x1a => b'*',
                    v @ 0x1b..=0x1e => b',' + (v - 0x1b) as u8,
                    _ => return None,
                }
            }
            0x10..=0x1c => {
                rd.advance(2)?;
                match rd.peek(6) {
                    v @ 0x00..=0x19 => b'A' + v as u8,
                    v @ 0x1a..=0x33 => b'a' + (v - 0x1a) as u8,
                    _ => return None,
                }
            }
            _ => {
                rd.advance(3)?;
                match rd.peek(5) {
                    v @ 0x08..=0x09 => b'!' + (v - 8) as u8,
                    v @ 0x0a..=0x14 => b'%' + (v - 0x0a) as u8,
                    v @ 0x15..=0x1a => b':' + (v - 0x15) as u8,
                    0x1b => b'_',
                    0x1c => b' ',
                    _ => return None,
                }
            }
        };
        out.push(c);
    }
    Some(())
}

/// Expected finder sequence for an expanded symbol whose first character
/// is `seg`
///
/// Returns false when the sequence does not contain the finder of the
/// segment being matched, or is longer than any valid symbol.
fn lookup_sequence(seg: &Segment, fixed: i32, seq: &mut [i32; MAX_EXP_CHARS + 1]) -> bool {
    let n = seg.data as usize / 211;
    let start = ((n + 1) / 2 + 1).pow(2) / 4;
    let n = n + 4;
    if n > MAX_EXP_CHARS {
        return false;
    }

    let mut fixed = fixed >> 1;
    seq[0] = 0;
    seq[1] = 1;
    let mut p = start;
    let mut i = 2;
    while i < n {
        let Some(&byte) = EXP_SEQUENCES.get(p) else {
            return false;
        };
        let s = if i & 2 == 0 {
            p += 1;
            (byte >> 4) as i32
        } else {
            (byte & 0xf) as i32
        };
        if s == fixed {
            fixed = -1;
        }
        seq[i] = s << 1;
        seq[i + 1] = (s << 1) + 1;
        i += 2;
    }
    seq[n] = -1;
    fixed < 1
}

/// Search the segment table for a complete expanded symbol containing
/// segment `ifixed`
fn match_segment_exp(dcode: &mut Decoder, ifixed: usize, dir: i32) -> SymbolType {
    let db = &dcode.databar;
    let csegs = db.segs.len();
    let fixed = db.segs[ifixed].index();
    let iseg: Vec<i32> = db
        .segs
        .iter()
        .map(|s| {
            if s.exp && s.finder >= 0 && s.usable() {
                s.index()
            } else {
                -1
            }
        })
        .collect();

    let mut seq = [-1i32; MAX_EXP_CHARS + 1];
    let mut segs = [-1i32; MAX_EXP_CHARS + 1];
    let mut width = [0u32; MAX_EXP_CHARS + 1];
    let mut best: Option<Vec<usize>> = None;
    let mut maxcnt = 0;
    let mut maxage = 0x7fff;
    seq[0] = 0;
    width[0] = db.segs[ifixed].width;

    // depth first search over candidate segments for each sequence slot
    let mut i: isize = 0;
    loop {
        while i >= 0 && seq[i as usize] >= 0 {
            let k = i as usize;
            let found = if seq[k] == fixed {
                (segs[k] < 0 && check_width(width[k], db.segs[ifixed].width, 14))
                    .then_some(ifixed)
            } else {
                ((segs[k] + 1) as usize..csegs).find(|&j| {
                    iseg[j] == seq[k] && (k == 0 || check_width(width[k], db.segs[j].width, 14))
                })
            };
            let Some(j) = found else {
                i -= 1;
                continue;
            };
            let seg = &db.segs[j];
            if k == 0 {
                if !lookup_sequence(seg, fixed, &mut seq) {
                    i -= 1;
                    continue;
                }
                width[1] = seg.width;
            } else {
                width[k + 1] = (width[k] + seg.width) / 2;
            }
            segs[k] = j as i32;
            segs[k + 1] = -1;
            i += 1;
        }
        if i < 0 {
            break;
        }

        let chosen: Vec<usize> = segs[..i as usize].iter().map(|&j| j as usize).collect();
        let head = &db.segs[chosen[0]];
        let mut age = db.age(head);
        let mut cnt = 0;
        let mut chk = 0;
        for &j in &chosen[1..] {
            let seg = &db.segs[j];
            chk += seg.check as u32;
            cnt += seg.count as u32;
            age += db.age(seg);
        }

        i -= 1;
        if chk % 211 != head.data as u32 % 211 {
            continue;
        }
        if maxcnt > cnt || (maxcnt == cnt && maxage <= age) {
            continue;
        }
        maxcnt = cnt;
        maxage = age;
        best = Some(chosen);
    }

    let Some(best) = best else {
        return SymbolType::Partial;
    };

    if !dcode.acquire_lock(SymbolType::DatabarExp) {
        return SymbolType::Partial;
    }

    let data: Vec<u16> = best.iter().map(|&j| dcode.databar.segs[j].data).collect();
    let Some(text) = postprocess_exp(&data).filter(|text| dcode.size_buf(text.len() + 1)) else {
        trace!(chars = data.len(), "databar: invalid expanded data");
        dcode.release_lock(SymbolType::DatabarExp);
        return SymbolType::Partial;
    };
    dcode.buf_mut()[..text.len()].copy_from_slice(&text);
    dcode.set_buffer_len(text.len());

    for &j in &best {
        let seg = &mut dcode.databar.segs[j];
        if j != ifixed && seg.count > 0 {
            seg.count -= 1;
            if seg.count == 0 {
                seg.finder = -1;
            }
        }
    }

    // stacked rows are often read in opposite directions
    let last = dcode.databar.segs[best[best.len() - 1]];
    dcode.direction = (1 - 2 * (last.side ^ last.color) as i32) * dir;
    dcode.modifiers = Modifier::Gs1.into();
    SymbolType::DatabarExp
}

/// Pair segment `iseg` with three others into a complete RSS-14 symbol
fn match_segment(dcode: &mut Decoder, iseg: usize) -> SymbolType {
    let db = &mut dcode.databar;
    let seg = db.segs[iseg];
    if !seg.usable() {
        return SymbolType::Partial;
    }

    let csegs = db.segs.len();
    let mut maxage = 0xfff;
    let mut maxcnt = 0;
    let mut smax = None;

    for i0 in 0..csegs {
        let s0 = &db.segs[i0];
        if i0 == iseg
            || s0.finder != seg.finder
            || s0.exp
            || s0.color != seg.color
            || s0.side == seg.side
            || !s0.usable()
            || !check_width(seg.width, s0.width, 14)
        {
            continue;
        }

        for i1 in 0..csegs {
            let s1 = &db.segs[i1];
            if i1 == i0
                || s1.finder < 0
                || s1.exp
                || s1.color == seg.color
                || !s1.usable()
                || !check_width(seg.width, s1.width, 14)
            {
                continue;
            }

            // checksum from the finder pair
            let mut chkf = if seg.color != 0 {
                seg.finder as u32 + s1.finder as u32 * 9
            } else {
                s1.finder as u32 + seg.finder as u32 * 9
            };
            if chkf > 72 {
                chkf -= 1;
            }
            if chkf > 8 {
                chkf -= 1;
            }
            let chks = (seg.check as u32 + s0.check as u32 + s1.check as u32) % 79;
            let chk = if chkf >= chks {
                chkf - chks
            } else {
                79 + chkf - chks
            };
            let age1 = db.age(s0) + db.age(s1);

            for i2 in i1 + 1..csegs {
                let s2 = &db.segs[i2];
                if i2 == i0
                    || s2.finder != s1.finder
                    || s2.exp
                    || s2.color != s1.color
                    || s2.side == s1.side
                    || s2.check as u32 != chk
                    || !s2.usable()
                    || !check_width(seg.width, s2.width, 14)
                {
                    continue;
                }
                let age = age1 + db.age(s2);
                let cnt = s0.count as u32 + s1.count as u32 + s2.count as u32;
                if maxcnt < cnt || (maxcnt == cnt && maxage > age) {
                    maxcnt = cnt;
                    maxage = age;
                    smax = Some([i0, i1, i2]);
                }
            }
        }
    }

    let Some(smax) = smax else {
        return SymbolType::Partial;
    };

    let mut d = [0u32; 4];
    d[((seg.color << 1) | seg.side) as usize] = seg.data as u32;
    for i in smax {
        let s = &mut db.segs[i];
        d[((s.color << 1) | s.side) as usize] = s.data as u32;
        s.count -= 1;
        if s.count == 0 {
            s.finder = -1;
        }
    }
    db.segs[iseg].finder = -1;

    if !dcode.acquire_lock(SymbolType::Databar) {
        return SymbolType::Partial;
    }

    let text = postprocess(d, dcode.databar.config.contains(Config::EmitCheck));
    dcode.buf_mut()[..text.len()].copy_from_slice(&text);
    dcode.set_buffer_len(text.len());
    dcode.modifiers = Modifier::Gs1.into();
    dcode.direction = 1 - 2 * (seg.side ^ seg.color ^ 1) as i32;
    SymbolType::Databar
}

/// Decode the half-character of segment `iseg` starting at width `off`,
/// reading towards `dir`
fn decode_char(dcode: &mut Decoder, iseg: usize, mut off: u8, dir: i32) -> SymbolType {
    let seg = dcode.databar.segs[iseg];
    let s = dcode.calc_s(if dir > 0 { off } else { off.wrapping_sub(6) }, 8);
    let n: u32 = if seg.exp {
        17
    } else if seg.side != 0 {
        15
    } else {
        16
    };
    if s < 13 || !check_width(seg.width, s, n) {
        return SymbolType::None;
    }

    // pair widths to element widths, with the narrowest of each parity
    let mut emin = [0i32, -(n as i32)];
    let mut sum = 0i32;
    let mut sig0 = 0u32;
    let mut sig1 = 0u32;
    for i in (0..4).rev() {
        let e = decode_e(dcode.pair_width(off), s, n);
        if e < 0 {
            return SymbolType::None;
        }
        sum = e - sum;
        off = off.wrapping_add_signed(dir as i8);
        sig1 = (sig1 << 4).wrapping_add(sum as u32);
        emin[1] = emin[1].max(-sum);
        if i == 0 {
            break;
        }

        let e = decode_e(dcode.pair_width(off), s, n);
        if e < 0 {
            return SymbolType::None;
        }
        sum = e - sum;
        off = off.wrapping_add_signed(dir as i8);
        sig0 = (sig0 << 4).wrapping_add(sum as u32);
        emin[0] = emin[0].min(sum);
    }

    let mut diff = emin[(!n & 1) as usize] as u32;
    diff = diff.wrapping_add(diff << 4);
    diff = diff.wrapping_add(diff << 8);
    let sig0 = sig0.wrapping_sub(diff);
    let sig1 = sig1.wrapping_add(diff);

    let mut sum0 = sig0.wrapping_add(sig0 >> 8);
    let mut sum1 = sig1.wrapping_add(sig1 >> 8);
    sum0 = sum0.wrapping_add(sum0 >> 4) & 0xf;
    sum1 = sum1.wrapping_add(sum1 >> 4) & 0xf;

    if sum0 + sum1 + 8 != n {
        trace!(sum0, sum1, n, "databar: bad element sum");
        return SymbolType::None;
    }
    if ((sum0 ^ (n >> 1)) | (sum1 ^ (n >> 1) ^ n)) & 1 != 0 {
        trace!(sum0, sum1, n, "databar: bad parity");
        return SymbolType::None;
    }

    let Some(g) = GROUPS.get((((n & 3) ^ 1) * 5 + (sum1 >> 1)) as usize) else {
        return SymbolType::None;
    };

    let wmax = g.wmax as u32;
    let Some(vodd) = calc_value4(sig0.wrapping_add(0x1111), sum0 + 4, wmax, n & 1 == 0)
        .filter(|&v| v <= g.todd as u32)
    else {
        return SymbolType::None;
    };
    let Some(veven) = calc_value4(sig1.wrapping_add(0x1111), sum1 + 4, 9 - wmax, n & 1 != 0)
        .filter(|&v| v <= g.teven as u32)
    else {
        return SymbolType::None;
    };

    let v = g.sum as u32
        + if n & 2 != 0 {
            vodd + veven * g.todd as u32
        } else {
            veven + vodd * g.teven as u32
        };

    let chk = if seg.exp {
        let side = seg.color ^ seg.side ^ 1;
        if v >= 4096 {
            return SymbolType::None;
        }
        let chk = calc_check(sig0, sig1, side != 0, 211);
        if seg.finder != 0 || seg.color != 0 || seg.side != 0 {
            let i = ((seg.finder as i32) << 1) - side as i32 + seg.color as i32;
            let Some(&weight) = usize::try_from(i).ok().and_then(|i| EXP_CHECKSUMS.get(i))
            else {
                return SymbolType::None;
            };
            (chk * weight) % 211
        } else if v >= 4009 {
            return SymbolType::None;
        } else {
            0
        }
    } else {
        let chk = calc_check(sig0, sig1, seg.side != 0, 79);
        if seg.color != 0 {
            (chk * 16) % 79
        } else {
            chk
        }
    };

    let db = &mut dcode.databar;
    db.segs[iseg].check = chk as u8;
    db.segs[iseg].data = v as u16;
    db.merge_segment(iseg);

    if seg.exp {
        match_segment_exp(dcode, iseg, dir)
    } else if dir > 0 {
        match_segment(dcode, iseg)
    } else {
        SymbolType::Partial
    }
}

fn decode_finder(dcode: &mut Decoder) -> SymbolType {
    let e0 = dcode.pair_width(1);
    let mut e2 = dcode.pair_width(3);
    let (dir, e3) = if e0 < e2 {
        let e = e2.wrapping_mul(4);
        if e < e0.wrapping_mul(15) || e > e0.wrapping_mul(34) {
            return SymbolType::None;
        }
        (0u8, dcode.pair_width(4))
    } else {
        let e = e0.wrapping_mul(4);
        if e < e2.wrapping_mul(15) || e > e2.wrapping_mul(34) {
            return SymbolType::None;
        }
        e2 = e0;
        (1, dcode.pair_width(0))
    };
    let e1 = dcode.pair_width(2);

    let s = e1 + e3;
    if s < 12 {
        return SymbolType::None;
    }

    let [a, b, c] = [e3, e2, e1].map(|e| decode_e(e, s, 14));
    if a < 0 || b < 0 || c < 0 {
        return SymbolType::None;
    }
    let sig = (a << 8) | (b << 4) | c;
    if !(8..=10).contains(&b) || c >= 10 || a >= 10 || ((sig >> 8) + sig) & 0xf != 10 {
        return SymbolType::None;
    }

    let finder = (FINDER_HASH[((sig - (sig >> 5)) & 0x1f) as usize] as i32
        + FINDER_HASH[((sig >> 1) & 0x1f) as usize] as i32)
        & 0x1f;
    if finder == 0x1f {
        return SymbolType::None;
    }
    let db = &dcode.databar;
    let enabled = if finder < 9 {
        db.config.contains(Config::Enable)
    } else {
        db.config_exp.contains(Config::Enable)
    };
    if !enabled {
        return SymbolType::None;
    }

    let color = dcode.color() as u8 ^ dir ^ 1;
    let db = &mut dcode.databar;
    let iseg = db.alloc_segment();
    db.segs[iseg] = Segment {
        finder: (if finder >= 9 { finder - 9 } else { finder }) as i8,
        exp: finder >= 9,
        color,
        side: dir,
        partial: false,
        count: 1,
        epoch: db.epoch,
        check: 0,
        data: 0,
        width: s,
    };

    let rc = decode_char(dcode, iseg, 12 - dir, -1);
    let db = &mut dcode.databar;
    if rc == SymbolType::None {
        db.segs[iseg].partial = true;
    } else {
        db.epoch = db.epoch.wrapping_add(1);
    }

    // outer character completes 8 widths later
    let i = (dcode.idx as usize + 8 + dir as usize) & 0xf;
    if db.chars[i] != -1 {
        trace!(i, "databar: pending character slot busy");
        return SymbolType::None;
    }
    db.chars[i] = iseg as i8;
    rc
}

pub(crate) fn decode_databar(dcode: &mut Decoder) -> SymbolType {
    let i = (dcode.idx & 0xf) as usize;
    let sym = decode_finder(dcode);

    let db = &mut dcode.databar;
    let pending = db.chars[i];
    if pending < 0 {
        return sym;
    }
    db.chars[i] = -1;
    let iseg = pending as usize;

    // a finder whose inner character failed is retried from the other side
    let (jseg, pair) = if db.segs[iseg].partial {
        db.segs[iseg].side ^= 1;
        (iseg, None)
    } else {
        let jseg = db.alloc_segment();
        let pair = db.segs[iseg];
        db.segs[jseg] = Segment {
            side: pair.side ^ 1,
            partial: false,
            count: 1,
            epoch: db.epoch,
            ..pair
        };
        (jseg, Some(iseg))
    };

    let sym = decode_char(dcode, jseg, 1, 1);
    let db = &mut dcode.databar;
    if sym == SymbolType::None {
        db.segs[jseg].finder = -1;
        if let Some(pair) = pair {
            db.segs[pair].partial = true;
        }
    } else {
        db.epoch = db.epoch.wrapping_add(1);
    }
    sym
}
