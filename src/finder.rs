//! Barcode finder pattern detection
//!
//! Detects the 1:1:3:1:1 bar/space ratio of a QR code finder pattern in the
//! width stream. Each hit records a [`FinderLine`] locating the pattern's
//! center bar relative to the most recent edge; the image scanner converts it
//! to image coordinates.

use crate::{color::Color, decoder::decode_e, symbol::Configs, Decoder, SymbolType};

/// A scan line crossing a finder pattern
///
/// Offsets are in scanner width units, measured back from the last edge
/// when produced by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FinderLine {
    /// start of the center bar along the line, and line position across it
    pub(crate) pos: [i32; 2],
    /// length of the center bar
    pub(crate) len: i32,
    /// offset to the middle of the bar before the center
    pub(crate) boffs: i32,
    /// offset to the middle of the bar after the center
    pub(crate) eoffs: i32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct QrFinder {
    /// sum of the last 5 widths
    pub(crate) s5: u32,
    pub(crate) line: FinderLine,
    pub(crate) config: Configs,
}

impl QrFinder {
    pub(crate) fn reset(&mut self) {
        self.s5 = 0;
    }
}

/// Find QR code finder pattern
///
/// Searches for the 1:1:3:1:1 ratio pattern characteristic of QR code finders.
pub(crate) fn find_qr(dcode: &mut Decoder) -> SymbolType {
    // update latest finder pattern width
    dcode.qrf.s5 = dcode
        .qrf
        .s5
        .wrapping_sub(dcode.get_width(6))
        .wrapping_add(dcode.get_width(1));
    let s = dcode.qrf.s5;

    // only dark-on-light finders are matched; reversed codes are not found
    if dcode.color() != Color::Space || s < 7 {
        return SymbolType::None;
    }

    if decode_e(dcode.pair_width(1), s, 7) != 0
        || decode_e(dcode.pair_width(2), s, 7) != 2
        || decode_e(dcode.pair_width(3), s, 7) != 2
        || decode_e(dcode.pair_width(4), s, 7) != 0
    {
        return SymbolType::None;
    }

    // valid QR finder symbol - mark positions needed by the reader
    let qz = dcode.get_width(0) as i32;
    let w1 = dcode.get_width(1) as i32;
    let len = qz + w1 + dcode.get_width(2) as i32;
    let pos = len + dcode.get_width(3) as i32;
    let w5 = dcode.get_width(5) as i32;

    dcode.qrf.line = FinderLine {
        pos: [pos, pos],
        len,
        boffs: pos + dcode.get_width(4) as i32 + (w5 + 1) / 2,
        eoffs: qz + (w1 + 1) / 2,
    };

    dcode.direction = 0;
    dcode.set_buffer_len(0);

    SymbolType::QrCode
}
