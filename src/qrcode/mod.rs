//! QR Code reader
//!
//! The width decoder flags every scan line that crosses a finder pattern.
//! Once both scan axes have crossed enough of them, the area those lines
//! span is handed to `rqrr` for grid detection and decoding, and each
//! payload is converted to text.

use crate::{
    finder::FinderLine,
    image::Image,
    symbol::{Orientation, Symbol},
    SymbolType,
};
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8, WINDOWS_1252};
use tracing::{debug, trace};

/// Fractional bits of finder line coordinates
pub(crate) const QR_FINDER_SUBPREC: i32 = 2;

/// Finder lines needed along each axis before a decode is attempted
const MIN_FINDER_LINES: usize = 9;

/// Converts a pixel coordinate to finder line precision, optionally rounding
/// to the pixel center
#[inline]
pub(crate) fn qr_fixed(v: i32, rnd: i32) -> i32 {
    (v << QR_FINDER_SUBPREC) + (rnd << (QR_FINDER_SUBPREC - 1))
}

/// Finder pattern crossings collected over one image scan
#[derive(Debug, Default)]
pub(crate) struct QrReader {
    /// lines found by the horizontal passes [0] and the vertical passes [1]
    finder_lines: [Vec<FinderLine>; 2],
}

impl QrReader {
    pub(crate) fn reset(&mut self) {
        self.finder_lines[0].clear();
        self.finder_lines[1].clear();
    }

    /// Record a finder line in image coordinates
    pub(crate) fn found_line(&mut self, vertical: bool, line: FinderLine) {
        self.finder_lines[vertical as usize].push(line);
    }

    pub(crate) fn nlines(&self, vertical: bool) -> usize {
        self.finder_lines[vertical as usize].len()
    }

    /// Whether enough finder lines were seen to make a decode worthwhile
    pub(crate) fn has_candidates(&self) -> bool {
        self.nlines(false) >= MIN_FINDER_LINES && self.nlines(true) >= MIN_FINDER_LINES
    }

    /// Pixel rectangle `(x, y, w, h)` spanned by the finder lines, widened
    /// by the longest line and clipped to `crop`
    ///
    /// Finder patterns sit in three corners of a code, so the rectangle
    /// covers every code they belong to along with its quiet zone.
    pub(crate) fn region(&self, crop: (u32, u32, u32, u32)) -> Option<(u32, u32, u32, u32)> {
        // x0, y0, x1, y1 in finder line units
        let mut bounds: Option<[i64; 4]> = None;
        let mut margin = 0i64;
        for (axis, lines) in self.finder_lines.iter().enumerate() {
            for line in lines {
                let lo = line.pos[axis] as i64 - line.boffs as i64;
                let hi = line.pos[axis] as i64 + line.len as i64 + line.eoffs as i64;
                let across = line.pos[1 - axis] as i64;
                margin = margin.max(hi - lo);

                let (x0, x1, y0, y1) = if axis == 0 {
                    (lo, hi, across, across)
                } else {
                    (across, across, lo, hi)
                };
                bounds = Some(match bounds {
                    None => [x0, y0, x1, y1],
                    Some(b) => [b[0].min(x0), b[1].min(y0), b[2].max(x1), b[3].max(y1)],
                });
            }
        }
        let [x0, y0, x1, y1] = bounds?;

        let (cx, cy, cw, ch) = crop;
        let clip = |lo: i64, hi: i64, start: u32, len: u32| {
            let lo = ((lo - margin) >> QR_FINDER_SUBPREC).max(start as i64);
            let hi = (((hi + margin) >> QR_FINDER_SUBPREC) + 1).min(start as i64 + len as i64);
            (lo < hi).then_some((lo as u32, (hi - lo) as u32))
        };
        let (x, w) = clip(x0, x1, cx, cw)?;
        let (y, h) = clip(y0, y1, cy, ch)?;
        Some((x, y, w, h))
    }

    /// Decode the QR codes inside the crop rectangle of `img`
    ///
    /// The region around the finder lines is tried first, then the whole
    /// crop if that finds nothing. With `binary` set, payloads are kept as
    /// the raw bytes carried by the code; otherwise they are converted to
    /// UTF-8 text.
    pub(crate) fn decode(&self, img: &Image, binary: bool) -> Vec<Symbol> {
        let crop = img.crop();
        trace!(
            hlines = self.nlines(false),
            vlines = self.nlines(true),
            "qr: decoding"
        );

        if let Some(region) = self.region(crop).filter(|&region| region != crop) {
            let syms = decode_region(img, region, binary);
            if !syms.is_empty() {
                return syms;
            }
            debug!(?region, "qr: nothing near the finder lines");
        }
        decode_region(img, crop, binary)
    }
}

fn decode_region(img: &Image, region: (u32, u32, u32, u32), binary: bool) -> Vec<Symbol> {
    let (cx, cy, cw, ch) = region;
    if cw == 0 || ch == 0 {
        return Vec::new();
    }

    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        cw as usize,
        ch as usize,
        |x, y| img.pixel(cx + x as u32, cy + y as u32),
    );
    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), "qr: located grids");

    grids
        .iter()
        .filter_map(|grid| {
            let mut raw = Vec::new();
            match grid.decode_to(&mut raw) {
                Ok(meta) => trace!(version = ?meta.version, ecc = meta.ecc_level, "qr: decoded"),
                Err(err) => {
                    debug!(?err, "qr: grid failed to decode");
                    return None;
                }
            }

            let data = if binary { raw } else { bytes_to_text(&raw) };
            let mut sym = Symbol::new(SymbolType::QrCode, data);

            // bounds run clockwise from the top-left module; the polygon
            // runs counter-clockwise from the same corner
            let corners = grid
                .bounds
                .map(|p| (p.x + cx as i32, p.y + cy as i32));
            for i in [0, 3, 2, 1] {
                sym.add_point(corners[i].0, corners[i].1);
            }
            sym.orientation = orientation(corners[0], corners[1]);
            Some(sym)
        })
        .collect()
}

/// Orientation of a code whose top edge runs from `top_left` to `top_right`
pub(crate) fn orientation(top_left: (i32, i32), top_right: (i32, i32)) -> Orientation {
    let dx = top_right.0 - top_left.0;
    let dy = top_right.1 - top_left.1;
    if dx == 0 && dy == 0 {
        Orientation::Unknown
    } else if dx.abs() >= dy.abs() {
        if dx > 0 {
            Orientation::Up
        } else {
            Orientation::Down
        }
    } else if dy > 0 {
        Orientation::Right
    } else {
        Orientation::Left
    }
}

/// Bytes with no C1 control codes, so Windows-1252 is a plausible reading
fn text_is_latin1(bytes: &[u8]) -> bool {
    !bytes.iter().any(|&b| (0x80..0xa0).contains(&b))
}

/// Convert a QR byte payload to UTF-8
///
/// A UTF-8 byte order mark is honored. Otherwise the candidates are tried in
/// order: UTF-8, Shift-JIS, then Windows-1252. Bytes no candidate accepts
/// are passed through unchanged.
pub(crate) fn bytes_to_text(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_ascii() {
        return bytes.to_vec();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(rest) {
            return text.into_owned().into_bytes();
        }
    }

    const CANDIDATES: [&Encoding; 3] = [UTF_8, SHIFT_JIS, WINDOWS_1252];
    for enc in CANDIDATES {
        if enc == WINDOWS_1252 && !text_is_latin1(bytes) {
            continue;
        }
        if let Some(text) = enc.decode_without_bom_handling_and_without_replacement(bytes) {
            trace!(encoding = enc.name(), "qr: converted text");
            return text.into_owned().into_bytes();
        }
    }
    debug!(len = bytes.len(), "qr: no text encoding matched");
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{imageops, GrayImage, Luma};
    use ::qrcode::QrCode;

    fn render(data: &[u8]) -> GrayImage {
        QrCode::new(data)
            .unwrap()
            .render::<Luma<u8>>()
            .module_dimensions(4, 4)
            .build()
    }

    fn to_image(gray: &GrayImage) -> Image {
        Image::from_gray(gray.as_raw(), gray.width(), gray.height()).unwrap()
    }

    #[test]
    fn test_decode_rendered_code() {
        let img = to_image(&render(b"hello zedscan"));
        let syms = QrReader::default().decode(&img, false);
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].symbol_type(), SymbolType::QrCode);
        assert_eq!(syms[0].data(), b"hello zedscan");
        assert_eq!(syms[0].points().len(), 4);
        assert_eq!(syms[0].orientation(), Orientation::Up);
    }

    #[test]
    fn test_rotated_code_orientation() {
        let gray = imageops::rotate90(&render(b"rotated"));
        let syms = QrReader::default().decode(&to_image(&gray), false);
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].orientation(), Orientation::Right);

        let gray = imageops::rotate180(&render(b"rotated"));
        let syms = QrReader::default().decode(&to_image(&gray), false);
        assert_eq!(syms[0].orientation(), Orientation::Down);
    }

    #[test]
    fn test_binary_keeps_raw_bytes() {
        // half-width katakana in Shift-JIS, not valid UTF-8
        let payload = [0xb1u8, 0xb2, 0xb3];
        let img = to_image(&render(&payload));
        let raw = QrReader::default().decode(&img, true);
        assert_eq!(raw[0].data(), &payload);

        let text = QrReader::default().decode(&img, false);
        assert_eq!(text[0].data_string(), Some("ｱｲｳ"));
    }

    #[test]
    fn test_empty_crop_decodes_nothing() {
        let mut img = to_image(&render(b"cropped"));
        img.set_crop(0, 0, 0, 0);
        assert!(QrReader::default().decode(&img, false).is_empty());
    }

    #[test]
    fn test_text_conversion() {
        assert_eq!(bytes_to_text(b"plain"), b"plain");
        assert_eq!(bytes_to_text("žluť".as_bytes()), "žluť".as_bytes());
        assert_eq!(bytes_to_text(b"\xef\xbb\xbfbom"), b"bom");
        assert_eq!(bytes_to_text(b"caf\xe9"), "café".as_bytes());
        // C1 control codes rule out Windows-1252 and nothing else fits
        assert_eq!(bytes_to_text(b"\x85\xff"), b"\x85\xff");
    }

    #[test]
    fn test_orientation_from_top_edge() {
        assert_eq!(orientation((0, 0), (10, 1)), Orientation::Up);
        assert_eq!(orientation((10, 0), (10, 10)), Orientation::Right);
        assert_eq!(orientation((10, 10), (0, 9)), Orientation::Down);
        assert_eq!(orientation((0, 10), (1, 0)), Orientation::Left);
        assert_eq!(orientation((3, 3), (3, 3)), Orientation::Unknown);
    }

    fn line(pos: [i32; 2], len: i32, boffs: i32, eoffs: i32) -> FinderLine {
        FinderLine { pos, len, boffs, eoffs }
    }

    #[test]
    fn test_region_spans_finder_lines() {
        let mut qr = QrReader::default();
        assert_eq!(qr.region((0, 0, 100, 100)), None);

        qr.found_line(false, line([40, 20], 12, 4, 4));
        qr.found_line(true, line([100, 60], 12, 4, 4));
        assert_eq!(qr.region((0, 0, 100, 100)), Some((4, 0, 27, 25)));
        assert_eq!(qr.region((10, 0, 20, 100)), Some((10, 0, 20, 25)));
        assert_eq!(qr.region((50, 0, 10, 10)), None);
    }

    /// A code pasted at (300, 150) in a larger blank frame
    fn framed() -> (Image, u32, u32) {
        let code = render(b"framed");
        let (w, h) = code.dimensions();
        let mut frame = GrayImage::from_pixel(600, 400, Luma([255]));
        imageops::overlay(&mut frame, &code, 300, 150);
        (to_image(&frame), w, h)
    }

    #[test]
    fn test_decode_near_finder_lines() {
        let (img, w, h) = framed();
        let (w, h) = (w as i32, h as i32);

        let mut qr = QrReader::default();
        qr.found_line(false, line([qr_fixed(300, 0), qr_fixed(150 + h / 2, 1)], w * 4, 0, 0));
        qr.found_line(true, line([qr_fixed(300 + w / 2, 1), qr_fixed(150, 0)], h * 4, 0, 0));
        let region = qr.region(img.crop()).unwrap();
        assert_ne!(region, img.crop());

        let syms = qr.decode(&img, false);
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].data(), b"framed");
        for &(x, y) in syms[0].points() {
            assert!((300..300 + w).contains(&x), "x = {x}");
            assert!((150..150 + h).contains(&y), "y = {y}");
        }
    }

    #[test]
    fn test_stray_finder_lines_fall_back_to_crop() {
        let (img, _, _) = framed();
        let mut qr = QrReader::default();
        qr.found_line(false, line([0, 0], 40, 0, 0));
        qr.found_line(true, line([0, 0], 40, 0, 0));
        assert_eq!(qr.region(img.crop()), Some((0, 0, 21, 21)));

        let syms = qr.decode(&img, false);
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].data(), b"framed");
    }

    #[test]
    fn test_finder_line_gate() {
        let mut qr = QrReader::default();
        for _ in 0..MIN_FINDER_LINES {
            qr.found_line(false, FinderLine::default());
        }
        assert!(!qr.has_candidates());
        for _ in 0..MIN_FINDER_LINES {
            qr.found_line(true, FinderLine::default());
        }
        assert!(qr.has_candidates());
        qr.reset();
        assert_eq!(qr.nlines(false) + qr.nlines(true), 0);
    }
}
