//! Image handling and format support

use crate::symbol::SymbolSet;
use crate::{Error, Result};

/// Create a fourcc code from 4 bytes
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

/// 8-bit grayscale
pub const Y800: u32 = fourcc(b'Y', b'8', b'0', b'0');

/// Same as [`Y800`]
pub const GREY: u32 = fourcc(b'G', b'R', b'E', b'Y');

/// Parse a 4-character format tag such as `"Y800"`
pub fn parse_fourcc(tag: &str) -> Result<u32> {
    match *tag.as_bytes() {
        [a, b, c, d] => Ok(fourcc(a, b, c, d)),
        _ => Err(Error::UnsupportedFormat(tag.to_string())),
    }
}

/// Render a fourcc code back into its 4-character tag
pub fn fourcc_name(format: u32) -> String {
    format
        .to_le_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Bits per pixel of the formats whose buffer size can be validated
fn bits_per_pixel(format: u32) -> Option<u64> {
    const KNOWN: &[(&[u8; 4], u64)] = &[
        (b"Y800", 8),
        (b"GREY", 8),
        (b"Y8  ", 8),
        (b"Y16 ", 16),
        (b"YUYV", 16),
        (b"UYVY", 16),
        (b"RGBP", 16),
        (b"RGB3", 24),
        (b"BGR3", 24),
        (b"RGB4", 32),
        (b"BGR4", 32),
    ];
    KNOWN
        .iter()
        .find(|(tag, _)| fourcc(tag[0], tag[1], tag[2], tag[3]) == format)
        .map(|&(_, bpp)| bpp)
}

/// Expected buffer length for a frame, or `None` if the format is opaque
fn expected_len(format: u32, width: u32, height: u32) -> Result<Option<usize>> {
    let Some(bpp) = bits_per_pixel(format) else {
        return Ok(None);
    };
    let bytes = (width as u64 * height as u64 * bpp).div_ceil(8);
    usize::try_from(bytes)
        .map(Some)
        .map_err(|_| Error::ImageTooLarge { width, height })
}

fn check_len(format: u32, width: u32, height: u32, actual: usize) -> Result<()> {
    match expected_len(format, width, height)? {
        Some(expected) if expected != actual => Err(Error::BufferSize { expected, actual }),
        _ => Ok(()),
    }
}

/// An image buffer to be scanned, plus the symbols found in it
///
/// The crop rectangle limits scanning to part of the frame and always lies
/// within the image bounds.
#[derive(Debug, Clone)]
pub struct Image {
    format: u32,
    width: u32,
    height: u32,
    crop_x: u32,
    crop_y: u32,
    crop_w: u32,
    crop_h: u32,
    data: Vec<u8>,
    symbols: Option<SymbolSet>,
}

impl Default for Image {
    /// An empty 0x0 grayscale frame with no buffer
    fn default() -> Self {
        Self {
            format: Y800,
            width: 0,
            height: 0,
            crop_x: 0,
            crop_y: 0,
            crop_w: 0,
            crop_h: 0,
            data: Vec::new(),
            symbols: None,
        }
    }
}

impl Image {
    /// Create an image from a buffer in the given format
    ///
    /// Fails if `format` is not a 4-character tag or if the buffer length
    /// does not match the frame size for a known format.
    pub fn new(width: u32, height: u32, format: &str, data: Vec<u8>) -> Result<Self> {
        let format = parse_fourcc(format)?;
        check_len(format, width, height, data.len())?;
        Ok(Self {
            format,
            width,
            height,
            crop_x: 0,
            crop_y: 0,
            crop_w: width,
            crop_h: height,
            data,
            symbols: None,
        })
    }

    /// Create an image from grayscale data
    pub fn from_gray(data: &[u8], width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, "Y800", data.to_vec())
    }

    /// Get the image width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the image height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the image format as a fourcc code
    pub fn format(&self) -> u32 {
        self.format
    }

    pub fn format_name(&self) -> String {
        fourcc_name(self.format)
    }

    /// Whether the image holds 8-bit luma samples that can be scanned directly
    pub fn is_gray(&self) -> bool {
        self.format == Y800 || self.format == GREY
    }

    /// Get access to the raw image data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Change the frame size
    ///
    /// The crop is reset to the full frame. Only a size the current buffer
    /// can back is accepted; use [`set_data`](Self::set_data) to change both
    /// together.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        check_len(self.format, width, height, self.data.len())?;
        self.width = width;
        self.height = height;
        self.reset_crop();
        Ok(())
    }

    /// Replace the frame size and buffer together
    ///
    /// On failure the image is left unchanged.
    pub fn set_data(&mut self, width: u32, height: u32, data: Vec<u8>) -> Result<()> {
        check_len(self.format, width, height, data.len())?;
        self.width = width;
        self.height = height;
        self.data = data;
        self.symbols = None;
        self.reset_crop();
        Ok(())
    }

    /// Crop rectangle as `(x, y, width, height)`
    pub fn crop(&self) -> (u32, u32, u32, u32) {
        (self.crop_x, self.crop_y, self.crop_w, self.crop_h)
    }

    /// Limit scanning to a rectangle, clamped to the image bounds
    pub fn set_crop(&mut self, x: u32, y: u32, w: u32, h: u32) {
        self.crop_x = x.min(self.width);
        self.crop_w = w.min(self.width - self.crop_x);
        self.crop_y = y.min(self.height);
        self.crop_h = h.min(self.height - self.crop_y);
    }

    fn reset_crop(&mut self) {
        self.crop_x = 0;
        self.crop_y = 0;
        self.crop_w = self.width;
        self.crop_h = self.height;
    }

    /// Symbols found by the last scan, or `None` if the image has not been
    /// scanned since it was created or recycled
    pub fn symbols(&self) -> Option<&SymbolSet> {
        self.symbols.as_ref()
    }

    /// Iterate over the symbols found by the last scan
    pub fn iter_symbols(&self) -> impl Iterator<Item = &crate::Symbol> {
        self.symbols.iter().flat_map(SymbolSet::iter)
    }

    /// Detach and return the attached result set
    pub fn take_symbols(&mut self) -> Option<SymbolSet> {
        self.symbols.take()
    }

    pub(crate) fn set_symbols(&mut self, symbols: SymbolSet) {
        self.symbols = Some(symbols);
    }

    /// Fails unless the buffer holds one byte per pixel
    pub(crate) fn check_gray_len(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize;
        if self.data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Sample at `(x, y)`; callers stay within the frame
    #[inline]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}
