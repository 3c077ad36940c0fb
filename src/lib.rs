//! Barcode Scanning Library
//!
//! A three-stage decoding pipeline derived from ZBar:
//!
//! - [`Scanner`] turns a line of pixel intensities into bar/space widths.
//! - [`Decoder`] runs one state machine per symbology over a width stream
//!   and reports completed symbols.
//! - [`ImageScanner`] drives both across the rows and columns of an
//!   [`Image`] and collects the results in a [`SymbolSet`].
//!
//! # Example
//!
//! ```
//! use zedscan::{Decoder, SymbolType};
//!
//! let mut decoder = Decoder::new();
//! let widths = "9 111 212241113121211311141132 11111 311213121312121332111132 111 9";
//! let mut found = SymbolType::None;
//! for w in widths.bytes().filter(u8::is_ascii_digit) {
//!     let ty = decoder.decode_width((w - b'0') as u32);
//!     if ty > SymbolType::Partial {
//!         found = ty;
//!     }
//! }
//! assert_eq!(found, SymbolType::Ean13);
//! assert_eq!(decoder.data_string(), Some("6268964977804"));
//! ```

pub mod color;
pub mod config;
pub mod decoder;
mod decoders;
pub mod error;
mod finder;
pub mod image;
pub mod img_scanner;
mod img_scanner_config;
#[cfg(feature = "qrcode")]
mod qrcode;
pub mod scanner;
pub mod symbol;

// Re-export main types
pub use color::Color;
pub use config::{Config, DecoderConfig};
pub use decoder::{Decoder, DecoderHandler};
pub use error::{Error, Result};
pub use image::Image;
pub use img_scanner::ImageScanner;
pub use scanner::Scanner;
pub use symbol::{Configs, Modifier, Modifiers, Orientation, Symbol, SymbolSet, SymbolType};
