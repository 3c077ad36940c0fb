//! Symbol management module
//!
//! Copyright 2007-2010 (c) Jeff Brown <spadix@users.sourceforge.net>
//! Rust port based on the C implementation
//!
//! Decoded symbols, their metadata, and the result sets that own them.

use crate::config::Config;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum SymbolType {
    #[default]
    None = 0,
    Partial = 1,
    Ean2 = 2,
    Ean5 = 5,
    Ean8 = 8,
    Upce = 9,
    Isbn10 = 10,
    Upca = 12,
    Ean13 = 13,
    Isbn13 = 14,
    Composite = 15,
    I25 = 25,
    Databar = 34,
    DatabarExp = 35,
    Codabar = 38,
    Code39 = 39,
    Pdf417 = 57,
    QrCode = 64,
    Code93 = 93,
    Code128 = 128,
}

impl SymbolType {
    /// Every symbology that carries decoder configuration
    pub const ALL: [Self; 16] = [
        SymbolType::Ean13,
        SymbolType::Ean2,
        SymbolType::Ean5,
        SymbolType::Ean8,
        SymbolType::Upca,
        SymbolType::Upce,
        SymbolType::Isbn10,
        SymbolType::Isbn13,
        SymbolType::I25,
        SymbolType::Databar,
        SymbolType::DatabarExp,
        SymbolType::Codabar,
        SymbolType::Code39,
        SymbolType::Code93,
        SymbolType::Code128,
        SymbolType::QrCode,
    ];

    /// Members of the EAN/UPC family, including the add-ons
    pub fn is_ean(self) -> bool {
        matches!(
            self,
            Self::Ean2
                | Self::Ean5
                | Self::Ean8
                | Self::Upce
                | Self::Isbn10
                | Self::Upca
                | Self::Ean13
                | Self::Isbn13
        )
    }

    /// EAN-2 and EAN-5 supplements
    pub fn is_addon(self) -> bool {
        matches!(self, Self::Ean2 | Self::Ean5)
    }

    /// 1-D symbologies decoded from a single scan line
    pub fn is_linear(self) -> bool {
        (self > Self::Partial && self < Self::Composite)
            || matches!(
                self,
                Self::I25
                    | Self::Databar
                    | Self::DatabarExp
                    | Self::Codabar
                    | Self::Code39
                    | Self::Code93
                    | Self::Code128
            )
    }

    /// Symbologies accepting the min/max length options
    pub(crate) fn has_length_limits(self) -> bool {
        matches!(
            self,
            Self::I25 | Self::Codabar | Self::Code39 | Self::Code93 | Self::Code128
        )
    }
}

impl Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "None",
                Self::Partial => "Partial",
                Self::Ean2 => "EAN-2",
                Self::Ean5 => "EAN-5",
                Self::Ean8 => "EAN-8",
                Self::Upce => "UPC-E",
                Self::Isbn10 => "ISBN-10",
                Self::Upca => "UPC-A",
                Self::Ean13 => "EAN-13",
                Self::Isbn13 => "ISBN-13",
                Self::Composite => "COMPOSITE",
                Self::I25 => "I2/5",
                Self::Databar => "DataBar",
                Self::DatabarExp => "DataBar-Exp",
                Self::Codabar => "Codabar",
                Self::Code39 => "CODE-39",
                Self::Pdf417 => "PDF417",
                Self::QrCode => "QR-Code",
                Self::Code93 => "CODE-93",
                Self::Code128 => "CODE-128",
            }
        )
    }
}

impl From<SymbolType> for i32 {
    fn from(value: SymbolType) -> Self {
        value as i32
    }
}

impl From<i32> for SymbolType {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Partial,
            2 => Self::Ean2,
            5 => Self::Ean5,
            8 => Self::Ean8,
            9 => Self::Upce,
            10 => Self::Isbn10,
            12 => Self::Upca,
            13 => Self::Ean13,
            14 => Self::Isbn13,
            15 => Self::Composite,
            25 => Self::I25,
            34 => Self::Databar,
            35 => Self::DatabarExp,
            38 => Self::Codabar,
            39 => Self::Code39,
            57 => Self::Pdf417,
            64 => Self::QrCode,
            93 => Self::Code93,
            128 => Self::Code128,
            _ => Self::None,
        }
    }
}

/// Rotation of a symbol relative to the image, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Unknown = -1,
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl From<i32> for Orientation {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Up,
            1 => Self::Right,
            2 => Self::Down,
            3 => Self::Left,
            _ => Self::Unknown,
        }
    }
}

/// Encoding modifiers detected while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Data follows the GS1 Application Identifier structure
    Gs1 = 0,
    /// Data carries an AIM application indicator
    Aim = 1,
}

// ============================================================================
// Bit sets
// ============================================================================

/// Set of boolean decoder configs, as a bit mask indexed by [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Configs(pub(crate) u32);

impl Configs {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, cfg: Config) -> bool {
        let bit = cfg as u32;
        bit < 32 && (self.0 >> bit) & 1 != 0
    }

    pub(crate) fn set(&mut self, cfg: Config, on: bool) {
        let bit = 1 << (cfg as u32);
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub(crate) fn with(mut self, cfg: Config) -> Self {
        self.set(cfg, true);
        self
    }

    pub fn iter(self) -> impl Iterator<Item = Config> {
        Config::BOOLEAN
            .into_iter()
            .filter(move |&cfg| self.contains(cfg))
    }
}

/// Set of [`Modifier`]s, as a bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(pub(crate) u32);

impl Modifiers {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, m: Modifier) -> bool {
        (self.0 >> (m as u32)) & 1 != 0
    }

    pub(crate) fn insert(&mut self, m: Modifier) {
        self.0 |= 1 << (m as u32);
    }

    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        [Modifier::Gs1, Modifier::Aim]
            .into_iter()
            .filter(move |&m| self.contains(m))
    }
}

impl From<Modifier> for Modifiers {
    fn from(m: Modifier) -> Self {
        let mut set = Self::empty();
        set.insert(m);
        set
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// A decoded barcode symbol
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Symbol {
    pub(crate) symbol_type: SymbolType,
    pub(crate) configs: Configs,
    pub(crate) modifiers: Modifiers,
    pub(crate) data: Vec<u8>,
    pub(crate) points: Vec<(i32, i32)>,
    pub(crate) orientation: Orientation,
    pub(crate) direction: i32,
    pub(crate) components: Option<SymbolSet>,
    pub(crate) quality: i32,
}

impl Symbol {
    pub(crate) fn new(symbol_type: SymbolType, data: Vec<u8>) -> Self {
        Self {
            symbol_type,
            data,
            quality: 1,
            ..Default::default()
        }
    }

    pub(crate) fn add_point(&mut self, x: i32, y: i32) {
        self.points.push((x, y));
    }

    /// Get the symbol type
    pub fn symbol_type(&self) -> SymbolType {
        self.symbol_type
    }

    /// Get the decoded data as bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the decoded data as a string (if valid UTF-8)
    pub fn data_string(&self) -> Option<&str> {
        std::str::from_utf8(self.data()).ok()
    }

    /// Decoder configs that were active when this symbol was decoded
    pub fn configs(&self) -> Configs {
        self.configs
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Location polygon, one point per detection for linear symbols or the
    /// four corners of a 2-D symbol
    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Reading direction along the scan axis that decoded the symbol
    ///
    /// 1 when the data runs toward increasing image coordinates, -1 when it
    /// runs the other way, and 0 when unknown, as for 2-D symbols.
    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// Relative confidence; for linear symbols, the number of scan lines that
    /// decoded the same data
    pub fn quality(&self) -> i32 {
        self.quality
    }

    /// Get the component symbols (for composite symbols like EAN+add-on)
    pub fn components(&self) -> Option<&SymbolSet> {
        self.components.as_ref()
    }

    /// Number of component symbols; 0 for atomic symbols
    pub fn component_count(&self) -> usize {
        self.components.as_ref().map_or(0, SymbolSet::len)
    }
}

/// Collection of decoded symbols, unique by type and data
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolSet {
    symbols: Vec<Symbol>,
}

impl SymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an iterator over the symbols
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Check if there are any symbols
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Get the number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Symbol> {
        self.symbols.get(idx)
    }

    pub(crate) fn find_mut(&mut self, ty: SymbolType, data: &[u8]) -> Option<&mut Symbol> {
        self.symbols
            .iter_mut()
            .find(|s| s.symbol_type == ty && s.data == data)
    }

    pub(crate) fn push(&mut self, sym: Symbol) {
        self.symbols.push(sym);
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&Symbol) -> bool) {
        self.symbols.retain(f);
    }

    pub(crate) fn take(&mut self) -> Vec<Symbol> {
        std::mem::take(&mut self.symbols)
    }
}

impl From<Vec<Symbol>> for SymbolSet {
    fn from(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }
}

impl<'a> IntoIterator for &'a SymbolSet {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

impl IntoIterator for SymbolSet {
    type Item = Symbol;
    type IntoIter = std::vec::IntoIter<Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.into_iter()
    }
}

impl std::ops::Index<usize> for SymbolSet {
    type Output = Symbol;

    fn index(&self, idx: usize) -> &Symbol {
        &self.symbols[idx]
    }
}
