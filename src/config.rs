//! Decoder and scanner configuration
//!
//! Configuration comes in two forms. The runtime form is a sparse set of
//! `(symbology, option, value)` triples, applied with `set_config` on a
//! [`Decoder`](crate::Decoder) or [`ImageScanner`](crate::ImageScanner), or
//! parsed from text with [`parse_config`]. The typed form is the
//! [`DecoderConfig`] builder, which uses the type system so that only
//! configurations valid for a symbology can be expressed.
//!
//! # Examples
//!
//! ```
//! use zedscan::config::*;
//!
//! let config = DecoderConfig::new()
//!     .enable(Ean13)
//!     .enable(Code39)
//!     .set_length_limits(Code39, 4, 20)
//!     .set_binary(QrCode, true)
//!     .position_tracking(true);
//! assert!(config.is_enabled(zedscan::SymbolType::Code39));
//! ```
//!
//! ```compile_fail
//! # use zedscan::config::*;
//! // EAN-13 has fixed length, it doesn't support length limits
//! DecoderConfig::new().set_length_limits(Ean13, 1, 20);
//! ```
//!
//! ```compile_fail
//! # use zedscan::config::*;
//! // Code39 is not a 2D code, it doesn't support binary mode
//! DecoderConfig::new().set_binary(Code39, true);
//! ```

use crate::{Error, Result, SymbolType};
use std::collections::{BTreeMap, BTreeSet};

pub mod symbologies;

pub use symbologies::*;

// ============================================================================
// Runtime options
// ============================================================================

/// Configuration option identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Config {
    /// Enable the symbology
    Enable = 0,
    /// Verify an optional check digit
    AddCheck = 1,
    /// Include the check digit in the decoded data
    EmitCheck = 2,
    /// Full ASCII character set
    Ascii = 3,
    /// Keep 2-D payloads as raw bytes
    Binary = 4,
    /// Minimum data length
    MinLen = 0x20,
    /// Maximum data length (0 is unbounded)
    MaxLen = 0x21,
    /// Detections required before a symbol is reported
    Uncertainty = 0x40,
    /// Record symbol locations
    Position = 0x80,
    /// Column stride for vertical passes (0 disables)
    XDensity = 0x100,
    /// Row stride for horizontal passes (0 disables)
    YDensity = 0x101,
}

impl Config {
    /// Options stored as bits in a [`Configs`](crate::symbol::Configs) set
    pub const BOOLEAN: [Config; 5] = [
        Config::Enable,
        Config::AddCheck,
        Config::EmitCheck,
        Config::Ascii,
        Config::Binary,
    ];

    pub fn is_boolean(self) -> bool {
        (self as u32) < 5
    }

    pub fn is_length(self) -> bool {
        matches!(self, Config::MinLen | Config::MaxLen)
    }

    /// Options owned by the image scanner rather than the width decoder
    pub fn is_scanner(self) -> bool {
        self as u32 >= Config::Uncertainty as u32
    }
}

// ============================================================================
// Text grammar
// ============================================================================

/// Symbology names in match order; a name matches when the input is a
/// prefix of it
const SYMBOLOGY_NAMES: &[(&str, SymbolType)] = &[
    ("qrcode", SymbolType::QrCode),
    ("db", SymbolType::Databar),
    ("databar", SymbolType::Databar),
    ("upca", SymbolType::Upca),
    ("upce", SymbolType::Upce),
    ("ean13", SymbolType::Ean13),
    ("ean8", SymbolType::Ean8),
    ("ean5", SymbolType::Ean5),
    ("ean2", SymbolType::Ean2),
    ("i25", SymbolType::I25),
    ("isbn13", SymbolType::Isbn13),
    ("isbn10", SymbolType::Isbn10),
    ("db-exp", SymbolType::DatabarExp),
    ("databar-exp", SymbolType::DatabarExp),
    ("codabar", SymbolType::Codabar),
    ("code93", SymbolType::Code93),
    ("code39", SymbolType::Code39),
    ("pdf417", SymbolType::Pdf417),
    ("code128", SymbolType::Code128),
];

fn is_prefix(token: &str, name: &str) -> bool {
    name.starts_with(token)
}

fn parse_symbology(token: &str) -> Result<Option<SymbolType>> {
    if token.is_empty() || token == "*" {
        return Ok(None);
    }
    if token.len() < 2 {
        return Err(Error::UnknownSymbology(token.to_string()));
    }
    SYMBOLOGY_NAMES
        .iter()
        .find(|(name, _)| is_prefix(token, name))
        .map(|&(_, sym)| Some(sym))
        .ok_or_else(|| Error::UnknownSymbology(token.to_string()))
}

/// Returns the option and whether its name inverts the value
fn parse_option(token: &str) -> Result<(Config, bool)> {
    let unknown = || Error::UnknownOption(token.to_string());
    let len = token.len();
    if len < 1 {
        return Err(unknown());
    }
    if is_prefix(token, "y-density") {
        return Ok((Config::YDensity, false));
    }
    if is_prefix(token, "x-density") {
        return Ok((Config::XDensity, false));
    }
    if len < 2 {
        return Err(unknown());
    }
    if is_prefix(token, "enable") {
        return Ok((Config::Enable, false));
    }
    if len < 3 {
        return Err(unknown());
    }
    if is_prefix(token, "disable") {
        return Ok((Config::Enable, true));
    }
    const OPTIONS: &[(&str, Config)] = &[
        ("min-length", Config::MinLen),
        ("max-length", Config::MaxLen),
        ("ascii", Config::Ascii),
        ("binary", Config::Binary),
        ("add-check", Config::AddCheck),
        ("emit-check", Config::EmitCheck),
        ("uncertainty", Config::Uncertainty),
        ("position", Config::Position),
    ];
    OPTIONS
        .iter()
        .find(|(name, _)| is_prefix(token, name))
        .map(|&(_, cfg)| (cfg, false))
        .ok_or_else(unknown)
}

/// Integer in C literal syntax: decimal, `0x` hex or leading-zero octal
fn parse_int(text: &str) -> Option<i32> {
    let text = text.trim();
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    i32::try_from(if neg { -magnitude } else { magnitude }).ok()
}

/// Parse a configuration string of the form `[symbology.]option[=value]`
///
/// A missing symbology (or `*`) applies to all symbologies and is returned
/// as `None`. A missing value means 1. The `no-` prefix and the `disable`
/// option invert the value.
///
/// ```
/// use zedscan::{config::{parse_config, Config}, SymbolType};
///
/// assert_eq!(
///     parse_config("qrcode.enable=0").unwrap(),
///     (Some(SymbolType::QrCode), Config::Enable, 0)
/// );
/// assert_eq!(parse_config("no-position").unwrap(), (None, Config::Position, 0));
/// ```
pub fn parse_config(text: &str) -> Result<(Option<SymbolType>, Config, i32)> {
    let (sym, rest) = match text.split_once('.') {
        Some((sym, rest)) => (parse_symbology(sym)?, rest),
        None => (None, text),
    };

    let (name, value) = match rest.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (rest, None),
    };

    let (name, mut negate) = match name.strip_prefix("no-") {
        Some(stripped) if !stripped.is_empty() => (stripped, true),
        _ => (name, false),
    };

    let (cfg, inverted) = parse_option(name)?;
    negate ^= inverted;

    let mut val = match value {
        Some(v) => parse_int(v).ok_or_else(|| Error::InvalidValue {
            option: name.to_string(),
            value: v.to_string(),
        })?,
        None => 1,
    };
    if negate {
        val = (val == 0) as i32;
    }
    Ok((sym, cfg, val))
}

// ============================================================================
// Typed builder
// ============================================================================

/// Marker trait for symbologies that can be enabled/disabled
pub trait SupportsEnable: Symbology {}

/// Marker trait for symbologies that support checksum configuration
pub trait SupportsChecksum: Symbology {}

/// Marker trait for symbologies that support variable length limits
pub trait SupportsLengthLimits: Symbology {}

/// Marker trait for symbologies that support binary mode
pub trait SupportsBinary: Symbology {}

/// Marker trait for symbologies that support uncertainty configuration
pub trait SupportsUncertainty: Symbology {}

/// Base trait that all symbology types must implement
pub trait Symbology: Sized {
    /// The corresponding SymbolType enum value
    const TYPE: SymbolType;

    /// Human-readable name
    const NAME: &'static str;
}

/// Type-safe configuration builder
///
/// Starts from the library defaults; apply it with
/// [`ImageScanner::with_config`](crate::ImageScanner::with_config).
///
/// ```
/// use zedscan::config::*;
/// use zedscan::ImageScanner;
///
/// let config = DecoderConfig::new()
///     .disable_all()
///     .enable(Ean13)
///     .set_checksum(Code39, true, false)
///     .scan_density(2, 2);
/// let scanner = ImageScanner::with_config(config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub(crate) enabled: BTreeSet<SymbolType>,
    /// (add_check, emit_check)
    pub(crate) checksum_flags: BTreeMap<SymbolType, (bool, bool)>,
    /// (min, max)
    pub(crate) length_limits: BTreeMap<SymbolType, (u32, u32)>,
    pub(crate) binary_mode: BTreeSet<SymbolType>,
    pub(crate) uncertainty: BTreeMap<SymbolType, u32>,

    pub(crate) position_tracking: bool,
    pub(crate) x_density: u32,
    pub(crate) y_density: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderConfig {
    /// Create a configuration matching the decoder defaults
    ///
    /// EAN-13, EAN-8, I25, DataBar, DataBar Expanded, Codabar, Code39,
    /// Code93, Code128 and QR are enabled. UPC-A, UPC-E and the ISBNs are
    /// reported as EAN-13 unless enabled.
    pub fn new() -> Self {
        let mut config = Self {
            enabled: BTreeSet::new(),
            checksum_flags: BTreeMap::new(),
            length_limits: BTreeMap::new(),
            binary_mode: BTreeSet::new(),
            uncertainty: BTreeMap::new(),
            position_tracking: true,
            x_density: 1,
            y_density: 1,
        };

        config.enabled.extend([
            SymbolType::Ean13,
            SymbolType::Ean8,
            SymbolType::I25,
            SymbolType::Databar,
            SymbolType::DatabarExp,
            SymbolType::Codabar,
            SymbolType::Code39,
            SymbolType::Code93,
            SymbolType::Code128,
            SymbolType::QrCode,
        ]);

        for sym in [
            SymbolType::Ean13,
            SymbolType::Ean8,
            SymbolType::Upca,
            SymbolType::Upce,
            SymbolType::Isbn10,
            SymbolType::Isbn13,
            SymbolType::Databar,
            SymbolType::DatabarExp,
        ] {
            config.checksum_flags.insert(sym, (false, true));
        }

        config.length_limits.insert(SymbolType::I25, (6, 0));
        config.length_limits.insert(SymbolType::Codabar, (4, 0));
        config.length_limits.insert(SymbolType::Code39, (1, 0));

        config
    }

    /// Enable a symbology
    pub fn enable<S: Symbology + SupportsEnable>(mut self, _: S) -> Self {
        self.enabled.insert(S::TYPE);
        self
    }

    /// Disable a symbology
    pub fn disable<S: Symbology + SupportsEnable>(mut self, _: S) -> Self {
        self.enabled.remove(&S::TYPE);
        self
    }

    /// Disable all symbologies, to start from a clean slate
    pub fn disable_all(mut self) -> Self {
        self.enabled.clear();
        self
    }

    pub fn is_enabled(&self, sym: SymbolType) -> bool {
        self.enabled.contains(&sym)
    }

    /// Configure checksum behavior
    ///
    /// `add_check` verifies an optional check digit, `emit_check` keeps it
    /// in the decoded data.
    pub fn set_checksum<S: Symbology + SupportsChecksum>(
        mut self,
        _: S,
        add_check: bool,
        emit_check: bool,
    ) -> Self {
        self.checksum_flags.insert(S::TYPE, (add_check, emit_check));
        self
    }

    /// Set minimum and maximum data length; a maximum of 0 is unbounded
    pub fn set_length_limits<S: Symbology + SupportsLengthLimits>(
        mut self,
        _: S,
        min: u32,
        max: u32,
    ) -> Self {
        self.length_limits.insert(S::TYPE, (min, max));
        self
    }

    /// Keep 2-D payloads as raw bytes instead of converting text to UTF-8
    pub fn set_binary<S: Symbology + SupportsBinary>(mut self, _: S, enabled: bool) -> Self {
        if enabled {
            self.binary_mode.insert(S::TYPE);
        } else {
            self.binary_mode.remove(&S::TYPE);
        }
        self
    }

    /// Number of detections beyond the first required before reporting
    pub fn set_uncertainty<S: Symbology + SupportsUncertainty>(
        mut self,
        _: S,
        threshold: u32,
    ) -> Self {
        self.uncertainty.insert(S::TYPE, threshold);
        self
    }

    /// Record the pixel coordinates of each detection
    pub fn position_tracking(mut self, enabled: bool) -> Self {
        self.position_tracking = enabled;
        self
    }

    /// Set scan stride for both axes; 0 disables an axis
    pub fn scan_density(mut self, x: u32, y: u32) -> Self {
        self.x_density = x;
        self.y_density = y;
        self
    }

    pub fn x_density(mut self, density: u32) -> Self {
        self.x_density = density;
        self
    }

    pub fn y_density(mut self, density: u32) -> Self {
        self.y_density = density;
        self
    }

    /// Flatten into runtime triples, in application order
    pub(crate) fn settings(&self) -> Vec<(Option<SymbolType>, Config, i32)> {
        let mut out = vec![(None, Config::Enable, 0)];
        for &sym in &self.enabled {
            out.push((Some(sym), Config::Enable, 1));
        }
        for (&sym, &(add, emit)) in &self.checksum_flags {
            out.push((Some(sym), Config::AddCheck, add as i32));
            out.push((Some(sym), Config::EmitCheck, emit as i32));
        }
        for (&sym, &(min, max)) in &self.length_limits {
            out.push((Some(sym), Config::MinLen, clamp_i32(min)));
            out.push((Some(sym), Config::MaxLen, clamp_i32(max)));
        }
        for &sym in &self.binary_mode {
            out.push((Some(sym), Config::Binary, 1));
        }
        for (&sym, &n) in &self.uncertainty {
            out.push((Some(sym), Config::Uncertainty, clamp_i32(n)));
        }
        out.push((None, Config::Position, self.position_tracking as i32));
        out.push((None, Config::XDensity, clamp_i32(self.x_density)));
        out.push((None, Config::YDensity, clamp_i32(self.y_density)));
        out
    }
}

fn clamp_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_option() {
        assert_eq!(parse_config("enable").unwrap(), (None, Config::Enable, 1));
        assert_eq!(parse_config("disable").unwrap(), (None, Config::Enable, 0));
        assert_eq!(parse_config("no-disable").unwrap(), (None, Config::Enable, 1));
        assert_eq!(
            parse_config("*.x-density=3").unwrap(),
            (None, Config::XDensity, 3)
        );
    }

    #[test]
    fn test_parse_symbology_prefixes() {
        assert_eq!(
            parse_config("qr.binary").unwrap(),
            (Some(SymbolType::QrCode), Config::Binary, 1)
        );
        assert_eq!(
            parse_config("db.enable").unwrap().0,
            Some(SymbolType::Databar)
        );
        assert_eq!(
            parse_config("databar-exp.enable").unwrap().0,
            Some(SymbolType::DatabarExp)
        );
        assert_eq!(
            parse_config("code.enable").unwrap().0,
            Some(SymbolType::Code93)
        );
        assert_eq!(
            parse_config("code128.min-len=4").unwrap(),
            (Some(SymbolType::Code128), Config::MinLen, 4)
        );
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_config("i25.max=0x10").unwrap().2, 16);
        assert_eq!(parse_config("i25.min=010").unwrap().2, 8);
        assert_eq!(parse_config("no-emit-check=0").unwrap().2, 1);
        assert_eq!(parse_config("uncert=-1").unwrap().2, -1);
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(
            parse_config("nope.enable"),
            Err(Error::UnknownSymbology(_))
        ));
        assert!(matches!(
            parse_config("e.enable"),
            Err(Error::UnknownSymbology(_))
        ));
        assert!(matches!(
            parse_config("ean13.frobnicate"),
            Err(Error::UnknownOption(_))
        ));
        assert!(matches!(parse_config("e"), Err(Error::UnknownOption(_))));
        assert!(matches!(parse_config(""), Err(Error::UnknownOption(_))));
        assert!(matches!(
            parse_config("ean13.enable=yes"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_default_config() {
        let config = DecoderConfig::new();
        assert!(config.is_enabled(SymbolType::Ean13));
        assert!(config.is_enabled(SymbolType::Code39));
        assert!(!config.is_enabled(SymbolType::Upca));
        assert!(config.position_tracking);
        assert_eq!(config.x_density, 1);
        assert_eq!(config.y_density, 1);
    }

    #[test]
    fn test_builder_pattern() {
        let config = DecoderConfig::new()
            .enable(Ean13)
            .disable(Code39)
            .set_checksum(Code39, true, false)
            .position_tracking(false)
            .scan_density(2, 3);

        assert!(config.is_enabled(SymbolType::Ean13));
        assert!(!config.is_enabled(SymbolType::Code39));
        assert_eq!(
            config.checksum_flags.get(&SymbolType::Code39),
            Some(&(true, false))
        );
        assert!(!config.position_tracking);
        assert_eq!((config.x_density, config.y_density), (2, 3));
    }

    #[test]
    fn test_settings_start_from_disabled() {
        let config = DecoderConfig::new()
            .disable_all()
            .enable(QrCode)
            .set_binary(QrCode, true)
            .set_length_limits(I25, 8, 10);
        let settings = config.settings();
        assert_eq!(settings[0], (None, Config::Enable, 0));
        assert!(settings.contains(&(Some(SymbolType::QrCode), Config::Enable, 1)));
        assert!(settings.contains(&(Some(SymbolType::QrCode), Config::Binary, 1)));
        assert!(settings.contains(&(Some(SymbolType::I25), Config::MaxLen, 10)));
        assert!(!settings.contains(&(Some(SymbolType::Ean13), Config::Enable, 1)));
    }
}
