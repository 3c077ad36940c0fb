//! Low-level barcode decoder
//!
//! The [`Decoder`] consumes a stream of alternating space/bar widths and runs
//! every enabled symbology state machine against it in parallel. The first
//! width of a scan is a space.

use crate::{
    color::Color,
    config::{parse_config, Config},
    decoders::{
        codabar::{decode_codabar, CodabarDecoder},
        code128::{decode_code128, Code128Decoder},
        code39::{decode_code39, Code39Decoder},
        code93::{decode_code93, Code93Decoder},
        databar::{decode_databar, DatabarDecoder},
        ean::{decode_ean, EanDecoder},
        i25::{decode_i25, I25Decoder},
    },
    finder::{find_qr, QrFinder},
    symbol::{Configs, Modifiers},
    Error, Result, SymbolType,
};
use tracing::{debug, trace};

/// Window size for bar width history (must be power of 2)
pub(crate) const DECODE_WINDOW: usize = 16;

pub(crate) const BUFFER_MIN: usize = 0x20;
pub(crate) const BUFFER_MAX: usize = 0x100;
pub(crate) const BUFFER_INCR: usize = 0x10;

/// Widths are saturated here so sums over the window cannot overflow
pub(crate) const MAX_WIDTH: u32 = 1 << 20;

/// Callback invoked synchronously from [`Decoder::decode_width`] whenever a
/// width yields a symbol type other than `None`
pub type DecoderHandler = Box<dyn FnMut(&Decoder) + Send>;

/// Map element width to a discrete module count
///
/// Returns -1 if the element width is invalid.
#[inline]
pub(crate) fn decode_e(e: u32, s: u32, n: u32) -> i32 {
    if s == 0 {
        return -1;
    }
    let big_e = (e.wrapping_mul(n).wrapping_mul(2).wrapping_add(1) / s).wrapping_sub(3) / 2;
    if big_e >= n - 3 {
        -1
    } else {
        big_e as i32
    }
}

/// Width-stream decoder holding one state machine per symbology
pub struct Decoder {
    /// number of widths fed since the last scan boundary
    pub(crate) idx: u8,
    w: [u32; DECODE_WINDOW],
    type_: SymbolType,
    /// symbology holding the shared result buffer
    pub(crate) lock: SymbolType,
    pub(crate) modifiers: Modifiers,
    pub(crate) direction: i32,
    /// running sum of the last 6 widths
    pub(crate) s6: u32,
    buf: Vec<u8>,
    buflen: usize,
    handler: Option<DecoderHandler>,

    pub(crate) qrf: QrFinder,
    pub(crate) ean: EanDecoder,
    pub(crate) i25: I25Decoder,
    pub(crate) databar: DatabarDecoder,
    pub(crate) codabar: CodabarDecoder,
    pub(crate) code39: Code39Decoder,
    pub(crate) code93: Code93Decoder,
    pub(crate) code128: Code128Decoder,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("idx", &self.idx)
            .field("type", &self.type_)
            .field("lock", &self.lock)
            .field("direction", &self.direction)
            .field("data", &String::from_utf8_lossy(self.data()))
            .finish_non_exhaustive()
    }
}

impl Decoder {
    pub fn new() -> Self {
        let mut dcode = Self {
            idx: 0,
            w: [0; DECODE_WINDOW],
            type_: SymbolType::None,
            lock: SymbolType::None,
            modifiers: Modifiers::empty(),
            direction: 0,
            s6: 0,
            buf: vec![0; BUFFER_MIN],
            buflen: 0,
            handler: None,
            qrf: QrFinder::default(),
            ean: EanDecoder::default(),
            i25: I25Decoder::default(),
            databar: DatabarDecoder::default(),
            codabar: CodabarDecoder::default(),
            code39: Code39Decoder::default(),
            code93: Code93Decoder::default(),
            code128: Code128Decoder::default(),
        };
        dcode.restore_defaults();
        dcode.reset();
        dcode
    }

    // ========================================================================
    // Width window
    // ========================================================================

    /// Width `offset` elements back from the most recent one
    #[inline]
    pub(crate) fn get_width(&self, offset: u8) -> u32 {
        self.w[(self.idx.wrapping_sub(offset) as usize) & (DECODE_WINDOW - 1)]
    }

    /// Sum of the widths at `offset` and `offset + 1`
    #[inline]
    pub(crate) fn pair_width(&self, offset: u8) -> u32 {
        self.get_width(offset)
            .wrapping_add(self.get_width(offset.wrapping_add(1)))
    }

    /// Sum of `n` consecutive widths starting `offset` back
    #[inline]
    pub(crate) fn calc_s(&self, offset: u8, n: u8) -> u32 {
        (offset..offset.wrapping_add(n)).fold(0u32, |s, i| s.wrapping_add(self.get_width(i)))
    }

    /// Color of the current element
    ///
    /// While decoding this is the color of the width just stored; between
    /// calls it is the color expected for the next width.
    #[inline]
    pub fn color(&self) -> Color {
        Color::from(self.idx)
    }

    // ========================================================================
    // Shared result buffer
    // ========================================================================

    /// Grow the result buffer so it can hold `len` bytes
    ///
    /// Returns false when `len` exceeds the maximum buffer size.
    pub(crate) fn size_buf(&mut self, len: usize) -> bool {
        let alloc = self.buf.len();
        if len <= BUFFER_MIN || len < alloc {
            return true;
        }
        if len > BUFFER_MAX {
            debug!(len, "decoder buffer limit exceeded");
            return false;
        }
        let len = len.max(alloc + BUFFER_INCR).min(BUFFER_MAX);
        self.buf.resize(len, 0);
        true
    }

    pub(crate) fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub(crate) fn buf(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn set_buffer_len(&mut self, len: usize) {
        self.buflen = len.min(self.buf.len());
    }

    // ========================================================================
    // Lock
    // ========================================================================

    /// Claim the shared buffer for `req`; fails if another symbology holds it
    pub(crate) fn acquire_lock(&mut self, req: SymbolType) -> bool {
        if self.lock != SymbolType::None {
            trace!(held = %self.lock, requested = %req, "decoder lock busy");
            return false;
        }
        self.lock = req;
        true
    }

    pub(crate) fn release_lock(&mut self, req: SymbolType) {
        if self.lock == req {
            self.lock = SymbolType::None;
        } else {
            trace!(held = %self.lock, released = %req, "release of unheld decoder lock");
        }
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Process next bar/space width from input stream
    ///
    /// # Returns
    /// - the symbol type if this width completes a symbol; the data is then
    ///   available from [`data`](Self::data)
    /// - [`SymbolType::Partial`] as a hint that part of a symbol was decoded
    /// - [`SymbolType::None`] if no new symbol data is available
    pub fn decode_width(&mut self, w: u32) -> SymbolType {
        let mut sym = SymbolType::None;

        self.w[(self.idx as usize) & (DECODE_WINDOW - 1)] = w.min(MAX_WIDTH);

        // update shared character width
        self.s6 = self.s6.wrapping_sub(self.get_width(7));
        self.s6 = self.s6.wrapping_add(self.get_width(1));

        // each decoder processes width stream in parallel
        if cfg!(feature = "qrcode") && self.qrf.config.contains(Config::Enable) {
            let tmp = find_qr(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "ean") && self.ean.enable {
            let tmp = decode_ean(self);
            if tmp != SymbolType::None {
                sym = tmp;
            }
        }

        if cfg!(feature = "code39") && self.code39.config.contains(Config::Enable) {
            let tmp = decode_code39(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "code93") && self.code93.config.contains(Config::Enable) {
            let tmp = decode_code93(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "code128") && self.code128.config.contains(Config::Enable) {
            let tmp = decode_code128(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "databar")
            && (self.databar.config.contains(Config::Enable)
                || self.databar.config_exp.contains(Config::Enable))
        {
            let tmp = decode_databar(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "codabar") && self.codabar.config.contains(Config::Enable) {
            let tmp = decode_codabar(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        if cfg!(feature = "i25") && self.i25.config.contains(Config::Enable) {
            let tmp = decode_i25(self);
            if tmp > SymbolType::Partial {
                sym = tmp;
            }
        }

        self.idx = self.idx.wrapping_add(1);
        self.type_ = sym;

        if sym != SymbolType::None {
            if sym > SymbolType::Partial {
                debug!(symbology = %sym, direction = self.direction, "decoded symbol");
            }
            if self.lock != SymbolType::None
                && sym > SymbolType::Partial
                && sym != SymbolType::QrCode
            {
                self.release_lock(sym);
            }
            if let Some(mut handler) = self.handler.take() {
                handler(self);
                self.handler = Some(handler);
            }
        }

        sym
    }

    /// Reset all decoder state; configuration and handler are kept
    pub fn reset(&mut self) {
        self.idx = 0;
        self.w = [0; DECODE_WINDOW];
        self.type_ = SymbolType::None;
        self.lock = SymbolType::None;
        self.modifiers = Modifiers::empty();
        self.direction = 0;
        self.s6 = 0;
        self.buflen = 0;
        self.qrf.reset();
        self.ean.reset();
        self.i25.reset();
        self.databar.reset();
        self.codabar.reset();
        self.code39.reset();
        self.code93.reset();
        self.code128.reset();
    }

    /// Mark the start of a new scan path
    ///
    /// In-progress symbols are discarded; DataBar keeps its finder segments
    /// so that stacked rows can still be paired.
    pub fn new_scan(&mut self) {
        self.w = [0; DECODE_WINDOW];
        self.lock = SymbolType::None;
        self.idx = 0;
        self.s6 = 0;
        self.qrf.reset();
        self.ean.new_scan();
        self.i25.reset();
        self.databar.new_scan();
        self.codabar.reset();
        self.code39.reset();
        self.code93.reset();
        self.code128.reset();
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Type of the symbol produced by the last width
    pub fn symbol_type(&self) -> SymbolType {
        self.type_
    }

    /// Data of the last decoded symbol
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.buflen]
    }

    pub fn data_string(&self) -> Option<&str> {
        std::str::from_utf8(self.data()).ok()
    }

    /// Scan direction of the last symbol: 1 forward, -1 reverse, 0 unknown
    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// Modifiers detected on the last symbol
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Configs that applied to the last symbol
    pub fn configs(&self) -> Configs {
        self.get_configs(self.type_)
    }

    /// Replace the completion handler, returning the previous one
    pub fn set_handler(&mut self, handler: Option<DecoderHandler>) -> Option<DecoderHandler> {
        std::mem::replace(&mut self.handler, handler)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    fn config_ref(&self, sym: SymbolType) -> Option<&Configs> {
        Some(match sym {
            SymbolType::Ean13 => &self.ean.ean13_config,
            SymbolType::Ean2 => &self.ean.ean2_config,
            SymbolType::Ean5 => &self.ean.ean5_config,
            SymbolType::Ean8 => &self.ean.ean8_config,
            SymbolType::Upca => &self.ean.upca_config,
            SymbolType::Upce => &self.ean.upce_config,
            SymbolType::Isbn10 => &self.ean.isbn10_config,
            SymbolType::Isbn13 => &self.ean.isbn13_config,
            SymbolType::I25 => &self.i25.config,
            SymbolType::Databar => &self.databar.config,
            SymbolType::DatabarExp => &self.databar.config_exp,
            SymbolType::Codabar => &self.codabar.config,
            SymbolType::Code39 => &self.code39.config,
            SymbolType::Code93 => &self.code93.config,
            SymbolType::Code128 => &self.code128.config,
            SymbolType::QrCode => &self.qrf.config,
            _ => return None,
        })
    }

    fn config_mut(&mut self, sym: SymbolType) -> Option<&mut Configs> {
        Some(match sym {
            SymbolType::Ean13 => &mut self.ean.ean13_config,
            SymbolType::Ean2 => &mut self.ean.ean2_config,
            SymbolType::Ean5 => &mut self.ean.ean5_config,
            SymbolType::Ean8 => &mut self.ean.ean8_config,
            SymbolType::Upca => &mut self.ean.upca_config,
            SymbolType::Upce => &mut self.ean.upce_config,
            SymbolType::Isbn10 => &mut self.ean.isbn10_config,
            SymbolType::Isbn13 => &mut self.ean.isbn13_config,
            SymbolType::I25 => &mut self.i25.config,
            SymbolType::Databar => &mut self.databar.config,
            SymbolType::DatabarExp => &mut self.databar.config_exp,
            SymbolType::Codabar => &mut self.codabar.config,
            SymbolType::Code39 => &mut self.code39.config,
            SymbolType::Code93 => &mut self.code93.config,
            SymbolType::Code128 => &mut self.code128.config,
            SymbolType::QrCode => &mut self.qrf.config,
            _ => return None,
        })
    }

    fn length_limits_mut(&mut self, sym: SymbolType) -> Option<&mut [i32; 2]> {
        Some(match sym {
            SymbolType::I25 => &mut self.i25.configs,
            SymbolType::Codabar => &mut self.codabar.configs,
            SymbolType::Code39 => &mut self.code39.configs,
            SymbolType::Code93 => &mut self.code93.configs,
            SymbolType::Code128 => &mut self.code128.configs,
            _ => return None,
        })
    }

    /// Boolean configs currently set for `sym`; empty for unknown symbologies
    pub fn get_configs(&self, sym: SymbolType) -> Configs {
        self.config_ref(sym).copied().unwrap_or_default()
    }

    /// Read one config value
    pub fn get_config(&self, sym: SymbolType, cfg: Config) -> Result<i32> {
        let unsupported = Error::UnsupportedConfig {
            symbology: sym,
            config: cfg,
        };
        let configs = self.config_ref(sym).ok_or(unsupported.clone())?;
        if cfg.is_boolean() {
            return Ok(configs.contains(cfg) as i32);
        }
        if cfg.is_length() {
            let idx = cfg as usize - Config::MinLen as usize;
            return Ok(match sym {
                SymbolType::I25 => self.i25.configs[idx],
                SymbolType::Codabar => self.codabar.configs[idx],
                SymbolType::Code39 => self.code39.configs[idx],
                SymbolType::Code93 => self.code93.configs[idx],
                SymbolType::Code128 => self.code128.configs[idx],
                _ => return Err(unsupported),
            });
        }
        Err(unsupported)
    }

    /// (min, max) length limits for a variable-length symbology
    pub(crate) fn length_limits(&self, sym: SymbolType) -> (i32, i32) {
        match sym {
            SymbolType::I25 => (self.i25.configs[0], self.i25.configs[1]),
            SymbolType::Codabar => (self.codabar.configs[0], self.codabar.configs[1]),
            SymbolType::Code39 => (self.code39.configs[0], self.code39.configs[1]),
            SymbolType::Code93 => (self.code93.configs[0], self.code93.configs[1]),
            SymbolType::Code128 => (self.code128.configs[0], self.code128.configs[1]),
            _ => (0, 0),
        }
    }

    fn check_config(&self, sym: SymbolType, cfg: Config, val: i32) -> Result<()> {
        let unsupported = || Error::UnsupportedConfig {
            symbology: sym,
            config: cfg,
        };
        if self.config_ref(sym).is_none() || cfg.is_scanner() {
            return Err(unsupported());
        }
        if cfg.is_boolean() {
            if val != 0 && val != 1 {
                return Err(Error::InvalidValue {
                    option: format!("{cfg:?}"),
                    value: val.to_string(),
                });
            }
        } else if cfg.is_length() {
            if !sym.has_length_limits() {
                return Err(unsupported());
            }
            if val < 0 {
                return Err(Error::InvalidValue {
                    option: format!("{cfg:?}"),
                    value: val.to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply_config(&mut self, sym: SymbolType, cfg: Config, val: i32) {
        if cfg.is_boolean() {
            if let Some(configs) = self.config_mut(sym) {
                configs.set(cfg, val != 0);
            }
            self.ean.update_enable();
        } else if let Some(limits) = self.length_limits_mut(sym) {
            limits[cfg as usize - Config::MinLen as usize] = val;
        }
    }

    /// Set a config for one symbology, or for all of them with `None`
    ///
    /// Invalid requests are rejected without changing any state. With
    /// `None`, length limits only apply to symbologies that support them.
    pub fn set_config(&mut self, sym: Option<SymbolType>, cfg: Config, val: i32) -> Result<()> {
        match sym {
            Some(sym) => {
                self.check_config(sym, cfg, val).inspect_err(|err| {
                    debug!(%err, "rejected decoder config");
                })?;
                self.apply_config(sym, cfg, val);
            }
            None => {
                let targets: Vec<SymbolType> = SymbolType::ALL
                    .into_iter()
                    .filter(|&s| !cfg.is_length() || s.has_length_limits())
                    .collect();
                for &s in &targets {
                    self.check_config(s, cfg, val)?;
                }
                for s in targets {
                    self.apply_config(s, cfg, val);
                }
            }
        }
        Ok(())
    }

    /// Parse and apply a `[symbology.]option[=value]` config string
    pub fn parse_config(&mut self, text: &str) -> Result<()> {
        let (sym, cfg, val) = parse_config(text)?;
        self.set_config(sym, cfg, val)
    }

    /// Restore the default configuration of every symbology
    pub fn restore_defaults(&mut self) {
        let on = |cfgs: &[Config]| {
            cfgs.iter()
                .fold(Configs::empty(), |acc, &cfg| acc.with(cfg))
        };
        let enabled = on(&[Config::Enable]);
        let ean = on(&[Config::Enable, Config::EmitCheck]);
        let variant = on(&[Config::EmitCheck]);

        self.ean.ean13_config = ean;
        self.ean.ean8_config = ean;
        self.ean.upca_config = variant;
        self.ean.upce_config = variant;
        self.ean.isbn10_config = variant;
        self.ean.isbn13_config = variant;
        self.ean.ean2_config = Configs::empty();
        self.ean.ean5_config = Configs::empty();
        self.ean.update_enable();

        self.i25.config = enabled;
        self.i25.configs = [6, 0];
        self.databar.config = ean;
        self.databar.config_exp = ean;
        self.codabar.config = enabled;
        self.codabar.configs = [4, 0];
        self.code39.config = enabled;
        self.code39.configs = [1, 0];
        self.code93.config = enabled;
        self.code93.configs = [0, 0];
        self.code128.config = enabled;
        self.code128.configs = [0, 0];
        self.qrf.config = enabled;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::symbol::Modifier;
    use std::sync::{Arc, Mutex};

    /// Feed a string of single-digit widths, ignoring spaces
    pub(crate) fn feed(dcode: &mut Decoder, widths: &str) -> Vec<SymbolType> {
        widths
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|w| dcode.decode_width(w))
            .collect()
    }

    const EAN13_WIDTHS: &str =
        "9 111 212241113121211311141132 11111 311213121312121332111132 111 9";

    const DATABAR_WIDTHS: &str = "11 31111333 13911 31131231 11214222 11553 21231313 1";

    #[test]
    fn test_decode_e() {
        assert_eq!(decode_e(10, 70, 7), 0);
        assert_eq!(decode_e(30, 70, 7), 2);
        assert_eq!(decode_e(70, 70, 7), -1);
        assert_eq!(decode_e(5, 0, 7), -1);
    }

    #[test]
    fn test_ean13_widths() {
        let mut dcode = Decoder::new();
        let results = feed(&mut dcode, EAN13_WIDTHS);
        assert_eq!(results.last(), Some(&SymbolType::Ean13));
        assert_eq!(dcode.symbol_type(), SymbolType::Ean13);
        assert_eq!(dcode.data_string(), Some("6268964977804"));
        assert_eq!(dcode.color(), Color::Bar);
        assert_eq!(dcode.direction(), 1);
        assert_eq!(
            dcode.configs(),
            Configs::empty().with(Config::Enable).with(Config::EmitCheck)
        );
        assert!(dcode.modifiers().is_empty());
    }

    #[test]
    fn test_handler_sees_results() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dcode = Decoder::new();
        let sink = Arc::clone(&seen);
        dcode.set_handler(Some(Box::new(move |d: &Decoder| {
            sink.lock()
                .unwrap()
                .push((d.symbol_type(), d.data().to_vec()));
        })));
        feed(&mut dcode, EAN13_WIDTHS);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2, "{seen:?}");
        assert_eq!(seen[0].0, SymbolType::Partial);
        assert_eq!(seen[1].0, SymbolType::Ean13);
        assert_eq!(seen[1].1, b"6268964977804");
    }

    #[test]
    fn test_databar_widths() {
        let mut dcode = Decoder::new();
        dcode.set_config(None, Config::Enable, 0).unwrap();
        dcode
            .set_config(Some(SymbolType::Databar), Config::Enable, 1)
            .unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        dcode.set_handler(Some(Box::new(move |d: &Decoder| {
            if d.symbol_type() > SymbolType::Partial {
                *sink.lock().unwrap() = Some((
                    d.symbol_type(),
                    d.data().to_vec(),
                    d.modifiers(),
                    d.direction(),
                ));
            }
        })));
        feed(&mut dcode, DATABAR_WIDTHS);

        let (ty, data, modifiers, direction) =
            seen.lock().unwrap().clone().expect("no symbol decoded");
        assert_eq!(ty, SymbolType::Databar);
        assert_eq!(data, b"0124012345678905");
        assert_eq!(modifiers, Modifiers::from(Modifier::Gs1));
        assert_eq!(direction, 1);
    }

    #[test]
    fn test_reset_restores_space() {
        let mut dcode = Decoder::new();
        feed(&mut dcode, EAN13_WIDTHS);
        dcode.decode_width(3);
        dcode.reset();
        assert_eq!(dcode.color(), Color::Space);
        assert_eq!(dcode.direction(), 0);
        assert_eq!(dcode.symbol_type(), SymbolType::None);
        assert!(dcode.data().is_empty());
        assert!(dcode.get_configs(SymbolType::Ean13).contains(Config::Enable));
    }

    #[test]
    fn test_disabled_symbology_not_decoded() {
        let mut dcode = Decoder::new();
        dcode
            .set_config(Some(SymbolType::Ean13), Config::Enable, 0)
            .unwrap();
        dcode
            .set_config(Some(SymbolType::Ean8), Config::Enable, 0)
            .unwrap();
        let results = feed(&mut dcode, EAN13_WIDTHS);
        assert!(!results.contains(&SymbolType::Ean13));
    }

    #[test]
    fn test_config_rejection_is_atomic() {
        let mut dcode = Decoder::new();
        let before = dcode.get_configs(SymbolType::Code39);

        assert!(dcode
            .set_config(Some(SymbolType::Code39), Config::Enable, 2)
            .is_err());
        assert!(dcode.set_config(None, Config::AddCheck, 7).is_err());
        assert!(dcode
            .set_config(Some(SymbolType::Ean13), Config::MinLen, 3)
            .is_err());
        assert!(dcode
            .set_config(Some(SymbolType::Composite), Config::Enable, 1)
            .is_err());
        assert!(dcode
            .set_config(Some(SymbolType::Code39), Config::XDensity, 1)
            .is_err());
        assert!(dcode.parse_config("code39.bogus=1").is_err());

        assert_eq!(dcode.get_configs(SymbolType::Code39), before);
        assert_eq!(dcode.get_config(SymbolType::Code39, Config::MinLen), Ok(1));
    }

    #[test]
    fn test_set_config_all_and_defaults() {
        let mut dcode = Decoder::new();
        dcode.parse_config("disable").unwrap();
        for sym in SymbolType::ALL {
            assert!(!dcode.get_configs(sym).contains(Config::Enable), "{sym}");
        }
        dcode.parse_config("min-length=3").unwrap();
        assert_eq!(dcode.get_config(SymbolType::I25, Config::MinLen), Ok(3));
        assert_eq!(dcode.get_config(SymbolType::Code128, Config::MinLen), Ok(3));

        dcode.restore_defaults();
        assert!(dcode.get_configs(SymbolType::Ean13).contains(Config::Enable));
        assert!(!dcode.get_configs(SymbolType::Upca).contains(Config::Enable));
        assert_eq!(dcode.get_config(SymbolType::I25, Config::MinLen), Ok(6));
    }

    #[test]
    fn test_buffer_growth() {
        let mut dcode = Decoder::new();
        assert!(dcode.size_buf(BUFFER_MIN));
        assert!(dcode.size_buf(BUFFER_MIN + 1));
        assert_eq!(dcode.buf().len(), BUFFER_MIN + BUFFER_INCR);
        assert!(dcode.size_buf(200));
        assert_eq!(dcode.buf().len(), 200);
        assert!(!dcode.size_buf(BUFFER_MAX + 1));
        assert_eq!(dcode.buf().len(), 200);
    }

    #[test]
    fn test_huge_widths_saturate() {
        let mut dcode = Decoder::new();
        dcode.parse_config("enable").unwrap();
        let huge = [1 << 25, u32::MAX, 3, u32::MAX - 1, 1, 1 << 31, 2, 1 << 25];
        for _ in 0..8 {
            for w in huge {
                dcode.decode_width(w);
            }
        }
        assert!(dcode.get_width(1) <= MAX_WIDTH);

        // large but in-range widths keep their ratios
        dcode.reset();
        let mut last = SymbolType::None;
        for w in EAN13_WIDTHS.chars().filter_map(|c| c.to_digit(10)) {
            last = dcode.decode_width(w << 12);
        }
        assert_eq!(last, SymbolType::Ean13);
        assert_eq!(dcode.data_string(), Some("6268964977804"));
    }

    proptest::proptest! {
        #[test]
        fn prop_any_widths_decode_without_panic(
            widths in proptest::collection::vec(proptest::prelude::any::<u32>(), 0..256)
        ) {
            let mut dcode = Decoder::new();
            dcode.parse_config("enable").unwrap();
            for w in widths {
                dcode.decode_width(w);
            }
        }
    }

    #[test]
    fn test_lock_is_keyed() {
        let mut dcode = Decoder::new();
        assert!(dcode.acquire_lock(SymbolType::Code39));
        assert!(!dcode.acquire_lock(SymbolType::Code128));
        dcode.release_lock(SymbolType::Code128);
        assert_eq!(dcode.lock, SymbolType::Code39);
        dcode.release_lock(SymbolType::Code39);
        assert_eq!(dcode.lock, SymbolType::None);
    }
}
