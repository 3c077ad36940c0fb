//! Image scanner
//!
//! Drives a [`Scanner`] and a [`Decoder`] along the rows and columns of an
//! [`Image`], merges repeated detections of the same symbol, and assembles
//! the survivors into the image's [`SymbolSet`]. Optionally caches results
//! across consecutive frames so a steady symbol in a video stream is
//! reported once.

use crate::{
    config::{parse_config, Config, DecoderConfig},
    decoder::Decoder,
    image::Image,
    img_scanner_config::ImageScannerConfig,
    scanner::Scanner,
    symbol::{Orientation, Symbol, SymbolSet},
    Error, Result, SymbolType,
};
use std::collections::HashMap;
use tracing::{debug, trace};

#[cfg(feature = "qrcode")]
use crate::qrcode::{qr_fixed, QrReader, QR_FINDER_SUBPREC};

/// Detections a linear symbol needs when every row is scanned
const CONSISTENCY: i32 = 3;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    /// frame in which the symbol was last seen
    last_seen: u64,
    /// frames in which the symbol was suppressed since it was reported
    count: i32,
}

/// Multi-pass image scanner
///
/// ```
/// use zedscan::{Image, ImageScanner};
///
/// let mut scanner = ImageScanner::new();
/// let mut image = Image::from_gray(&[255; 64 * 48], 64, 48).unwrap();
/// assert_eq!(scanner.scan(&mut image).unwrap(), 0);
/// assert!(image.symbols().unwrap().is_empty());
/// ```
pub struct ImageScanner {
    scn: Scanner,
    dcode: Decoder,
    #[cfg(feature = "qrcode")]
    qr: QrReader,
    config: ImageScannerConfig,

    // current scan direction
    dx: i32,
    dy: i32,
    du: i32,
    umin: i32,
    v: i32,

    /// results of the scan in progress, then of the last scan
    syms: SymbolSet,

    enable_cache: bool,
    cache: HashMap<(SymbolType, Vec<u8>), CacheEntry>,
    /// frames scanned while caching
    frame: u64,
}

impl Default for ImageScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageScanner")
            .field("config", &self.config)
            .field("enable_cache", &self.enable_cache)
            .field("frame", &self.frame)
            .field("results", &self.syms.len())
            .finish_non_exhaustive()
    }
}

impl ImageScanner {
    pub fn new() -> Self {
        Self {
            scn: Scanner::new(),
            dcode: Decoder::new(),
            #[cfg(feature = "qrcode")]
            qr: QrReader::default(),
            config: ImageScannerConfig::default(),
            dx: 0,
            dy: 0,
            du: 0,
            umin: 0,
            v: 0,
            syms: SymbolSet::new(),
            enable_cache: false,
            cache: HashMap::new(),
            frame: 0,
        }
    }

    /// Create a scanner from a typed configuration
    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        let mut scanner = Self::new();
        for (sym, cfg, val) in config.settings() {
            scanner.set_config(sym, cfg, val)?;
        }
        Ok(scanner)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set a decoder or scanner option
    ///
    /// Decoder options go to the internal decoder. `Uncertainty` is per
    /// symbology, `Position` and the densities take `None`. Invalid requests
    /// are rejected without changing any state.
    pub fn set_config(&mut self, sym: Option<SymbolType>, cfg: Config, val: i32) -> Result<()> {
        if cfg.is_scanner() {
            self.config.set(sym, cfg, val).inspect_err(|err| {
                debug!(%err, "rejected scanner config");
            })
        } else {
            self.dcode.set_config(sym, cfg, val)
        }
    }

    pub fn get_config(&self, sym: Option<SymbolType>, cfg: Config) -> Result<i32> {
        if cfg.is_scanner() {
            return self.config.get(sym, cfg);
        }
        let sym = sym.ok_or(Error::UnsupportedConfig {
            symbology: SymbolType::None,
            config: cfg,
        })?;
        self.dcode.get_config(sym, cfg)
    }

    /// Parse and apply a `[symbology.]option[=value]` config string
    pub fn parse_config(&mut self, text: &str) -> Result<()> {
        let (sym, cfg, val) = parse_config(text)?;
        self.set_config(sym, cfg, val)
    }

    /// Restore every decoder and scanner option to its default
    pub fn restore_defaults(&mut self) {
        self.dcode.restore_defaults();
        self.config = ImageScannerConfig::default();
    }

    /// Enable or disable the inter-frame result cache
    ///
    /// Either way, anything cached so far is forgotten.
    pub fn enable_cache(&mut self, enable: bool) {
        self.cache.clear();
        self.frame = 0;
        self.enable_cache = enable;
    }

    /// Number of frames a reported symbol stays suppressed after it was
    /// last seen
    pub fn set_cache_window(&mut self, frames: u32) {
        self.config.cache_window = frames;
    }

    /// Symbols reported by the last scan
    pub fn results(&self) -> &SymbolSet {
        &self.syms
    }

    /// Release the results attached to `img` by an earlier scan
    pub fn recycle(&mut self, img: &mut Image) {
        img.take_symbols();
        self.syms = SymbolSet::new();
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    /// Scan an image for symbols
    ///
    /// Only the crop rectangle is scanned. The symbols found replace any
    /// previous results attached to the image. Returns the number of symbols
    /// reported; with caching enabled, symbols already reported in recent
    /// frames are left out.
    pub fn scan(&mut self, img: &mut Image) -> Result<usize> {
        if !img.is_gray() {
            return Err(Error::UnsupportedFormat(img.format_name()));
        }
        img.check_gray_len()?;

        #[cfg(feature = "qrcode")]
        self.qr.reset();
        img.take_symbols();
        self.syms = SymbolSet::new();
        if self.enable_cache {
            self.frame += 1;
        }

        let (_, _, w, h) = img.crop();
        if w > 0 && h > 0 {
            self.quiet_border();
            self.scan_rows(img);
            self.scan_columns(img);
        }

        #[cfg(feature = "qrcode")]
        self.decode_qr(img);

        self.filter_symbols();
        self.merge_ean_addon();
        if self.enable_cache {
            self.apply_cache();
        }

        debug!(symbols = self.syms.len(), frame = self.frame, "scan complete");
        img.set_symbols(self.syms.clone());
        Ok(self.syms.len())
    }

    /// Horizontal passes, alternating direction every `y_density` rows
    fn scan_rows(&mut self, img: &Image) {
        let density = self.config.y_density as i32;
        if density <= 0 {
            return;
        }
        let (cx, cy, cw, ch) = crop_i32(img);
        let (cx1, cy1) = (cx + cw, cy + ch);

        let border = (((ch - 1) % density + 1) / 2).min(ch / 2);
        let mut y = cy + border;
        self.dy = 0;

        while y < cy1 {
            trace!(y, "img_x+");
            self.v = y;
            self.dx = 1;
            self.du = 1;
            self.umin = cx;
            for x in cx..cx1 {
                self.scan_sample(img.pixel(x as u32, y as u32));
            }
            self.quiet_border();

            match y.checked_add(density) {
                Some(next) if next < cy1 => y = next,
                _ => break,
            }

            trace!(y, "img_x-");
            self.v = y;
            self.dx = -1;
            self.du = -1;
            self.umin = cx1;
            for x in (cx..cx1).rev() {
                self.scan_sample(img.pixel(x as u32, y as u32));
            }
            self.quiet_border();

            match y.checked_add(density) {
                Some(next) => y = next,
                None => break,
            }
        }
        self.dx = 0;
    }

    /// Vertical passes, alternating direction every `x_density` columns
    fn scan_columns(&mut self, img: &Image) {
        let density = self.config.x_density as i32;
        if density <= 0 {
            return;
        }
        let (cx, cy, cw, ch) = crop_i32(img);
        let (cx1, cy1) = (cx + cw, cy + ch);

        let border = (((cw - 1) % density + 1) / 2).min(cw / 2);
        let mut x = cx + border;
        self.dx = 0;

        while x < cx1 {
            trace!(x, "img_y+");
            self.v = x;
            self.dy = 1;
            self.du = 1;
            self.umin = cy;
            for y in cy..cy1 {
                self.scan_sample(img.pixel(x as u32, y as u32));
            }
            self.quiet_border();

            match x.checked_add(density) {
                Some(next) if next < cx1 => x = next,
                _ => break,
            }

            trace!(x, "img_y-");
            self.v = x;
            self.dy = -1;
            self.du = -1;
            self.umin = cy1;
            for y in (cy..cy1).rev() {
                self.scan_sample(img.pixel(x as u32, y as u32));
            }
            self.quiet_border();

            match x.checked_add(density) {
                Some(next) => x = next,
                None => break,
            }
        }
        self.dy = 0;
    }

    #[inline]
    fn scan_sample(&mut self, y: u8) {
        if let Some(w) = self.scn.scan_pixel(y.into()) {
            self.decode(w);
        }
    }

    #[inline]
    fn decode(&mut self, w: u32) {
        let sym = self.dcode.decode_width(w);
        if sym > SymbolType::Partial {
            self.symbol_handler(sym);
        }
    }

    /// Flush the scanner pipeline at the end of a scan line
    fn quiet_border(&mut self) {
        while let Some(w) = self.scn.flush() {
            self.decode(w);
        }
        self.scn.new_scan();
        self.dcode.new_scan();
    }

    /// Record a symbol completed by the decoder on the current line
    fn symbol_handler(&mut self, ty: SymbolType) {
        if ty == SymbolType::QrCode {
            self.qr_handler();
            return;
        }

        let position = self.config.position_tracking;
        let (x, y) = if position {
            let w = self.scn.width();
            let u = self.umin + self.du * self.scn.edge(w, 0) as i32;
            if self.dx != 0 {
                (u, self.v)
            } else {
                (self.v, u)
            }
        } else {
            (0, 0)
        };

        let data = self.dcode.data();
        if let Some(sym) = self.syms.find_mut(ty, data) {
            sym.quality += 1;
            if position {
                sym.add_point(x, y);
            }
            trace!(symbology = %ty, x, y, quality = sym.quality, "dup symbol");
            return;
        }

        let mut sym = Symbol::new(ty, data.to_vec());
        sym.configs = self.dcode.get_configs(ty);
        sym.modifiers = self.dcode.modifiers();
        if position {
            sym.add_point(x, y);
        }
        let dir = self.dcode.direction();
        if dir != 0 {
            sym.orientation = Orientation::from((self.dy != 0) as i32 + ((self.du ^ dir) & 2));
            sym.direction = dir * self.du;
        }
        trace!(symbology = %ty, x, y, "new symbol");
        self.syms.push(sym);
    }

    /// Convert the decoder's finder line to image coordinates and keep it
    #[cfg(feature = "qrcode")]
    fn qr_handler(&mut self) {
        let mut line = self.dcode.qrf.line;
        let edge = |offset: i32| self.scn.edge(offset as u32, QR_FINDER_SUBPREC) as i32;

        let u = edge(line.pos[0]);
        line.boffs = u - edge(line.boffs);
        line.len = edge(line.len);
        line.eoffs = edge(line.eoffs) - line.len;
        line.len -= u;

        let mut u = qr_fixed(self.umin, 0) + self.du * u;
        if self.du < 0 {
            std::mem::swap(&mut line.boffs, &mut line.eoffs);
            u -= line.len;
        }
        let vert = self.dx == 0;
        line.pos[vert as usize] = u;
        line.pos[!vert as usize] = qr_fixed(self.v, 1);

        self.qr.found_line(vert, line);
    }

    #[cfg(not(feature = "qrcode"))]
    fn qr_handler(&mut self) {}

    #[cfg(feature = "qrcode")]
    fn decode_qr(&mut self, img: &Image) {
        if !self.qr.has_candidates() {
            return;
        }
        let binary = self
            .dcode
            .get_configs(SymbolType::QrCode)
            .contains(Config::Binary);
        for sym in self.qr.decode(img, binary) {
            match self.syms.find_mut(sym.symbol_type, &sym.data) {
                Some(dup) => dup.quality += 1,
                None => self.syms.push(sym),
            }
        }
    }

    /// Drop symbols seen on too few scan lines to be trusted
    fn filter_symbols(&mut self) {
        let config = &self.config;
        self.syms.retain(|sym| {
            let keep = sym.quality > config.uncertainty(sym.symbol_type) as i32;
            if !keep {
                trace!(symbology = %sym.symbol_type, quality = sym.quality, "below uncertainty");
            }
            keep
        });

        // one row is one scan, so a single misread line must not count
        let filter =
            !self.enable_cache && (self.config.x_density == 1 || self.config.y_density == 1);
        if filter {
            self.syms.retain(|sym| {
                !needs_consistency(sym.symbol_type) || sym.quality >= CONSISTENCY
            });
        }
    }

    /// Combine a lone EAN/UPC symbol and a lone add-on into one composite
    fn merge_ean_addon(&mut self) {
        let is_main = |ty: SymbolType| ty.is_ean() && !ty.is_addon() && ty != SymbolType::Isbn10;
        let nean = self.syms.iter().filter(|s| is_main(s.symbol_type)).count();
        let naddon = self
            .syms
            .iter()
            .filter(|s| s.symbol_type.is_addon())
            .count();
        if nean != 1 || naddon != 1 {
            return;
        }

        let mut ean = None;
        let mut addon = None;
        let mut rest = Vec::new();
        for sym in self.syms.take() {
            if is_main(sym.symbol_type) {
                ean = Some(sym);
            } else if sym.symbol_type.is_addon() {
                addon = Some(sym);
            } else {
                rest.push(sym);
            }
        }
        let (Some(ean), Some(addon)) = (ean, addon) else {
            return;
        };

        let mut data = ean.data.clone();
        data.extend_from_slice(&addon.data);
        let mut composite = Symbol::new(SymbolType::Composite, data);
        composite.orientation = ean.orientation;
        composite.direction = ean.direction;
        composite.quality = ean.quality.min(addon.quality);
        composite.points = ean.points.iter().chain(&addon.points).copied().collect();
        debug!(
            ean = %ean.symbol_type,
            addon = %addon.symbol_type,
            "merged EAN add-on"
        );
        composite.components = Some(SymbolSet::from(vec![ean, addon]));

        rest.push(composite);
        self.syms = SymbolSet::from(rest);
    }

    /// Suppress symbols reported within the cache window
    fn apply_cache(&mut self) {
        let frame = self.frame;
        let window = self.config.cache_window as u64;
        self.cache
            .retain(|_, entry| frame - entry.last_seen <= window);

        let cache = &mut self.cache;
        self.syms.retain(|sym| {
            let key = (sym.symbol_type, sym.data.clone());
            match cache.get_mut(&key) {
                Some(entry) => {
                    entry.last_seen = frame;
                    entry.count += 1;
                    trace!(symbology = %sym.symbol_type, count = entry.count, "cache hit, suppressed");
                    false
                }
                None => {
                    cache.insert(
                        key,
                        CacheEntry {
                            last_seen: frame,
                            count: 0,
                        },
                    );
                    true
                }
            }
        });
    }
}

/// Symbologies whose short patterns are easily misread from a single line
fn needs_consistency(ty: SymbolType) -> bool {
    ty.is_ean() || matches!(ty, SymbolType::Databar | SymbolType::DatabarExp | SymbolType::Codabar)
}

fn crop_i32(img: &Image) -> (i32, i32, i32, i32) {
    let (x, y, w, h) = img.crop();
    (x as i32, y as i32, w as i32, h as i32)
}
