//! Image scanner configuration
//!
//! Type-safe configuration structures for the image scanner, replacing
//! bitfields and integer arrays with idiomatic Rust types. Decoder options are
//! forwarded to the [`Decoder`](crate::Decoder); the options here are the ones
//! only the image scanner interprets.

use crate::{config::Config, Error, Result, SymbolType};
use std::collections::HashMap;

/// Frames during which a reported symbol stays suppressed while caching
pub(crate) const DEFAULT_CACHE_WINDOW: u32 = 30;

/// Configuration options for the image scanner
#[derive(Debug, Clone)]
pub(crate) struct ImageScannerConfig {
    /// Position tracking enabled
    pub(crate) position_tracking: bool,

    /// Column stride of the vertical passes
    pub(crate) x_density: u32,

    /// Row stride of the horizontal passes
    pub(crate) y_density: u32,

    /// Result cache window, in frames
    pub(crate) cache_window: u32,

    /// Per-symbology uncertainty thresholds
    pub(crate) uncertainty: HashMap<SymbolType, u32>,
}

impl Default for ImageScannerConfig {
    fn default() -> Self {
        let mut config = Self {
            position_tracking: true,
            x_density: 1,
            y_density: 1,
            cache_window: DEFAULT_CACHE_WINDOW,
            uncertainty: HashMap::new(),
        };

        // Set default uncertainty values
        config.uncertainty.insert(SymbolType::Ean2, 2);
        config.uncertainty.insert(SymbolType::Ean5, 2);
        config.uncertainty.insert(SymbolType::Ean8, 2);
        config.uncertainty.insert(SymbolType::Ean13, 2);
        config.uncertainty.insert(SymbolType::Upca, 2);
        config.uncertainty.insert(SymbolType::Upce, 2);
        config.uncertainty.insert(SymbolType::Isbn10, 2);
        config.uncertainty.insert(SymbolType::Isbn13, 2);
        config.uncertainty.insert(SymbolType::I25, 2);
        config.uncertainty.insert(SymbolType::Databar, 2);
        config.uncertainty.insert(SymbolType::DatabarExp, 2);
        config.uncertainty.insert(SymbolType::Codabar, 1);
        config.uncertainty.insert(SymbolType::Code39, 0);
        config.uncertainty.insert(SymbolType::Code93, 0);
        config.uncertainty.insert(SymbolType::Code128, 0);
        config.uncertainty.insert(SymbolType::QrCode, 0);

        config
    }
}

impl ImageScannerConfig {
    /// Detections beyond the first needed before `sym` is reported
    pub(crate) fn uncertainty(&self, sym: SymbolType) -> u32 {
        self.uncertainty.get(&sym).copied().unwrap_or(0)
    }

    pub(crate) fn get(&self, sym: Option<SymbolType>, cfg: Config) -> Result<i32> {
        let unsupported = || Error::UnsupportedConfig {
            symbology: sym.unwrap_or_default(),
            config: cfg,
        };
        match (cfg, sym) {
            (Config::Uncertainty, Some(sym)) => self
                .uncertainty
                .get(&sym)
                .map(|&n| n as i32)
                .ok_or_else(unsupported),
            (Config::Position, None) => Ok(self.position_tracking as i32),
            (Config::XDensity, None) => Ok(self.x_density as i32),
            (Config::YDensity, None) => Ok(self.y_density as i32),
            _ => Err(unsupported()),
        }
    }

    /// Apply one scanner option; rejected requests change nothing
    pub(crate) fn set(&mut self, sym: Option<SymbolType>, cfg: Config, val: i32) -> Result<()> {
        let unsupported = || Error::UnsupportedConfig {
            symbology: sym.unwrap_or_default(),
            config: cfg,
        };
        let invalid = || Error::InvalidValue {
            option: format!("{cfg:?}"),
            value: val.to_string(),
        };
        let count = u32::try_from(val).map_err(|_| invalid())?;

        match (cfg, sym) {
            (Config::Uncertainty, None) => {
                self.uncertainty.values_mut().for_each(|n| *n = count);
            }
            (Config::Uncertainty, Some(sym)) => {
                *self.uncertainty.get_mut(&sym).ok_or_else(unsupported)? = count;
            }
            (Config::Position, None) => {
                if count > 1 {
                    return Err(invalid());
                }
                self.position_tracking = count != 0;
            }
            (Config::XDensity, None) => self.x_density = count,
            (Config::YDensity, None) => self.y_density = count,
            _ => return Err(unsupported()),
        }
        Ok(())
    }
}
