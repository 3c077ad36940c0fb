//! Error types and handling

use crate::config::Config;
use crate::SymbolType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Symbology name in a config string did not match any known symbology
    #[error("unknown symbology: {0:?}")]
    UnknownSymbology(String),

    /// Option name in a config string did not match any known option
    #[error("unknown config option: {0:?}")]
    UnknownOption(String),

    #[error("invalid value {value:?} for config option {option:?}")]
    InvalidValue { option: String, value: String },

    /// The option exists but cannot be applied to this symbology, or the
    /// value is out of range for it
    #[error("config {config:?} is not supported for {symbology}")]
    UnsupportedConfig {
        symbology: SymbolType,
        config: Config,
    },

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid buffer size: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Frame dimensions need a buffer larger than the address space
    #[error("image too large: {width}x{height}")]
    ImageTooLarge { width: u32, height: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
