//! Per-symbology width-stream decoders
//!
//! Each module is a state machine driven from
//! [`Decoder::decode_width`](crate::Decoder::decode_width).

pub(crate) mod codabar;
pub(crate) mod code128;
pub(crate) mod code39;
pub(crate) mod code93;
pub(crate) mod databar;
pub(crate) mod ean;
pub(crate) mod i25;
