//! Symbology marker types and their capability implementations
//!
//! Each supported symbology has a zero-sized type used to select it in the
//! [`DecoderConfig`](super::DecoderConfig) builder.

use super::*;

macro_rules! symbologies {
    ($($(#[$doc:meta])* $name:ident => $name_str:literal;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl Symbology for $name {
                const TYPE: SymbolType = SymbolType::$name;
                const NAME: &'static str = $name_str;
            }
        )*
    };
}

macro_rules! supports {
    ($cap:ident: $($name:ident),* $(,)?) => {
        $(impl $cap for $name {})*
    };
}

symbologies! {
    /// EAN-2 add-on (2-digit supplement)
    Ean2 => "EAN-2";
    /// EAN-5 add-on (5-digit supplement)
    Ean5 => "EAN-5";
    /// EAN-8 barcode
    Ean8 => "EAN-8";
    /// UPC-E barcode
    Upce => "UPC-E";
    /// ISBN-10 (legacy book code)
    Isbn10 => "ISBN-10";
    /// UPC-A barcode
    Upca => "UPC-A";
    /// EAN-13 barcode
    Ean13 => "EAN-13";
    /// ISBN-13 (book code)
    Isbn13 => "ISBN-13";
    /// Interleaved 2 of 5
    I25 => "Interleaved 2 of 5";
    /// GS1 DataBar (RSS-14)
    Databar => "DataBar";
    /// GS1 DataBar Expanded
    DatabarExp => "DataBar Expanded";
    Codabar => "Codabar";
    Code39 => "Code 39";
    QrCode => "QR Code";
    Code93 => "Code 93";
    Code128 => "Code 128";
}

supports!(SupportsEnable:
    Ean2, Ean5, Ean8, Upce, Isbn10, Upca, Ean13, Isbn13,
    I25, Databar, DatabarExp, Codabar, Code39, QrCode, Code93, Code128,
);

supports!(SupportsChecksum:
    Ean2, Ean5, Ean8, Upce, Isbn10, Upca, Ean13, Isbn13,
    Databar, DatabarExp, Codabar, Code39, Code93, Code128,
);

supports!(SupportsLengthLimits: I25, Codabar, Code39, Code93, Code128);

supports!(SupportsBinary: QrCode);

supports!(SupportsUncertainty:
    Ean2, Ean5, Ean8, Upce, Isbn10, Upca, Ean13, Isbn13,
    I25, Databar, DatabarExp, Codabar, Code39, QrCode, Code93, Code128,
);
