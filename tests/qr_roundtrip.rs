//! Property-based tests for QR code scanning
//!
//! Random payloads are encoded with the `qrcode` crate, rendered to a
//! grayscale image and scanned back through [`ImageScanner`].

#![cfg(feature = "qrcode")]

use image::{GrayImage, Luma};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use qrcode::QrCode;
use zedscan::{Config, Image, ImageScanner, Orientation, SymbolType};

/// Render a QR code with its quiet zone, four pixels per module
fn generate_qr_image(data: &[u8]) -> Option<GrayImage> {
    let code = QrCode::new(data).ok()?;
    Some(
        code.render::<Luma<u8>>()
            .quiet_zone(true)
            .module_dimensions(4, 4)
            .build(),
    )
}

/// A scanner that only looks for QR codes
fn qr_scanner() -> ImageScanner {
    let mut scanner = ImageScanner::new();
    scanner.set_config(None, Config::Enable, 0).unwrap();
    scanner
        .set_config(Some(SymbolType::QrCode), Config::Enable, 1)
        .unwrap();
    scanner
}

fn scan_qr(scanner: &mut ImageScanner, gray: &GrayImage) -> Result<Vec<Vec<u8>>, String> {
    let mut img = Image::from_gray(gray.as_raw(), gray.width(), gray.height())
        .map_err(|e| format!("failed to create image: {e}"))?;
    scanner
        .scan(&mut img)
        .map_err(|e| format!("scan failed: {e}"))?;

    let symbols = img.symbols().ok_or("no result set attached")?;
    if symbols.is_empty() {
        return Err("no symbols found".to_string());
    }
    Ok(symbols.iter().map(|s| s.data().to_vec()).collect())
}

#[test]
fn test_scan_qr_code() {
    let gray = generate_qr_image(b"Hello, zedscan!").unwrap();
    let mut img = Image::from_gray(gray.as_raw(), gray.width(), gray.height()).unwrap();

    ImageScanner::new().scan(&mut img).unwrap();

    let qr: Vec<_> = img
        .iter_symbols()
        .filter(|s| s.symbol_type() == SymbolType::QrCode)
        .collect();
    assert_eq!(qr.len(), 1);
    let sym = qr[0];
    assert_eq!(sym.data_string(), Some("Hello, zedscan!"));
    assert_eq!(sym.points().len(), 4);
    assert_eq!(sym.orientation(), Orientation::Up);

    // the polygon stays inside the frame
    for &(x, y) in sym.points() {
        assert!(x >= 0 && x <= gray.width() as i32, "x = {x}");
        assert!(y >= 0 && y <= gray.height() as i32, "y = {y}");
    }
}

#[test]
fn test_qr_disabled() {
    let gray = generate_qr_image(b"not today").unwrap();
    let mut img = Image::from_gray(gray.as_raw(), gray.width(), gray.height()).unwrap();
    let mut scanner = ImageScanner::new();
    scanner.parse_config("qrcode.enable=0").unwrap();
    scanner.scan(&mut img).unwrap();
    assert!(img
        .iter_symbols()
        .all(|s| s.symbol_type() != SymbolType::QrCode));
}

#[test]
fn test_qr_binary_mode() {
    // Latin-1 bytes that are not valid UTF-8
    let payload = b"caf\xe9";
    let gray = generate_qr_image(payload).unwrap();

    let mut scanner = qr_scanner();
    assert_eq!(
        scan_qr(&mut scanner, &gray).unwrap(),
        vec!["café".as_bytes().to_vec()]
    );

    scanner.parse_config("qrcode.binary").unwrap();
    assert_eq!(scan_qr(&mut scanner, &gray).unwrap(), vec![payload.to_vec()]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// ASCII text survives an encode/scan round trip
    #[test]
    fn prop_qr_roundtrip_ascii(data in "[a-zA-Z0-9 ]{1,100}") {
        let img = generate_qr_image(data.as_bytes())
            .ok_or_else(|| TestCaseError::fail("failed to generate QR code"))?;
        let decoded = scan_qr(&mut qr_scanner(), &img).map_err(TestCaseError::fail)?;

        prop_assert_eq!(decoded.len(), 1, "expected exactly one symbol");
        prop_assert_eq!(&decoded[0], data.as_bytes());
    }

    /// URL-shaped payloads come back unchanged
    #[test]
    fn prop_qr_roundtrip_urls(
        protocol in "(https?|ftp)",
        domain in "[a-z]{3,20}",
        tld in "(com|org|net|edu)",
        path in "[a-z0-9/]{0,30}",
    ) {
        let url = format!("{protocol}://{domain}.{tld}/{path}");
        let img = generate_qr_image(url.as_bytes())
            .ok_or_else(|| TestCaseError::fail("failed to generate QR code"))?;
        let decoded = scan_qr(&mut qr_scanner(), &img).map_err(TestCaseError::fail)?;

        prop_assert_eq!(decoded.len(), 1);
        prop_assert_eq!(decoded[0].as_slice(), url.as_bytes());
    }

    /// Bytes come back unchanged in binary mode
    ///
    /// High bytes are drawn from 0xa0..0xe0, which never start a Shift-JIS
    /// pair, so the encoder stays in byte mode.
    #[test]
    fn prop_qr_roundtrip_binary(
        data in prop::collection::vec(prop_oneof![0u8..0x80, 0xa0u8..0xe0], 1..64)
    ) {
        let img = generate_qr_image(&data)
            .ok_or_else(|| TestCaseError::fail("failed to generate QR code"))?;
        let mut scanner = qr_scanner();
        scanner.parse_config("qrcode.binary=1").map_err(|e| TestCaseError::fail(e.to_string()))?;
        let decoded = scan_qr(&mut scanner, &img).map_err(TestCaseError::fail)?;

        prop_assert_eq!(decoded.len(), 1);
        prop_assert_eq!(&decoded[0], &data);
    }
}
