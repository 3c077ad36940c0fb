//! Integration tests for scanning rendered linear barcodes
//!
//! Each test draws an EAN-13 symbol, with or without an add-on, from its
//! bar/space widths, optionally rotates it with the `image` crate, and runs
//! it through the image scanner.

use image::{imageops, GrayImage, Luma};
use zedscan::{Config, Image, ImageScanner, Orientation, SymbolType};

/// EAN-13 "6268964977804", leading and trailing quiet zones included
const EAN13: &str = "9 111 212241113121211311141132 11111 311213121312121332111132 111 9";

/// ISBN 978-0-306-40615-7 followed by the EAN-5 add-on "52495"
const ISBN_EAN5: &str = "9 111 1312 3121 1123 1411 1123 1114 11111 1132 3211 1114 2221 1231 1312 111 \
                         9 112 1321 11 2122 11 2311 11 3112 11 1231 9";

/// Draw a width string, starting with a space, `module` pixels per unit
fn render(widths: &str, module: u32, rows: u32) -> GrayImage {
    let mut line = Vec::new();
    let mut color = 255u8;
    for w in widths.chars().filter_map(|c| c.to_digit(10)) {
        line.extend(std::iter::repeat(color).take((w * module) as usize));
        color = 255 - color;
    }
    let width = line.len() as u32 + 20 * module;
    let margin = 10 * module;

    GrayImage::from_fn(width, rows, |x, _| {
        let i = x.wrapping_sub(margin) as usize;
        Luma([line.get(i).copied().unwrap_or(255)])
    })
}

fn to_image(gray: &GrayImage) -> Image {
    Image::from_gray(gray.as_raw(), gray.width(), gray.height()).expect("valid buffer")
}

#[test]
fn test_scan_ean13() {
    let mut scanner = ImageScanner::new();
    let mut img = to_image(&render(EAN13, 2, 16));

    let n = scanner.scan(&mut img).unwrap();
    assert_eq!(n, 1);

    let symbols = img.symbols().expect("scan attaches results");
    let sym = &symbols[0];
    assert_eq!(sym.symbol_type(), SymbolType::Ean13);
    assert_eq!(sym.data_string(), Some("6268964977804"));
    assert!(sym.quality() >= 3);
    assert_eq!(sym.orientation(), Orientation::Up);
    assert!(sym.components().is_none());

    // every point lies on one of the scanned rows, inside the frame
    for &(x, y) in sym.points() {
        assert!((0..img.width() as i32).contains(&x), "x = {x}");
        assert!((0..img.height() as i32).contains(&y), "y = {y}");
    }
}

#[test]
fn test_orientation_all_variants() {
    let upright = render(EAN13, 2, 16);

    let cases = [
        ("none", upright.clone(), Orientation::Up),
        ("90 clockwise", imageops::rotate90(&upright), Orientation::Right),
        ("180", imageops::rotate180(&upright), Orientation::Down),
        ("270 clockwise", imageops::rotate270(&upright), Orientation::Left),
    ];

    for (name, gray, expected) in cases {
        let mut scanner = ImageScanner::new();
        let mut img = to_image(&gray);
        scanner.scan(&mut img).unwrap();

        let symbols = img.symbols().unwrap();
        assert_eq!(symbols.len(), 1, "no symbol at rotation {name}");
        assert_eq!(symbols[0].data(), b"6268964977804", "rotation {name}");
        assert_eq!(
            symbols[0].orientation(),
            expected,
            "wrong orientation at rotation {name}"
        );
    }
}

#[test]
fn test_crop_limits_scan() {
    // barcode on the top half, blank paper on the bottom half
    let barcode = render(EAN13, 2, 16);
    let mut gray = GrayImage::from_pixel(barcode.width(), 32, Luma([255]));
    imageops::replace(&mut gray, &barcode, 0, 0);

    let mut scanner = ImageScanner::new();
    let mut img = to_image(&gray);

    img.set_crop(0, 16, img.width(), 16);
    assert_eq!(scanner.scan(&mut img).unwrap(), 0);
    assert!(img.symbols().is_some_and(|s| s.is_empty()));

    img.set_crop(0, 0, img.width(), img.height());
    assert_eq!(scanner.scan(&mut img).unwrap(), 1);
    let sym = &img.symbols().unwrap()[0];
    assert!(sym.points().iter().all(|&(_, y)| y < 16));
}

#[test]
fn test_cache_reports_once() {
    let gray = render(EAN13, 2, 8);

    let mut scanner = ImageScanner::new();
    scanner.enable_cache(true);
    let counts: Vec<usize> = (0..4)
        .map(|_| scanner.scan(&mut to_image(&gray)).unwrap())
        .collect();
    assert_eq!(counts, [1, 0, 0, 0]);

    // re-enabling forgets what was cached
    scanner.enable_cache(true);
    assert_eq!(scanner.scan(&mut to_image(&gray)).unwrap(), 1);

    scanner.enable_cache(false);
    let counts: Vec<usize> = (0..3)
        .map(|_| scanner.scan(&mut to_image(&gray)).unwrap())
        .collect();
    assert_eq!(counts, [1, 1, 1]);
}

#[test]
fn test_disabled_symbology_is_not_reported() {
    let mut scanner = ImageScanner::new();
    scanner.parse_config("ean13.disable").unwrap();
    let mut img = to_image(&render(EAN13, 2, 8));
    scanner.scan(&mut img).unwrap();
    assert!(img
        .iter_symbols()
        .all(|s| s.symbol_type() != SymbolType::Ean13));

    scanner.restore_defaults();
    assert_eq!(
        scanner
            .get_config(Some(SymbolType::Ean13), Config::Enable)
            .unwrap(),
        1
    );
    assert_eq!(scanner.scan(&mut img).unwrap(), 1);
}

#[test]
fn test_sparse_rows() {
    // one row in four is still enough with the column passes off
    let mut scanner = ImageScanner::new();
    scanner.set_config(None, Config::XDensity, 0).unwrap();
    scanner.set_config(None, Config::YDensity, 4).unwrap();
    let mut img = to_image(&render(EAN13, 2, 16));
    assert_eq!(scanner.scan(&mut img).unwrap(), 1);
    assert!(img.symbols().unwrap()[0].quality() > 2);
}

#[test]
fn test_ean_addon_composite() {
    let mut scanner = ImageScanner::new();
    scanner.parse_config("ean5.enable").unwrap();
    let mut img = to_image(&render(ISBN_EAN5, 2, 16));
    scanner.scan(&mut img).unwrap();

    let symbols = img.symbols().unwrap();
    assert_eq!(symbols.len(), 1, "{symbols:?}");
    let sym = &symbols[0];
    assert_eq!(sym.symbol_type(), SymbolType::Composite);
    assert_eq!(sym.data_string(), Some("978030640615752495"));
    assert_eq!(sym.orientation(), Orientation::Up);
    assert_eq!(sym.direction(), 1);

    let parts: Vec<_> = sym
        .components()
        .expect("composite keeps its parts")
        .iter()
        .map(|c| (c.symbol_type(), c.data_string()))
        .collect();
    assert_eq!(
        parts,
        [
            (SymbolType::Ean13, Some("9780306406157")),
            (SymbolType::Ean5, Some("52495")),
        ]
    );
    assert_eq!(sym.component_count(), 2);
}

#[test]
fn test_addon_ignored_when_disabled() {
    let mut scanner = ImageScanner::new();
    let mut img = to_image(&render(ISBN_EAN5, 2, 16));
    scanner.scan(&mut img).unwrap();

    let symbols = img.symbols().unwrap();
    assert_eq!(symbols.len(), 1, "{symbols:?}");
    assert_eq!(symbols[0].symbol_type(), SymbolType::Ean13);
    assert_eq!(symbols[0].data_string(), Some("9780306406157"));
}
