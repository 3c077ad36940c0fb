use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma};
use qrcode::QrCode;
use zedscan::{Decoder, Image, ImageScanner, Scanner};

const EAN13: &str = "9 111 212241113121211311141132 11111 311213121312121332111132 111 9";

fn ean_line(module: usize) -> Vec<u8> {
    let mut line = vec![255u8; 10 * module];
    let mut color = 255u8;
    for w in EAN13.chars().filter_map(|c| c.to_digit(10)) {
        line.extend(std::iter::repeat(color).take(w as usize * module));
        color = 255 - color;
    }
    line.extend(std::iter::repeat(255).take(10 * module));
    line
}

// Synthetic frames, generated once per run
fn test_images() -> Vec<(&'static str, GrayImage)> {
    let line = ean_line(3);
    let ean = GrayImage::from_fn(line.len() as u32, 120, |x, _| Luma([line[x as usize]]));

    let qr = QrCode::new(b"https://example.com/zedscan/bench")
        .map(|code| {
            code.render::<Luma<u8>>()
                .module_dimensions(4, 4)
                .build()
        })
        .expect("payload fits in a QR code");

    let blank = GrayImage::from_pixel(640, 480, Luma([255]));

    vec![("ean13", ean), ("qr", qr), ("blank_vga", blank)]
}

fn benchmark_image_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_scanner");

    for (name, gray) in test_images() {
        let (width, height) = gray.dimensions();
        group.bench_with_input(BenchmarkId::from_parameter(name), &gray, |b, gray| {
            b.iter(|| {
                let mut img =
                    Image::from_gray(black_box(gray.as_raw()), black_box(width), black_box(height))
                        .unwrap();
                let mut scanner = ImageScanner::new();
                black_box(scanner.scan(&mut img).unwrap())
            });
        });
    }

    group.finish();
}

fn benchmark_line(c: &mut Criterion) {
    let line = ean_line(3);

    c.bench_function("scan_line/ean13", |b| {
        let mut scn = Scanner::new();
        let mut dcode = Decoder::new();
        b.iter(|| {
            let mut found = 0;
            for &y in black_box(&line) {
                if let Some(w) = scn.scan_pixel(y.into()) {
                    found += (dcode.decode_width(w) > zedscan::SymbolType::Partial) as u32;
                }
            }
            while let Some(w) = scn.flush() {
                found += (dcode.decode_width(w) > zedscan::SymbolType::Partial) as u32;
            }
            scn.new_scan();
            dcode.new_scan();
            black_box(found)
        });
    });
}

criterion_group!(benches, benchmark_image_scanner, benchmark_line);
criterion_main!(benches);
