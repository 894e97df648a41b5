//! Component-level microbenchmarks for zdeflate.
//! Focuses on checksums, match comparison, and the deflater at each level.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zdeflate::compress::{adler32, crc32};
use zdeflate::{compress_zlib, deflate_raw, Deflater};

fn make_pattern(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    while out.len() < len {
        out.extend_from_slice(pattern);
    }
    out.truncate(len);
    out
}

fn make_random(len: usize, mut seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        out.push((seed >> 16) as u8);
    }
    out.truncate(len);
    out
}

/// Filtered RGB scanlines of a gradient, the usual input of the zlib writer.
fn gradient_rows(width: u32, height: u32) -> Vec<u8> {
    let mut rows = Vec::with_capacity(((width * 3 + 1) * height) as usize);
    for y in 0..height {
        rows.push(1);
        for x in 0..width {
            let r = ((x * 255) / width) as u8;
            let g = ((y * 255) / height) as u8;
            let b = (((x + y) * 127) / (width + height)) as u8;
            rows.extend_from_slice(&[r, g, b]);
        }
    }
    rows
}

fn bench_checksums(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksums");

    for size in [1024usize, 64 * 1024, 1 << 20] {
        let data = make_random(size, 0xC0FF_EE00);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("adler32", size), &data, |b, data| {
            b.iter(|| black_box(adler32(black_box(data))));
        });

        group.bench_with_input(BenchmarkId::new("crc32", size), &data, |b, data| {
            b.iter(|| black_box(crc32(black_box(data))));
        });
    }

    group.finish();
}

fn bench_match_length(c: &mut Criterion) {
    // Two copies of the same text, so every comparison runs to the cap.
    let mut data = make_pattern(4096);
    data.extend_from_slice(&make_pattern(4096));

    let mut group = c.benchmark_group("match_length");
    group.throughput(Throughput::Elements(256));

    group.bench_function("full_258", |b| {
        b.iter(|| {
            let mut total = 0;
            for i in 0..256 {
                total += zdeflate::simd::match_length(black_box(&data), i, 4096 + i, 258);
            }
            black_box(total)
        });
    });

    group.bench_function("fallback_full_258", |b| {
        b.iter(|| {
            let mut total = 0;
            for i in 0..256 {
                total +=
                    zdeflate::simd::fallback::match_length(black_box(&data), i, 4096 + i, 258);
            }
            black_box(total)
        });
    });

    group.finish();
}

fn bench_deflate_levels(c: &mut Criterion) {
    let inputs = [
        ("pattern", make_pattern(1 << 20)),
        ("random", make_random(1 << 20, 0x1234_5678)),
        ("gradient", gradient_rows(512, 512)),
    ];

    for (name, data) in &inputs {
        let mut group = c.benchmark_group(format!("deflate_{name}"));
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.sample_size(10);

        for level in [0u8, 1, 3, 6, 9] {
            group.bench_with_input(BenchmarkId::new("level", level), data, |b, data| {
                b.iter(|| black_box(deflate_raw(black_box(data), level).unwrap()));
            });
        }

        group.finish();
    }
}

fn bench_streaming_windows(c: &mut Criterion) {
    let data = gradient_rows(512, 256);

    let mut group = c.benchmark_group("deflater_output_window");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    for window in [512usize, 4096, 64 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(window), &data, |b, data| {
            let mut out = vec![0u8; window];
            let mut deflater = Deflater::new(6).unwrap();
            b.iter(|| {
                deflater.reset().unwrap();
                deflater.set_input(data, 0, data.len()).unwrap();
                deflater.finish().unwrap();
                let mut total = 0;
                while !deflater.is_finished() {
                    total += deflater.deflate(&mut out, 0, window).unwrap();
                }
                black_box(total)
            });
        });
    }

    group.finish();
}

fn bench_zlib(c: &mut Criterion) {
    let data = gradient_rows(512, 512);

    let mut group = c.benchmark_group("zlib_512_rgb");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("zdeflate_default", |b| {
        b.iter(|| black_box(compress_zlib(black_box(&data), 6).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_checksums,
    bench_match_length,
    bench_deflate_levels,
    bench_streaming_windows,
    bench_zlib
);
criterion_main!(benches);
