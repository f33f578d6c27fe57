//! Benchmarks for text preparation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;
use txt2pdf_batch::converter::{normalize_text, text_blocks, TextDecoder};

fn sample_text() -> String {
    (0..2_000)
        .map(|i| {
            if i % 10 == 0 {
                "\r\n".to_string()
            } else {
                format!("line {i}: the quick brown fox jumps over the lazy dog, twice over\r\n")
            }
        })
        .collect()
}

fn benchmark_normalize(c: &mut Criterion) {
    let text = sample_text();

    c.bench_function("normalize_text", |b| {
        b.iter(|| black_box(normalize_text(black_box(&text))))
    });
}

fn benchmark_text_blocks(c: &mut Criterion) {
    let text = normalize_text(&sample_text());

    c.bench_function("text_blocks_64", |b| {
        b.iter(|| black_box(text_blocks(black_box(&text), 64)))
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let decoder = TextDecoder::default();
    let utf8 = sample_text().into_bytes();
    let mut latin1 = utf8.clone();
    latin1.extend_from_slice(&[0xE9, 0xFF, b'\n']);

    c.bench_function("decode_utf8", |b| {
        b.iter(|| black_box(decoder.decode(Path::new("bench.txt"), utf8.clone())))
    });

    c.bench_function("decode_fallback", |b| {
        b.iter(|| black_box(decoder.decode(Path::new("bench.txt"), latin1.clone())))
    });
}

criterion_group!(benches, benchmark_normalize, benchmark_text_blocks, benchmark_decode);
criterion_main!(benches);
