//! Criterion benches for the host-side reference implementations.
//!
//! The references run on every verified sample iteration, so their cost
//! bounds how large a verified run can reasonably get.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use helios_rs::samples::binary_search::{cpu_binary_search, generate_sorted_input};
use helios_rs::samples::concurrent::{cpu_hash, HASH_ROUNDS};
use helios_rs::samples::image_filter::cpu_sepia_mirror;
use helios_rs::samples::image_io::synth_rgba;
use helios_rs::samples::matrix_mul::cpu_matrix_mul;
use helios_rs::samples::transfer::cpu_transfer;
use helios_rs::samples::unsharp_mask::{cpu_unsharp_mask, gaussian_1d, gaussian_2d};

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    for size in [1usize << 12, 1 << 16, 1 << 20] {
        let data = generate_sorted_input(size, 42);
        let key = data[size / 3];

        group.bench_with_input(BenchmarkId::new("binary", size), &key, |b, &key| {
            b.iter(|| cpu_binary_search(black_box(&data), black_box(key)))
        });
        group.bench_with_input(BenchmarkId::new("linear", size), &key, |b, &key| {
            b.iter(|| black_box(&data).iter().position(|&v| v == key))
        });
    }
    group.finish();
}

fn bench_element_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_kernels");
    let input: Vec<u32> = (0..1u32 << 16).map(|v| v % 256).collect();

    group.bench_function("transfer_64k", |b| {
        b.iter(|| cpu_transfer(black_box(&input), black_box(3)))
    });
    group.bench_function("hash_64k", |b| {
        b.iter(|| {
            black_box(&input)
                .iter()
                .map(|&v| cpu_hash(v, 0x9E37_79B9, HASH_ROUNDS))
                .collect::<Vec<u32>>()
        })
    });
    group.finish();
}

fn bench_image_references(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_references");
    group.sample_size(20);
    let image = synth_rgba(256, 256, 42);

    group.bench_function("sepia_mirror_256", |b| {
        b.iter(|| cpu_sepia_mirror(black_box(&image)))
    });
    for radius in [2u32, 8] {
        group.bench_with_input(
            BenchmarkId::new("unsharp_256", radius),
            &radius,
            |b, &radius| b.iter(|| cpu_unsharp_mask(black_box(&image), radius, 0.8, 1.0)),
        );
    }
    group.bench_function("gaussian_weights_r8", |b| {
        b.iter(|| (gaussian_1d(black_box(8)), gaussian_2d(black_box(8))))
    });
    group.finish();
}

fn bench_matrix_mul(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_mul");
    group.sample_size(10);
    for dim in [64usize, 128] {
        let a: Vec<f32> = (0..dim * dim).map(|v| (v % 97) as f32 / 97.0).collect();
        let b_mat: Vec<f32> = (0..dim * dim).map(|v| (v % 89) as f32 / 89.0).collect();
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, &dim| {
            b.iter(|| cpu_matrix_mul(black_box(&a), black_box(&b_mat), dim, dim, dim))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_search,
    bench_element_kernels,
    bench_image_references,
    bench_matrix_mul
);
criterion_main!(benches);
