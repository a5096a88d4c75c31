//! End-to-end sample runs with verification enabled.
//!
//! These tests drive the real device through the public API. On hosts
//! without a usable adapter every run reports a GPU error and the test
//! skips.

use helios_rs::samples::{
    BinarySearchSample, ConcurrentKernelSample, ImageFilterSample, MatrixMulSample,
    TransferSample, UnsharpMaskSample,
};
use helios_rs::{run_sample, Config, Error, Sample};

fn run_verified<S: Sample>(mut sample: S, config: &Config) {
    match run_sample(&mut sample, config) {
        Ok(report) => {
            assert_eq!(report.iterations, config.iterations);
            assert_eq!(report.metrics.dispatches, config.iterations as u64);
            assert_eq!(report.metrics.verify_failures, 0);
        }
        // Requires a GPU, so it may be skipped in CI
        Err(Error::Gpu(_)) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn binary_search_verifies() {
    let config = Config::builder()
        .size(1 << 16)
        .iterations(3)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(BinarySearchSample::new(), &config);
}

#[test]
fn binary_search_handles_absent_key() {
    // Generated values stay far below u32::MAX, so this key cannot be
    // present and both sides must agree on "not found".
    let config = Config::builder()
        .size(1 << 14)
        .key(u32::MAX)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(BinarySearchSample::new(), &config);
}

#[test]
fn transfer_strategies_verify() {
    let config = Config::builder()
        .size(1 << 14)
        .kernels(4)
        .streams(2)
        .iterations(2)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(TransferSample::new(), &config);
}

#[test]
fn concurrent_kernels_verify() {
    let config = Config::builder()
        .kernels(4)
        .workgroups(16)
        .streams(4)
        .iterations(2)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(ConcurrentKernelSample::new(), &config);
}

#[test]
fn unsharp_mask_verifies() {
    let config = Config::builder()
        .radius(2)
        .amount(1.5)
        .threshold(2.0)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(UnsharpMaskSample::new(), &config);
}

#[test]
fn image_filter_verifies() {
    let config = Config::builder()
        .iterations(2)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(ImageFilterSample::new(), &config);
}

#[test]
fn matrix_mul_verifies() {
    let config = Config::builder()
        .size(64)
        .iterations(2)
        .verify(true)
        .quiet(true)
        .build()
        .unwrap();
    run_verified(MatrixMulSample::new(), &config);
}

#[test]
fn dump_stats_writes_report() {
    let path = std::env::temp_dir().join("helios_integration_stats.json");
    let _ = std::fs::remove_file(&path);

    let config = Config::builder()
        .size(1 << 12)
        .quiet(true)
        .dump_stats(&path)
        .build()
        .unwrap();
    match run_sample(&mut BinarySearchSample::new(), &config) {
        Ok(_) => {
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text.contains("\"sample\": \"BinarySearch\""));
            let _ = std::fs::remove_file(&path);
        }
        // Requires a GPU, so it may be skipped in CI
        Err(Error::Gpu(_)) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn invalid_config_rejected_before_device_work() {
    assert!(matches!(
        Config::builder().streams(0).build(),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Config::builder().size(0).build(),
        Err(Error::Config(_))
    ));
}

#[test]
fn image_output_round_trips() {
    let out = std::env::temp_dir().join("helios_integration_filter.png");
    let _ = std::fs::remove_file(&out);

    let config = Config::builder().quiet(true).build().unwrap();
    let mut sample = ImageFilterSample::new();
    match run_sample(&mut sample, &config) {
        Ok(_) => {
            sample.save_output(&out).unwrap();
            let loaded = helios_rs::samples::image_io::load_rgba(&out).unwrap();
            assert_eq!(loaded.width, 512);
            assert_eq!(loaded.height, 512);
            let _ = std::fs::remove_file(&out);
        }
        // Requires a GPU, so it may be skipped in CI
        Err(Error::Gpu(_)) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}
