/// Shared helpers for synthetic test signals.
use ndarray::{Array1, Array3, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f32::consts::PI;

#[allow(unused)]
/// `[B, C, T]` batch of `amp · sin(2π f t / fs)` plus white Gaussian noise.
pub fn sine_plus_noise(
    shape: (usize, usize, usize),
    freq: f32,
    sfreq: f32,
    amp: f32,
    noise_std: f32,
    seed: u64,
) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0_f32, noise_std).unwrap();
    Array3::from_shape_fn(shape, |(_, _, t)| {
        amp * (2.0 * PI * freq * t as f32 / sfreq).sin() + noise.sample(&mut rng)
    })
}

#[allow(unused)]
/// `[B, C, T]` white Gaussian noise with per-channel standard deviation.
pub fn white_noise(shape: (usize, usize, usize), std_per_channel: &[f32], seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let unit = Normal::new(0.0_f32, 1.0).unwrap();
    Array3::from_shape_fn(shape, |(_, c, _)| std_per_channel[c] * unit.sample(&mut rng))
}

#[allow(unused)]
/// 1-D pure sine.
pub fn sine(n: usize, freq: f32, sfreq: f32) -> Array1<f32> {
    Array1::from_shape_fn(n, |t| (2.0 * PI * freq * t as f32 / sfreq).sin())
}

#[allow(unused)]
/// Index of the largest value.
pub fn argmax(x: ArrayView1<f32>) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

#[allow(unused)]
/// Maximum absolute difference between two arrays of equal shape.
pub fn max_abs_diff<D: ndarray::Dimension>(a: &ndarray::Array<f32, D>, b: &ndarray::Array<f32, D>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f32, f32::max)
}

#[allow(unused)]
/// Unique path in the system temp dir for a test artefact.
pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("tmanorm_{}_{name}", std::process::id()))
}
