//! Adaptive filter design from a PSD and a reference barycenter.
//!
//! For every sample `b` and channel `c`:
//!   • transfer function  `D = sqrt(bary[c]) / sqrt(psd[b, c])`
//!   • impulse response   `h = irfft(D, n = L)`
//!   • centred response   `fftshift(h)` (zero lag moved to index `L/2`)
//!   • kernel             reversed centred response, ready for a
//!                        cross-correlation style `conv1d`
//!
//! The ratio is not guarded against a zero PSD unless a floor is given;
//! non-finite taps flow through to the caller.  The one exception is the DC
//! bin when both its target and its power are zero, which is always the
//! case for a rectangular-window PSD of mean-removed segments: it passes
//! with unit gain.
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{Result, TmaError};

/// Amplitude transfer function `sqrt(barycenter) / sqrt(psd)`, `[B, C, F]`.
///
/// `psd_floor`, when set, clamps the PSD from below before the division.
/// A DC bin with zero target and zero power gets gain `1`.  Anywhere else
/// zero power gives `inf` (positive target) or `NaN` (zero target).
pub fn transfer_function(
    psd: ArrayView3<f32>,
    barycenter: ArrayView2<f32>,
    psd_floor: Option<f32>,
) -> Result<Array3<f32>> {
    let (_, n_ch, n_freq) = psd.dim();
    if barycenter.dim() != (n_ch, n_freq) {
        return Err(TmaError::shape(&[n_ch, n_freq], barycenter.shape()));
    }
    let power = |p: f32| match psd_floor {
        Some(floor) => (p as f64).max(floor as f64),
        None => p as f64,
    };
    let target = barycenter.mapv(|v| (v as f64).sqrt());

    let mut d = Array3::<f32>::zeros(psd.raw_dim());
    for (mut d_b, psd_b) in d.axis_iter_mut(Axis(0)).zip(psd.axis_iter(Axis(0))) {
        Zip::from(&mut d_b)
            .and(&psd_b)
            .and(&target)
            .for_each(|d, &p, &t| *d = (t / power(p).sqrt()) as f32);
        // A silent DC bin over a silent target has nothing to reshape.
        if n_freq > 0 {
            for c in 0..n_ch {
                if power(psd_b[[c, 0]]) == 0.0 && target[[c, 0]] == 0.0 {
                    d_b[[c, 0]] = 1.0;
                }
            }
        }
    }
    Ok(d)
}

/// Inverse one-sided FFT of a real-valued spectrum to `n` real samples.
///
/// `spectrum` must hold `n / 2 + 1` bins; it is treated as the positive half
/// of a Hermitian spectrum with zero imaginary part.
pub fn irfft_real(spectrum: ArrayView1<f32>, n: usize) -> Result<Vec<f32>> {
    if n == 0 || spectrum.len() != n / 2 + 1 {
        return Err(TmaError::config(format!(
            "irfft of length {n} needs {} bins, got {}",
            n / 2 + 1,
            spectrum.len()
        )));
    }
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(n);
    let mut buf = vec![Complex::<f64>::default(); n];
    fill_hermitian(&mut buf, spectrum);
    ifft.process(&mut buf);
    let inv_n = 1.0 / n as f64;
    Ok(buf.iter().map(|c| (c.re * inv_n) as f32).collect())
}

/// Circular shift by `n / 2`: `out[(i + n/2) mod n] = x[i]`.
///
/// Matches `numpy.fft.fftshift` for a 1-D input.
pub fn fftshift(x: &[f32]) -> Vec<f32> {
    let n = x.len();
    let mut out = vec![0.0_f32; n];
    for (i, &v) in x.iter().enumerate() {
        out[(i + n / 2) % n] = v;
    }
    out
}

/// Per-sample, per-channel kernels `[B, C, L]` reshaping `psd` toward
/// `barycenter`.
///
/// # Errors
///
/// * [`TmaError::InvalidConfiguration`] if the PSD frequency axis is not
///   `filter_size / 2 + 1` long.
/// * [`TmaError::ShapeMismatch`] if `barycenter` is not `[C, F]`.
pub fn build_kernel(
    psd: ArrayView3<f32>,
    barycenter: ArrayView2<f32>,
    filter_size: usize,
    psd_floor: Option<f32>,
) -> Result<Array3<f32>> {
    let (n_batch, n_ch, n_freq) = psd.dim();
    if filter_size == 0 || n_freq != filter_size / 2 + 1 {
        return Err(TmaError::config(format!(
            "filter_size {filter_size} implies {} frequency bins, PSD has {n_freq}",
            filter_size / 2 + 1
        )));
    }
    let d = transfer_function(psd, barycenter, psd_floor)?;

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(filter_size);
    let mut buf = vec![Complex::<f64>::default(); filter_size];
    let mut scratch = vec![Complex::<f64>::default(); ifft.get_inplace_scratch_len()];
    let inv_n = 1.0 / filter_size as f64;
    let half = filter_size / 2;

    let mut kernel = Array3::<f32>::zeros((n_batch, n_ch, filter_size));
    Zip::from(kernel.lanes_mut(Axis(2)))
        .and(d.lanes(Axis(2)))
        .for_each(|mut k, spec| {
            fill_hermitian(&mut buf, spec);
            ifft.process_with_scratch(&mut buf, &mut scratch);
            // Shift then reverse: tap j holds h[(L − 1 − j − L/2) mod L].
            for (j, tap) in k.iter_mut().enumerate() {
                let shifted = filter_size - 1 - j;
                let src = (shifted + filter_size - half) % filter_size;
                *tap = (buf[src].re * inv_n) as f32;
            }
        });

    let n_bad = kernel.iter().filter(|v| !v.is_finite()).count();
    if n_bad > 0 {
        log::warn!("{n_bad} non-finite kernel taps (zero or near-zero PSD bins)");
    }
    Ok(kernel)
}

// Expand `n/2 + 1` real bins to a full length-`n` Hermitian spectrum.
fn fill_hermitian(buf: &mut [Complex<f64>], spectrum: ArrayView1<f32>) {
    let n = buf.len();
    buf.iter_mut().for_each(|c| *c = Complex::default());
    for (k, &v) in spectrum.iter().enumerate() {
        let c = Complex { re: v as f64, im: 0.0 };
        buf[k] = c;
        if k > 0 && n - k != k {
            buf[n - k] = c;
        }
    }
}
