//! "Same"-length direct convolution with per-sample, per-channel kernels.
//!
//! Follows the deep-learning `conv1d` convention, which is a
//! cross-correlation:
//!
//! ```text
//! left  = (K − 1) / 2,  right = K − 1 − left   (zero padding)
//! y[t]  = Σ_k w[k] · x[t + k − left]
//! ```
//!
//! Kernels produced by [`build_kernel`](super::build_kernel) are already
//! time-reversed, so the result is a true convolution with the centred
//! impulse response.
use ndarray::{Array3, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};

use crate::error::{Result, TmaError};

/// Filter one signal with one kernel; output has the length of `x`.
pub fn conv1d_same(x: &[f32], w: &[f32]) -> Vec<f32> {
    let mut y = vec![0.0_f32; x.len()];
    correlate_into(
        ArrayView1::from(x),
        ArrayView1::from(w),
        ArrayViewMut1::from(&mut y[..]),
    );
    y
}

/// Apply `kernels[b, c, :]` to `batch[b, c, :]` for every sample and channel.
///
/// Equivalent to one grouped convolution with `groups = n_channels` per
/// sample; channels never mix.
///
/// # Errors
///
/// [`TmaError::ShapeMismatch`] if the batch and channel axes of `kernels`
/// differ from those of `batch`.
pub fn conv1d_same_grouped(batch: ArrayView3<f32>, kernels: ArrayView3<f32>) -> Result<Array3<f32>> {
    let (n_batch, n_ch, _) = batch.dim();
    let (k_batch, k_ch, _) = kernels.dim();
    if (n_batch, n_ch) != (k_batch, k_ch) {
        return Err(TmaError::shape(&[n_batch, n_ch], &[k_batch, k_ch]));
    }

    let mut out = Array3::<f32>::zeros(batch.raw_dim());
    Zip::from(out.lanes_mut(Axis(2)))
        .and(batch.lanes(Axis(2)))
        .and(kernels.lanes(Axis(2)))
        .for_each(|y, x, w| correlate_into(x, w, y));
    Ok(out)
}

fn correlate_into(x: ArrayView1<f32>, w: ArrayView1<f32>, mut y: ArrayViewMut1<f32>) {
    let n_x = x.len();
    let n_w = w.len();
    if n_w == 0 {
        y.fill(0.0);
        return;
    }
    let left = (n_w - 1) / 2;

    for (t, out) in y.iter_mut().enumerate() {
        // Valid taps: 0 <= t + k − left < n_x.
        let k_lo = left.saturating_sub(t);
        let k_hi = n_w.min(n_x + left - t);
        let mut acc = 0.0_f64;
        for k in k_lo..k_hi {
            acc += w[k] as f64 * x[t + k - left] as f64;
        }
        *out = acc as f32;
    }
}
