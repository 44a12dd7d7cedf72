//! Running Wasserstein barycenter of per-channel power spectra.
//!
//! For a batch of spectra `psd[b, c, f]` the batch barycenter is
//!
//! ```text
//! bary[c, f] = ( (1/B) · Σ_b sqrt(psd[b, c, f]) )²
//! ```
//!
//! and the tracker keeps an exponential moving average of it:
//! `stored = (1 − m) · stored + m · bary`, seeded with the first batch.
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use crate::error::{Result, TmaError};

/// Batch barycenter `(mean_b sqrt(psd))²`, shape `[C, F]`.
///
/// Fails on an empty batch.
pub fn batch_barycenter(psd: ArrayView3<f32>) -> Result<Array2<f32>> {
    let (n_batch, n_ch, n_freq) = psd.dim();
    if n_batch == 0 {
        return Err(TmaError::config("cannot compute a barycenter of an empty batch"));
    }
    let inv_b = 1.0 / n_batch as f64;
    let mut acc = Array2::<f64>::zeros((n_ch, n_freq));
    for sample in psd.axis_iter(Axis(0)) {
        acc.zip_mut_with(&sample, |a, &p| *a += (p as f64).sqrt());
    }
    Ok(acc.mapv(|s| {
        let m = s * inv_b;
        (m * m) as f32
    }))
}

/// Owns the running barycenter of one normalization stage.
#[derive(Debug, Clone)]
pub struct BarycenterTracker {
    momentum: f32,
    running: Option<Array2<f32>>,
}

impl BarycenterTracker {
    /// `momentum` must lie in `(0, 1]`.
    pub fn new(momentum: f32) -> Result<Self> {
        if !(momentum > 0.0 && momentum <= 1.0) {
            return Err(TmaError::config(format!(
                "momentum must lie in (0, 1], got {momentum}"
            )));
        }
        Ok(Self { momentum, running: None })
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn is_initialized(&self) -> bool {
        self.running.is_some()
    }

    /// Current running barycenter `[C, F]`, if any batch has been seen.
    pub fn barycenter(&self) -> Option<ArrayView2<'_, f32>> {
        self.running.as_ref().map(|b| b.view())
    }

    /// Fold a PSD batch `[B, C, F]` into the running barycenter and return
    /// the post-update value.
    pub fn update(&mut self, psd: ArrayView3<f32>) -> Result<ArrayView2<'_, f32>> {
        let (_, n_ch, n_freq) = psd.dim();
        if let Some(running) = &self.running {
            if running.dim() != (n_ch, n_freq) {
                return Err(TmaError::shape(running.shape(), &[n_ch, n_freq]));
            }
        }
        let new = batch_barycenter(psd)?;

        let m = self.momentum;
        let running = match self.running.take() {
            None => {
                log::debug!("barycenter initialised: {n_ch} channels × {n_freq} bins");
                new
            }
            Some(mut old) => {
                old.zip_mut_with(&new, |o, &n| *o = (1.0 - m) * *o + m * n);
                old
            }
        };
        Ok(self.running.insert(running).view())
    }

    /// Replace the running barycenter, e.g. when resuming from saved state.
    pub fn restore(&mut self, barycenter: Array2<f32>) -> Result<()> {
        if barycenter.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(TmaError::config(
                "restored barycenter must be finite and non-negative",
            ));
        }
        self.running = Some(barycenter);
        Ok(())
    }

    /// Drop the running barycenter; the next update re-seeds it.
    pub fn reset(&mut self) {
        self.running = None;
    }
}
