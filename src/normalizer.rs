//! Temporal moving-average spectral normalization.
//!
//! One [`Normalizer`] is one filtering stage.  Each call to
//! [`Normalizer::apply`]:
//!   1. estimates the PSD of every sample/channel (rectangular Welch,
//!      `L = filter_size`, 50 % overlap, unit sampling rate),
//!   2. folds the batch barycenter into the running barycenter,
//!   3. builds per-sample, per-channel kernels from `sqrt(bary / psd)`,
//!   4. filters the batch with a "same"-length grouped convolution.
//!
//! The output always has the shape of the input.
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::barycenter::BarycenterTracker;
use crate::config::NormConfig;
use crate::error::{Result, TmaError};
use crate::filter::{build_kernel, conv1d_same_grouped};
use crate::spectral::{WelchPlan, WindowKind};

/// Spectral normalization stage with its own running barycenter.
///
/// # Examples
///
/// ```
/// use ndarray::Array3;
/// use tmanorm::Normalizer;
///
/// let mut norm = Normalizer::new(64, 0.1).unwrap();
/// let x = Array3::<f32>::from_shape_fn((4, 2, 256), |(b, c, t)| {
///     ((t as f32) * 0.2 + (b + c) as f32).sin()
/// });
/// let y = norm.apply(x.view()).unwrap();
/// assert_eq!(y.dim(), x.dim());
/// assert!(norm.is_initialized());
/// ```
#[derive(Debug)]
pub struct Normalizer {
    config: NormConfig,
    plan: WelchPlan,
    tracker: BarycenterTracker,
}

impl Normalizer {
    /// Stage with `filter_size` taps and EMA `momentum` in `(0, 1]`.
    pub fn new(filter_size: usize, momentum: f32) -> Result<Self> {
        Self::from_config(&NormConfig {
            filter_size,
            momentum,
            ..NormConfig::default()
        })
    }

    pub fn from_config(config: &NormConfig) -> Result<Self> {
        config.validate()?;
        let plan = WelchPlan::new(config.filter_size, None, WindowKind::Rectangular, 1.0)?;
        let tracker = BarycenterTracker::new(config.momentum)?;
        Ok(Self {
            config: config.clone(),
            plan,
            tracker,
        })
    }

    pub fn config(&self) -> &NormConfig {
        &self.config
    }

    pub fn filter_size(&self) -> usize {
        self.config.filter_size
    }

    pub fn momentum(&self) -> f32 {
        self.config.momentum
    }

    /// `true` once the first batch has seeded the barycenter.
    pub fn is_initialized(&self) -> bool {
        self.tracker.is_initialized()
    }

    /// Running barycenter `[C, F]` for diagnostics or checkpointing.
    pub fn barycenter(&self) -> Option<ArrayView2<'_, f32>> {
        self.tracker.barycenter()
    }

    /// Resume from a saved barycenter; it must be `[C, filter_size/2 + 1]`.
    pub fn restore_barycenter(&mut self, barycenter: Array2<f32>) -> Result<()> {
        let n_freq = self.plan.n_freqs();
        if barycenter.ncols() != n_freq {
            return Err(TmaError::shape(
                &[barycenter.nrows(), n_freq],
                barycenter.shape(),
            ));
        }
        self.tracker.restore(barycenter)
    }

    /// Forget the running barycenter.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    /// PSD `[B, C, F]` as seen by this stage (rectangular window, unit rate).
    pub fn psd(&self, batch: ArrayView3<f32>) -> Result<Array3<f32>> {
        self.plan.psd(batch, Axis(2))
    }

    /// Filter `batch` (`[B, C, T]`), updating the running barycenter.
    ///
    /// # Errors
    ///
    /// * [`TmaError::InvalidConfiguration`] if `T < filter_size` or the
    ///   batch has no samples or no channels.
    /// * [`TmaError::ShapeMismatch`] if the channel count differs from the
    ///   batches seen before.
    ///
    /// A zero PSD bin is not an error: the affected outputs become NaN/Inf
    /// (see [`ensure_finite`]).
    pub fn apply(&mut self, batch: ArrayView3<f32>) -> Result<Array3<f32>> {
        let (n_batch, n_ch, n_times) = batch.dim();
        if n_batch == 0 || n_ch == 0 {
            return Err(TmaError::config(format!(
                "batch must have at least one sample and one channel, got [{n_batch}, {n_ch}, {n_times}]"
            )));
        }
        if n_times < self.config.filter_size {
            return Err(TmaError::config(format!(
                "filter_size ({}) exceeds time-axis length ({n_times})",
                self.config.filter_size
            )));
        }

        let psd = self.psd(batch)?;
        let kernel = {
            let bary = self.tracker.update(psd.view())?;
            build_kernel(psd.view(), bary, self.config.filter_size, self.config.psd_floor)?
        };
        let out = conv1d_same_grouped(batch, kernel.view())?;

        log::debug!(
            "normalised batch [{n_batch}, {n_ch}, {n_times}] with {}-tap kernels",
            self.config.filter_size
        );
        Ok(out)
    }
}

/// Fail with [`TmaError::NumericalDegeneracy`] if `data` holds NaN or Inf.
///
/// The normalizer deliberately does not guard the PSD ratio; callers that
/// want a hard failure run this on its output.
pub fn ensure_finite(data: ArrayView3<f32>) -> Result<()> {
    let n_bad = data.iter().filter(|v| !v.is_finite()).count();
    if n_bad > 0 {
        return Err(TmaError::NumericalDegeneracy(format!(
            "{n_bad} of {} values are non-finite",
            data.len()
        )));
    }
    Ok(())
}
