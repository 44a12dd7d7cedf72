//! Normalizer and spectral-estimator configuration.
//!
//! [`NormConfig`] holds the tunables of one normalization stage and
//! [`WelchConfig`] those of a stand-alone PSD estimate.  All fields have
//! defaults matching the values used for sleep-staging experiments.
use crate::error::{Result, TmaError};
use crate::spectral::WindowKind;

/// Configuration of a single [`Normalizer`](crate::Normalizer) stage.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use tmanorm::NormConfig;
///
/// let cfg = NormConfig {
///     filter_size: 16,   // short kernel, as used inside an encoder
///     ..NormConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Welch segment length `L`, which is also the number of kernel taps.
    ///
    /// The PSD has `L / 2 + 1` frequency bins.  Every input batch must have
    /// at least `L` time samples.
    ///
    /// Default: `128`.
    pub filter_size: usize,

    /// EMA weight given to each new batch barycenter, in `(0, 1]`.
    ///
    /// `1.0` disables smoothing: the reference is always the current batch
    /// barycenter.
    ///
    /// Default: `0.1`.
    pub momentum: f32,

    /// Optional lower bound applied to the PSD before the transfer-function
    /// ratio is formed.
    ///
    /// `None` keeps the unguarded ratio: an all-zero channel yields
    /// non-finite kernel taps, which are propagated to the output for the
    /// caller to detect.
    ///
    /// Default: `None`.
    pub psd_floor: Option<f32>,
}

impl Default for NormConfig {
    /// 128-tap filter · momentum 0.1 · no PSD floor.
    fn default() -> Self {
        Self {
            filter_size: 128,
            momentum: 0.1,
            psd_floor: None,
        }
    }
}

impl NormConfig {
    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.filter_size < 2 {
            return Err(TmaError::config(format!(
                "filter_size must be >= 2, got {}",
                self.filter_size
            )));
        }
        if !(self.momentum > 0.0 && self.momentum <= 1.0) {
            return Err(TmaError::config(format!(
                "momentum must lie in (0, 1], got {}",
                self.momentum
            )));
        }
        if let Some(floor) = self.psd_floor {
            if !(floor.is_finite() && floor >= 0.0) {
                return Err(TmaError::config(format!(
                    "psd_floor must be finite and non-negative, got {floor}"
                )));
            }
        }
        Ok(())
    }

    /// Number of one-sided frequency bins, `filter_size / 2 + 1`.
    ///
    /// ```
    /// use tmanorm::NormConfig;
    /// assert_eq!(NormConfig::default().n_freqs(), 65);
    /// ```
    pub fn n_freqs(&self) -> usize {
        self.filter_size / 2 + 1
    }
}

/// Parameters of a stand-alone Welch PSD estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct WelchConfig {
    /// Segment length in samples.  Default: `128`.
    pub segment_length: usize,
    /// Overlap between segments; `None` means `segment_length / 2`.
    pub overlap: Option<usize>,
    /// Taper applied to every segment.  Default: [`WindowKind::Hann`].
    pub window: WindowKind,
    /// Sampling rate in Hz.  Default: `1.0`.
    pub sampling_rate: f32,
}

impl Default for WelchConfig {
    fn default() -> Self {
        Self {
            segment_length: 128,
            overlap: None,
            window: WindowKind::Hann,
            sampling_rate: 1.0,
        }
    }
}

impl WelchConfig {
    /// Overlap actually used, resolving the `None` default.
    pub fn effective_overlap(&self) -> usize {
        self.overlap.unwrap_or(self.segment_length / 2)
    }
}
