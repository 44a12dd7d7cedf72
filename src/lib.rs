//! # tmanorm — spectral domain-adaptation normalization for EEG batches
//!
//! Recordings from different sites and devices carry systematically
//! different power spectra.  `tmanorm` implements *temporal moving-average
//! normalization*: every batch is filtered so that each channel's power
//! spectrum moves toward a running Wasserstein barycenter of all spectra
//! seen so far, before the batch reaches a sleep-staging classifier.
//!
//! ## Pipeline overview
//!
//! ```text
//! x [B, C, T]
//!   │
//!   ├─ spectral::welch_psd()        rectangular Welch, L = filter_size → psd [B, C, L/2+1]
//!   ├─ BarycenterTracker::update()  bary = EMA((mean_b sqrt(psd))²)    → bary [C, L/2+1]
//!   ├─ filter::build_kernel()       irfft(sqrt(bary/psd)), shift, flip → h [B, C, L]
//!   └─ filter::conv1d_same_grouped() per-sample, per-channel "same" conv
//!        │
//!        └─→ filtered x [B, C, T]  (same shape, forwarded to the encoder)
//! ```
//!
//! ## Quick start
//!
//! ```
//! use ndarray::Array3;
//! use tmanorm::{Normalizer, NormConfig};
//!
//! let cfg = NormConfig { filter_size: 64, ..NormConfig::default() };
//! let mut before_encoder = Normalizer::from_config(&cfg).unwrap();
//! let mut after_encoder  = Normalizer::from_config(&cfg).unwrap();  // independent state
//!
//! let x: Array3<f32> = Array3::from_shape_fn((8, 2, 3000), |(b, c, t)| {
//!     ((t as f32) * 0.1 * (1 + c) as f32).sin() * (1.0 + b as f32)
//! });
//! let y = before_encoder.apply(x.view()).unwrap();
//! assert_eq!(y.dim(), x.dim());
//! assert!(!after_encoder.is_initialized());
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use ndarray::{Array3, Axis};
//! use tmanorm::spectral::{welch_psd, WindowKind};
//! use tmanorm::barycenter::BarycenterTracker;
//! use tmanorm::filter::{build_kernel, conv1d_same_grouped};
//!
//! let x = Array3::<f32>::from_shape_fn((4, 2, 512), |(b, c, t)| ((t * (b + c + 1)) as f32 * 0.05).sin());
//! let (_freqs, psd) = welch_psd(x.view(), 1.0, 128, None, WindowKind::Rectangular, Axis(2)).unwrap();
//!
//! let mut tracker = BarycenterTracker::new(0.1).unwrap();
//! let bary = tracker.update(psd.view()).unwrap().to_owned();
//!
//! let h = build_kernel(psd.view(), bary.view(), 128, None).unwrap();
//! let y = conv1d_same_grouped(x.view(), h.view()).unwrap();
//! assert_eq!(y.dim(), (4, 2, 512));
//! ```
//!
//! ## Numerical degeneracy
//!
//! A channel whose PSD is exactly zero (e.g. a flat-lined electrode) while
//! the barycenter is not makes the transfer function infinite.  This is
//! *not* guarded: NaN/Inf reach the output so the caller can decide what to
//! do.  The one exception is a DC bin where both are zero, which passes
//! with unit gain.  Use
//! [`normalizer::ensure_finite`] for a hard failure, or
//! [`NormConfig::psd_floor`] to clamp the PSD.

pub mod barycenter;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod io;
pub mod normalizer;
pub mod spectral;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{NormConfig, WelchConfig};

// error
pub use error::{Result, TmaError};

// spectral
pub use spectral::{rfft_freqs, welch_psd, WelchPlan, WindowKind};

// barycenter
pub use barycenter::{batch_barycenter, BarycenterTracker};

// filter
pub use filter::{build_kernel, conv1d_same, conv1d_same_grouped, transfer_function};

// normalizer
pub use normalizer::{ensure_finite, Normalizer};

// dataset
pub use dataset::{SequenceDataset, WindowMeta};

// io
pub use io::{load_barycenter, save_barycenter, NormState, SignalBatch, StWriter};

use ndarray::{Array1, Array3, ArrayView3, Axis};

/// PSD of a `[B, C, T]` batch under `cfg`, along the time axis.
///
/// Convenience wrapper over [`welch_psd`] for diagnostics, e.g. comparing
/// spectra before and after normalization.
///
/// ```
/// use ndarray::Array3;
/// use tmanorm::{batch_psd, WelchConfig};
///
/// let x = Array3::<f32>::zeros((2, 2, 300));
/// let (freqs, psd) = batch_psd(x.view(), &WelchConfig::default()).unwrap();
/// assert_eq!((freqs.len(), psd.dim()), (65, (2, 2, 65)));
/// ```
pub fn batch_psd(batch: ArrayView3<f32>, cfg: &WelchConfig) -> Result<(Array1<f32>, Array3<f32>)> {
    welch_psd(
        batch,
        cfg.sampling_rate,
        cfg.segment_length,
        cfg.overlap,
        cfg.window,
        Axis(2),
    )
}
