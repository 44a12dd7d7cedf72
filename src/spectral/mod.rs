//! Windowed power-spectral-density estimation.
//!
//! - [`window`]: taper coefficients (rectangular, symmetric Hamming, symmetric
//!   Hann), matching `torch.*_window(periodic=False)`.
//! - [`welch`]: Welch's averaged periodogram over any axis of an N-D array,
//!   with per-segment mean removal and one-sided density scaling.

pub mod welch;
pub mod window;

pub use welch::{rfft_freqs, welch_psd, WelchPlan};
pub use window::{hamming, hann, WindowKind};
