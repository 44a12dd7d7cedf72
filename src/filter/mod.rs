//! Adaptive FIR construction and application.
//!
//! - [`design`]: barycenter-to-PSD transfer function, inverse real FFT,
//!   centring shift and time reversal → one kernel per sample and channel.
//! - [`apply`]: "same"-length grouped convolution, matching a deep-learning
//!   `conv1d(padding="same", groups=n_channels)` applied sample by sample.

pub mod apply;
pub mod design;

pub use apply::{conv1d_same, conv1d_same_grouped};
pub use design::{build_kernel, fftshift, irfft_real, transfer_function};
