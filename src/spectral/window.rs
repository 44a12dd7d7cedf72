//! Segment tapers for the Welch estimator.
//!
//! Both cosine windows are the *symmetric* variants (denominator `N - 1`),
//! i.e. `scipy.signal.get_window(..., fftbins=False)`.
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::TmaError;

/// Taper applied to each Welch segment before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowKind {
    /// All ones (no tapering).  Used by the normalizer itself.
    #[default]
    Rectangular,
    /// `0.54 − 0.46 cos(2πn / (N−1))`
    Hamming,
    /// `0.5 − 0.5 cos(2πn / (N−1))`
    Hann,
}

impl WindowKind {
    /// Window coefficients of length `n`.
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        match self {
            WindowKind::Rectangular => vec![1.0; n],
            WindowKind::Hamming => hamming(n),
            WindowKind::Hann => hann(n),
        }
    }

    /// Canonical lowercase name, accepted back by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            WindowKind::Rectangular => "rectangular",
            WindowKind::Hamming => "hamming",
            WindowKind::Hann => "hann",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = TmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" | "ones" | "none" => Ok(WindowKind::Rectangular),
            "hamming" => Ok(WindowKind::Hamming),
            "hann" | "hanning" => Ok(WindowKind::Hann),
            other => Err(TmaError::config(format!("unsupported window type '{other}'"))),
        }
    }
}

/// Symmetric Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    generalized_cosine(n, 0.54, 0.46)
}

/// Symmetric Hann window of length `n`.
pub fn hann(n: usize) -> Vec<f64> {
    generalized_cosine(n, 0.5, 0.5)
}

// `a - b·cos(2πi/(n-1))`; a single-tap window is `[1.0]`.
fn generalized_cosine(n: usize, a: f64, b: f64) -> Vec<f64> {
    match n {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| a - b * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}
