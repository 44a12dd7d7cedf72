//! Welch's averaged-periodogram PSD estimator.
//!
//! Algorithm, applied independently to every 1-D lane along the chosen axis:
//!   1. Cut `⌊(T − O) / (L − O)⌋` segments of length `L`, step `L − O`.
//!   2. Remove each segment's mean, multiply by the window.
//!   3. One-sided FFT (`L/2 + 1` bins), `|X|² / (fs · Σw²)`.
//!   4. Double every bin except DC and, for even `L`, Nyquist.
//!   5. Average over segments.
//!
//! With a rectangular window the mean-removed segment has no DC component,
//! so bin 0 is stored as exactly `0.0` rather than as rounding residue.
//!
//! Arithmetic is carried out in `f64`; results are stored as `f32`.
use std::sync::Arc;

use ndarray::{Array, Array1, ArrayView, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{Result, TmaError};
use crate::spectral::window::WindowKind;

/// One-sided FFT frequency grid for an `n`-point transform at rate `fs`.
///
/// Equivalent to `numpy.fft.rfftfreq(n, d=1/fs)`.
pub fn rfft_freqs(n: usize, fs: f32) -> Array1<f32> {
    let df = fs as f64 / n as f64;
    Array1::from_iter((0..n / 2 + 1).map(|k| (k as f64 * df) as f32))
}

/// Precomputed window, scaling and FFT plan for repeated Welch estimates.
pub struct WelchPlan {
    segment_length: usize,
    overlap: usize,
    sampling_rate: f64,
    window: Vec<f64>,
    scaling: f64,
    // Detrended, untapered segments have no DC power.
    zero_dc: bool,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for WelchPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WelchPlan")
            .field("segment_length", &self.segment_length)
            .field("overlap", &self.overlap)
            .field("sampling_rate", &self.sampling_rate)
            .field("scaling", &self.scaling)
            .finish()
    }
}

impl WelchPlan {
    /// Build a plan; `overlap = None` means `segment_length / 2`.
    pub fn new(
        segment_length: usize,
        overlap: Option<usize>,
        window: WindowKind,
        sampling_rate: f32,
    ) -> Result<Self> {
        if segment_length == 0 {
            return Err(TmaError::config("segment_length must be > 0"));
        }
        let overlap = overlap.unwrap_or(segment_length / 2);
        if overlap >= segment_length {
            return Err(TmaError::config(format!(
                "overlap ({overlap}) must be smaller than segment_length ({segment_length})"
            )));
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(TmaError::config(format!(
                "sampling_rate must be positive and finite, got {sampling_rate}"
            )));
        }

        let zero_dc = window == WindowKind::Rectangular;
        let window = window.coefficients(segment_length);
        let scaling: f64 = window.iter().map(|w| w * w).sum();

        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fft = planner.plan_fft_forward(segment_length);

        Ok(Self {
            segment_length,
            overlap,
            sampling_rate: sampling_rate as f64,
            window,
            scaling,
            zero_dc,
            fft,
        })
    }

    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Number of one-sided frequency bins, `L / 2 + 1`.
    pub fn n_freqs(&self) -> usize {
        self.segment_length / 2 + 1
    }

    /// Frequency axis matching [`WelchPlan::psd`]'s output.
    pub fn freqs(&self) -> Array1<f32> {
        rfft_freqs(self.segment_length, self.sampling_rate as f32)
    }

    /// Number of segments a lane of `n_times` samples is cut into.
    ///
    /// Fails when the segment does not fit in the lane.
    pub fn n_segments(&self, n_times: usize) -> Result<usize> {
        if self.segment_length > n_times {
            return Err(TmaError::config(format!(
                "segment_length ({}) exceeds time-axis length ({n_times})",
                self.segment_length
            )));
        }
        let step = self.segment_length - self.overlap;
        Ok((n_times - self.overlap) / step)
    }

    /// PSD of `signal` along `axis`; the output has the same shape as the
    /// input except that `axis` has length [`n_freqs`](Self::n_freqs).
    pub fn psd<D: Dimension>(&self, signal: ArrayView<f32, D>, axis: Axis) -> Result<Array<f32, D>> {
        if axis.index() >= signal.ndim() {
            return Err(TmaError::config(format!(
                "axis {} out of range for a {}-D signal",
                axis.index(),
                signal.ndim()
            )));
        }
        let n_times = signal.len_of(axis);
        let n_segments = self.n_segments(n_times)?;

        let mut dim = signal.raw_dim();
        dim[axis.index()] = self.n_freqs();
        let mut out = Array::<f32, D>::zeros(dim);

        log::trace!(
            "welch: {} lanes × {n_segments} segments (L={}, O={})",
            signal.len() / n_times.max(1),
            self.segment_length,
            self.overlap
        );

        let mut scratch = LaneScratch::new(self);
        Zip::from(out.lanes_mut(axis))
            .and(signal.lanes(axis))
            .for_each(|o, x| self.lane_psd(x, o, n_segments, &mut scratch));

        Ok(out)
    }

    fn lane_psd(
        &self,
        x: ArrayView1<f32>,
        mut out: ArrayViewMut1<f32>,
        n_segments: usize,
        s: &mut LaneScratch,
    ) {
        let l = self.segment_length;
        let n_freqs = self.n_freqs();
        let step = l - self.overlap;
        let norm = 1.0 / (self.sampling_rate * self.scaling);
        // Bins [1, last_doubled) carry power from their negative-frequency twin.
        let last_doubled = if l % 2 == 0 { n_freqs - 1 } else { n_freqs };

        s.acc.iter_mut().for_each(|v| *v = 0.0);

        for seg in 0..n_segments {
            let start = seg * step;
            let segment = x.slice(ndarray::s![start..start + l]);
            let mean = segment.iter().map(|&v| v as f64).sum::<f64>() / l as f64;

            for ((b, &v), &w) in s.buf.iter_mut().zip(segment.iter()).zip(self.window.iter()) {
                *b = Complex { re: (v as f64 - mean) * w, im: 0.0 };
            }
            self.fft.process_with_scratch(&mut s.buf, &mut s.fft_scratch);

            for (k, (a, c)) in s.acc.iter_mut().zip(s.buf[..n_freqs].iter()).enumerate() {
                let mut p = c.norm_sqr() * norm;
                if k >= 1 && k < last_doubled {
                    p *= 2.0;
                }
                *a += p;
            }
        }

        if self.zero_dc {
            // Σ(x − mean) is zero; drop the rounding residue.
            s.acc[0] = 0.0;
        }
        let inv_n = 1.0 / n_segments as f64;
        for (o, &a) in out.iter_mut().zip(s.acc.iter()) {
            *o = (a * inv_n) as f32;
        }
    }
}

/// Per-call buffers reused across lanes.
struct LaneScratch {
    buf: Vec<Complex<f64>>,
    fft_scratch: Vec<Complex<f64>>,
    acc: Vec<f64>,
}

impl LaneScratch {
    fn new(plan: &WelchPlan) -> Self {
        Self {
            buf: vec![Complex::default(); plan.segment_length],
            fft_scratch: vec![Complex::default(); plan.fft.get_inplace_scratch_len()],
            acc: vec![0.0; plan.n_freqs()],
        }
    }
}

/// Welch PSD of `signal` along `axis`.
///
/// Returns `(frequencies, psd)` where `psd` has the shape of `signal` with
/// `axis` replaced by `segment_length / 2 + 1` frequency bins.
///
/// # Errors
///
/// [`TmaError::InvalidConfiguration`] if `segment_length` is zero or longer
/// than the time axis, `overlap >= segment_length`, `axis` is out of range,
/// or `sampling_rate` is not a positive finite number.
///
/// # Examples
///
/// ```
/// use ndarray::{Array3, Axis};
/// use tmanorm::spectral::{welch_psd, WindowKind};
///
/// let x = Array3::<f32>::from_shape_fn((2, 3, 512), |(_, _, t)| (t as f32 * 0.3).sin());
/// let (freqs, psd) = welch_psd(x.view(), 1.0, 128, None, WindowKind::Hann, Axis(2)).unwrap();
/// assert_eq!(freqs.len(), 65);
/// assert_eq!(psd.dim(), (2, 3, 65));
/// ```
pub fn welch_psd<D: Dimension>(
    signal: ArrayView<f32, D>,
    sampling_rate: f32,
    segment_length: usize,
    overlap: Option<usize>,
    window: WindowKind,
    axis: Axis,
) -> Result<(Array1<f32>, Array<f32, D>)> {
    let plan = WelchPlan::new(segment_length, overlap, window, sampling_rate)?;
    let psd = plan.psd(signal, axis)?;
    Ok((plan.freqs(), psd))
}
