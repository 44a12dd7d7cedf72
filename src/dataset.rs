//! In-memory windowed-sequence dataset.
//!
//! Holds pre-cut windows `[N, C, T]` with one label per window plus the
//! subject and recording domain each window came from.  Single windows are
//! read with [`SequenceDataset::get_item`], sequences of windows (the input
//! of a sequence-to-sequence sleep stager) with
//! [`SequenceDataset::get_batch`].
use ndarray::{Array3, ArrayView2, Axis};

use crate::error::{Result, TmaError};

/// Label mapping applied on read, e.g. merging sleep stages.
pub type TargetTransform = Box<dyn Fn(i64) -> i64 + Send + Sync>;

/// Per-window bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMeta {
    pub target: i64,
    pub subject: String,
    /// Recording domain (dataset or run) the window belongs to.
    pub domain: String,
    /// Position of the window in the dataset.
    pub i_window: usize,
}

pub struct SequenceDataset {
    x: Array3<f32>,
    y: Vec<i64>,
    subjects: Vec<String>,
    domains: Vec<String>,
    target_transform: Option<TargetTransform>,
}

impl std::fmt::Debug for SequenceDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceDataset")
            .field("shape", &self.x.dim())
            .field("has_target_transform", &self.target_transform.is_some())
            .finish()
    }
}

impl SequenceDataset {
    /// All per-window vectors must have one entry per window of `x`.
    pub fn new(
        x: Array3<f32>,
        y: Vec<i64>,
        subjects: Vec<String>,
        domains: Vec<String>,
    ) -> Result<Self> {
        let n = x.len_of(Axis(0));
        for (what, len) in [("y", y.len()), ("subjects", subjects.len()), ("domains", domains.len())] {
            if len != n {
                log::error!("dataset: '{what}' has {len} entries for {n} windows");
                return Err(TmaError::shape(&[n], &[len]));
            }
        }
        Ok(Self { x, y, subjects, domains, target_transform: None })
    }

    pub fn with_target_transform(mut self, f: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        self.target_transform = Some(Box::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// `(channels, samples)` of every window.
    pub fn window_shape(&self) -> (usize, usize) {
        let (_, c, t) = self.x.dim();
        (c, t)
    }

    fn check(&self, idx: usize) -> Result<()> {
        if idx >= self.len() {
            return Err(TmaError::IndexOutOfRange { index: idx, len: self.len() });
        }
        Ok(())
    }

    fn target(&self, idx: usize) -> i64 {
        let y = self.y[idx];
        match &self.target_transform {
            Some(f) => f(y),
            None => y,
        }
    }

    /// One window `[C, T]` and its (transformed) label.
    pub fn get_item(&self, idx: usize) -> Result<(ArrayView2<'_, f32>, i64)> {
        self.check(idx)?;
        Ok((self.x.index_axis(Axis(0), idx), self.target(idx)))
    }

    /// Stack the windows at `indices` into `[S, C, T]` with their labels.
    pub fn get_batch(&self, indices: &[usize]) -> Result<(Array3<f32>, Vec<i64>)> {
        for &i in indices {
            self.check(i)?;
        }
        let x = self.x.select(Axis(0), indices);
        let y = indices.iter().map(|&i| self.target(i)).collect();
        Ok((x, y))
    }

    /// Bookkeeping for window `idx` (label untransformed).
    pub fn metadata(&self, idx: usize) -> Result<WindowMeta> {
        self.check(idx)?;
        Ok(WindowMeta {
            target: self.y[idx],
            subject: self.subjects[idx].clone(),
            domain: self.domains[idx].clone(),
            i_window: idx,
        })
    }

    /// Indices of all windows recorded in `domain`.
    pub fn domain_indices(&self, domain: &str) -> Vec<usize> {
        self.domains
            .iter()
            .enumerate()
            .filter(|(_, d)| d.as_str() == domain)
            .map(|(i, _)| i)
            .collect()
    }
}
