//! Safetensors I/O for signal batches and normalizer state.
//!
//! Reader: parses `f32` tensors out of a `.safetensors` file, e.g. a batch
//! `x` of shape `[B, C, T]` exported from the training dataloader.
//! Writer: [`StWriter`] emits `F32` / `I32` tensors in the same format.
use anyhow::{bail, Context, Result};
use ndarray::{Array2, Array3, ArrayBase, ArrayD, ArrayView2, Data, Dimension, IxDyn};
use std::collections::HashMap;
use std::path::Path;

// ── Low-level safetensors parser (raw bytes → ndarray, no dependency on the
//    `safetensors` crate's tensor types). ─────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    let len_bytes: [u8; 8] = bytes
        .get(..8)
        .context("safetensors file too small")?
        .try_into()?;
    let n = usize::try_from(u64::from_le_bytes(len_bytes))
        .context("safetensors header length does not fit in memory")?;
    let data_start = 8usize
        .checked_add(n)
        .context("safetensors header length overflows")?;
    let raw_header = bytes
        .get(8..data_start)
        .context("safetensors header truncated")?;
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(raw_header).context("failed to parse safetensors header")?;
    Ok((header, data_start))
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry has no 'shape'")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("non-integer dimension"))
        .collect()
}

fn raw_slice<'a>(bytes: &'a [u8], data_start: usize, entry: &serde_json::Value) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .context("tensor entry has no 'data_offsets'")?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad start offset")? as usize,
            e.as_u64().context("bad end offset")? as usize,
        ),
        _ => bail!("'data_offsets' must hold two integers"),
    };
    let (start, end) = data_start
        .checked_add(s)
        .zip(data_start.checked_add(e))
        .context("tensor data offsets overflow")?;
    if start > end {
        bail!("tensor data offsets are reversed: [{s}, {e}]");
    }
    bytes.get(start..end).context("tensor data out of file bounds")
}

fn read_f32_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f32>> {
    let dtype = entry["dtype"].as_str().unwrap_or("?");
    if dtype != "F32" {
        bail!("expected an F32 tensor, found {dtype}");
    }
    let raw = raw_slice(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_i32_scalar(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<i32> {
    let raw = raw_slice(bytes, data_start, entry)?;
    let b: [u8; 4] = raw.get(..4).context("empty I32 tensor")?.try_into()?;
    Ok(i32::from_le_bytes(b))
}

// ── Public readers ────────────────────────────────────────────────────────────

/// Load the `F32` tensor stored under `key`, with its stored shape.
pub fn load_tensor(path: &Path, key: &str) -> Result<ArrayD<f32>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;
    let entry = header
        .get(key)
        .with_context(|| format!("missing '{key}' key in {}", path.display()))?;
    let shape = shape_of(entry)?;
    let data = read_f32_tensor(&bytes, data_start, entry)?;
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
}

/// A batch of multi-channel windows loaded from disk.
pub struct SignalBatch {
    /// [B, C, T] signal in the units the dataloader produced.
    pub data: Array3<f32>,
    /// Sampling rate (Hz), if the file records one.
    pub sfreq: Option<f32>,
}

impl SignalBatch {
    /// Load tensor `key` (`[B, C, T]`) and the optional scalar `sfreq`.
    pub fn load(path: &Path, key: &str) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let entry = header.get(key).with_context(|| format!("missing '{key}' key"))?;
        let shape = shape_of(entry)?;
        let [b, c, t] = shape[..] else {
            bail!("'{key}' must be 3-D [B, C, T], found shape {shape:?}");
        };
        let data = Array3::from_shape_vec((b, c, t), read_f32_tensor(&bytes, data_start, entry)?)?;

        let sfreq = match header.get("sfreq") {
            Some(e) => read_f32_tensor(&bytes, data_start, e)?.first().copied(),
            None => None,
        };

        Ok(SignalBatch { data, sfreq })
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Collects `F32` / `I32` tensors and writes them as one safetensors file.
///
/// Tensors are laid out in insertion order; the JSON header is padded with
/// spaces to a multiple of 8 bytes.
///
/// ```rust,no_run
/// use tmanorm::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("freqs", &[0.0f32, 0.25, 0.5], &[3]);
/// w.add_i32("filter_size", &[4], &[1]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    tensors: Vec<PendingTensor>,
}

struct PendingTensor {
    name: String,
    dtype: &'static str,
    shape: Vec<usize>,
    bytes: Vec<u8>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push<const N: usize>(
        &mut self,
        name: &str,
        dtype: &'static str,
        shape: &[usize],
        values: impl Iterator<Item = [u8; N]>,
    ) {
        self.tensors.push(PendingTensor {
            name: name.to_owned(),
            dtype,
            shape: shape.to_vec(),
            bytes: values.flatten().collect(),
        });
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        self.push(name, "F32", shape, data.iter().map(|v| v.to_le_bytes()));
    }

    /// Add an array of any dimensionality in logical row-major order, so
    /// transposed or sliced views are stored as they index.
    pub fn add_f32_arr<S, D>(&mut self, name: &str, arr: &ArrayBase<S, D>)
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        self.push(name, "F32", arr.shape(), arr.iter().map(|v| v.to_le_bytes()));
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        self.push(name, "I32", shape, data.iter().map(|v| v.to_le_bytes()));
    }

    /// Serialise the header, then every tensor's bytes back to back.
    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let mut header = serde_json::Map::new();
        let mut end = 0usize;
        for t in &self.tensors {
            let start = end;
            end += t.bytes.len();
            header.insert(
                t.name.clone(),
                serde_json::json!({ "dtype": t.dtype, "shape": t.shape, "data_offsets": [start, end] }),
            );
        }
        let mut header_bytes = serde_json::to_vec(&header)?;
        header_bytes.resize(header_bytes.len().next_multiple_of(8), b' ');

        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut out = std::io::BufWriter::new(file);
        out.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
        out.write_all(&header_bytes)?;
        for t in &self.tensors {
            out.write_all(&t.bytes)?;
        }
        out.flush()?;
        Ok(())
    }
}

// ── Normalizer state ─────────────────────────────────────────────────────────

/// Persisted state of one normalization stage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormState {
    /// [C, F] running barycenter.
    pub barycenter: Array2<f32>,
    pub filter_size: usize,
    pub momentum: f32,
}

/// Write a stage's barycenter together with the parameters it was built with.
pub fn save_barycenter(
    path: &Path,
    barycenter: ArrayView2<f32>,
    filter_size: usize,
    momentum: f32,
) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_arr("barycenter", &barycenter);
    w.add_i32("filter_size", &[i32::try_from(filter_size)?], &[1]);
    w.add_f32("momentum", &[momentum], &[1]);
    w.write(path)
}

/// Read state written by [`save_barycenter`].
pub fn load_barycenter(path: &Path) -> Result<NormState> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let entry = header.get("barycenter").context("missing 'barycenter' key")?;
    let shape = shape_of(entry)?;
    let [c, f] = shape[..] else {
        bail!("'barycenter' must be 2-D [C, F], found shape {shape:?}");
    };
    let barycenter = Array2::from_shape_vec((c, f), read_f32_tensor(&bytes, data_start, entry)?)?;

    let fs_entry = header.get("filter_size").context("missing 'filter_size' key")?;
    let filter_size = usize::try_from(read_i32_scalar(&bytes, data_start, fs_entry)?)
        .context("negative filter_size")?;

    let m_entry = header.get("momentum").context("missing 'momentum' key")?;
    let momentum = read_f32_tensor(&bytes, data_start, m_entry)?
        .first()
        .copied()
        .context("empty 'momentum' tensor")?;

    Ok(NormState { barycenter, filter_size, momentum })
}
