/// psd_compare: normalise one batch and write every intermediate spectrum to
/// a safetensors file for side-by-side inspection.
///
/// Output keys:
///   freqs          [F]          f32  frequency axis (Hz) of the diagnostic PSDs
///   psd_input      [B, C, F]    f32  Hann-windowed Welch PSD of the input
///   psd_filtered   [B, C, F]    f32  same, after normalization
///   barycenter     [C, F']      f32  running barycenter (F' = filter_size/2 + 1)
///   kernel         [B, C, L]    f32  filter applied to each sample/channel
///   filtered       [B, C, T]    f32  normalised batch
///   filter_size    [1]          i32
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use tmanorm::{
    batch_psd, build_kernel,
    io::{SignalBatch, StWriter},
    Normalizer, WelchConfig, WindowKind,
};

#[derive(Parser, Debug)]
#[command(name = "psd_compare")]
struct Args {
    /// Input .safetensors holding a [B, C, T] f32 batch.
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Tensor key of the batch.
    #[arg(long, default_value = "x")]
    key: String,

    /// Normalizer filter size (samples).
    #[arg(long, default_value_t = 128)]
    filter_size: usize,

    /// Normalizer momentum.
    #[arg(long, default_value_t = 0.1_f32)]
    momentum: f32,

    /// Segment length of the diagnostic PSD (samples).
    #[arg(long, default_value_t = 128)]
    nperseg: usize,

    /// Window of the diagnostic PSD (hann, hamming, rectangular).
    #[arg(long, default_value = "hann")]
    window: WindowKind,

    /// Sampling rate (Hz); overrides the one stored in the input file.
    #[arg(long)]
    sfreq: Option<f32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // ── 1. Load ────────────────────────────────────────────────────────────
    let t_load = Instant::now();
    let batch = SignalBatch::load(&args.input, &args.key)?;
    let sfreq = args.sfreq.or(batch.sfreq).unwrap_or(1.0);
    let ms_load = t_load.elapsed().as_secs_f64() * 1000.0;
    let (n_b, n_ch, n_t) = batch.data.dim();

    let welch = WelchConfig {
        segment_length: args.nperseg,
        overlap: None,
        window: args.window,
        sampling_rate: sfreq,
    };

    // ── 2. Input PSD ───────────────────────────────────────────────────────
    let t_psd = Instant::now();
    let (freqs, psd_input) = batch_psd(batch.data.view(), &welch)?;
    let ms_psd = t_psd.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Normalise ───────────────────────────────────────────────────────
    let t_norm = Instant::now();
    let mut norm = Normalizer::new(args.filter_size, args.momentum)?;
    let filtered = norm.apply(batch.data.view())?;
    let ms_norm = t_norm.elapsed().as_secs_f64() * 1000.0;

    let barycenter = norm
        .barycenter()
        .context("normalizer did not record a barycenter")?
        .to_owned();
    let kernel = build_kernel(
        norm.psd(batch.data.view())?.view(),
        barycenter.view(),
        args.filter_size,
        None,
    )?;

    // ── 4. Output PSD ──────────────────────────────────────────────────────
    let (_, psd_filtered) = batch_psd(filtered.view(), &welch)?;

    // Format: "TIMING load=Xms psd=Xms norm=Xms"
    eprintln!("TIMING load={ms_load:.4}ms psd={ms_psd:.4}ms norm={ms_norm:.4}ms");
    eprintln!("  {n_b} × {n_ch} ch × {n_t} samples  sfreq={sfreq} Hz  window={}", args.window);

    // ── 5. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_f32_arr("freqs",        &freqs);
    w.add_f32_arr("psd_input",    &psd_input);
    w.add_f32_arr("psd_filtered", &psd_filtered);
    w.add_f32_arr("barycenter",   &barycenter);
    w.add_f32_arr("kernel",       &kernel);
    w.add_f32_arr("filtered",     &filtered);
    w.add_i32("filter_size", &[i32::try_from(args.filter_size)?], &[1]);
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}
