use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tmanorm::{
    ensure_finite,
    io::{load_barycenter, save_barycenter, NormState, SignalBatch, StWriter},
    NormConfig, Normalizer,
};

#[derive(Parser)]
#[command(name = "tmanorm", about = "Spectral barycenter normalization of an EEG batch")]
struct Args {
    /// Input .safetensors holding a [B, C, T] f32 batch
    #[arg(long)]
    input: PathBuf,

    /// Output .safetensors path for the filtered batch
    #[arg(long)]
    output: PathBuf,

    /// Tensor key of the batch in the input file
    #[arg(long, default_value = "x")]
    key: String,

    /// Filter length / Welch segment length in samples (default: 128)
    #[arg(long, default_value_t = 128)]
    filter_size: usize,

    /// EMA momentum of the running barycenter (default: 0.1)
    #[arg(long, default_value_t = 0.1)]
    momentum: f32,

    /// Lower bound on the PSD before the barycenter ratio (default: none)
    #[arg(long)]
    psd_floor: Option<f32>,

    /// Number of chained, independent normalization stages
    #[arg(long, default_value_t = 1)]
    stages: usize,

    /// Resume from a barycenter written by --state-out (single stage only)
    #[arg(long)]
    state_in: Option<PathBuf>,

    /// Write the barycenter here after filtering (single stage only)
    #[arg(long)]
    state_out: Option<PathBuf>,

    /// Fail if the filtered batch contains NaN or Inf
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    check_stages(&args)?;

    let batch = SignalBatch::load(&args.input, &args.key)?;
    let (b, c, t) = batch.data.dim();
    match batch.sfreq {
        Some(sfreq) => log::info!("Loaded batch {b} × {c} ch × {t} samples @ {sfreq} Hz"),
        None => log::info!("Loaded batch {b} × {c} ch × {t} samples"),
    }

    let cfg = NormConfig {
        filter_size: args.filter_size,
        momentum: args.momentum,
        psd_floor: args.psd_floor,
    };
    let mut stages = (0..args.stages)
        .map(|_| Normalizer::from_config(&cfg))
        .collect::<tmanorm::Result<Vec<_>>>()?;

    if let Some(path) = &args.state_in {
        let state = load_barycenter(path)?;
        check_state(&state, &cfg)?;
        stages[0].restore_barycenter(state.barycenter)?;
        log::info!("Resumed barycenter from {}", path.display());
    }

    let mut x = batch.data;
    for (i, stage) in stages.iter_mut().enumerate() {
        x = stage.apply(x.view())?;
        log::info!("Stage {i}: filtered with {}-tap kernels", stage.filter_size());
    }

    if args.strict {
        ensure_finite(x.view())?;
    }

    let mut w = StWriter::new();
    w.add_f32_arr(&args.key, &x);
    if let Some(sfreq) = batch.sfreq {
        w.add_f32("sfreq", &[sfreq], &[1]);
    }
    w.write(&args.output)?;
    log::info!("Written → {}", args.output.display());

    if let Some(path) = &args.state_out {
        if let Some(bary) = stages[0].barycenter() {
            save_barycenter(path, bary, cfg.filter_size, cfg.momentum)?;
            log::info!("Barycenter state → {}", path.display());
        }
    }

    Ok(())
}

// Barycenter state describes exactly one stage.
fn check_stages(args: &Args) -> Result<()> {
    if args.stages == 0 {
        bail!("--stages must be at least 1");
    }
    if args.stages > 1 && (args.state_in.is_some() || args.state_out.is_some()) {
        bail!("--state-in/--state-out hold one stage's barycenter; got --stages {}", args.stages);
    }
    Ok(())
}

fn check_state(state: &NormState, cfg: &NormConfig) -> Result<()> {
    if state.filter_size != cfg.filter_size {
        bail!(
            "state was saved with filter_size {}, running with {}",
            state.filter_size,
            cfg.filter_size
        );
    }
    if state.momentum != cfg.momentum {
        bail!(
            "state was saved with momentum {}, running with {}",
            state.momentum,
            cfg.momentum
        );
    }
    Ok(())
}
