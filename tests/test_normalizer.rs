mod common;
use common::{argmax, max_abs_diff, sine_plus_noise, white_noise};
use ndarray::{Array3, Axis};
use std::sync::{Arc, Mutex};
use tmanorm::{batch_psd, ensure_finite, NormConfig, Normalizer, TmaError, WelchConfig, WindowKind};

// ── Shape ─────────────────────────────────────────────────────────────────────

#[test]
fn output_shape_equals_input_shape() {
    for (filter_size, shape) in [
        (16_usize, (1_usize, 1_usize, 16_usize)),
        (16, (3, 2, 17)),
        (32, (5, 4, 1000)),
        (33, (2, 3, 200)),
        (128, (4, 2, 3000)),
    ] {
        let mut norm = Normalizer::new(filter_size, 0.1).unwrap();
        let x = white_noise(shape, &vec![1.0; shape.1], 5);
        let y = norm.apply(x.view()).unwrap();
        assert_eq!(y.dim(), shape, "filter_size={filter_size}");
    }
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[test]
fn dominant_frequency_is_preserved() {
    let sfreq = 100.0_f32;
    let x = sine_plus_noise((4, 2, 512), 10.0, sfreq, 1.0, 0.5, 42);

    let mut norm = Normalizer::new(128, 0.1).unwrap();
    let y = norm.apply(x.view()).unwrap();
    assert_eq!(y.dim(), x.dim());
    assert!(y.iter().all(|v| v.is_finite()));

    let welch = WelchConfig { segment_length: 128, sampling_rate: sfreq, ..WelchConfig::default() };
    let (freqs, psd_in) = batch_psd(x.view(), &welch).unwrap();
    let (_, psd_out) = batch_psd(y.view(), &welch).unwrap();

    for b in 0..4 {
        for c in 0..2 {
            let p_in = argmax(psd_in.slice(ndarray::s![b, c, ..]));
            let p_out = argmax(psd_out.slice(ndarray::s![b, c, ..]));
            assert!(
                p_in.abs_diff(p_out) <= 1,
                "b={b} c={c}: peak moved from {} Hz to {} Hz",
                freqs[p_in],
                freqs[p_out]
            );
            approx::assert_abs_diff_eq!(freqs[p_out], 10.0, epsilon = 1.0);
        }
    }
}

#[test]
fn homogeneous_batch_passes_through_unchanged() {
    // Every sample identical → psd == barycenter → unit impulse kernel.
    let one = white_noise((1, 3, 600), &[1.0, 3.0, 0.2], 9);
    let x = Array3::from_shape_fn((4, 3, 600), |(_, c, t)| one[[0, c, t]]);
    let mut norm = Normalizer::new(64, 0.1).unwrap();
    let y = norm.apply(x.view()).unwrap();
    let err = max_abs_diff(&x, &y);
    assert!(err < 1e-3, "max deviation {err:.2e}");
}

#[test]
fn samples_are_pulled_toward_common_spectrum() {
    // Sample 0 is 4× louder than sample 1; after filtering both land on the
    // barycenter level, so their power ratio shrinks.
    let quiet = white_noise((1, 1, 2048), &[1.0], 1);
    let loud = white_noise((1, 1, 2048), &[4.0], 2);
    let mut x = Array3::<f32>::zeros((2, 1, 2048));
    x.slice_mut(ndarray::s![0, .., ..]).assign(&loud.index_axis(Axis(0), 0));
    x.slice_mut(ndarray::s![1, .., ..]).assign(&quiet.index_axis(Axis(0), 0));

    let mut norm = Normalizer::new(64, 0.1).unwrap();
    let y = norm.apply(x.view()).unwrap();

    let power = |a: &Array3<f32>, b: usize| {
        a.slice(ndarray::s![b, 0, ..]).iter().map(|v| v * v).sum::<f32>()
    };
    let ratio_in = power(&x, 0) / power(&x, 1);
    let ratio_out = power(&y, 0) / power(&y, 1);
    assert!(ratio_in > 10.0);
    assert!(ratio_out < 2.0, "power ratio after normalization: {ratio_out:.2}");
}

// ── Degenerate input ─────────────────────────────────────────────────────────

#[test]
fn all_zero_batch_propagates_nan() {
    let x = Array3::<f32>::zeros((2, 2, 256));
    let mut norm = Normalizer::new(64, 0.1).unwrap();
    let y = norm.apply(x.view()).expect("zero input must not be an error");
    assert_eq!(y.dim(), x.dim());
    // Zero target over zero power above DC is 0/0.
    assert!(y.iter().all(|v| v.is_nan()));
    assert!(norm.barycenter().unwrap().iter().all(|&v| v == 0.0));
    assert!(matches!(ensure_finite(y.view()), Err(TmaError::NumericalDegeneracy(_))));
}

#[test]
fn flat_lined_sample_propagates_non_finite_values() {
    // Sample 0 is silent while the barycenter is not: sqrt(bary) / 0 = inf.
    let mut x = white_noise((2, 2, 256), &[1.0, 1.0], 8);
    x.slice_mut(ndarray::s![0, .., ..]).fill(0.0);

    let mut norm = Normalizer::new(64, 0.1).unwrap();
    let y = norm.apply(x.view()).expect("degenerate PSD must not be an error");
    assert!(y.slice(ndarray::s![0, .., ..]).iter().any(|v| !v.is_finite()));
    assert!(y.slice(ndarray::s![1, .., ..]).iter().all(|v| v.is_finite()));
    assert!(matches!(ensure_finite(y.view()), Err(TmaError::NumericalDegeneracy(_))));
}

#[test]
fn psd_floor_keeps_flat_lined_sample_finite() {
    let mut x = white_noise((2, 2, 256), &[1.0, 1.0], 8);
    x.slice_mut(ndarray::s![0, .., ..]).fill(0.0);

    let cfg = NormConfig { filter_size: 64, psd_floor: Some(1e-12), ..NormConfig::default() };
    let mut norm = Normalizer::from_config(&cfg).unwrap();
    let y = norm.apply(x.view()).unwrap();
    assert!(ensure_finite(y.view()).is_ok());
}

// ── State ────────────────────────────────────────────────────────────────────

#[test]
fn instances_keep_independent_state() {
    let x1 = white_noise((4, 2, 512), &[1.0, 5.0], 100);
    let x2 = white_noise((4, 2, 512), &[2.0, 0.5], 200);

    let mut a = Normalizer::new(128, 0.1).unwrap();
    let mut b = Normalizer::new(128, 0.1).unwrap();
    let mut fresh = Normalizer::new(128, 0.1).unwrap();

    a.apply(x1.view()).unwrap();
    a.apply(x2.view()).unwrap();

    let y_b = b.apply(x2.view()).unwrap();
    let y_fresh = fresh.apply(x2.view()).unwrap();
    assert_eq!(y_b, y_fresh, "mutating one instance leaked into another");
    assert_ne!(a.barycenter().unwrap(), b.barycenter().unwrap());
}

#[test]
fn restored_state_continues_identically() {
    let x1 = white_noise((3, 2, 400), &[1.0, 2.0], 1);
    let x2 = white_noise((3, 2, 400), &[0.3, 2.5], 2);

    let mut original = Normalizer::new(32, 0.2).unwrap();
    original.apply(x1.view()).unwrap();
    let saved = original.barycenter().unwrap().to_owned();

    let mut resumed = Normalizer::new(32, 0.2).unwrap();
    resumed.restore_barycenter(saved).unwrap();

    assert_eq!(original.apply(x2.view()).unwrap(), resumed.apply(x2.view()).unwrap());
    assert_eq!(original.barycenter(), resumed.barycenter());
}

#[test]
fn first_apply_initialises_irreversibly() {
    let mut norm = Normalizer::new(16, 0.1).unwrap();
    assert!(!norm.is_initialized());
    norm.apply(white_noise((2, 1, 64), &[1.0], 0).view()).unwrap();
    assert!(norm.is_initialized());
    // A failed call leaves the state initialised.
    assert!(norm.apply(Array3::<f32>::zeros((2, 1, 8)).view()).is_err());
    assert!(norm.is_initialized());
}

#[test]
fn psd_seen_by_normalizer_is_rectangular_welch() {
    let x = white_noise((2, 2, 300), &[1.0, 1.0], 4);
    let norm = Normalizer::new(50, 0.1).unwrap();
    let welch = WelchConfig {
        segment_length: 50,
        window: WindowKind::Rectangular,
        ..WelchConfig::default()
    };
    let (_, expected) = batch_psd(x.view(), &welch).unwrap();
    assert_eq!(norm.psd(x.view()).unwrap(), expected);
}

#[test]
fn mutex_serialises_shared_instance() {
    let shared = Arc::new(Mutex::new(Normalizer::new(32, 0.1).unwrap()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let x = white_noise((2, 2, 128), &[1.0, 1.0], i);
                let mut norm = shared.lock().unwrap();
                norm.apply(x.view()).unwrap().dim()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (2, 2, 128));
    }
    assert!(shared.lock().unwrap().is_initialized());
}
