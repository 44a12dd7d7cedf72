mod common;
use common::{temp_path, white_noise};
use ndarray::Array2;
use tmanorm::io::{load_barycenter, load_tensor, save_barycenter, SignalBatch, StWriter};
use tmanorm::Normalizer;

#[test]
fn batch_written_then_loaded() {
    let x = white_noise((3, 2, 100), &[1.0, 2.0], 1);
    let path = temp_path("batch.safetensors");

    let mut w = StWriter::new();
    w.add_f32_arr("x", &x);
    w.add_f32("sfreq", &[100.0], &[1]);
    w.write(&path).unwrap();

    let batch = SignalBatch::load(&path, "x").unwrap();
    assert_eq!(batch.data, x);
    assert_eq!(batch.sfreq, Some(100.0));

    let dynamic = load_tensor(&path, "x").unwrap();
    assert_eq!(dynamic.shape(), &[3, 2, 100]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn batch_must_be_three_dimensional() {
    let path = temp_path("flat.safetensors");
    let mut w = StWriter::new();
    w.add_f32("x", &[1.0, 2.0, 3.0, 4.0], &[2, 2]);
    w.write(&path).unwrap();

    let err = SignalBatch::load(&path, "x").err().expect("2-D batch accepted");
    assert!(err.to_string().contains("3-D"), "{err}");
    assert!(SignalBatch::load(&path, "missing").is_err());

    std::fs::remove_file(&path).ok();
}

#[test]
fn barycenter_state_resumes_normalizer() {
    let x = white_noise((4, 2, 256), &[1.0, 0.5], 2);
    let mut norm = Normalizer::new(64, 0.2).unwrap();
    norm.apply(x.view()).unwrap();

    let path = temp_path("state.safetensors");
    save_barycenter(&path, norm.barycenter().unwrap(), 64, 0.2).unwrap();

    let state = load_barycenter(&path).unwrap();
    assert_eq!(state.filter_size, 64);
    assert_eq!(state.momentum, 0.2);
    assert_eq!(state.barycenter.view(), norm.barycenter().unwrap());

    let mut resumed = Normalizer::new(state.filter_size, state.momentum).unwrap();
    resumed.restore_barycenter(state.barycenter).unwrap();
    let x2 = white_noise((4, 2, 256), &[2.0, 0.1], 3);
    assert_eq!(norm.apply(x2.view()).unwrap(), resumed.apply(x2.view()).unwrap());

    std::fs::remove_file(&path).ok();
}

#[test]
fn wrong_dtype_is_rejected() {
    let path = temp_path("ints.safetensors");
    let mut w = StWriter::new();
    w.add_i32("barycenter", &[1, 2], &[1, 2]);
    w.add_i32("filter_size", &[2], &[1]);
    w.add_f32("momentum", &[0.1], &[1]);
    w.write(&path).unwrap();
    assert!(load_barycenter(&path).is_err());
    std::fs::remove_file(&path).ok();
}

#[test]
fn writer_preserves_logical_order_of_views() {
    // A transposed view is written in logical (row-major) order.
    let a = Array2::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f32);
    let path = temp_path("transposed.safetensors");
    let mut w = StWriter::new();
    w.add_f32_arr("t", &a.t());
    w.write(&path).unwrap();

    let back = load_tensor(&path, "t").unwrap();
    assert_eq!(back.shape(), &[3, 2]);
    assert_eq!(back.iter().copied().collect::<Vec<_>>(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    std::fs::remove_file(&path).ok();
}
