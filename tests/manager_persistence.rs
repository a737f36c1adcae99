//! Save/load behaviour of the model manager across fresh instances.

use std::fs;
use std::path::Path;

use multimodel::persist::model_file_name;
use multimodel::{Algorithm, ModelError, ModelManager};
use ndarray::{Array, Array2};

// =============================================================================
// Test Helpers
// =============================================================================

fn inputs(n: usize, f: usize) -> Array2<f64> {
    Array::from_shape_fn((n, f), |(i, j)| {
        let t = i as f64 / n as f64;
        ((j + 1) as f64 * 3.1 * t).sin() + 0.1 * j as f64
    })
}

/// Column `k` is a different linear combination of the inputs.
fn linear_targets(x: &Array2<f64>, k: usize) -> Array2<f64> {
    Array::from_shape_fn((x.nrows(), k), |(i, c)| {
        x.row(i)
            .iter()
            .enumerate()
            .map(|(j, v)| v * ((c + 1) as f64 - j as f64 * 0.5))
            .sum::<f64>()
            + c as f64
    })
}

fn fitted(
    algorithm: &str,
    scale_data: bool,
    separate: bool,
    x: &Array2<f64>,
    y: &Array2<f64>,
) -> ModelManager {
    let mut manager = ModelManager::new();
    manager.build_model(algorithm, scale_data).unwrap();
    manager.fit(x.view(), y.view(), separate).unwrap();
    manager
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn joint_linear_round_trip_is_exact() {
    let x = inputs(50, 3);
    let y = linear_targets(&x, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("linear.bin");

    let manager = fitted("linear_model", false, false, &x, &y);
    manager.save_model(&path).unwrap();
    assert!(path.is_file());

    let mut loaded = ModelManager::new();
    loaded.load_model(&path, false, false).unwrap();
    assert!(!loaded.is_separate());
    assert_eq!(loaded.algorithm(), Some(Algorithm::Linear));
    assert_eq!(loaded.predict(x.view()).unwrap(), manager.predict(x.view()).unwrap());
}

#[test]
fn separate_models_reload_in_column_order() {
    let x = inputs(40, 4);
    let y = linear_targets(&x, 12);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("per_column");

    let manager = fitted("linear_model", true, true, &x, &y);
    assert_eq!(manager.n_models(), 12);
    manager.save_model(&path).unwrap();

    let mut expected: Vec<String> = (0..12).map(model_file_name).collect();
    expected.sort();
    assert_eq!(file_names(&path), expected);

    let mut loaded = ModelManager::new();
    loaded.load_model(&path, true, true).unwrap();
    assert_eq!(loaded.n_models(), 12);
    let before = manager.predict(x.view()).unwrap();
    let after = loaded.predict(x.view()).unwrap();
    assert_eq!(after, before);
    for (p, t) in after.iter().zip(y.iter()) {
        assert!((p - t).abs() < 1e-8);
    }
}

#[test]
fn svr_is_forced_into_separate_mode() {
    let x = inputs(30, 2);
    let y = linear_targets(&x, 3);
    let manager = fitted("SVR", false, false, &x, &y);
    assert!(manager.is_separate());
    assert_eq!(manager.n_models(), 3);
    assert_eq!(manager.predict(x.view()).unwrap().dim(), (30, 3));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svr");
    manager.save_model(&path).unwrap();
    assert!(path.is_dir());

    let mut loaded = ModelManager::new();
    loaded.restore(&path).unwrap();
    assert!(loaded.is_separate());
    assert_eq!(loaded.predict(x.view()).unwrap(), manager.predict(x.view()).unwrap());
}

#[test]
fn scaled_gradient_boosting_round_trip_is_exact() {
    let x = inputs(60, 3);
    let y = linear_targets(&x, 2);
    let manager = fitted("GradientBoostingRegressor", true, true, &x, &y);

    let dir = tempfile::tempdir().unwrap();
    manager.save_model(dir.path()).unwrap();
    let mut loaded = ModelManager::new();
    loaded.load_model(dir.path(), true, true).unwrap();
    assert!(loaded.scalers().is_some());
    assert_eq!(loaded.predict(x.view()).unwrap(), manager.predict(x.view()).unwrap());
}

#[test]
fn resave_with_fewer_columns_replaces_directory() {
    let x = inputs(30, 3);
    let dir = tempfile::tempdir().unwrap();

    let wide = fitted("linear_model", false, true, &x, &linear_targets(&x, 3));
    wide.save_model(dir.path()).unwrap();
    let narrow = fitted("linear_model", false, true, &x, &linear_targets(&x, 2));
    narrow.save_model(dir.path()).unwrap();
    assert_eq!(file_names(dir.path()), ["model0.bin", "model1.bin"]);

    let mut loaded = ModelManager::new();
    loaded.load_model(dir.path(), false, true).unwrap();
    assert_eq!(loaded.n_models(), 2);
    assert_eq!(loaded.predict(x.view()).unwrap(), narrow.predict(x.view()).unwrap());
}

#[test]
fn single_output_target_uses_one_model() {
    let x = inputs(25, 2);
    let y = linear_targets(&x, 1);
    for algorithm in ["linear_model", "SVR", "GradientBoostingRegressor"] {
        let manager = fitted(algorithm, false, false, &x, &y);
        assert_eq!(manager.n_models(), 1, "{algorithm}");
        assert_eq!(manager.predict(x.view()).unwrap().dim(), (25, 1));
    }
}

#[test]
fn loaded_manager_can_be_refitted() {
    let x = inputs(20, 2);
    let y = linear_targets(&x, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("joint.bin");
    fitted("linear_model", false, false, &x, &y).save_model(&path).unwrap();

    let mut manager = ModelManager::new();
    manager.load_model(&path, false, false).unwrap();
    manager.fit(x.view(), y.view(), true).unwrap();
    assert!(manager.is_separate());
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn unsupported_algorithm_leaves_manager_empty() {
    let mut manager = ModelManager::new();
    let err = manager.build_model("RandomForestRegressor", true).unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedAlgorithm(_)));
    assert!(manager.algorithm().is_none());

    let x = inputs(5, 1);
    let y = linear_targets(&x, 1);
    assert!(matches!(
        manager.fit(x.view(), y.view(), false),
        Err(ModelError::NotBuilt)
    ));
}

#[test]
fn fresh_manager_cannot_predict() {
    let manager = ModelManager::new();
    let x = inputs(3, 2);
    assert!(matches!(manager.predict(x.view()), Err(ModelError::PredictBeforeFit)));
}

#[test]
fn load_rejects_wrong_separate_flag() {
    let x = inputs(20, 2);
    let y = linear_targets(&x, 2);
    let dir = tempfile::tempdir().unwrap();
    let joint_file = dir.path().join("joint.bin");
    fitted("linear_model", false, false, &x, &y).save_model(&joint_file).unwrap();

    let models_dir = dir.path().join("models");
    fs::create_dir(&models_dir).unwrap();
    fs::copy(&joint_file, models_dir.join(model_file_name(0))).unwrap();

    let mut manager = ModelManager::new();
    let err = manager.load_model(&models_dir, false, true).unwrap_err();
    assert!(matches!(
        err,
        ModelError::ConfigMismatch {
            field: "separate_models",
            ..
        }
    ));
    assert!(!manager.is_fitted());
}

#[test]
fn load_detects_swapped_files() {
    let x = inputs(20, 2);
    let y = linear_targets(&x, 3);
    let dir = tempfile::tempdir().unwrap();
    fitted("linear_model", false, true, &x, &y).save_model(dir.path()).unwrap();

    let first = dir.path().join(model_file_name(0));
    let last = dir.path().join(model_file_name(2));
    let tmp = dir.path().join("swap.tmp");
    fs::rename(&first, &tmp).unwrap();
    fs::rename(&last, &first).unwrap();
    fs::rename(&tmp, &last).unwrap();

    let mut manager = ModelManager::new();
    let err = manager.load_model(dir.path(), false, true).unwrap_err();
    assert!(matches!(
        err,
        ModelError::ArtifactOrder {
            position: 0,
            column: 2,
            ..
        }
    ));
}

#[test]
fn load_detects_stale_extra_file() {
    let x = inputs(20, 2);
    let y = linear_targets(&x, 2);
    let dir = tempfile::tempdir().unwrap();
    fitted("linear_model", false, true, &x, &y).save_model(dir.path()).unwrap();
    fs::copy(
        dir.path().join(model_file_name(0)),
        dir.path().join(model_file_name(2)),
    )
    .unwrap();

    let mut manager = ModelManager::new();
    assert!(matches!(
        manager.load_model(dir.path(), false, true),
        Err(ModelError::ArtifactOrder { count: 2, .. })
    ));
}

#[test]
fn load_missing_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = ModelManager::new();
    assert!(matches!(
        manager.load_model(dir.path().join("nope.bin"), false, false),
        Err(ModelError::Io { .. })
    ));
    assert!(matches!(
        manager.load_model(dir.path().join("nope"), false, true),
        Err(ModelError::Io { .. })
    ));
}

#[test]
fn load_rejects_foreign_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    fs::write(&path, b"definitely not a model").unwrap();
    let mut manager = ModelManager::new();
    assert!(matches!(
        manager.load_model(&path, false, false),
        Err(ModelError::Deserialization { .. })
    ));
}

#[test]
fn load_names_file_from_other_fit() {
    let x = inputs(20, 2);
    let dir = tempfile::tempdir().unwrap();
    let wide = dir.path().join("wide");
    let narrow = dir.path().join("narrow");
    fitted("linear_model", false, true, &x, &linear_targets(&x, 3)).save_model(&wide).unwrap();
    fitted("linear_model", false, true, &x, &linear_targets(&x, 2)).save_model(&narrow).unwrap();
    fs::copy(wide.join(model_file_name(2)), narrow.join(model_file_name(2))).unwrap();

    let mut manager = ModelManager::new();
    match manager.load_model(&narrow, false, true) {
        Err(ModelError::ArtifactOrder {
            path,
            position,
            count,
            ..
        }) => {
            assert_eq!(path, narrow.join(model_file_name(2)));
            assert_eq!(position, 2);
            assert_eq!(count, 2);
        }
        other => panic!("expected ArtifactOrder, got {other:?}"),
    }
}

#[test]
fn load_rejects_missing_column_file() {
    let x = inputs(20, 2);
    let dir = tempfile::tempdir().unwrap();
    fitted("linear_model", false, true, &x, &linear_targets(&x, 3)).save_model(dir.path()).unwrap();
    fs::remove_file(dir.path().join(model_file_name(2))).unwrap();

    let mut manager = ModelManager::new();
    assert!(matches!(
        manager.load_model(dir.path(), false, true),
        Err(ModelError::Deserialization { .. })
    ));
}

#[test]
fn load_rejects_scalers_from_other_fit() {
    let x = inputs(30, 2);
    let y = linear_targets(&x, 2);
    let shifted = y.mapv(|v| 10.0 * v + 5.0);
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fitted("linear_model", true, true, &x, &y).save_model(&first).unwrap();
    fitted("linear_model", true, true, &x, &shifted).save_model(&second).unwrap();
    fs::copy(second.join(model_file_name(1)), first.join(model_file_name(1))).unwrap();

    let mut manager = ModelManager::new();
    match manager.load_model(&first, true, true) {
        Err(ModelError::Deserialization { path, .. }) => {
            assert_eq!(path, first.join(model_file_name(1)));
        }
        other => panic!("expected Deserialization, got {other:?}"),
    }
    assert!(!manager.is_fitted());
}
