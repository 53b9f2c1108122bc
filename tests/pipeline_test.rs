//! End-to-end runs: write synthetic light curves and offline feature rows,
//! train a model on the dippers, then score again from the saved model.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use yso_dippers::anomaly::ScoreTable;
use yso_dippers::data::model::{Band, BandFeatures, BandSeries, LightCurvePoint, OfflineRecord};
use yso_dippers::data::writer::{write_light_curves, write_offline_parquet};
use yso_dippers::features::{Extractor, FeatureTable, TimeSeries};
use yso_dippers::{pipeline, ForestParams, GroupSource, PipelineConfig, PipelineError};

/// `n` points per band with noise and, for dippers, one dimming event.
fn simulate(id: &str, n_g: usize, n_r: usize, dip: bool, rng: &mut StdRng) -> Vec<LightCurvePoint> {
    let noise = Normal::new(0.0, 0.05).unwrap();
    let base = rng.gen_range(14.0..17.0);
    let mut points = Vec::new();
    for (band, n) in [(Band::G, n_g), (Band::R, n_r)] {
        for i in 0..n {
            let jd = 2_459_000.5 + i as f64 * 3.1 + rng.gen_range(0.0..1.0);
            let depth = if dip && (4..7).contains(&i) { 0.8 } else { 0.0 };
            points.push(LightCurvePoint {
                object_id: id.to_string(),
                fid: band.fid(),
                jd: Some(jd),
                magpsf: Some(base + depth + noise.sample(rng)),
                sigmapsf: Some(rng.gen_range(0.02..0.06)),
            });
        }
    }
    points
}

fn offline(id: &str, with_r: bool, extractor: &Extractor, rng: &mut StdRng) -> OfflineRecord {
    let points = simulate(id, 15, 15, false, rng);
    let names = extractor.names();
    let stats = |band: Band| -> BandFeatures {
        let series = BandSeries::from_points(&points, band);
        names
            .iter()
            .cloned()
            .zip(extractor.eval(&TimeSeries::from_band(&series)))
            .collect()
    };
    OfflineRecord {
        object_id: id.to_string(),
        g: Some(stats(Band::G)),
        r: with_r.then(|| stats(Band::R)),
        cfid: points.iter().map(|p| p.fid).collect(),
        dcmag: points.iter().map(|p| p.mag()).collect(),
    }
}

/// Eight dippers plus one object too sparse in r, and a field file with ten
/// objects, one of them missing r and one written twice.
fn write_inputs(dir: &Path) -> PipelineConfig {
    let mut rng = StdRng::seed_from_u64(7);
    let extractor = Extractor::standard();

    let mut points = Vec::new();
    for i in 0..8 {
        points.extend(simulate(&format!("ZTF_DIP_{i}"), 12, 12, true, &mut rng));
    }
    points.extend(simulate("ZTF_SPARSE", 12, 3, true, &mut rng));
    let lc_path = dir.join("light_curves.csv");
    write_light_curves(&lc_path, &points).unwrap();

    let mut records: Vec<OfflineRecord> = (0..10)
        .map(|i| offline(&format!("ZTF_FLD_{i}"), i != 3, &extractor, &mut rng))
        .collect();
    records.push(records[0].clone());
    let field_path = dir.join("field.parquet");
    write_offline_parquet(&field_path, &records, &extractor.names()).unwrap();

    PipelineConfig {
        min_points: 5,
        light_curves: vec![GroupSource::new("dippers", lc_path)],
        feature_files: vec![GroupSource::new("field", field_path)],
        training_group: "dippers".to_string(),
        train_model: true,
        model_path: dir.join("models").join("model.json"),
        scores_path: dir.join("out").join("scores.json"),
        features_dir: Some(dir.join("features")),
        forest: ForestParams {
            n_estimators: 50,
            max_samples: 256,
            seed: 3,
        },
    }
}

#[test]
fn train_then_score_from_saved_model() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());

    let trained = pipeline::run(&config).expect("training run");
    assert!(config.model_path.is_file());
    assert_eq!(trained.len(), 2);

    let dippers = FeatureTable::read_csv(&dir.path().join("features").join("dippers.csv")).unwrap();
    let field = FeatureTable::read_csv(&dir.path().join("features").join("field.csv")).unwrap();

    // sparse object fails the cut, the field loses its incomplete row and duplicate
    assert_eq!(dippers.len(), 8);
    assert!(!dippers.object_ids().contains(&"ZTF_SPARSE"));
    assert_eq!(field.len(), 9);
    assert!(!field.object_ids().contains(&"ZTF_FLD_3"));

    // both input paths produce the same columns
    assert_eq!(dippers.header(), field.header());
    assert_eq!(dippers.header().len(), 1 + 2 * 27);

    assert_eq!(trained.get("dippers").unwrap().len(), dippers.len());
    assert_eq!(trained.get("field").unwrap().len(), field.len());
    for (_, scores) in trained.groups() {
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));
    }

    let reload = PipelineConfig {
        train_model: false,
        scores_path: dir.path().join("out").join("rescored.json"),
        features_dir: None,
        ..config
    };
    let rescored = pipeline::run(&reload).expect("scoring run");
    assert_eq!(rescored, trained);
    assert_eq!(ScoreTable::load(&reload.scores_path).unwrap(), trained);
}

#[test]
fn scoring_without_a_model_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        train_model: false,
        ..write_inputs(dir.path())
    };

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ModelNotFound(path)) if *path == config.model_path
    ));
    assert!(!config.scores_path.exists());
}

#[test]
fn config_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = PipelineConfig::from_file(&config_path).unwrap();
    assert_eq!(loaded, config);

    let scores = pipeline::run(&loaded).unwrap();
    assert_eq!(scores.groups().map(|(name, _)| name).collect::<Vec<_>>(), ["dippers", "field"]);
}
