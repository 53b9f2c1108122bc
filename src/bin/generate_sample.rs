use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_distr::Normal;

use yso_dippers::data::model::{Band, BandFeatures, BandSeries, LightCurvePoint, OfflineRecord};
use yso_dippers::data::writer::{write_light_curves, write_offline_parquet};
use yso_dippers::features::{Extractor, TimeSeries};

/// Write synthetic dipper light curves (CSV) and background / YSO feature
/// files (Parquet)
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Output directory
    #[arg(default_value = "data")]
    out_dir: PathBuf,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Brightness variability model of a synthetic source.
#[derive(Clone, Copy)]
enum Kind {
    /// Flat baseline with a few transient dimming events.
    Dipper,
    /// Flat baseline with white noise only.
    Quiet,
    /// Smooth quasi-periodic modulation.
    Periodic,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Observation times: a 300-day season sampled at irregular cadence.
fn cadence(n: usize, start: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut t: Vec<f64> = (0..n).map(|_| start + rng.gen_range(0.0..300.0)).collect();
    t.sort_by(|a, b| a.total_cmp(b));
    t
}

const NOISE: f64 = 0.03;

fn simulate(
    kind: Kind,
    t: &[f64],
    base: f64,
    jitter: &Normal<f64>,
    rng: &mut StdRng,
) -> (Vec<f64>, Vec<f64>) {
    let start = t.first().copied().unwrap_or(0.0);

    let dips: Vec<(f64, f64, f64)> = match kind {
        Kind::Dipper => (0..rng.gen_range(1..=3))
            .map(|_| {
                (
                    start + rng.gen_range(0.0..300.0),
                    rng.gen_range(1.0..6.0),
                    rng.gen_range(0.3..1.2),
                )
            })
            .collect(),
        _ => Vec::new(),
    };
    let period = rng.gen_range(3.0..15.0);
    let phase = rng.gen_range(0.0..std::f64::consts::TAU);
    let amp = rng.gen_range(0.1..0.4);

    let mags = t
        .iter()
        .map(|&ti| {
            let signal = match kind {
                Kind::Dipper => dips.iter().map(|&(mu, w, a)| gaussian(ti, mu, w, a)).sum::<f64>(),
                Kind::Quiet => 0.0,
                Kind::Periodic => amp * (std::f64::consts::TAU * ti / period + phase).sin(),
            };
            base + signal + jitter.sample(rng)
        })
        .collect();
    let errs = t.iter().map(|_| NOISE * rng.gen_range(0.8..1.2)).collect();
    (mags, errs)
}

fn light_curve(
    id: &str,
    kind: Kind,
    n_g: usize,
    n_r: usize,
    jitter: &Normal<f64>,
    rng: &mut StdRng,
) -> Vec<LightCurvePoint> {
    let base = rng.gen_range(14.0..18.0);
    let mut points = Vec::new();
    for (band, n, offset) in [(Band::G, n_g, 0.0), (Band::R, n_r, -0.4)] {
        let t = cadence(n, 2_459_000.5, rng);
        let (mags, errs) = simulate(kind, &t, base + offset, jitter, rng);
        for ((jd, mag), err) in t.into_iter().zip(mags).zip(errs) {
            points.push(LightCurvePoint {
                object_id: id.to_string(),
                fid: band.fid(),
                jd: Some(jd),
                magpsf: Some(mag),
                sigmapsf: Some(err),
            });
        }
    }
    // the API returns points in no particular order
    points.shuffle(rng);
    points
}

fn offline_record(
    id: &str,
    kind: Kind,
    extractor: &Extractor,
    missing_r: bool,
    jitter: &Normal<f64>,
    rng: &mut StdRng,
) -> OfflineRecord {
    let (n_g, n_r) = (rng.gen_range(8..40), rng.gen_range(8..40));
    let points = light_curve(id, kind, n_g, n_r, jitter, rng);
    let names = extractor.names();
    let band_stats = |band: Band| -> BandFeatures {
        let series = BandSeries::from_points(&points, band);
        names
            .iter()
            .cloned()
            .zip(extractor.eval(&TimeSeries::from_band(&series)))
            .collect()
    };

    OfflineRecord {
        object_id: id.to_string(),
        g: Some(band_stats(Band::G)),
        r: (!missing_r).then(|| band_stats(Band::R)),
        cfid: points.iter().map(|p| p.fid).collect(),
        dcmag: points.iter().map(|p| p.mag()).collect(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let extractor = Extractor::standard();
    let jitter = Normal::new(0.0, NOISE)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    // Dippers: every fifth object is too sparse in r to pass the 5-point cut
    let mut dippers = Vec::new();
    for i in 0..40 {
        let n_r = if i % 5 == 4 { 4 } else { rng.gen_range(10..60) };
        let n_g = rng.gen_range(10..60);
        let id = format!("ZTF_DIP_{i:03}");
        dippers.extend(light_curve(&id, Kind::Dipper, n_g, n_r, &jitter, &mut rng));
    }
    let lc_path = args.out_dir.join("light_curves.csv");
    write_light_curves(&lc_path, &dippers)?;

    // Background field: some objects lack r data, one is duplicated
    let mut other: Vec<OfflineRecord> = (0..300)
        .map(|i| {
            let id = format!("ZTF_BKG_{i:04}");
            offline_record(&id, Kind::Quiet, &extractor, i % 17 == 0, &jitter, &mut rng)
        })
        .collect();
    other.push(other[1].clone());
    let other_path = args.out_dir.join("other.parquet");
    write_offline_parquet(&other_path, &other, &extractor.names())?;

    let yso: Vec<OfflineRecord> = (0..80)
        .map(|i| {
            let id = format!("ZTF_YSO_{i:03}");
            offline_record(&id, Kind::Periodic, &extractor, false, &jitter, &mut rng)
        })
        .collect();
    let yso_path = args.out_dir.join("yso.parquet");
    write_offline_parquet(&yso_path, &yso, &extractor.names())?;

    println!(
        "Wrote {} dipper points to {}, {} background rows to {}, {} YSO rows to {}",
        dippers.len(),
        lc_path.display(),
        other.len(),
        other_path.display(),
        yso.len(),
        yso_path.display()
    );
    Ok(())
}
