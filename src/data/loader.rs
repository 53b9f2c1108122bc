use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, LargeListArray, ListArray, StructArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::{Band, BandFeatures, LightCurvePoint, LightCurves, OfflineRecord};
use crate::error::PipelineError;

/// Columns the light-curve CSV must provide.
pub const LIGHT_CURVE_COLUMNS: [&str; 5] =
    ["i:objectId", "i:fid", "i:jd", "i:magpsf", "i:sigmapsf"];

// ---------------------------------------------------------------------------
// Light-curve CSV
// ---------------------------------------------------------------------------

/// Load light-curve points from a delimited file with a header row.
///
/// Only the `i:*` columns in [`LIGHT_CURVE_COLUMNS`] are read; anything else
/// the API returned is ignored.
pub fn load_light_curves(path: &Path) -> Result<LightCurves> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening light-curve file {}", path.display()))?;

    let headers = reader.headers().context("reading CSV headers")?.clone();
    for column in LIGHT_CURVE_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::MissingColumn {
                file: path.to_path_buf(),
                column: column.to_string(),
            }
            .into());
        }
    }

    let mut points = Vec::new();
    for (row_no, result) in reader.deserialize::<LightCurvePoint>().enumerate() {
        let point = result.with_context(|| format!("{}: CSV row {row_no}", path.display()))?;
        points.push(point);
    }

    debug!("{}: loaded {} light-curve points", path.display(), points.len());
    Ok(LightCurves::new(points))
}

// ---------------------------------------------------------------------------
// Offline feature files – public entry-point
// ---------------------------------------------------------------------------

/// Load a pre-extracted feature file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – columns `objectId`, `lc_features`, `cfid`, `dcmag` (recommended)
/// * `.json`    – the same rows as `df.to_json(orient='records')`
pub fn load_offline_features(path: &Path) -> Result<Vec<OfflineRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        other => bail!("Unsupported feature file extension: .{other}"),
    }
    .with_context(|| format!("loading offline features from {}", path.display()))?;

    debug!("{}: loaded {} offline rows", path.display(), records.len());
    Ok(records)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema:
///
/// ```json
/// [
///   {
///     "objectId": "ZTF18abcdefg",
///     "lc_features": { "1": { "mean": 15.2, ... }, "2": null },
///     "cfid":  [1, 2, 1, ...],
///     "dcmag": [15.1, 14.8, 15.3, ...]
///   },
///   ...
/// ]
/// ```
#[derive(Debug, Deserialize)]
struct JsonRow {
    #[serde(rename = "objectId")]
    object_id: String,
    lc_features: BTreeMap<String, Option<BTreeMap<String, Option<f64>>>>,
    #[serde(default)]
    cfid: Vec<i64>,
    #[serde(default)]
    dcmag: Vec<Option<f64>>,
}

fn load_json(path: &Path) -> Result<Vec<OfflineRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let rows: Vec<JsonRow> = serde_json::from_str(&text).context("parsing JSON")?;

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.cfid.len() != row.dcmag.len() {
                bail!(
                    "Row {i}: cfid has {} values but dcmag has {}",
                    row.cfid.len(),
                    row.dcmag.len()
                );
            }
            let band = |b: Band| {
                row.lc_features.get(b.key()).cloned().flatten().map(|stats| {
                    stats
                        .into_iter()
                        .map(|(name, v)| (name, v.unwrap_or(f64::NAN)))
                        .collect::<BandFeatures>()
                })
            };
            Ok(OfflineRecord {
                g: band(Band::G),
                r: band(Band::R),
                object_id: row.object_id,
                cfid: row.cfid,
                dcmag: row.dcmag.into_iter().map(|m| m.unwrap_or(f64::NAN)).collect(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of pre-extracted features.
///
/// Expected schema:
/// - `objectId`: Utf8 or LargeUtf8
/// - `lc_features`: Struct with nullable Struct fields `"1"` and `"2"`, each
///   holding one float column per feature name
/// - `cfid`: List or LargeList of any integer type
/// - `dcmag`: List or LargeList of Float64 or Float32
///
/// Works with files written by both **Pandas** and **Polars**.
fn load_parquet(path: &Path) -> Result<Vec<OfflineRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let ids = required_column(&batch, path, "objectId")?;
        let lc_features = required_column(&batch, path, "lc_features")?
            .as_struct_opt()
            .context("'lc_features' is not a struct column")?;
        let cfid_col = required_column(&batch, path, "cfid")?;
        let dcmag_col = required_column(&batch, path, "dcmag")?;

        let g_struct = band_struct(lc_features, Band::G)?;
        let r_struct = band_struct(lc_features, Band::R)?;

        for row in 0..batch.num_rows() {
            let object_id = string_at(ids, row)
                .with_context(|| format!("Row {row}: failed to read 'objectId'"))?;
            let cfid = extract_i64_list(cfid_col, row)
                .with_context(|| format!("Row {row}: failed to read 'cfid'"))?;
            let dcmag = extract_f64_list(dcmag_col, row)
                .with_context(|| format!("Row {row}: failed to read 'dcmag'"))?;

            if cfid.len() != dcmag.len() {
                bail!(
                    "Row {row}: cfid has {} values but dcmag has {}",
                    cfid.len(),
                    dcmag.len()
                );
            }

            let present = !lc_features.is_null(row);
            records.push(OfflineRecord {
                object_id,
                g: g_struct.filter(|_| present).and_then(|s| band_features(s, row)),
                r: r_struct.filter(|_| present).and_then(|s| band_features(s, row)),
                cfid,
                dcmag,
            });
        }
    }

    Ok(records)
}

// -- Parquet / Arrow helpers --

fn required_column<'a>(batch: &'a RecordBatch, path: &Path, name: &str) -> Result<&'a ArrayRef> {
    batch.column_by_name(name).ok_or_else(|| {
        PipelineError::MissingColumn {
            file: path.to_path_buf(),
            column: name.to_string(),
        }
        .into()
    })
}

/// The per-band sub-struct of `lc_features`, if the file has one.
fn band_struct(lc_features: &StructArray, band: Band) -> Result<Option<&StructArray>> {
    match lc_features.column_by_name(band.key()) {
        None => Ok(None),
        Some(col) => col
            .as_struct_opt()
            .map(Some)
            .with_context(|| format!("'lc_features.{}' is not a struct", band.key())),
    }
}

/// Read one row of a band struct into a name → value map. Null structs mean
/// the band has no features for this object.
fn band_features(stats: &StructArray, row: usize) -> Option<BandFeatures> {
    if stats.is_null(row) {
        return None;
    }
    let features = stats
        .fields()
        .iter()
        .zip(stats.columns())
        .map(|(field, col)| (field.name().clone(), f64_at(col, row)))
        .collect();
    Some(features)
}

/// Read a numeric cell as `f64`; nulls and non-numeric types become NaN.
fn f64_at(col: &ArrayRef, row: usize) -> f64 {
    if col.is_null(row) {
        return f64::NAN;
    }
    match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row),
        dt if dt.is_numeric() => cast(&col.slice(row, 1), &DataType::Float64)
            .map(|a| a.as_primitive::<Float64Type>().value(0))
            .unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn string_at(col: &ArrayRef, row: usize) -> Result<String> {
    if col.is_null(row) {
        bail!("null object id");
    }
    match col.data_type() {
        DataType::Utf8 => Ok(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Ok(col.as_string::<i64>().value(row).to_string()),
        other => bail!("Expected string column, got {other:?}"),
    }
}

/// The values of a List or LargeList column at the given row. Null lists are
/// returned as `None`.
fn list_values(col: &ArrayRef, row: usize) -> Result<Option<ArrayRef>> {
    if col.is_null(row) {
        return Ok(None);
    }

    let values = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };
    Ok(Some(values))
}

fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    let Some(values) = list_values(col, row)? else {
        return Ok(Vec::new());
    };
    let values = cast(&values, &DataType::Float64).context("casting list values to Float64")?;
    Ok(values
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn extract_i64_list(col: &ArrayRef, row: usize) -> Result<Vec<i64>> {
    let Some(values) = list_values(col, row)? else {
        return Ok(Vec::new());
    };
    if !values.data_type().is_integer() {
        bail!("List inner type is {:?}, expected an integer type", values.data_type());
    }
    let values = cast(&values, &DataType::Int64).context("casting list values to Int64")?;
    // A null band id can never match a band.
    Ok(values
        .as_primitive::<Int64Type>()
        .iter()
        .map(|v| v.unwrap_or(-1))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::writer::write_offline_parquet;

    fn stats(mean: f64) -> BandFeatures {
        [("mean".to_string(), mean), ("median".to_string(), mean + 0.1)]
            .into_iter()
            .collect()
    }

    #[test]
    fn csv_reads_api_columns_and_ignores_the_rest() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "i:objectId,i:ra,i:fid,i:jd,i:magpsf,i:sigmapsf").unwrap();
        writeln!(file, "ZTF1,10.0,1,2459000.5,15.2,0.05").unwrap();
        writeln!(file, "ZTF1,10.0,2,2459001.5,,0.05").unwrap();
        file.flush().unwrap();

        let curves = load_light_curves(file.path()).unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves.points[0].object_id, "ZTF1");
        assert_eq!(curves.points[0].band(), Some(Band::G));
        assert!(curves.points[1].mag().is_nan());
    }

    #[test]
    fn csv_without_required_column_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "i:objectId,i:fid,i:jd,i:magpsf").unwrap();
        writeln!(file, "ZTF1,1,2459000.5,15.2").unwrap();
        file.flush().unwrap();

        let err = load_light_curves(file.path()).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::MissingColumn { column, .. }) => assert_eq!(column, "i:sigmapsf"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parquet_nested_features_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.parquet");
        let names = vec!["mean".to_string(), "median".to_string()];
        let records = vec![
            OfflineRecord {
                object_id: "a".into(),
                g: Some(stats(15.0)),
                r: Some(stats(14.0)),
                cfid: vec![1, 2, 1],
                dcmag: vec![15.0, 14.0, 15.5],
            },
            OfflineRecord {
                object_id: "b".into(),
                g: Some(stats(16.0)),
                r: None,
                cfid: vec![1],
                dcmag: vec![16.0],
            },
        ];
        write_offline_parquet(&path, &records, &names).unwrap();

        let loaded = load_offline_features(&path).unwrap();
        assert_eq!(loaded, records);
    }

    /// Two rows in the narrow types other writers produce: Float32 statistics,
    /// `LargeList<Int32>` band ids and `LargeList<Float32>` magnitudes. Row 0
    /// has a null band id, row 1 has no `lc_features` at all.
    fn write_narrow_parquet(path: &Path) {
        use std::sync::Arc;

        use arrow::array::{
            Float32Array, Float32Builder, Int32Builder, LargeListBuilder, StringArray,
        };
        use arrow::buffer::NullBuffer;
        use arrow::datatypes::{Field, Fields};
        use parquet::arrow::ArrowWriter;

        let band = |mean: [f32; 2], median: [f32; 2]| {
            StructArray::from(vec![
                (
                    Arc::new(Field::new("mean", DataType::Float32, true)),
                    Arc::new(Float32Array::from(mean.to_vec())) as ArrayRef,
                ),
                (
                    Arc::new(Field::new("median", DataType::Float32, true)),
                    Arc::new(Float32Array::from(median.to_vec())) as ArrayRef,
                ),
            ])
        };
        let g = band([15.5, 0.0], [15.25, 0.0]);
        let r = band([14.25, 0.0], [14.75, 0.0]);
        let lc_fields = Fields::from(vec![
            Field::new("1", g.data_type().clone(), true),
            Field::new("2", r.data_type().clone(), true),
        ]);
        let lc_features = StructArray::try_new(
            lc_fields,
            vec![Arc::new(g) as ArrayRef, Arc::new(r)],
            Some(NullBuffer::from(vec![true, false])),
        )
        .unwrap();

        let mut cfid = LargeListBuilder::new(Int32Builder::new());
        cfid.values().append_value(1);
        cfid.values().append_null();
        cfid.values().append_value(2);
        cfid.append(true);
        cfid.values().append_value(1);
        cfid.append(true);

        let mut dcmag = LargeListBuilder::new(Float32Builder::new());
        dcmag.values().append_slice(&[15.5, 15.0, 14.25]);
        dcmag.append(true);
        dcmag.values().append_value(16.0);
        dcmag.append(true);

        let batch = RecordBatch::try_from_iter(vec![
            ("objectId", Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef),
            ("lc_features", Arc::new(lc_features)),
            ("cfid", Arc::new(cfid.finish())),
            ("dcmag", Arc::new(dcmag.finish())),
        ])
        .unwrap();

        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn parquet_narrow_numeric_and_large_list_columns_are_widened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrow.parquet");
        write_narrow_parquet(&path);

        let loaded = load_offline_features(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        let a = &loaded[0];
        assert_eq!(a.object_id, "a");
        let expected = |mean: f64, median: f64| -> BandFeatures {
            [("mean".to_string(), mean), ("median".to_string(), median)]
                .into_iter()
                .collect()
        };
        assert_eq!(a.g, Some(expected(15.5, 15.25)));
        assert_eq!(a.r, Some(expected(14.25, 14.75)));
        assert_eq!(a.dcmag, vec![15.5, 15.0, 14.25]);
    }

    #[test]
    fn parquet_null_band_id_and_null_feature_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrow.parquet");
        write_narrow_parquet(&path);

        let loaded = load_offline_features(&path).unwrap();
        // a null band id reads as -1 and matches neither band
        assert_eq!(loaded[0].cfid, vec![1, -1, 2]);
        assert_eq!(loaded[0].magnitudes(Band::G), vec![15.5]);
        assert_eq!(loaded[0].magnitudes(Band::R), vec![14.25]);

        let b = &loaded[1];
        assert_eq!(b.object_id, "b");
        assert!(b.g.is_none());
        assert!(b.r.is_none());
        assert_eq!(b.cfid, vec![1]);
        assert_eq!(b.dcmag, vec![16.0]);
    }

    #[test]
    fn json_rows_with_null_band_load() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"objectId":"a","lc_features":{{"1":{{"mean":1.5,"median":null}},"2":null}},
                 "cfid":[1,2],"dcmag":[1.0,null]}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        let loaded = load_offline_features(file.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        let g = loaded[0].g.as_ref().unwrap();
        assert_eq!(g["mean"], 1.5);
        assert!(g["median"].is_nan());
        assert!(loaded[0].r.is_none());
        assert!(loaded[0].dcmag[1].is_nan());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_offline_features(Path::new("features.xlsx")).unwrap_err();
        assert!(format!("{err:#}").contains(".xlsx"));
    }
}
