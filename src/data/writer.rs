use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, Int64Builder, ListBuilder, StringArray,
    StructArray,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::model::{Band, LightCurvePoint, OfflineRecord};

/// Write light-curve points in the API's CSV column layout.
pub fn write_light_curves(path: &Path, points: &[LightCurvePoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating light-curve file {}", path.display()))?;
    for p in points {
        writer.serialize(p).context("writing light-curve row")?;
    }
    writer.flush().context("flushing light-curve file")?;
    Ok(())
}

/// Write offline feature rows to Parquet with a nested `lc_features` struct.
///
/// Each band becomes a nullable struct with one Float64 field per entry of
/// `names`. A band that is `None` is written as a null struct; a name that is
/// missing from a band's map is written as a null value.
pub fn write_offline_parquet(
    path: &Path,
    records: &[OfflineRecord],
    names: &[String],
) -> Result<()> {
    let ids = StringArray::from(
        records.iter().map(|r| r.object_id.as_str()).collect::<Vec<_>>(),
    );

    let g = band_struct(records, Band::G, names)?;
    let r = band_struct(records, Band::R, names)?;
    let lc_fields = Fields::from(vec![
        Field::new(Band::G.key(), g.data_type().clone(), true),
        Field::new(Band::R.key(), r.data_type().clone(), true),
    ]);
    let lc_features = StructArray::try_new(lc_fields, vec![Arc::new(g), Arc::new(r)], None)
        .context("assembling lc_features struct")?;

    let mut cfid_builder = ListBuilder::new(Int64Builder::new());
    for rec in records {
        cfid_builder.values().append_slice(&rec.cfid);
        cfid_builder.append(true);
    }
    let cfid = cfid_builder.finish();

    let mut dcmag_builder = ListBuilder::new(Float64Builder::new());
    for rec in records {
        dcmag_builder.values().append_slice(&rec.dcmag);
        dcmag_builder.append(true);
    }
    let dcmag = dcmag_builder.finish();

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("objectId", Arc::new(ids)),
        ("lc_features", Arc::new(lc_features)),
        ("cfid", Arc::new(cfid)),
        ("dcmag", Arc::new(dcmag)),
    ];
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), false))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
        .context("creating record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating parquet file {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn band_struct(records: &[OfflineRecord], band: Band, names: &[String]) -> Result<StructArray> {
    let fields: Fields = names
        .iter()
        .map(|name| Field::new(name, DataType::Float64, true))
        .collect();
    let columns: Vec<ArrayRef> = names
        .iter()
        .map(|name| {
            let values: Float64Array = records
                .iter()
                .map(|rec| rec.band(band).and_then(|stats| stats.get(name).copied()))
                .collect();
            Arc::new(values) as ArrayRef
        })
        .collect();
    let validity = NullBuffer::from(
        records
            .iter()
            .map(|rec| rec.band(band).is_some())
            .collect::<Vec<bool>>(),
    );
    StructArray::try_new(fields, columns, Some(validity))
        .with_context(|| format!("assembling band struct '{}'", band.key()))
}
