use std::path::Path;

use anyhow::{bail, Context, Result};
use log::debug;
use ndarray::Array2;

use crate::data::model::Band;

/// Name of the identifier column, always first.
pub const ID_COLUMN: &str = "objectId";

/// Build the flat feature-table header from the extractor's feature names:
/// `objectId`, then for each band its statistics followed by `asymmetry`.
pub fn build_header(names: &[String]) -> Vec<String> {
    let mut header = vec![ID_COLUMN.to_string()];
    for band in Band::ALL {
        header.extend(names.iter().map(|n| format!("{n}_{band}")));
        header.push(format!("asymmetry_{band}"));
    }
    header
}

/// One object's flattened feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub object_id: String,
    pub values: Vec<f64>,
}

impl FeatureRow {
    /// Whether every statistic is a finite number.
    pub fn is_defined(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// A feature table: fixed header plus one row per object, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    header: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Empty table with the given header (identifier column included).
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Append a row. The value count must match the header's statistic count.
    pub fn push(&mut self, row: FeatureRow) -> Result<()> {
        if row.values.len() != self.n_features() {
            bail!(
                "{}: row has {} values but the table has {} feature columns",
                row.object_id,
                row.values.len(),
                self.n_features()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    /// Remove every row that holds a NaN or infinite statistic. Returns the
    /// number of rows removed.
    pub fn drop_undefined(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| {
            let keep = row.is_defined();
            if !keep {
                debug!("{}: dropped, undefined statistic", row.object_id);
            }
            keep
        });
        before - self.rows.len()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn object_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.object_id.as_str()).collect()
    }

    /// Number of statistic columns (identifier excluded).
    pub fn n_features(&self) -> usize {
        self.header.len().saturating_sub(1)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Statistic columns as a `rows × features` matrix, in row order.
    pub fn to_matrix(&self) -> Array2<f64> {
        let n_features = self.n_features();
        Array2::from_shape_fn((self.rows.len(), n_features), |(i, j)| self.rows[i].values[j])
    }

    /// Write the table as CSV with its header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating feature table {}", path.display()))?;
        writer.write_record(&self.header).context("writing header")?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.header.len());
            record.push(row.object_id.clone());
            record.extend(row.values.iter().map(|v| v.to_string()));
            writer.write_record(&record).with_context(|| format!("writing row {}", row.object_id))?;
        }
        writer.flush().context("flushing feature table")?;
        Ok(())
    }

    /// Read a table previously written by [`FeatureTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening feature table {}", path.display()))?;
        let header: Vec<String> = reader
            .headers()
            .context("reading CSV headers")?
            .iter()
            .map(|h| h.to_string())
            .collect();
        if header.first().map(String::as_str) != Some(ID_COLUMN) {
            bail!("{}: first column must be '{ID_COLUMN}'", path.display());
        }

        let mut table = FeatureTable::new(header);
        for (row_no, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("CSV row {row_no}"))?;
            let object_id = record.get(0).unwrap_or("").to_string();
            let values = record
                .iter()
                .skip(1)
                .enumerate()
                .map(|(j, tok)| {
                    tok.trim().parse::<f64>().with_context(|| {
                        format!("Row {row_no}, column {}: '{tok}' is not a number", j + 1)
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            table.push(FeatureRow { object_id, values })?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FeatureTable {
        let mut t = FeatureTable::new(build_header(&["mean".to_string()]));
        for (id, v) in [("a", 1.0), ("b", f64::NAN), ("c", 3.0), ("d", f64::INFINITY)] {
            t.push(FeatureRow {
                object_id: id.into(),
                values: vec![v, 0.1, v, 0.2],
            })
            .unwrap();
        }
        t
    }

    #[test]
    fn header_layout() {
        let header = build_header(&["mean".to_string(), "skew".to_string()]);
        assert_eq!(
            header,
            [
                "objectId",
                "mean_g",
                "skew_g",
                "asymmetry_g",
                "mean_r",
                "skew_r",
                "asymmetry_r"
            ]
        );
    }

    #[test]
    fn undefined_rows_are_dropped_in_order() {
        let mut t = table();
        assert_eq!(t.drop_undefined(), 2);
        assert_eq!(t.object_ids(), vec!["a", "c"]);
    }

    #[test]
    fn matrix_excludes_identifier() {
        let mut t = table();
        t.drop_undefined();
        let m = t.to_matrix();
        assert_eq!(m.dim(), (2, 4));
        assert_eq!(m[[1, 0]], 3.0);
    }

    #[test]
    fn wrong_width_row_is_rejected() {
        let mut t = FeatureTable::new(build_header(&["mean".to_string()]));
        let err = t.push(FeatureRow {
            object_id: "x".into(),
            values: vec![1.0],
        });
        assert!(err.is_err());
    }

    #[test]
    fn csv_round_trip() {
        let mut t = table();
        t.drop_undefined();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        t.write_csv(&path).unwrap();
        assert_eq!(FeatureTable::read_csv(&path).unwrap(), t);
    }
}
