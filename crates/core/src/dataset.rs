use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A loaded tabular dataset. The column set is whatever the file declares;
/// rule evaluation must tolerate absent columns.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<DatasetRow>,
}

/// One record of a tabular dataset, keyed by column name.
pub type DatasetRow = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl CellValue {
    /// Parse a raw cell, treating empty cells and the usual NA markers as
    /// missing values.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_missing_marker(trimmed) {
            return CellValue::Null;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return CellValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return CellValue::Float(value);
        }
        CellValue::Text(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(value) => Some(*value as f64),
            CellValue::Float(value) => Some(*value),
            CellValue::Text(_) | CellValue::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Display form used for label distributions.
    pub fn display(&self) -> String {
        match self {
            CellValue::Int(value) => value.to_string(),
            CellValue::Float(value) => value.to_string(),
            CellValue::Text(value) => value.clone(),
            CellValue::Null => "null".to_string(),
        }
    }
}

fn is_missing_marker(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "na" | "n/a" | "nan" | "null"
    )
}

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("dataset {path} has no header row")]
    MissingHeader { path: String },
}

/// Load a CSV dataset into typed rows. Loading failures are typed and left
/// to the caller; a batch scan records them instead of aborting.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetLoadError> {
    let display_path = path.to_string_lossy().to_string();
    let file = std::fs::File::open(path).map_err(|source| DatasetLoadError::Io {
        path: display_path.clone(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|source| DatasetLoadError::Malformed {
            path: display_path.clone(),
            source,
        })?;
    let columns = headers
        .iter()
        .map(|name| name.trim().to_string())
        .collect::<Vec<_>>();
    if columns.is_empty() || columns.iter().all(|name| name.is_empty()) {
        return Err(DatasetLoadError::MissingHeader { path: display_path });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| DatasetLoadError::Malformed {
            path: display_path.clone(),
            source,
        })?;
        let mut row = DatasetRow::new();
        for (index, column) in columns.iter().enumerate() {
            // Short records (flexible mode) leave trailing cells missing.
            let cell = record.get(index).map(CellValue::parse).unwrap_or(CellValue::Null);
            row.insert(column.clone(), cell);
        }
        rows.push(row);
    }

    Ok(Dataset {
        path: path.to_path_buf(),
        columns,
        rows,
    })
}

/// Rule-independent dataset measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub row_count: u64,
    pub column_count: u64,
    pub missing_cells: u64,
    pub label_distribution: Option<BTreeMap<String, u64>>,
}

pub fn dataset_stats(dataset: &Dataset, label_column: &str) -> DatasetStats {
    let missing_cells = dataset
        .rows
        .iter()
        .flat_map(|row| row.values())
        .filter(|cell| cell.is_null())
        .count() as u64;

    let label_distribution = if dataset.columns.iter().any(|name| name == label_column) {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in &dataset.rows {
            if let Some(cell) = row.get(label_column) {
                if !cell.is_null() {
                    *counts.entry(cell.display()).or_insert(0) += 1;
                }
            }
        }
        Some(counts)
    } else {
        None
    };

    DatasetStats {
        row_count: dataset.rows.len() as u64,
        column_count: dataset.columns.len() as u64,
        missing_cells,
        label_distribution,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{dataset_stats, load_dataset, CellValue, DatasetLoadError};

    fn write_dataset(contents: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("events.csv");
        fs::write(&path, contents).expect("write dataset");
        (temp, path)
    }

    #[test]
    fn parses_typed_cells() {
        assert_eq!(CellValue::parse("7"), CellValue::Int(7));
        assert_eq!(CellValue::parse("2.5"), CellValue::Float(2.5));
        assert_eq!(CellValue::parse(" Delete "), CellValue::Text("Delete".to_string()));
        assert_eq!(CellValue::parse(""), CellValue::Null);
        assert_eq!(CellValue::parse("N/A"), CellValue::Null);
    }

    #[test]
    fn loads_rows_and_counts_missing_cells() {
        let (_temp, path) = write_dataset(
            "User,Action,Login_Attempts,Label\n\
             alice,Read,1,normal\n\
             bob,Delete,,suspicious\n\
             carol,,6,normal\n",
        );
        let dataset = load_dataset(&path).expect("load");
        assert_eq!(dataset.columns.len(), 4);
        assert_eq!(dataset.rows.len(), 3);

        let stats = dataset_stats(&dataset, "Label");
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.column_count, 4);
        assert_eq!(stats.missing_cells, 2);

        let labels = stats.label_distribution.expect("label column present");
        assert_eq!(labels.get("normal"), Some(&2));
        assert_eq!(labels.get("suspicious"), Some(&1));
    }

    #[test]
    fn absent_label_column_is_not_an_error() {
        let (_temp, path) = write_dataset("a,b\n1,2\n");
        let dataset = load_dataset(&path).expect("load");
        let stats = dataset_stats(&dataset, "Label");
        assert!(stats.label_distribution.is_none());
    }

    #[test]
    fn short_rows_count_as_missing() {
        let (_temp, path) = write_dataset("a,b,c\n1,2\n");
        let dataset = load_dataset(&path).expect("load");
        let stats = dataset_stats(&dataset, "Label");
        assert_eq!(stats.missing_cells, 1);
        assert!(dataset.rows[0].get("c").expect("cell present").is_null());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let temp = TempDir::new().expect("tempdir");
        let result = load_dataset(&temp.path().join("absent.csv"));
        assert!(matches!(result, Err(DatasetLoadError::Io { .. })));
    }

    #[test]
    fn headerless_file_is_rejected() {
        let (_temp, path) = write_dataset("");
        let result = load_dataset(&path);
        assert!(matches!(
            result,
            Err(DatasetLoadError::MissingHeader { .. })
        ));
    }
}
