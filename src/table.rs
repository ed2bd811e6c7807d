use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::DbvError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A single cell value. Sorting and filtering are written exhaustively over
/// this variant instead of coercing through strings at comparison time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Epoch milliseconds. Formatted as a date for display only.
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The raw string form used for substring filtering. This is the
    /// unformatted value; display formatting (NULL marker, date rendering)
    /// happens in the UI and never affects filter matches.
    pub fn raw_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ms) => ms.to_string(),
        }
    }

    /// Natural ordering between two non-null values. Mixed variants fall
    /// back to comparing their raw string forms.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (a, b) => a.raw_string().cmp(&b.raw_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&Value::Null)
    }
}

/// Column metadata, immutable for the lifetime of one table view. The type
/// tag is free form and only used for display, never for typed comparison.
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub type_tag: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        TableColumn {
            name: name.into(),
            type_tag: type_tag.into(),
            nullable: false,
            primary_key: false,
            foreign_key: false,
        }
    }

    pub fn is_temporal(&self) -> bool {
        self.type_tag.contains("date") || self.type_tag.contains("time")
    }
}

/// One loaded row set, the local stand-in for what a remote query endpoint
/// would deliver. `total_row_count` can exceed `rows.len()` when the source
/// was truncated on load.
pub struct TableData {
    pub name: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Row>,
    pub total_row_count: usize,
}

impl TableData {
    pub fn new(name: impl Into<String>, columns: Vec<TableColumn>, rows: Vec<Row>) -> Self {
        let total_row_count = rows.len();
        TableData {
            name: name.into(),
            columns,
            rows,
            total_row_count,
        }
    }

    pub fn load(path: PathBuf) -> Result<Self, DbvError> {
        let file_info = Self::get_file_info(path)?;
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };

        // Each column is converted in its own thread. All values end up as
        // tagged variants in memory.
        let start_time = Instant::now();
        let df = frame.collect()?;

        let loaded: Result<Vec<(TableColumn, Vec<Value>)>, _> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let loaded = loaded?;

        let duration = start_time.elapsed().as_millis();
        info!(
            "Loaded {} ({} bytes) in {duration}ms",
            file_info.path.display(),
            file_info.file_size
        );

        let nrows = df.height();
        let mut columns = Vec::with_capacity(loaded.len());
        let mut column_data = Vec::with_capacity(loaded.len());
        for (column, data) in loaded {
            debug!(
                "Column \"{}\": {} ({} rows)",
                column.name,
                column.type_tag,
                data.len()
            );
            columns.push(column);
            column_data.push(data);
        }

        // Transpose column storage into rows for the view engine.
        let mut rows = Vec::with_capacity(nrows);
        for ridx in 0..nrows {
            let values = column_data
                .iter_mut()
                .map(|col| std::mem::replace(&mut col[ridx], Value::Null))
                .collect();
            rows.push(Row::new(values));
        }

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        Ok(TableData::new(name, columns, rows))
    }

    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == field)
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(TableColumn, Vec<Value>), PolarsError> {
        let col = df.column(col_name)?;
        let dtype = col.dtype().clone();

        let data: Vec<Value> = if dtype == DataType::Boolean {
            col.bool()?
                .into_iter()
                .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
                .collect()
        } else if Self::is_numeric_type(&dtype) {
            let casted = col.cast(&DataType::Float64)?;
            casted
                .f64()?
                .into_iter()
                .map(|v| v.map(Value::Number).unwrap_or(Value::Null))
                .collect()
        } else if let DataType::Datetime(unit, _) = &dtype {
            let factor = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let casted = col.cast(&DataType::Int64)?;
            casted
                .i64()?
                .into_iter()
                .map(|v| v.map(|t| Value::Timestamp(t / factor)).unwrap_or(Value::Null))
                .collect()
        } else if dtype == DataType::Date {
            // Days since epoch
            let casted = col.cast(&DataType::Int64)?;
            casted
                .i64()?
                .into_iter()
                .map(|v| {
                    v.map(|d| Value::Timestamp(d * 86_400_000))
                        .unwrap_or(Value::Null)
                })
                .collect()
        } else {
            let casted = col.cast(&DataType::String)?;
            casted
                .str()?
                .into_iter()
                .map(|v| {
                    v.map(|s| Value::Text(s.replace("\r\n", " ↵ ").replace("\n", " ↵ ")))
                        .unwrap_or(Value::Null)
                })
                .collect()
        };

        let column = TableColumn {
            name: col_name.to_string(),
            type_tag: dtype.to_string().to_lowercase(),
            nullable: col.null_count() > 0,
            primary_key: false,
            foreign_key: false,
        };
        Ok((column, data))
    }

    fn detect_file_type(path: &Path) -> Result<FileType, DbvError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(DbvError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, DbvError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DbvError::FileNotFound,
            ErrorKind::PermissionDenied => DbvError::PermissionDenied,
            _ => DbvError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(DbvError::LoadingFailed("Not a file!".into()));
        }

        let file_size = metadata.len();
        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size,
            file_type,
        })
    }

    fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.as_path().into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(
            PlPath::Local(path.as_path().into()),
            ScanArgsParquet::default(),
        )
    }

    fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.as_path().into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_null_values_compare_naturally() {
        assert_eq!(
            Value::Number(1.0).compare(&Value::Number(2.0)),
            Ordering::Less
        );
        assert_eq!(
            Value::Text("b".into()).compare(&Value::Text("a".into())),
            Ordering::Greater
        );
        assert_eq!(Value::Bool(false).compare(&Value::Bool(true)), Ordering::Less);
        assert_eq!(
            Value::Timestamp(10).compare(&Value::Timestamp(10)),
            Ordering::Equal
        );
    }

    #[test]
    fn nan_compares_equal_instead_of_panicking() {
        assert_eq!(
            Value::Number(f64::NAN).compare(&Value::Number(1.0)),
            Ordering::Equal
        );
    }

    #[test]
    fn mixed_variants_fall_back_to_raw_strings() {
        // "10" < "9" lexicographically
        assert_eq!(
            Value::Number(10.0).compare(&Value::Text("9".into())),
            Ordering::Less
        );
    }

    #[test]
    fn raw_string_keeps_integral_numbers_short() {
        assert_eq!(Value::Number(42.0).raw_string(), "42");
        assert_eq!(Value::Number(1.5).raw_string(), "1.5");
    }

    #[test]
    fn temporal_detection_uses_the_type_tag() {
        assert!(TableColumn::new("created", "datetime[ms]").is_temporal());
        assert!(TableColumn::new("birthday", "date").is_temporal());
        assert!(!TableColumn::new("name", "str").is_temporal());
    }
}
