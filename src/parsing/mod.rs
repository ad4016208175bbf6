use ndarray::{Array1, Array2, Axis};
use std::path::PathBuf;

pub mod diabetes;

/// Number of predictor columns in a record
pub const NUM_FEATURES: usize = 8;

/// Predictor columns, in the order the model expects them
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// The label column (0 = no diabetes, 1 = diabetes)
pub const LABEL_NAME: &str = "Outcome";

/// Rows of `data` are records in `FEATURE_NAMES` order, `target` holds the
/// aligned 0/1 labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub data: Array2<f64>,
    pub target: Array1<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Build a new dataset from the given rows (duplicates allowed)
    pub fn select(&self, rows: &[usize]) -> Dataset {
        Dataset {
            data: self.data.select(Axis(0), rows),
            target: self.target.select(Axis(0), rows),
        }
    }
}

/// Every reason a dataset file can be rejected. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("dataset file {} not found", path.display())]
    FileMissing { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dataset is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("malformed CSV record: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: column {column} is not a finite number")]
    Malformed { line: u64, column: String },
    #[error("line {line}: Outcome must be 0 or 1, got {value}")]
    InvalidLabel { line: u64, value: f64 },
    #[error("dataset has no rows")]
    Empty,
    #[error("dataset rows don't form a matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
