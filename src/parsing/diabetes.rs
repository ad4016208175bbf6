use super::{Dataset, LoadError, FEATURE_NAMES, LABEL_NAME, NUM_FEATURES};
use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// One row of the Pima Indians diabetes table, deserialized from the nine
/// required cells only.
#[derive(Debug, Deserialize)]
struct DiabetesRecord {
    #[serde(rename = "Pregnancies")]
    pregnancies: f64,
    #[serde(rename = "Glucose")]
    glucose: f64,
    #[serde(rename = "BloodPressure")]
    blood_pressure: f64,
    #[serde(rename = "SkinThickness")]
    skin_thickness: f64,
    #[serde(rename = "Insulin")]
    insulin: f64,
    #[serde(rename = "BMI")]
    bmi: f64,
    #[serde(rename = "DiabetesPedigreeFunction")]
    diabetes_pedigree_function: f64,
    #[serde(rename = "Age")]
    age: f64,
    #[serde(rename = "Outcome")]
    outcome: f64,
}

impl DiabetesRecord {
    /// The predictors in `FEATURE_NAMES` order
    fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }
}

/// The nine required columns: predictors in order, then the label
fn required_columns() -> impl Iterator<Item = &'static str> {
    FEATURE_NAMES.into_iter().chain(std::iter::once(LABEL_NAME))
}

/// Position of every required column in the header, first occurrence wins.
/// Returns the names of the absent columns instead if any are missing.
fn locate_columns(headers: &csv::ByteRecord) -> Result<Vec<usize>, Vec<String>> {
    let mut indices = vec![];
    let mut missing = vec![];

    for name in required_columns() {
        match headers.iter().position(|h| h == name.as_bytes()) {
            Some(idx) => indices.push(idx),
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(indices)
    } else {
        Err(missing)
    }
}

/// I/O failures while reading are precondition failures, not CSV problems
fn read_error(path: &Path, err: csv::Error) -> LoadError {
    if err.is_io_error() {
        LoadError::Io {
            path: path.to_path_buf(),
            source: err.into(),
        }
    } else {
        LoadError::Csv(err)
    }
}

/// Map a deserialization failure to the required column it happened in
fn cell_error(line: u64, err: csv::Error) -> LoadError {
    let column = match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => err
            .field()
            .and_then(|idx| required_columns().nth(idx as usize)),
        _ => None,
    };

    match column {
        Some(column) => LoadError::Malformed {
            line,
            column: column.to_string(),
        },
        None => LoadError::Csv(err),
    }
}

/// Load and validate the diabetes dataset.
///
/// Checks, in order, that the file can be read and that its header holds all
/// nine required columns. Only those cells are ever decoded, any other column
/// is skipped untouched. Any bad row rejects the whole file.
pub fn parse_dataset(path: impl AsRef<Path>) -> Result<Dataset, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::FileMissing {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let headers = reader
        .byte_headers()
        .map_err(|err| read_error(path, err))?
        .clone();

    let columns = locate_columns(&headers).map_err(|missing| LoadError::Schema { missing })?;
    let required_headers: csv::ByteRecord = required_columns().collect();

    let mut data = Vec::new();
    let mut target = Vec::new();

    for result in reader.byte_records() {
        let record = result.map_err(|err| read_error(path, err))?;
        let line = record.position().map_or(0, |p| p.line());

        let mut cells: csv::ByteRecord = columns.iter().map(|&idx| &record[idx]).collect();
        cells.set_position(record.position().cloned());
        let row: DiabetesRecord = cells
            .deserialize(Some(&required_headers))
            .map_err(|err| cell_error(line, err))?;
        let features = row.features();

        if let Some(idx) = features.iter().position(|x| !x.is_finite()) {
            return Err(LoadError::Malformed {
                line,
                column: FEATURE_NAMES[idx].to_string(),
            });
        }
        if row.outcome != 0f64 && row.outcome != 1f64 {
            return Err(LoadError::InvalidLabel {
                line,
                value: row.outcome,
            });
        }

        data.extend_from_slice(&features);
        target.push(row.outcome);
    }

    if target.is_empty() {
        return Err(LoadError::Empty);
    }

    debug!(columns = headers.len(), "dataset header validated");
    info!(path = %path.display(), rows = target.len(), "loaded dataset");

    Ok(Dataset {
        data: Array2::from_shape_vec((target.len(), NUM_FEATURES), data)?,
        target: Array1::from(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str =
        "Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,DiabetesPedigreeFunction,Age,Outcome";

    fn write_csv(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("diabetes.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_rows_in_feature_order() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!("{HEADER}\n6,148,72,35,0,33.6,0.627,50,1\n1,85,66,29,0,26.6,0.351,31,0\n"),
        );

        let dataset = parse_dataset(&path).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(
            dataset.data.row(0).to_vec(),
            vec![6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]
        );
        assert_eq!(dataset.target.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn extra_and_reordered_columns_are_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "Id,Outcome,Age,DiabetesPedigreeFunction,BMI,Insulin,SkinThickness,BloodPressure,Glucose,Pregnancies\n\
             7,1,50,0.627,33.6,0,35,72,148,6\n",
        );

        let dataset = parse_dataset(&path).unwrap();

        assert_eq!(
            dataset.data.row(0).to_vec(),
            vec![6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]
        );
        assert_eq!(dataset.target[0], 1.0);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diabetes.csv");

        match parse_dataset(&path) {
            Err(LoadError::FileMissing { path: reported }) => assert_eq!(reported, path),
            other => panic!("expected FileMissing, got {other:?}"),
        }
    }

    #[test]
    fn each_missing_required_column_is_a_schema_error() {
        let columns: Vec<&str> = HEADER.split(',').collect();

        for skip in 0..columns.len() {
            let kept: Vec<&str> = columns
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, c)| *c)
                .collect();
            let row = vec!["1"; kept.len()].join(",");
            let dir = TempDir::new().unwrap();
            let path = write_csv(&dir, &format!("{}\n{}\n", kept.join(","), row));

            match parse_dataset(&path) {
                Err(LoadError::Schema { missing }) => {
                    assert_eq!(missing, vec![columns[skip].to_string()])
                }
                other => panic!("expected Schema for {}, got {other:?}", columns[skip]),
            }
        }
    }

    #[test]
    fn column_names_are_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!("{}\n6,148,72,35,0,33.6,0.627,50,1\n", HEADER.replace("BMI", "bmi")),
        );

        assert!(matches!(
            parse_dataset(&path),
            Err(LoadError::Schema { missing }) if missing == vec!["BMI".to_string()]
        ));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER}\n"));

        assert!(matches!(parse_dataset(&path), Err(LoadError::Empty)));
    }

    #[test]
    fn non_numeric_cell_rejects_the_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            &format!("{HEADER}\n6,148,72,35,0,33.6,0.627,50,1\n1,abc,66,29,0,26.6,0.351,31,0\n"),
        );

        match parse_dataset(&path) {
            Err(LoadError::Malformed { line, column }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "Glucose");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn extra_column_with_non_utf8_bytes_is_never_decoded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diabetes.csv");
        let mut contents = format!("{HEADER},Note\n6,148,72,35,0,33.6,0.627,50,1,").into_bytes();
        contents.extend_from_slice(b"\xff\xfe\n");
        fs::write(&path, contents).unwrap();

        let dataset = parse_dataset(&path).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.target[0], 1.0);
    }

    #[test]
    fn repeated_required_column_uses_the_first_occurrence() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER},Age\n6,148,72,35,0,33.6,0.627,50,1,99\n"));

        let dataset = parse_dataset(&path).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.data[[0, 7]], 50.0);
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diabetes.csv");
        fs::create_dir(&path).unwrap();

        match parse_dataset(&path) {
            Err(LoadError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn nan_cell_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER}\n6,148,72,35,0,NaN,0.627,50,1\n"));

        match parse_dataset(&path) {
            Err(LoadError::Malformed { line, column }) => {
                assert_eq!(line, 2);
                assert_eq!(column, "BMI");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn outcome_outside_zero_one_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER}\n6,148,72,35,0,33.6,0.627,50,2\n"));

        assert!(matches!(
            parse_dataset(&path),
            Err(LoadError::InvalidLabel { line: 2, value }) if value == 2.0
        ));
    }
}
