//! Command-line front end: collects the eight raw fields of one subject,
//! hands them to the fitted model and renders the verdict.

use json::object;
use std::io::{self, BufRead, Write};
use tracing::warn;

use crate::model::risk::{InvalidInput, RiskLabel, RiskModel};
use crate::parsing::NUM_FEATURES;

/// Prompt labels, in the order the model expects the features
pub const FIELD_LABELS: [&str; NUM_FEATURES] = [
    "Pregnancies",
    "Glucose",
    "Blood Pressure",
    "Skin Thickness",
    "Insulin",
    "BMI",
    "Diabetes Pedigree",
    "Age",
];

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Why a single request produced no verdict
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Please enter valid numeric values.")]
    NotNumeric { field: String, value: String },
    #[error("Please enter valid numeric values. ({0})")]
    Rejected(#[from] InvalidInput),
}

/// Parse raw text fields into numbers. Surrounding whitespace is ignored.
pub fn parse_raw_features<S: AsRef<str>>(raw: &[S]) -> Result<Vec<f64>, RequestError> {
    raw.iter()
        .enumerate()
        .map(|(idx, value)| {
            let value = value.as_ref().trim();
            value.parse::<f64>().map_err(|_| RequestError::NotNumeric {
                field: FIELD_LABELS.get(idx).copied().unwrap_or("extra field").to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Parse and score one record
pub fn score_raw<S: AsRef<str>>(model: &RiskModel, raw: &[S]) -> Result<RiskLabel, RequestError> {
    let features = parse_raw_features(raw)?;
    let label = model.predict(&features)?;

    Ok(label)
}

pub fn render(label: RiskLabel, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => label.message().to_string(),
        OutputFormat::Json => {
            let mut data = object! {};
            data["label"] = label.as_u8().into();
            data["risk"] = label.message().into();
            data.dump()
        }
    }
}

pub fn render_error(err: &RequestError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => {
            let mut data = object! {};
            data["error"] = err.to_string().into();
            data.dump()
        }
    }
}

/// Score one record and write the verdict (or the input error) to `output`.
/// Returns whether a verdict was produced.
pub fn respond<S: AsRef<str>, W: Write>(
    model: &RiskModel,
    raw: &[S],
    format: OutputFormat,
    output: &mut W,
) -> io::Result<bool> {
    match score_raw(model, raw) {
        Ok(label) => {
            writeln!(output, "{}", render(label, format))?;
            Ok(true)
        }
        Err(err) => {
            match &err {
                RequestError::NotNumeric { field, value } => {
                    warn!(%field, %value, "rejected prediction request, field is not a number")
                }
                RequestError::Rejected(reason) => {
                    warn!(%reason, "rejected prediction request")
                }
            }
            writeln!(output, "{}", render_error(&err, format))?;
            Ok(false)
        }
    }
}

/// Interactive form: prompt for every field, print the verdict, repeat until
/// the input is exhausted. A bad entry only rejects the current form.
/// Banner and prompts go to `prompts`, verdicts and errors to `output`.
pub fn run_interactive<R: BufRead, W: Write, P: Write>(
    model: &RiskModel,
    input: &mut R,
    output: &mut W,
    prompts: &mut P,
    format: OutputFormat,
) -> io::Result<()> {
    writeln!(prompts, "Diabetes Risk Predictor")?;

    loop {
        let mut raw = Vec::with_capacity(NUM_FEATURES);

        for label in FIELD_LABELS {
            write!(prompts, "{label}: ")?;
            prompts.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(prompts)?;
                return Ok(());
            }
            raw.push(line.trim_end_matches(&['\r', '\n'][..]).to_string());
        }

        respond(model, &raw, format, output)?;
        output.flush()?;
    }
}
