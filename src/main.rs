pub mod logging;
pub mod model;
pub mod parsing;
pub mod shell;

use clap::Parser;
use model::risk::{FitError, RiskModel};
use parsing::{diabetes, LoadError};
use shell::OutputFormat;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path of the diabetes dataset (CSV with a header row)
    #[arg(short, long, default_value = "diabetes.csv")]
    dataset_path: PathBuf,

    /// Seed of the train/holdout partition and of the random forest
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Score a single record and exit, e.g. 6,148,72,35,0,33.6,0.627,50
    /// Order: Pregnancies, Glucose, BloodPressure, SkinThickness, Insulin,
    /// BMI, DiabetesPedigreeFunction, Age.
    /// Without this the interactive form is shown instead
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    features: Option<Vec<String>>,

    /// How results are printed
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long)]
    verbose: bool,
}

/// Title and body shown when the engine can't be built
fn fatal_message(err: &StartupError, dataset_path: &Path) -> String {
    match err {
        StartupError::Load(LoadError::FileMissing { .. }) => format!(
            "File Missing: Make sure '{}' is in the same folder as this program.",
            dataset_path.display()
        ),
        StartupError::Load(LoadError::Schema { missing }) => format!(
            "CSV Error: The CSV file does not contain the required columns (missing: {}).",
            missing.join(", ")
        ),
        StartupError::Load(err) => format!("CSV Error: {err}"),
        StartupError::Fit(err) => format!("Training Error: {err}"),
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Load the dataset and fit the model, once
fn build_model(args: &Args) -> Result<RiskModel, StartupError> {
    let dataset = diabetes::parse_dataset(&args.dataset_path)?;
    let model = RiskModel::fit(&dataset, args.seed)?;

    Ok(model)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::init(args.verbose) {
        eprintln!("{err}");
    }

    let model = match build_model(&args) {
        Ok(model) => model,
        Err(err) => {
            error!(%err, path = %args.dataset_path.display(), "failed to build the risk model");
            eprintln!("{}", fatal_message(&err, &args.dataset_path));
            return ExitCode::FAILURE;
        }
    };
    debug!(
        trees = model.num_trees(),
        training_rows = model.partition().training.len(),
        holdout_accuracy = model.holdout_accuracy(),
        "risk model ready"
    );

    let stdout = io::stdout();
    let result = match &args.features {
        Some(raw) => shell::respond(&model, raw.as_slice(), args.output, &mut stdout.lock()),
        None => {
            // Keep stdout machine-readable when printing JSON
            let mut prompts: Box<dyn Write> = match args.output {
                OutputFormat::Json => Box::new(io::stderr()),
                OutputFormat::Text => Box::new(io::stdout()),
            };
            let stdin = io::stdin();
            shell::run_interactive(
                &model,
                &mut stdin.lock(),
                &mut stdout.lock(),
                &mut prompts,
                args.output,
            )
            .map(|_| true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(%err, "failed to talk to the terminal");
            ExitCode::FAILURE
        }
    }
}
