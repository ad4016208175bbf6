use crate::parsing::{Dataset, FEATURE_NAMES, NUM_FEATURES};
use ndarray::ArrayView1;
use std::fmt;
use tracing::{debug, info};

use super::partition::{Partition, TRAIN_FRACTION};
use super::random_forest::{ForestConfig, RandomForest};
use super::Model;

/// Outcome of scoring one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLabel {
    Low = 0,
    High = 1,
}

impl RiskLabel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The fixed text shown to the user
    pub fn message(self) -> &'static str {
        match self {
            RiskLabel::Low => "Low Risk of Diabetes",
            RiskLabel::High => "High Risk of Diabetes",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The dataset can't produce a usable train/holdout partition
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error(
        "dataset of {rows} rows leaves {training} training and {holdout} holdout rows, both must be non-empty"
    )]
    TooFewRows {
        rows: usize,
        training: usize,
        holdout: usize,
    },
}

/// A single rejected prediction request. The model stays usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInput {
    #[error("expected 8 feature values, got {0}")]
    WrongLength(usize),
    #[error("feature {name} is not a finite number")]
    NotFinite { name: &'static str },
}

/// The fitted risk-scoring engine.
///
/// Only `fit` can build one, so every `RiskModel` holds a trained forest and
/// `predict` is always legal. Nothing mutates it afterwards, so it can be
/// shared by reference between threads.
#[derive(Debug, Clone)]
pub struct RiskModel {
    forest: RandomForest,
    partition: Partition,
    holdout_accuracy: f64,
}

impl RiskModel {
    /// Partition `dataset` 80/20 and fit a default forest on the training rows.
    /// `seed` drives both the partition and the forest.
    pub fn fit(dataset: &Dataset, seed: u64) -> Result<RiskModel, FitError> {
        RiskModel::fit_with(
            dataset,
            ForestConfig {
                seed,
                ..ForestConfig::default()
            },
        )
    }

    pub fn fit_with(dataset: &Dataset, config: ForestConfig) -> Result<RiskModel, FitError> {
        let partition = Partition::new(dataset.len(), TRAIN_FRACTION, config.seed);
        if partition.training.is_empty() || partition.holdout.is_empty() {
            return Err(FitError::TooFewRows {
                rows: dataset.len(),
                training: partition.training.len(),
                holdout: partition.holdout.len(),
            });
        }

        info!(
            training = partition.training.len(),
            holdout = partition.holdout.len(),
            seed = config.seed,
            "partitioned dataset"
        );

        let mut forest = RandomForest::new(config);
        forest.fit(&dataset.select(&partition.training));

        let holdout = dataset.select(&partition.holdout);
        let predictions = forest.predict(&holdout.data.view());
        let num_mistakes = predictions
            .iter()
            .zip(holdout.target.iter())
            .filter(|(prediction, actual)| prediction != actual)
            .count();
        let holdout_accuracy = 1f64 - num_mistakes as f64 / holdout.len() as f64;

        info!(
            trees = forest.trees.len(),
            num_mistakes,
            holdout_accuracy,
            "risk model fitted"
        );

        Ok(RiskModel {
            forest,
            partition,
            holdout_accuracy,
        })
    }

    /// Score one subject. `features` must hold the eight predictors in
    /// `FEATURE_NAMES` order.
    pub fn predict(&self, features: &[f64]) -> Result<RiskLabel, InvalidInput> {
        if features.len() != NUM_FEATURES {
            return Err(InvalidInput::WrongLength(features.len()));
        }
        if let Some(idx) = features.iter().position(|x| !x.is_finite()) {
            return Err(InvalidInput::NotFinite {
                name: FEATURE_NAMES[idx],
            });
        }

        let instance = ArrayView1::from(features);
        let label = if self.forest.predict_one(&instance) == 1f64 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        };

        debug!(?features, votes = self.forest.votes(&instance), ?label, "scored record");

        Ok(label)
    }

    /// Fraction of holdout rows predicted correctly
    pub fn holdout_accuracy(&self) -> f64 {
        self.holdout_accuracy
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn num_trees(&self) -> usize {
        self.forest.trees.len()
    }
}
