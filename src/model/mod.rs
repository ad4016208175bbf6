use ndarray::{Array1, ArrayView2};

use crate::parsing::Dataset;

pub mod decision_tree;
pub mod partition;
pub mod random_forest;
pub mod risk;

/// A binary classifier over rows of `FEATURE_NAMES`-ordered predictors.
/// Labels are carried as `f64` holding 0.0 or 1.0, like `Dataset::target`.
pub trait Model {
    fn fit(&mut self, dataset: &Dataset);
    fn predict(&self, inputs: &ArrayView2<f64>) -> Array1<f64>;
}
