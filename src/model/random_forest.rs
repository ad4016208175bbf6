use crate::parsing::Dataset;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::decision_tree::{DecisionTree, MaxFeatures};
use super::Model;

/// Training hyperparams of the forest
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub num_trees: usize,
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            num_trees: 100,
            max_features: MaxFeatures::Sqrt,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

/// Bagged ensemble of CART trees combined by majority vote.
///
/// A single `StdRng` seeded from `config.seed` drives the whole fit: for every
/// tree, in order, it draws the bootstrap sample and then the seed of that
/// tree's own feature-subsampling RNG. Two fits on the same dataset with the
/// same config therefore build identical forests.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub config: ForestConfig,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> RandomForest {
        RandomForest {
            config,
            trees: vec![],
        }
    }

    /// Number of trees voting for class 1
    pub fn votes(&self, instance: &ArrayView1<f64>) -> usize {
        self.trees
            .iter()
            .filter(|tree| tree.predict_one(instance) == 1f64)
            .count()
    }

    /// Class 1 needs a strict majority of the trees, a tied vote gives class 0
    pub fn predict_one(&self, instance: &ArrayView1<f64>) -> f64 {
        if 2 * self.votes(instance) > self.trees.len() {
            1f64
        } else {
            0f64
        }
    }
}

impl Model for RandomForest {
    fn fit(&mut self, dataset: &Dataset) {
        self.trees.clear();

        if dataset.is_empty() {
            warn!("fitting a random forest on an empty dataset, every prediction will be 0");
            return;
        }

        let num_rows = dataset.len();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        for _ in 0..self.config.num_trees {
            let bootstrap: Vec<usize> = (0..num_rows)
                .map(|_| rng.gen_range(0..num_rows))
                .collect();
            let mut tree = DecisionTree::new(
                self.config.max_features,
                self.config.min_samples_split,
                rng.gen(),
            );

            tree.fit(&dataset.select(&bootstrap));
            self.trees.push(tree);
        }

        debug!(
            trees = self.trees.len(),
            max_depth = self.trees.iter().map(|t| t.depth()).max().unwrap_or(0),
            nodes = self.trees.iter().map(|t| t.num_nodes()).sum::<usize>(),
            "random forest fitted"
        );
    }

    fn predict(&self, inputs: &ArrayView2<f64>) -> Array1<f64> {
        inputs
            .axis_iter(Axis(0))
            .map(|row| self.predict_one(&row))
            .collect()
    }
}
