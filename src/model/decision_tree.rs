use crate::parsing::Dataset;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::Model;

/// How many features are considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least one
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, num_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (num_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => num_features,
            MaxFeatures::Fixed(n) => *n,
        };

        n.clamp(1, num_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        // Number of training samples of class 0 and class 1
        counts: [usize; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A CART classification tree using Gini impurity.
/// Samples with `x[feature] <= threshold` go left, the rest go right.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub max_features: MaxFeatures,
    pub min_samples_split: usize,
    pub seed: u64, // Drives the per-node feature subsampling
    nodes: Vec<Node>, // nodes[0] is the root once fitted
}

/// Candidate split found while scanning one feature
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    pub fn new(max_features: MaxFeatures, min_samples_split: usize, seed: u64) -> DecisionTree {
        DecisionTree {
            max_features,
            min_samples_split,
            seed,
            nodes: vec![],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, left).max(depth_of(nodes, right))
                }
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }

    /// Predict the class of a single instance. An unfitted tree always answers 0.
    pub fn predict_one(&self, instance: &ArrayView1<f64>) -> f64 {
        let mut idx = 0;

        loop {
            match self.nodes.get(idx) {
                None => return 0f64,
                Some(Node::Leaf { counts }) => return majority(counts),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if instance[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    // Grow the subtree for `rows` and return the index of its root node
    fn grow(
        &mut self,
        data: &ArrayView2<f64>,
        target: &[usize],
        rows: &mut [usize],
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(target, rows);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { counts });

        let pure = counts[0] == 0 || counts[1] == 0;
        if pure || rows.len() < self.min_samples_split {
            return idx;
        }

        let Some(split) = self.best_split(data, target, rows, rng) else {
            return idx;
        };

        // Move the left-hand rows to the front of the slice
        let mut boundary = 0;
        for i in 0..rows.len() {
            if data[[rows[i], split.feature]] <= split.threshold {
                rows.swap(i, boundary);
                boundary += 1;
            }
        }
        let (left_rows, right_rows) = rows.split_at_mut(boundary);

        let left = self.grow(data, target, left_rows, rng);
        let right = self.grow(data, target, right_rows, rng);

        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };

        idx
    }

    /// Look for the lowest-impurity split among a random subset of features.
    /// Features that turn out to be constant on `rows` don't count towards
    /// the subset size, so a node is only left unsplit if no feature separates it.
    fn best_split(
        &self,
        data: &ArrayView2<f64>,
        target: &[usize],
        rows: &[usize],
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let num_features = data.ncols();
        let max_features = self.max_features.resolve(num_features);
        let mut features: Vec<usize> = (0..num_features).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= max_features {
                break;
            }

            let Some(candidate) = best_split_on_feature(data, target, rows, feature) else {
                continue;
            };
            visited += 1;

            if best.as_ref().map_or(true, |b| candidate.impurity < b.impurity) {
                best = Some(candidate);
            }
        }

        best
    }
}

impl Model for DecisionTree {
    /// Fit the tree to the whole dataset, replacing any previous fit
    fn fit(&mut self, dataset: &Dataset) {
        self.nodes.clear();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let target: Vec<usize> = dataset.target.iter().map(|y| (*y == 1f64) as usize).collect();
        let mut rows: Vec<usize> = (0..dataset.len()).collect();

        self.grow(&dataset.data.view(), &target, &mut rows, &mut rng);
    }

    fn predict(&self, inputs: &ArrayView2<f64>) -> Array1<f64> {
        inputs
            .axis_iter(Axis(0))
            .map(|row| self.predict_one(&row))
            .collect()
    }
}

/// Majority class of a leaf, ties go to class 0
fn majority(counts: &[usize; 2]) -> f64 {
    if counts[1] > counts[0] {
        1f64
    } else {
        0f64
    }
}

fn class_counts(target: &[usize], rows: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];

    for &row in rows {
        counts[target[row]] += 1;
    }

    counts
}

fn gini(counts: &[usize; 2]) -> f64 {
    let total = (counts[0] + counts[1]) as f64;
    if total == 0f64 {
        return 0f64;
    }

    let p0 = counts[0] as f64 / total;
    let p1 = counts[1] as f64 / total;

    1f64 - p0 * p0 - p1 * p1
}

/// Scan the sorted values of one feature and return the threshold with the
/// lowest weighted Gini impurity. None if the feature is constant on `rows`.
fn best_split_on_feature(
    data: &ArrayView2<f64>,
    target: &[usize],
    rows: &[usize],
    feature: usize,
) -> Option<SplitCandidate> {
    if rows.len() < 2 {
        return None;
    }

    let mut samples: Vec<(f64, usize)> = rows
        .iter()
        .map(|&row| (data[[row, feature]], target[row]))
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = class_counts(target, rows);
    let n = samples.len() as f64;
    let mut left = [0usize; 2];
    let mut best: Option<SplitCandidate> = None;

    for i in 0..samples.len() - 1 {
        left[samples[i].1] += 1;

        let (lo, hi) = (samples[i].0, samples[i + 1].0);
        if lo >= hi {
            continue;
        }

        let right = [total[0] - left[0], total[1] - left[1]];
        let n_left = (left[0] + left[1]) as f64;
        let n_right = (right[0] + right[1]) as f64;
        let impurity = (n_left * gini(&left) + n_right * gini(&right)) / n;

        if best.as_ref().map_or(true, |b| impurity < b.impurity) {
            // The midpoint can round up to `hi` for adjacent floats
            let mut threshold = lo + (hi - lo) / 2f64;
            if threshold >= hi {
                threshold = lo;
            }

            best = Some(SplitCandidate {
                feature,
                threshold,
                impurity,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn dataset(data: Array2<f64>, target: Vec<f64>) -> Dataset {
        Dataset {
            data,
            target: Array1::from(target),
        }
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(8), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(8), 8);
        assert_eq!(MaxFeatures::Fixed(0).resolve(8), 1);
        assert_eq!(MaxFeatures::Fixed(20).resolve(8), 8);
    }

    #[test]
    fn gini_of_pure_and_balanced_nodes() {
        assert_eq!(gini(&[4, 0]), 0f64);
        assert_eq!(gini(&[0, 0]), 0f64);
        assert!((gini(&[2, 2]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pure_dataset_is_a_single_leaf() {
        let mut tree = DecisionTree::new(MaxFeatures::All, 2, 0);
        tree.fit(&dataset(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], vec![1.0, 1.0, 1.0]));

        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&array![[100.0, -100.0]].view()).to_vec(), vec![1.0]);
    }

    #[test]
    fn separable_feature_is_split_at_the_midpoint() {
        let mut tree = DecisionTree::new(MaxFeatures::All, 2, 0);
        let data = array![[0.0, 1.0], [1.0, 9.0], [2.0, 1.0], [10.0, 9.0], [11.0, 1.0], [12.0, 9.0]];
        tree.fit(&dataset(data.clone(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]));

        assert_eq!(tree.depth(), 1);
        assert_eq!(
            tree.nodes[0],
            Node::Split {
                feature: 0,
                threshold: 6.0,
                left: 1,
                right: 2
            }
        );
        assert_eq!(tree.predict(&data.view()).to_vec(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(tree.predict(&array![[5.9, 0.0], [6.1, 0.0]].view()).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn fully_grown_tree_memorizes_distinct_rows() {
        let data = array![[1.0, 5.0], [2.0, 3.0], [3.0, 8.0], [4.0, 1.0], [5.0, 7.0]];
        let target = vec![0.0, 1.0, 0.0, 1.0, 0.0];
        let mut tree = DecisionTree::new(MaxFeatures::Fixed(1), 2, 7);
        tree.fit(&dataset(data.clone(), target.clone()));

        assert_eq!(tree.predict(&data.view()).to_vec(), target);
    }

    #[test]
    fn constant_features_leave_a_majority_leaf() {
        let mut tree = DecisionTree::new(MaxFeatures::All, 2, 0);
        tree.fit(&dataset(array![[1.0], [1.0], [1.0]], vec![1.0, 0.0, 1.0]));

        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.predict_one(&array![1.0].view()), 1.0);
    }

    #[test]
    fn leaf_ties_go_to_class_zero() {
        let mut tree = DecisionTree::new(MaxFeatures::All, 2, 0);
        tree.fit(&dataset(array![[1.0], [1.0]], vec![1.0, 0.0]));

        assert_eq!(tree.predict_one(&array![1.0].view()), 0.0);
    }

    #[test]
    fn unfitted_tree_predicts_zero() {
        let tree = DecisionTree::new(MaxFeatures::Sqrt, 2, 0);

        assert_eq!(tree.predict(&array![[1.0, 2.0]].view()).to_vec(), vec![0.0]);
    }
}
