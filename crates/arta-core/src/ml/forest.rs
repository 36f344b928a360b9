//! Random forests of bounded-depth decision trees
//!
//! Dense `Vec<f64>` feature rows, gini splitting with class weights for the
//! classifier, variance splitting for the regressor. Trees are arenas of
//! nodes so artifacts serialize to flat JSON. Every tree gets its own RNG
//! seeded from the forest seed, so fitting is reproducible.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Class distribution (classifier) or single-element mean (regressor)
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, row: &[f64]) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn push_leaf(nodes: &mut Vec<Node>, value: Vec<f64>) -> usize {
    nodes.push(Node::Leaf { value });
    nodes.len() - 1
}

/// Unique sorted values of one feature over the given rows
fn sorted_unique(x: &[Vec<f64>], idx: &[usize], feature: usize) -> Vec<f64> {
    let mut values: Vec<f64> = idx.iter().map(|&i| x[i][feature]).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values.dedup();
    values
}

// ============================================================================
// Classifier
// ============================================================================

/// Ensemble-of-decision-trees classifier with class-balanced weighting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl RandomForestClassifier {
    pub fn new(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split: 2,
            seed,
            n_classes: 0,
            trees: Vec::new(),
        }
    }

    /// Fit on feature rows and class indices in `0..n_classes`.
    ///
    /// `class_weights` rebalances skewed label counts; pass all-ones for
    /// unweighted fitting.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[usize], n_classes: usize, class_weights: &[f64]) {
        self.n_classes = n_classes;
        self.trees.clear();

        let n = x.len();
        if n == 0 || n_classes == 0 {
            return;
        }
        let n_features = x[0].len();
        let mtry = ((n_features as f64).sqrt().round() as usize)
            .max(1)
            .min(n_features.max(1));

        for t in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
            // Bootstrap sample with replacement
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut nodes = Vec::new();
            build_classification_node(
                &mut nodes,
                x,
                y,
                &indices,
                0,
                self.max_depth,
                self.min_samples_split,
                mtry,
                n_classes,
                class_weights,
                &mut rng,
            );
            self.trees.push(Tree { nodes });
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Averaged leaf distributions across all trees, normalized to sum 1
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_value(row)) {
                *p += v;
            }
        }
        let total: f64 = proba.iter().sum();
        if total > 0.0 {
            for p in &mut proba {
                *p /= total;
            }
        }
        proba
    }

    /// Class index with maximum predicted probability
    pub fn predict(&self, row: &[f64]) -> usize {
        let proba = self.predict_proba(row);
        proba
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

fn weighted_distribution(
    y: &[usize],
    idx: &[usize],
    n_classes: usize,
    class_weights: &[f64],
) -> Vec<f64> {
    let mut dist = vec![0.0; n_classes];
    for &i in idx {
        dist[y[i]] += class_weights[y[i]];
    }
    dist
}

fn gini(dist: &[f64]) -> f64 {
    let total: f64 = dist.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - dist.iter().map(|d| (d / total) * (d / total)).sum::<f64>()
}

fn normalized(mut dist: Vec<f64>) -> Vec<f64> {
    let total: f64 = dist.iter().sum();
    if total > 0.0 {
        for d in &mut dist {
            *d /= total;
        }
    }
    dist
}

#[allow(clippy::too_many_arguments)]
fn build_classification_node(
    nodes: &mut Vec<Node>,
    x: &[Vec<f64>],
    y: &[usize],
    idx: &[usize],
    depth: usize,
    max_depth: usize,
    min_samples_split: usize,
    mtry: usize,
    n_classes: usize,
    class_weights: &[f64],
    rng: &mut StdRng,
) -> usize {
    let dist = weighted_distribution(y, idx, n_classes, class_weights);
    let is_pure = dist.iter().filter(|d| **d > 0.0).count() <= 1;

    if depth >= max_depth || idx.len() < min_samples_split || is_pure {
        return push_leaf(nodes, normalized(dist));
    }

    let n_features = x[0].len();
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in index::sample(rng, n_features, mtry.min(n_features)) {
        let values = sorted_unique(x, idx, feature);
        if values.len() < 2 {
            continue;
        }
        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let mut left = vec![0.0; n_classes];
            let mut right = vec![0.0; n_classes];
            for &i in idx {
                if x[i][feature] <= threshold {
                    left[y[i]] += class_weights[y[i]];
                } else {
                    right[y[i]] += class_weights[y[i]];
                }
            }
            let weight_left: f64 = left.iter().sum();
            let weight_right: f64 = right.iter().sum();
            if weight_left <= 0.0 || weight_right <= 0.0 {
                continue;
            }
            let score =
                (weight_left * gini(&left) + weight_right * gini(&right)) / (weight_left + weight_right);
            if best.map_or(true, |(_, _, s)| score < s) {
                best = Some((feature, threshold, score));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return push_leaf(nodes, normalized(dist));
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
        idx.iter().partition(|&&i| x[i][feature] <= threshold);

    let node_id = nodes.len();
    nodes.push(Node::Split {
        feature,
        threshold,
        left: 0,
        right: 0,
    });
    let left_child = build_classification_node(
        nodes,
        x,
        y,
        &left_idx,
        depth + 1,
        max_depth,
        min_samples_split,
        mtry,
        n_classes,
        class_weights,
        rng,
    );
    let right_child = build_classification_node(
        nodes,
        x,
        y,
        &right_idx,
        depth + 1,
        max_depth,
        min_samples_split,
        mtry,
        n_classes,
        class_weights,
        rng,
    );
    if let Node::Split { left, right, .. } = &mut nodes[node_id] {
        *left = left_child;
        *right = right_child;
    }
    node_id
}

// ============================================================================
// Regressor
// ============================================================================

/// Ensemble-of-decision-trees regressor with variance splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    trees: Vec<Tree>,
}

impl RandomForestRegressor {
    pub fn new(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split: 2,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) {
        self.trees.clear();

        let n = x.len();
        if n == 0 {
            return;
        }
        let n_features = x[0].len();
        // Regression forests conventionally consider all features per split
        let mtry = n_features.max(1);

        for t in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut nodes = Vec::new();
            build_regression_node(
                &mut nodes,
                x,
                y,
                &indices,
                0,
                self.max_depth,
                self.min_samples_split,
                mtry,
                &mut rng,
            );
            self.trees.push(Tree { nodes });
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean of per-tree leaf means
    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| tree.leaf_value(row).first().copied().unwrap_or(0.0))
            .sum();
        sum / self.trees.len() as f64
    }
}

fn mean_of(y: &[f64], idx: &[usize]) -> f64 {
    if idx.is_empty() {
        return 0.0;
    }
    idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64
}

/// Sum of squared errors around the subset mean
fn sse_of(y: &[f64], idx: &[usize]) -> f64 {
    let mean = mean_of(y, idx);
    idx.iter().map(|&i| (y[i] - mean) * (y[i] - mean)).sum()
}

#[allow(clippy::too_many_arguments)]
fn build_regression_node(
    nodes: &mut Vec<Node>,
    x: &[Vec<f64>],
    y: &[f64],
    idx: &[usize],
    depth: usize,
    max_depth: usize,
    min_samples_split: usize,
    mtry: usize,
    rng: &mut StdRng,
) -> usize {
    if depth >= max_depth || idx.len() < min_samples_split || sse_of(y, idx) <= 1e-12 {
        return push_leaf(nodes, vec![mean_of(y, idx)]);
    }

    let n_features = x[0].len();
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in index::sample(rng, n_features, mtry.min(n_features)) {
        let values = sorted_unique(x, idx, feature);
        if values.len() < 2 {
            continue;
        }
        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                idx.iter().partition(|&&i| x[i][feature] <= threshold);
            if left_idx.is_empty() || right_idx.is_empty() {
                continue;
            }
            let score = sse_of(y, &left_idx) + sse_of(y, &right_idx);
            if best.map_or(true, |(_, _, s)| score < s) {
                best = Some((feature, threshold, score));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return push_leaf(nodes, vec![mean_of(y, idx)]);
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
        idx.iter().partition(|&&i| x[i][feature] <= threshold);

    let node_id = nodes.len();
    nodes.push(Node::Split {
        feature,
        threshold,
        left: 0,
        right: 0,
    });
    let left_child = build_regression_node(
        nodes,
        x,
        y,
        &left_idx,
        depth + 1,
        max_depth,
        min_samples_split,
        mtry,
        rng,
    );
    let right_child = build_regression_node(
        nodes,
        x,
        y,
        &right_idx,
        depth + 1,
        max_depth,
        min_samples_split,
        mtry,
        rng,
    );
    if let Node::Split { left, right, .. } = &mut nodes[node_id] {
        *left = left_child;
        *right = right_child;
    }
    node_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_separates_simple_data() {
        // One informative feature: class 0 below 0.5, class 1 above
        let x: Vec<Vec<f64>> = vec![
            vec![0.1, 0.0],
            vec![0.2, 1.0],
            vec![0.3, 0.5],
            vec![0.4, 0.2],
            vec![0.7, 0.9],
            vec![0.8, 0.1],
            vec![0.9, 0.4],
            vec![1.0, 0.6],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];

        let mut forest = RandomForestClassifier::new(25, 5, 42);
        forest.fit(&x, &y, 2, &[1.0, 1.0]);

        assert!(forest.is_fitted());
        assert_eq!(forest.predict(&[0.15, 0.5]), 0);
        assert_eq!(forest.predict(&[0.95, 0.5]), 1);

        let proba = forest.predict_proba(&[0.95, 0.5]);
        assert_eq!(proba.len(), 2);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(proba[1] > 0.8);
    }

    #[test]
    fn test_classifier_deterministic_given_seed() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<usize> = (0..10).map(|i| usize::from(i >= 5)).collect();

        let mut a = RandomForestClassifier::new(10, 4, 7);
        a.fit(&x, &y, 2, &[1.0, 1.0]);
        let mut b = RandomForestClassifier::new(10, 4, 7);
        b.fit(&x, &y, 2, &[1.0, 1.0]);

        for row in &x {
            assert_eq!(a.predict_proba(row), b.predict_proba(row));
        }
    }

    #[test]
    fn test_regressor_fits_piecewise_constant() {
        let x: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..12).map(|i| if i < 6 { 10.0 } else { 100.0 }).collect();

        let mut forest = RandomForestRegressor::new(25, 4, 42);
        forest.fit(&x, &y);

        assert!(forest.is_fitted());
        assert!((forest.predict(&[2.0]) - 10.0).abs() < 15.0);
        assert!((forest.predict(&[10.0]) - 100.0).abs() < 25.0);
        assert!(forest.predict(&[10.0]) > forest.predict(&[2.0]));
    }

    #[test]
    fn test_unfitted_forest_degrades() {
        let forest = RandomForestRegressor::new(10, 4, 42);
        assert!(!forest.is_fitted());
        assert_eq!(forest.predict(&[1.0]), 0.0);
    }
}
