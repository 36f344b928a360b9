//! Isolation forest for unsupervised outlier scoring
//!
//! Scores follow the standard formulation: s = 2^(-E[h(x)] / c(n)) in (0, 1),
//! where higher values mean fewer random cuts were needed to isolate the
//! point, i.e. more anomalous. The decision threshold is fitted from the
//! training scores at the configured contamination quantile.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
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

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    // c(n) = 2 H(n-1) - 2(n-1)/n, H(k) ~ ln(k) + Euler-Mascheroni
    2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    n_trees: usize,
    /// Per-tree subsample size, capped at 256 in the standard algorithm
    sample_size: usize,
    /// Expected fraction of outliers in the population
    contamination: f64,
    seed: u64,
    trees: Vec<Tree>,
    /// Score threshold fitted from training data; scores at or above it are
    /// flagged anomalous
    threshold: f64,
}

impl IsolationForest {
    pub fn new(n_trees: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_trees,
            sample_size: 256,
            contamination,
            seed,
            trees: Vec::new(),
            threshold: f64::INFINITY,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit trees on the rows and derive the contamination threshold.
    pub fn fit(&mut self, x: &[Vec<f64>]) {
        self.trees.clear();

        let n = x.len();
        if n == 0 {
            return;
        }
        // Effective subsample; remembered so scoring normalizes consistently
        self.sample_size = self.sample_size.min(n);
        let sample_size = self.sample_size;
        // Trees stop growing once a point would be isolated anyway
        let depth_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        for t in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
            let indices: Vec<usize> = index::sample(&mut rng, n, sample_size).into_iter().collect();

            let mut nodes = Vec::new();
            build_isolation_node(&mut nodes, x, &indices, 0, depth_limit, &mut rng);
            self.trees.push(Tree { nodes });
        }

        // Threshold at the (1 - contamination) quantile of training scores
        let mut scores: Vec<f64> = x.iter().map(|row| self.score(row)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let quantile = (1.0 - self.contamination).clamp(0.0, 1.0);
        let cut = ((scores.len() as f64) * quantile).floor() as usize;
        self.threshold = scores[cut.min(scores.len() - 1)];
    }

    /// Anomaly score in (0, 1); higher means more anomalous.
    pub fn score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.0;
        }
        2f64.powf(-mean_path / c)
    }

    /// Whether a row scores at or above the fitted contamination threshold
    pub fn is_anomaly(&self, row: &[f64]) -> bool {
        self.score(row) >= self.threshold
    }

    /// Fraction of rows scored normal; the training quality score.
    pub fn normal_fraction(&self, x: &[Vec<f64>]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        let normal = x.iter().filter(|row| !self.is_anomaly(row)).count();
        normal as f64 / x.len() as f64
    }
}

fn path_length(tree: &Tree, row: &[f64]) -> f64 {
    let mut id = 0;
    let mut depth = 0.0;
    loop {
        match &tree.nodes[id] {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                depth += 1.0;
                id = if row.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                    *left
                } else {
                    *right
                };
            }
        }
    }
}

fn build_isolation_node(
    nodes: &mut Vec<Node>,
    x: &[Vec<f64>],
    idx: &[usize],
    depth: usize,
    depth_limit: usize,
    rng: &mut StdRng,
) -> usize {
    if idx.len() <= 1 || depth >= depth_limit {
        nodes.push(Node::Leaf { size: idx.len() });
        return nodes.len() - 1;
    }

    // Pick a random feature with spread; give up after a few attempts if the
    // subset is constant in every sampled dimension
    let n_features = x[idx[0]].len();
    let mut split = None;
    for _ in 0..n_features.max(1) {
        let feature = rng.gen_range(0..n_features.max(1));
        if n_features == 0 {
            break;
        }
        let (min, max) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(x[i][feature]), hi.max(x[i][feature]))
        });
        if max > min {
            split = Some((feature, rng.gen_range(min..max)));
            break;
        }
    }

    let Some((feature, threshold)) = split else {
        nodes.push(Node::Leaf { size: idx.len() });
        return nodes.len() - 1;
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
    let left_child = build_isolation_node(nodes, x, &left_idx, depth + 1, depth_limit, rng);
    let right_child = build_isolation_node(nodes, x, &right_idx, depth + 1, depth_limit, rng);
    if let Node::Split { left, right, .. } = &mut nodes[node_id] {
        *left = left_child;
        *right = right_child;
    }
    node_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_outlier() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![10.0 + (i % 5) as f64, 20.0 + (i % 3) as f64])
            .collect();
        rows.push(vec![500.0, 500.0]);
        rows
    }

    #[test]
    fn test_outlier_scores_highest() {
        let rows = clustered_with_outlier();
        let mut forest = IsolationForest::new(100, 0.1, 42);
        forest.fit(&rows);

        let outlier_score = forest.score(&rows[30]);
        let max_inlier_score = rows[..30]
            .iter()
            .map(|r| forest.score(r))
            .fold(f64::NEG_INFINITY, f64::max);

        assert!(outlier_score > max_inlier_score);
        assert!(forest.is_anomaly(&rows[30]));
    }

    #[test]
    fn test_normal_fraction_near_contamination() {
        let rows = clustered_with_outlier();
        let mut forest = IsolationForest::new(100, 0.1, 42);
        forest.fit(&rows);

        let fraction = forest.normal_fraction(&rows);
        assert!(fraction > 0.7 && fraction < 1.0, "fraction = {}", fraction);
    }

    #[test]
    fn test_unfitted_scores_zero() {
        let forest = IsolationForest::new(100, 0.1, 42);
        assert!(!forest.is_fitted());
        assert_eq!(forest.score(&[1.0, 2.0]), 0.0);
        assert!(!forest.is_anomaly(&[1.0, 2.0]));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let rows = clustered_with_outlier();
        let mut a = IsolationForest::new(50, 0.1, 7);
        a.fit(&rows);
        let mut b = IsolationForest::new(50, 0.1, 7);
        b.fit(&rows);
        for row in &rows {
            assert_eq!(a.score(row), b.score(row));
        }
    }
}
