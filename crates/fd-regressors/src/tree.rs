//! CART regression tree grown by the boosting estimators.
//!
//! Splits minimise squared error. An optional L2 penalty on leaf values
//! shrinks leaves towards zero and turns the split gain into the
//! second-order boosting gain `G_L²/(n_L+λ) + G_R²/(n_R+λ) − G²/(n+λ)`.
//! With `λ = 0` this is exactly the reduction in sum of squared errors.
//! When bin edges are supplied, thresholds are restricted to those edges.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Growth parameters for a single tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0
    pub max_depth: usize,
    /// Minimum node size eligible for splitting
    pub min_samples_split: usize,
    /// Minimum number of rows in each child
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values
    pub l2_leaf_reg: f64,
    /// Minimum gain a split must exceed
    pub min_split_gain: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            l2_leaf_reg: 0.0,
            min_split_gain: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree stored as a flat node arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    target: &'a [f64],
    params: &'a TreeParams,
    bin_edges: Option<&'a [Vec<f64>]>,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows in `rows`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        target: &[f64],
        rows: Vec<usize>,
        params: &TreeParams,
        bin_edges: Option<&[Vec<f64>]>,
    ) -> Self {
        let mut grower = Grower {
            x: x.view(),
            target,
            params,
            bin_edges,
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    /// Predict a single feature row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl Grower<'_> {
    fn leaf_value(&self, rows: &[usize]) -> f64 {
        let sum: f64 = rows.iter().map(|&r| self.target[r]).sum();
        sum / (rows.len() as f64 + self.params.l2_leaf_reg)
    }

    fn score(&self, sum: f64, count: usize) -> f64 {
        sum * sum / (count as f64 + self.params.l2_leaf_reg)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(&rows),
        });

        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split.max(2)
            || rows.len() < 2 * self.params.min_samples_leaf.max(1)
        {
            return id;
        }

        let Some(split) = self.best_split(&rows) else {
            return id;
        };
        drop(rows);

        let left = self.grow(split.left, depth + 1);
        let right = self.grow(split.right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let total: f64 = rows.iter().map(|&r| self.target[r]).sum();
        let parent = self.score(total, rows.len());
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = rows.len();

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..self.x.ncols() {
            sorted.clear();
            sorted.extend(rows.iter().map(|&r| (self.x[[r, feature]], self.target[r])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let edges = self.bin_edges.map(|e| e[feature].as_slice());
            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += sorted[k].1;
                let left_count = k + 1;
                let (lo, hi) = (sorted[k].0, sorted[k + 1].0);
                if lo == hi || left_count < min_leaf || n - left_count < min_leaf {
                    continue;
                }
                let threshold = match edges {
                    Some(edges) => match edge_between(edges, lo, hi) {
                        Some(edge) => edge,
                        None => continue,
                    },
                    None => 0.5 * (lo + hi),
                };
                let gain = self.score(left_sum, left_count)
                    + self.score(total - left_sum, n - left_count)
                    - parent;
                if gain > self.params.min_split_gain
                    && gain > 1e-12
                    && best.is_none_or(|(_, _, g)| gain > g)
                {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[[r, feature]] <= threshold);
        Some(SplitCandidate {
            feature,
            threshold,
            gain,
            left,
            right,
        })
        .filter(|s| !s.left.is_empty() && !s.right.is_empty() && s.gain.is_finite())
    }
}

/// Largest bin edge `e` with `lo <= e < hi`.
fn edge_between(edges: &[f64], lo: f64, hi: f64) -> Option<f64> {
    let pos = edges.partition_point(|&e| e < hi);
    (pos > 0 && edges[pos - 1] >= lo).then(|| edges[pos - 1])
}

/// Quantile bin edges per feature, at most `max_bins - 1` distinct edges each.
pub fn quantile_bin_edges(x: ArrayView2<'_, f64>, max_bins: usize) -> Vec<Vec<f64>> {
    let bins = max_bins.max(2);
    x.columns()
        .into_iter()
        .map(|column| {
            let mut values: Vec<f64> = column.to_vec();
            values.sort_by(f64::total_cmp);
            values.dedup();
            if values.len() <= bins {
                // Every distinct value gets its own bin
                return values;
            }
            let mut edges: Vec<f64> = (1..bins)
                .map(|b| {
                    let pos = b * (values.len() - 1) / bins;
                    values[pos]
                })
                .collect();
            edges.dedup();
            edges
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};

    #[test]
    fn test_tree_fits_step_function() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let tree = RegressionTree::fit(x.view(), &y, (0..6).collect(), &TreeParams::default(), None);

        assert_eq!(tree.n_leaves(), 2);
        assert_relative_eq!(tree.predict_row(array![0.5].view()), 1.0);
        assert_relative_eq!(tree.predict_row(array![4.5].view()), 5.0);
    }

    #[test]
    fn test_depth_zero_is_mean() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [1.0, 2.0, 3.0, 6.0];
        let params = TreeParams {
            max_depth: 0,
            ..Default::default()
        };
        let tree = RegressionTree::fit(x.view(), &y, (0..4).collect(), &params, None);
        assert_eq!(tree.n_leaves(), 1);
        assert_relative_eq!(tree.predict_row(array![10.0].view()), 3.0);
    }

    #[test]
    fn test_l2_penalty_shrinks_leaves() {
        let x = array![[0.0], [1.0]];
        let y = [2.0, 2.0];
        let params = TreeParams {
            max_depth: 0,
            l2_leaf_reg: 2.0,
            ..Default::default()
        };
        let tree = RegressionTree::fit(x.view(), &y, vec![0, 1], &params, None);
        // 4 / (2 + 2)
        assert_relative_eq!(tree.predict_row(array![0.0].view()), 1.0);
    }

    #[test]
    fn test_min_leaf_blocks_small_children() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 0.0, 10.0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..Default::default()
        };
        let tree = RegressionTree::fit(x.view(), &y, (0..4).collect(), &params, None);
        // The only admissible split is 2 | 2
        assert_eq!(tree.n_leaves(), 2);
        assert_relative_eq!(tree.predict_row(array![3.0].view()), 5.0);
    }

    #[test]
    fn test_binned_thresholds_use_edges() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..8).map(|i| if i < 4 { 0.0 } else { 1.0 }).collect();
        let edges = quantile_bin_edges(x.view(), 4);
        assert!(edges[0].len() <= 3);
        let tree = RegressionTree::fit(x.view(), &y, (0..8).collect(), &TreeParams::default(), Some(&edges));
        assert!(tree.n_leaves() >= 2);
        assert_relative_eq!(tree.predict_row(array![7.0].view()), 1.0);
    }

    #[test]
    fn test_edge_between() {
        let edges = [1.0, 2.0, 3.0];
        assert_eq!(edge_between(&edges, 1.5, 2.5), Some(2.0));
        assert_eq!(edge_between(&edges, 2.0, 2.5), Some(2.0));
        assert_eq!(edge_between(&edges, 2.1, 2.9), None);
    }
}
