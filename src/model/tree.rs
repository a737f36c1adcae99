//! Regression trees used as boosting stages.
//!
//! Trees are stored as a flat node array with the root at index 0. Splits are
//! exact: for every feature the candidate rows are sorted, and each boundary
//! between two distinct values is scored by the reduction of squared error.
//! Samples with `x[feature] <= threshold` go left.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Tree structure limits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    /// A node with fewer samples than this becomes a leaf.
    pub min_samples_split: usize,
    /// Every child must keep at least this many samples.
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Immutable regression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    /// Grows a tree on `target` restricted to `rows`.
    ///
    /// `target` is indexed by row number of `x`, so callers can pass a row
    /// subsample without copying the matrix.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        target: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, target, rows.to_vec(), 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        target: &[f64],
        rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let id = self.nodes.len();
        let value = mean(target, &rows);
        self.nodes.push(Node::Leaf { value });

        let splittable = depth < params.max_depth
            && rows.len() >= params.min_samples_split.max(2)
            && rows.len() >= 2 * params.min_samples_leaf.max(1);
        if !splittable {
            return id;
        }

        if let Some(split) = best_split(x, target, &rows, params.min_samples_leaf.max(1)) {
            let left = self.grow(x, target, split.left, depth + 1, params);
            let right = self.grow(x, target, split.right, depth + 1, params);
            self.nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
        }
        id
    }

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

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

fn mean(target: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| target[r]).sum::<f64>() / rows.len() as f64
}

fn best_split(
    x: ArrayView2<'_, f64>,
    target: &[f64],
    rows: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| target[r]).sum();
    let base = total * total / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted = rows.to_vec();
    for feature in 0..x.ncols() {
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        for p in 1..n {
            left_sum += target[sorted[p - 1]];
            if p < min_leaf || n - p < min_leaf {
                continue;
            }
            let lo = x[[sorted[p - 1], feature]];
            let hi = x[[sorted[p], feature]];
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            let gain =
                left_sum * left_sum / p as f64 + right_sum * right_sum / (n - p) as f64 - base;
            if best.map_or(true, |(_, _, g)| gain > g) {
                let mid = lo + (hi - lo) / 2.0;
                let threshold = if mid < hi { mid } else { lo };
                best = Some((feature, threshold, gain));
            }
        }
    }

    let (feature, threshold, gain) = best?;
    if gain <= 1e-12 * base.abs().max(1.0) {
        return None;
    }
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&r| x[[r, feature]] <= threshold);
    Some(SplitCandidate {
        feature,
        threshold,
        left,
        right,
    })
}
