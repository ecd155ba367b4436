//! Regression tree grown on squared-error reduction
//!
//! Nodes live in a flat arena; children are referenced by index. Growth is
//! iterative so deep trees do not depend on the worker thread's stack size.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ForestConfig;

/// Feature values closer than this are treated as equal when looking for a
/// threshold.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
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

/// Growth limits shared by every tree in a forest.
#[derive(Debug, Clone)]
pub(crate) struct TreeParams {
    pub max_features: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
}

impl TreeParams {
    pub fn from_config(config: &ForestConfig, n_features: usize) -> Self {
        Self {
            max_features: config.max_features.resolve(n_features),
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_depth: config.max_depth,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `samples`. Repeated indices count as
    /// repeated observations, which is how bootstrap resamples are fed in.
    pub(crate) fn fit<R: Rng>(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((slot, samples, depth)) = pending.pop() {
            let n = samples.len();
            let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, sq), &i| {
                let v = y[i];
                (s + v, sq + v * v)
            });
            let mean = sum / n as f64;
            let impurity = sum_sq / n as f64 - mean * mean;

            let can_split = n >= params.min_samples_split
                && n >= 2 * params.min_samples_leaf
                && params.max_depth.map_or(true, |max| depth < max)
                && impurity > f64::EPSILON;

            let candidate = if can_split {
                best_split(x, y, &samples, sum, params, rng)
            } else {
                None
            };

            let Some(candidate) = candidate else {
                nodes[slot] = Node::Leaf { value: mean };
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&i| x[[i, candidate.feature]] <= candidate.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });

            nodes[slot] = Node::Split {
                feature: candidate.feature,
                threshold: candidate.threshold,
                left,
                right,
            };

            pending.push((right, right_samples, depth + 1));
            pending.push((left, left_samples, depth + 1));
        }

        Self { nodes }
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

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }
}

/// Search a random subset of features for the threshold that most reduces
/// squared error. Constant features do not count toward `max_features`.
fn best_split<R: Rng>(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    samples: &[usize],
    total: f64,
    params: &TreeParams,
    rng: &mut R,
) -> Option<Candidate> {
    let n = samples.len();
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut order = samples.to_vec();
    let mut visited = 0;
    let mut best: Option<Candidate> = None;

    for feature in features {
        if visited >= params.max_features {
            break;
        }

        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        if x[[order[n - 1], feature]] <= x[[order[0], feature]] + FEATURE_THRESHOLD {
            continue;
        }
        visited += 1;

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            let current = x[[order[pos], feature]];
            let next = x[[order[pos + 1], feature]];
            left_sum += y[order[pos]];

            let n_left = pos + 1;
            let n_right = n - n_left;
            if next <= current + FEATURE_THRESHOLD
                || n_left < params.min_samples_leaf
                || n_right < params.min_samples_leaf
            {
                continue;
            }

            // maximizing this minimizes the children's summed squared error
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;

            if best.map_or(true, |b| score > b.score) {
                let mut threshold = current / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = current;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams::from_config(&ForestConfig::default(), 2)
    }

    fn grow(x: &Array2<f64>, y: &Array1<f64>) -> RegressionTree {
        let mut rng = StdRng::seed_from_u64(0);
        let samples = (0..x.nrows()).collect();
        RegressionTree::fit(x.view(), y.view(), samples, &params(), &mut rng)
    }

    #[test]
    fn learns_a_step_exactly() {
        let x = array![[0.1, 5.0], [0.2, 5.0], [0.3, 5.0], [0.7, 5.0], [0.8, 5.0]];
        let y = array![1.0, 1.0, 1.0, 3.0, 3.0];

        let tree = grow(&x, &y);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(array![0.25, 5.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![0.75, 5.0].view()), 3.0);
        // threshold sits halfway between 0.3 and 0.7
        assert_eq!(tree.predict_row(array![0.49, 0.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![0.51, 0.0].view()), 3.0);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x = array![[0.1, 1.0], [0.2, 2.0], [0.3, 3.0]];
        let y = array![2.0, 2.0, 2.0];

        let tree = grow(&x, &y);

        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(array![9.0, 9.0].view()), 2.0);
    }

    #[test]
    fn constant_features_predict_the_mean() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let y = array![1.0, 2.0, 3.0, 6.0];

        let tree = grow(&x, &y);

        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(array![1.0, 1.0].view()), 3.0);
    }

    #[test]
    fn fully_grown_tree_fits_training_rows() {
        let x = Array2::from_shape_fn((20, 2), |(r, c)| (r * (c + 1)) as f64 / 20.0);
        let y = Array1::from_shape_fn(20, |r| ((r * 7) % 5) as f64);

        let tree = grow(&x, &y);

        for (row, expected) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(tree.predict_row(row), *expected);
        }
    }

    #[test]
    fn depth_limit_is_respected() {
        let x = Array2::from_shape_fn((32, 1), |(r, _)| r as f64);
        let y = Array1::from_shape_fn(32, |r| r as f64);
        let params = TreeParams {
            max_depth: Some(3),
            ..params()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(x.view(), y.view(), (0..32).collect(), &params, &mut rng);

        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.n_leaves(), 8);
    }

    #[test]
    fn repeated_samples_weigh_the_leaf_mean() {
        let x = array![[1.0], [1.0]];
        let y = array![0.0, 4.0];
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::fit(
            x.view(),
            y.view(),
            vec![0, 1, 1, 1],
            &TreeParams::from_config(&ForestConfig::default(), 1),
            &mut rng,
        );

        assert_eq!(tree.predict_row(array![1.0].view()), 3.0);
    }
}
