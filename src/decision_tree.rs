use crate::functions;
use crate::split::{self, SplitPoint};
use crate::table::{Record, Subset, Table, TableError};
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// When a node stops growing.
///
/// Shared by tree construction and prediction so that both agree on which
/// nodes are leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopRule {
    min_samples: NonZeroUsize,
    max_depth: NonZeroUsize,
}

impl StopRule {
    pub fn new(min_samples: NonZeroUsize, max_depth: NonZeroUsize) -> Self {
        Self {
            min_samples,
            max_depth,
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples.get()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.get()
    }

    /// `depth` is 1 at the root.
    pub fn check(&self, depth: usize, sample_count: usize) -> Option<LeafReason> {
        if depth >= self.max_depth() {
            Some(LeafReason::MaxDepth)
        } else if sample_count <= self.min_samples() {
            Some(LeafReason::MinSamples)
        } else {
            None
        }
    }

    pub fn should_stop(&self, depth: usize, sample_count: usize) -> bool {
        self.check(depth, sample_count).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafReason {
    MaxDepth,
    MinSamples,
    /// No candidate feature admits a split.
    NoSplit,
}

/// Target statistics of the rows that reached a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStats {
    /// Mean of the target.
    pub prediction: f64,
    /// Mean squared deviation of the target from `prediction`.
    pub variance: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        stats: NodeStats,
        reason: LeafReason,
    },
    Internal {
        stats: NodeStats,
        /// Index into [`DecisionTreeRegressor::features`].
        feature: usize,
        threshold: f64,
        mse_reduction: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn stats(&self) -> &NodeStats {
        match self {
            Node::Leaf { stats, .. } | Node::Internal { stats, .. } => stats,
        }
    }

    pub fn prediction(&self) -> f64 {
        self.stats().prediction
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn children(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { left, right, .. } => Some((&**left, &**right)),
        }
    }

    fn depth(&self) -> usize {
        match self.children() {
            None => 1,
            Some((l, r)) => 1 + std::cmp::max(l.depth(), r.depth()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    features: Option<Vec<String>>,
    min_samples: NonZeroUsize,
    max_depth: NonZeroUsize,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate split features, in evaluation order.
    ///
    /// When several features reduce the variance equally, the one listed
    /// first wins. Defaults to every table column in table order.
    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Minimum number of rows on each side of a split.
    pub fn min_samples(mut self, n: NonZeroUsize) -> Self {
        self.min_samples = n;
        self
    }

    /// Maximum depth, counting the root as depth 1.
    pub fn max_depth(mut self, n: NonZeroUsize) -> Self {
        self.max_depth = n;
        self
    }

    pub fn stop_rule(&self) -> StopRule {
        StopRule::new(self.min_samples, self.max_depth)
    }

    #[instrument(skip(self, table), fields(rows = table.rows_len(), target = table.target_name()))]
    pub fn fit(&self, table: &Table) -> Result<DecisionTreeRegressor, FitError> {
        let features = match &self.features {
            Some(features) => features.clone(),
            None => table.names().to_vec(),
        };
        if features.is_empty() {
            return Err(FitError::NoFeatures);
        }
        let columns = features
            .iter()
            .map(|name| {
                table
                    .column_index(name)
                    .ok_or_else(|| FitError::UnknownFeature { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rule = self.stop_rule();
        if rule.min_samples() > table.rows_len() {
            return Err(FitError::TooFewSamples {
                min_samples: rule.min_samples(),
                rows: table.rows_len(),
            });
        }

        let mut builder = NodeBuilder {
            features: &features,
            columns: &columns,
            rule,
        };
        let root = builder.build(&mut Subset::new(table), 1);

        let tree = DecisionTreeRegressor {
            root,
            features,
            rule,
        };
        info!(
            nodes = tree.nodes_len(),
            leaves = tree.leaves().count(),
            depth = tree.depth(),
            "tree fitted"
        );
        Ok(tree)
    }

    /// Builds the table from `records` (using the candidate features as
    /// columns) and fits a tree on it.
    pub fn fit_records<I, R>(
        &self,
        records: I,
        target: &str,
    ) -> Result<DecisionTreeRegressor, FitError>
    where
        I: IntoIterator<Item = R>,
        R: Record,
    {
        let features = self.features.as_ref().ok_or(FitError::NoFeatures)?;
        let table = Table::from_records(records, features.as_slice(), target)?;
        self.fit(&table)
    }
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            features: None,
            min_samples: NonZeroUsize::new(1).expect("never fails"),
            max_depth: NonZeroUsize::new(5).expect("never fails"),
        }
    }
}

#[derive(Debug)]
struct NodeBuilder<'a> {
    features: &'a [String],
    columns: &'a [usize],
    rule: StopRule,
}

impl<'a> NodeBuilder<'a> {
    fn build(&mut self, subset: &mut Subset, depth: usize) -> Node {
        let stats = NodeStats {
            prediction: functions::mean(subset.target()),
            variance: functions::mse(subset.target()),
            sample_count: subset.rows_len(),
        };

        if let Some(reason) = self.rule.check(depth, stats.sample_count) {
            return Node::Leaf { stats, reason };
        }

        let mut best: Option<(usize, SplitPoint)> = None;
        for (feature, &column) in self.columns.iter().enumerate() {
            let split = match split::find_best_split(subset, column, self.rule.min_samples()) {
                Some(split) => split,
                None => continue,
            };
            if best
                .as_ref()
                .map_or(true, |(_, t)| t.mse_reduction < split.mse_reduction)
            {
                best = Some((feature, split));
            }
        }

        let (feature, split) = match best {
            Some(best) => best,
            None => {
                return Node::Leaf {
                    stats,
                    reason: LeafReason::NoSplit,
                }
            }
        };
        debug!(
            depth,
            rows = stats.sample_count,
            feature = %self.features[feature],
            threshold = split.threshold,
            mse_reduction = split.mse_reduction,
            "split node"
        );

        let row = subset.partition(split.column, split.threshold);
        let (left, right) =
            subset.with_split(row, |subset| Box::new(self.build(subset, depth + 1)));
        Node::Internal {
            stats,
            feature,
            threshold: split.threshold,
            mse_reduction: split.mse_reduction,
            left,
            right,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    root: Node,
    features: Vec<String>,
    rule: StopRule,
}

impl DecisionTreeRegressor {

    pub fn predict<R: Record + ?Sized>(&self, record: &R) -> Result<f64, PredictError> {
        let leaf = self.descend(|feature| {
            let name = &self.features[feature];
            record
                .field(name)
                .ok_or_else(|| PredictError::MissingFeature { name: name.clone() })
        })?;
        Ok(leaf.prediction())
    }

    /// Predicts from feature values given in [`Self::features`] order.
    pub fn predict_row(&self, xs: &[f64]) -> Result<f64, PredictError> {
        self.leaf_of_row(xs).map(Node::prediction)
    }

    /// The node at which prediction stops for `xs`.
    pub fn leaf_of_row(&self, xs: &[f64]) -> Result<&Node, PredictError> {
        if xs.len() != self.features.len() {
            return Err(PredictError::FeatureCountMismatch {
                expected: self.features.len(),
                got: xs.len(),
            });
        }
        self.descend(|feature| Ok(xs[feature]))
    }

    fn descend<F>(&self, mut value: F) -> Result<&Node, PredictError>
    where
        F: FnMut(usize) -> Result<f64, PredictError>,
    {
        let mut node = &self.root;
        let mut depth = 1;
        loop {
            match node {
                Node::Internal {
                    stats,
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } if !self.rule.should_stop(depth, stats.sample_count) => {
                    node = if value(*feature)? <= *threshold {
                        &**left
                    } else {
                        &**right
                    };
                    depth += 1;
                }
                _ => return Ok(node),
            }
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Candidate feature names, indexed by the `feature` of internal nodes.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn stop_rule(&self) -> StopRule {
        self.rule
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            if let Some((left, right)) = node.children() {
                stack.push(right);
                stack.push(left);
            }
            Some(node)
        })
    }

    pub fn nodes_len(&self) -> usize {
        self.nodes().count()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_leaf())
    }
}

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("at least one candidate feature is required")]
    NoFeatures,

    #[error("unknown feature {name:?}")]
    UnknownFeature { name: String },

    #[error("min_samples ({min_samples}) exceeds the number of rows ({rows})")]
    TooFewSamples { min_samples: usize, rows: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictError {
    #[error("input has no value for feature {name:?}")]
    MissingFeature { name: String },

    #[error("input has {got} features, expected {expected}")]
    FeatureCountMismatch { expected: usize, got: usize },
}
