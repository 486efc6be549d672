pub use bloom_filter::BloomFilter;
pub use dataset::{ColumnKind, Dataset, DatasetError, Description, Window};
pub use decision_tree::{
    DecisionTreeRegressor, FitError, LeafReason, Node, NodeStats, PredictError, StopRule,
    TreeOptions,
};
pub use kmeans::{KMeans, KMeansError, KMeansOptions};
pub use paired_regression::{PairedRegression, RegressionError};
pub use split::{find_best_split, SplitPoint};
pub use table::{Record, Subset, Table, TableError};

pub mod bloom_filter;
pub mod dataset;
pub mod decision_tree;
pub mod kmeans;
pub mod paired_regression;
pub mod split;
pub mod table;

mod functions;
