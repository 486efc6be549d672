//! Structural properties of fitted trees on random small datasets.

use proptest::collection::vec;
use proptest::prelude::*;
use regtree::{find_best_split, Node, Subset, Table, TreeOptions};
use std::num::NonZeroUsize;

fn samples() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    // Few distinct ages so that ties are common.
    vec(
        (0u8..8, 0u8..2, -50i32..50).prop_map(|(a, g, t)| (a as f64 * 5.0, g as f64, t as f64)),
        1..40,
    )
}

fn table(samples: &[(f64, f64, f64)]) -> Table {
    Table::new(
        vec!["age".to_owned(), "gender".to_owned()],
        vec![
            samples.iter().map(|s| s.0).collect(),
            samples.iter().map(|s| s.1).collect(),
        ],
        "bmi",
        samples.iter().map(|s| s.2).collect(),
    )
    .expect("valid table")
}

/// Routes `rows` through `node` and checks that they are exactly the rows the
/// node was built from.
fn check_node(table: &Table, node: &Node, rows: &[usize], min_samples: usize, is_root: bool) {
    let stats = node.stats();
    assert_eq!(stats.sample_count, rows.len());
    if !is_root {
        assert!(rows.len() >= min_samples);
    }

    let mean = rows.iter().map(|&r| table.target()[r]).sum::<f64>() / rows.len() as f64;
    assert_eq!(stats.prediction, mean);
    assert!(stats.variance >= 0.0);

    if let Node::Internal {
        feature,
        threshold,
        left,
        right,
        ..
    } = node
    {
        let column = table.column(*feature);
        let (l, r): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| column[i] <= *threshold);
        assert!(!l.is_empty() && !r.is_empty());
        check_node(table, left, &l, min_samples, false);
        check_node(table, right, &r, min_samples, false);
    }
}

proptest! {
    #[test]
    fn fitted_trees_partition_their_samples(
        samples in samples(),
        min_samples in 1usize..4,
        max_depth in 1usize..7,
    ) {
        prop_assume!(min_samples <= samples.len());
        let table = table(&samples);
        let options = TreeOptions::new()
            .min_samples(NonZeroUsize::new(min_samples).unwrap())
            .max_depth(NonZeroUsize::new(max_depth).unwrap());
        let tree = options.fit(&table).unwrap();

        prop_assert!(tree.depth() <= max_depth);
        let rows = (0..table.rows_len()).collect::<Vec<_>>();
        check_node(&table, tree.root(), &rows, min_samples, true);

        // Same data, same options, same tree.
        let again = options.fit(&table).unwrap();
        prop_assert_eq!(tree.root(), again.root());
    }

    #[test]
    fn prediction_returns_the_mean_of_the_reached_leaf(
        samples in samples(),
        max_depth in 1usize..7,
    ) {
        let table = table(&samples);
        let tree = TreeOptions::new()
            .max_depth(NonZeroUsize::new(max_depth).unwrap())
            .fit(&table)
            .unwrap();

        for (row, &(age, gender, _)) in samples.iter().enumerate() {
            let leaf = tree.leaf_of_row(&table.row(row)).unwrap();
            prop_assert!(leaf.is_leaf());
            let by_name = tree.predict(&[("gender", gender), ("age", age)]).unwrap();
            prop_assert_eq!(by_name, leaf.prediction());
        }
    }

    #[test]
    fn split_points_respect_min_samples(
        samples in samples(),
        min_samples in 1usize..6,
    ) {
        let table = table(&samples);
        let subset = Subset::new(&table);
        for column in 0..table.features_len() {
            if let Some(split) = find_best_split(&subset, column, min_samples) {
                let values = table.column(column);
                let left = values.iter().filter(|&&x| x <= split.threshold).count();
                let right = values.len() - left;
                prop_assert!(left >= min_samples && right >= min_samples);
                prop_assert!(values.iter().all(|&x| x != split.threshold));
            } else {
                let mut sorted = table.column(column).to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                // Every admissible boundary lies between equal values.
                let n = sorted.len();
                if n >= 2 * min_samples {
                    for i in (min_samples - 1)..(n - min_samples) {
                        prop_assert_eq!(sorted[i], sorted[i + 1]);
                    }
                }
            }
        }
    }
}
