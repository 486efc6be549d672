//! CSV rows through to tree predictions.

use regtree::{ColumnKind, Dataset, LeafReason, Node, TreeOptions};
use std::num::NonZeroUsize;

const CSV: &str = "\
age,gender,bmi
18,F,19.0
22,M,21.0
25,F,20.0
31,M,26.0
45,F,27.0
52,M,31.0
60,F,28.0
67,M,32.0
";

#[test]
fn csv_to_prediction() -> Result<(), anyhow::Error> {
    let dataset = Dataset::from_reader(CSV.as_bytes())?;
    let gender = dataset.column("gender")?;
    assert_eq!(gender.kind(), ColumnKind::Categorical);
    let male = gender.code_of("M").expect("M is a category");

    let table = dataset.table(&["age", "gender"], "bmi")?;
    let tree = TreeOptions::new()
        .features(vec!["age", "gender"])
        .min_samples(NonZeroUsize::new(2).unwrap())
        .max_depth(NonZeroUsize::new(3).unwrap())
        .fit(&table)?;

    // Age separates young and old first.
    match tree.root() {
        Node::Internal {
            feature, threshold, ..
        } => {
            assert_eq!(tree.features()[*feature], "age");
            assert_eq!(*threshold, 28.0);
        }
        node => panic!("unexpected leaf: {:?}", node),
    }
    assert!(tree.depth() <= 3);

    let young_male = tree.predict(&[("age", 20.0), ("gender", male)])?;
    let old_male = tree.predict(&[("age", 65.0), ("gender", male)])?;
    assert!(young_male < old_male);

    assert_eq!(young_male, 20.0);
    for leaf in tree.leaves() {
        assert!(leaf.stats().sample_count >= 2);
    }

    // Three young rows cannot form two groups of two.
    match tree.leaf_of_row(&[20.0, male])? {
        Node::Leaf { reason, stats } => {
            assert_eq!(*reason, LeafReason::NoSplit);
            assert_eq!(stats.sample_count, 3);
        }
        node => panic!("unexpected split: {:?}", node),
    }
    Ok(())
}
