use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regtree::{Table, TreeOptions};
use std::num::NonZeroUsize;

fn table(rows: usize) -> Table {
    let mut rng = StdRng::seed_from_u64(0);
    let mut age = Vec::new();
    let mut gender = Vec::new();
    let mut bmi = Vec::new();

    for _ in 0..rows {
        let a: f64 = rng.gen_range(18.0..80.0);
        let g = if rng.gen::<bool>() { 1.0 } else { 0.0 };
        let noise: f64 = rng.gen_range(-2.0..2.0);

        age.push(a.round());
        gender.push(g);
        bmi.push(20.0 + a / 10.0 + 1.5 * g + noise);
    }

    Table::new(
        vec!["age".to_owned(), "gender".to_owned()],
        vec![age, gender],
        "bmi",
        bmi,
    )
    .unwrap()
}

fn fit(c: &mut Criterion) {
    let table = table(1000);
    let options = TreeOptions::new()
        .min_samples(NonZeroUsize::new(5).unwrap())
        .max_depth(NonZeroUsize::new(8).unwrap());

    c.bench_function("fit, features=2, n=1000, depth=8", |b| {
        b.iter(|| options.fit(&table).unwrap())
    });
}

fn predict(c: &mut Criterion) {
    let table = table(1000);
    let tree = TreeOptions::new()
        .min_samples(NonZeroUsize::new(5).unwrap())
        .max_depth(NonZeroUsize::new(8).unwrap())
        .fit(&table)
        .unwrap();
    let rows = (0..table.rows_len()).map(|i| table.row(i)).collect::<Vec<_>>();

    c.bench_function("predict, n=1000", |b| {
        b.iter(|| {
            rows.iter()
                .map(|xs| tree.predict_row(xs).unwrap())
                .sum::<f64>()
        })
    });
}

criterion_group!(benches, fit, predict);
criterion_main!(benches);
