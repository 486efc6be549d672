pub fn mean(xs: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0;
    let mut total = 0.0;
    for x in xs {
        count += 1;
        total += x;
    }
    assert_ne!(count, 0);
    total / count as f64
}

/// Mean squared deviation from the mean (population variance).
pub fn mse(xs: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = xs.clone().count() as f64;
    let m = mean(xs.clone());
    xs.map(|x| (x - m).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_mse_work() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(xs.iter().copied()), 2.5);
        assert_eq!(mse(xs.iter().copied()), 1.25);
        assert_eq!(mse([7.0].iter().copied()), 0.0);
    }

    #[test]
    #[should_panic]
    fn mean_of_nothing_panics() {
        mean(std::iter::empty());
    }
}
