use serde::Serialize;
use thiserror::Error;

/// Ordinary least squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairedRegression {
    intercept: f64,
    slope: f64,
    samples: usize,
}

impl PairedRegression {
    /// Pairs where either value is `NaN` are ignored.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self, RegressionError> {
        if xs.len() != ys.len() {
            return Err(RegressionError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }

        let pairs = xs
            .iter()
            .zip(ys.iter())
            .filter(|(x, y)| !x.is_nan() && !y.is_nan())
            .map(|(&x, &y)| (x, y));
        let (mut n, mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0usize, 0.0, 0.0, 0.0, 0.0);
        for (x, y) in pairs {
            n += 1;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }
        if n == 0 {
            return Err(RegressionError::Empty);
        }

        let nf = n as f64;
        let denominator = sum_xx - sum_x * sum_x / nf;
        if denominator == 0.0 || !denominator.is_finite() {
            return Err(RegressionError::ConstantInput);
        }
        let slope = (sum_xy - sum_x * sum_y / nf) / denominator;
        let intercept = (sum_y - slope * sum_x) / nf;
        Ok(Self {
            intercept,
            slope,
            samples: n,
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Number of pairs the fit used.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Predicts every non-`NaN` input; `NaN` inputs are skipped.
    pub fn predict_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter()
            .filter(|x| !x.is_nan())
            .map(|&x| self.predict(x))
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegressionError {
    #[error("x has {xs} values but y has {ys}")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("no pair without missing values")]
    Empty,

    #[error("x must take at least two distinct values")]
    ConstantInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_is_recovered() -> Result<(), anyhow::Error> {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = PairedRegression::fit(&xs, &ys)?;
        assert_eq!(fit.slope(), 2.0);
        assert_eq!(fit.intercept(), 1.0);
        assert_eq!(fit.predict(10.0), 21.0);
        assert_eq!(fit.samples(), 4);
        Ok(())
    }

    #[test]
    fn missing_values_are_dropped() -> Result<(), anyhow::Error> {
        let xs = [0.0, f64::NAN, 2.0, 4.0, 6.0];
        let ys = [0.0, 100.0, 1.0, f64::NAN, 3.0];
        let fit = PairedRegression::fit(&xs, &ys)?;
        assert_eq!(fit.samples(), 3);
        assert_eq!(fit.slope(), 0.5);
        assert_eq!(fit.intercept(), 0.0);
        assert_eq!(fit.predict_many(&[2.0, f64::NAN, 4.0]), vec![1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert_eq!(
            PairedRegression::fit(&[1.0], &[1.0, 2.0]),
            Err(RegressionError::LengthMismatch { xs: 1, ys: 2 })
        );
        assert_eq!(
            PairedRegression::fit(&[f64::NAN], &[1.0]),
            Err(RegressionError::Empty)
        );
        assert_eq!(
            PairedRegression::fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]),
            Err(RegressionError::ConstantInput)
        );
    }
}
