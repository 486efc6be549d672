use crate::functions;
use crate::table::Subset;

/// The best threshold found for one column of a subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPoint {
    pub column: usize,
    pub threshold: f64,
    /// `parent_mse - mse_left - mse_right`.
    pub mse_reduction: f64,
}

/// Finds the threshold on `column` that maximizes the variance reduction of
/// the target, with at least `min_samples` rows on each side.
///
/// Returns `None` when no valid split exists: the subset is smaller than
/// `2 * min_samples`, or every admissible boundary falls between equal values.
pub fn find_best_split(subset: &Subset, column: usize, min_samples: usize) -> Option<SplitPoint> {
    let n = subset.rows_len();
    let min_samples = min_samples.max(1);
    if n < 2 * min_samples {
        return None;
    }

    let table = subset.table();
    let values = table.column(column);
    let target = table.target();

    let sorted = subset.sorted_by_column(column);
    let parent_mse = functions::mse(subset.target());

    let mut best: Option<SplitPoint> = None;
    for i in (min_samples - 1)..(n - min_samples) {
        let x = values[sorted[i]];
        let x_next = values[sorted[i + 1]];
        if x == x_next {
            continue;
        }

        // Each side is a two-pass mse over its rows in sorted order.
        let (left, right) = sorted.split_at(i + 1);
        let left_mse = functions::mse(left.iter().map(|&r| target[r]));
        let right_mse = functions::mse(right.iter().map(|&r| target[r]));
        let mse_reduction = parent_mse - left_mse - right_mse;
        if best
            .as_ref()
            .map_or(true, |t| t.mse_reduction < mse_reduction)
        {
            best = Some(SplitPoint {
                column,
                threshold: midpoint(x, x_next),
                mse_reduction,
            });
        }
    }
    best
}

// Must satisfy `lower <= t < upper`, otherwise partitioning by `<= t` would
// not reproduce the scanned boundary (adjacent floats, overflow).
fn midpoint(lower: f64, upper: f64) -> f64 {
    let t = (lower + upper) / 2.0;
    if lower <= t && t < upper {
        t
    } else {
        lower
    }
}
