//! Order statistics and running filters over 1D arrays.

use super::NumCastUnchecked;

use ndarray::{Array1, ArrayBase, Data, Ix1};
use num::Float;


/// Percentile `q` (in `[0, 1]`) with linear interpolation between the closest
/// ranks. Returns zero for empty input. NaNs sort last.
pub fn percentile<T, D>(values: &ArrayBase<D, Ix1>, q: T) -> T
where
    T: Float + NumCastUnchecked,
    D: Data<Elem = T>,
{
    if values.is_empty() {
        return T::zero();
    }

    let mut sorted: Vec<T> = values.iter().cloned().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Greater));

    let q = q.max(T::zero()).min(T::one());
    let pos = q * T::from_usize_unchecked(sorted.len() - 1);
    let lo = pos.floor().to_f64_unchecked() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - pos.floor();

    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Indices of the `count` smallest values, in ascending order of value.
pub fn argsort_smallest<T, D>(values: &ArrayBase<D, Ix1>, count: usize) -> Vec<usize>
where
    T: Float,
    D: Data<Elem = T>,
{
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| {
        values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Greater)
    });
    idx.truncate(count);
    idx
}

/// Median filter with circular indexing.
///
/// Circular indexing keeps the result mirror-symmetric for a full FFT
/// spectrum, where bin `k` and bin `n - k` describe the same frequency.
pub fn median_filter_circular<T, D>(values: &ArrayBase<D, Ix1>, width: usize) -> Array1<T>
where
    T: Float,
    D: Data<Elem = T>,
{
    let n = values.len();
    if width <= 1 || n == 0 {
        return values.to_owned();
    }

    let half = width / 2;
    let mut window = Vec::with_capacity(2 * half + 1);

    Array1::from_shape_fn(n, |i| {
        window.clear();
        for o in 0..=(2 * half) {
            let j = (i + n * (half / n + 1) + o - half) % n;
            window.push(values[j]);
        }
        window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Greater));
        window[window.len() / 2]
    })
}

/// Centred moving average of width `width`, shrinking at the edges.
pub fn moving_average<T, D>(values: &ArrayBase<D, Ix1>, width: usize) -> Array1<T>
where
    T: Float + NumCastUnchecked,
    D: Data<Elem = T>,
{
    let n = values.len();
    if width <= 1 || n == 0 {
        return values.to_owned();
    }

    // prefix sums in f64 to keep long signals accurate
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for v in values.iter() {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v.to_f64_unchecked());
    }

    let before = width / 2;
    let after = width - before;

    Array1::from_shape_fn(n, |i| {
        let lo = i.saturating_sub(before);
        let hi = (i + after).min(n);
        T::from_unchecked((prefix[hi] - prefix[lo]) / (hi - lo) as f64)
    })
}

/// Centred running minimum of width `width`, shrinking at the edges.
pub fn moving_min<T, D>(values: &ArrayBase<D, Ix1>, width: usize) -> Array1<T>
where
    T: Float,
    D: Data<Elem = T>,
{
    let n = values.len();
    if width <= 1 || n == 0 {
        return values.to_owned();
    }

    let before = width / 2;
    let after = width - before;

    Array1::from_shape_fn(n, |i| {
        let lo = i.saturating_sub(before);
        let hi = (i + after).min(n);
        values.slice(ndarray::s![lo..hi]).fold(T::infinity(), |a, b| a.min(*b))
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn percentile_interpolates() {
        let v = array![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 1.0), 5.0);
        assert_eq!(percentile(&v, 0.5), 3.0);
        assert!((percentile(&v, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn argsort_picks_smallest() {
        let v = array![4.0, 1.0, 3.0, 0.5, 5.0];
        assert_eq!(argsort_smallest(&v, 2), vec![3, 1]);
    }

    #[test]
    fn circular_median_keeps_mirror_symmetry() {
        let v = array![9.0, 1.0, 7.0, 2.0, 5.0, 2.0, 7.0, 1.0];
        let m = median_filter_circular(&v, 3);
        for k in 1..v.len() {
            assert_eq!(m[k], m[v.len() - k]);
        }
    }

    #[test]
    fn median_removes_spike() {
        let v = array![1.0, 1.0, 10.0, 1.0, 1.0];
        assert_eq!(median_filter_circular(&v, 3), array![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn moving_average_of_step() {
        let v = array![0.0, 0.0, 1.0, 1.0];
        let a = moving_average(&v, 2);
        assert_eq!(a, array![0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn moving_min_erodes() {
        let v = array![1.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let m = moving_min(&v, 3);
        assert_eq!(m, array![1.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
