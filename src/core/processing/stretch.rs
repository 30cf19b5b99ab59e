use ndarray::{Array2, ArrayBase, Data, Dimension, Ix2, Zip};
use tracing::debug;

use crate::core::params::StretchParams;
use crate::error::{Error, Result};

/// Percentile of already-sorted samples, interpolating linearly between the
/// two closest ranks (`rank = p / 100 * (n - 1)`).
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = (p / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// The `p`-th percentile (0..=100) of `values`.
///
/// NaN samples sort after every number, so they only surface at the upper end.
/// This differs from numpy's `percentile`, which returns NaN for every `p` as
/// soon as one sample is NaN.
///
/// Returns `None` for an empty slice, or when `p` is NaN or outside 0..=100.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

/// Stretch one band to [0, 1] between its `pmin`-th and `pmax`-th percentiles.
///
/// Samples below the lower percentile become exactly 0 and samples above the
/// upper percentile exactly 1; everything in between is mapped linearly by
/// `(v - minval) / (maxval - minval)`. The clamp runs as a separate pass over the
/// *input* samples, so it holds even where the linear formula rounds to a value
/// slightly outside [0, 1].
///
/// A band whose percentiles coincide (e.g. a constant band) has a zero-width
/// range: samples equal to that value come out as NaN (`0 / 0`). That result is
/// returned as is.
///
/// NaN samples stay NaN in the output but do not poison the percentiles: they
/// sort last, so only bounds near 100 can pick one up. numpy would make the
/// whole band NaN instead.
///
/// # Errors
/// * [`Error::InvalidParameter`] unless `0 <= pmin < pmax <= 100`
/// * [`Error::InvalidShape`] if `band` is not 2-dimensional
/// * [`Error::EmptyBand`] if `band` has no samples
///
/// Validation happens before any computation; `band` is never modified.
pub fn percentile_stretch<S, D>(band: &ArrayBase<S, D>, params: StretchParams) -> Result<Array2<f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    params.validate()?;
    let band = band
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| Error::InvalidShape {
            expected: 2,
            actual: band.ndim(),
        })?;
    if band.is_empty() {
        return Err(Error::EmptyBand);
    }

    let mut sorted: Vec<f64> = band.iter().copied().collect();
    sorted.sort_unstable_by(f64::total_cmp);
    let minval = percentile_sorted(&sorted, params.pmin);
    let maxval = percentile_sorted(&sorted, params.pmax);

    debug!(
        "Percentile stretch: p{}={:.4}, p{}={:.4}, samples={}",
        params.pmin,
        minval,
        params.pmax,
        maxval,
        sorted.len()
    );

    let range = maxval - minval;
    let mut stretched = band.mapv(|v| (v - minval) / range);

    Zip::from(&mut stretched).and(&band).for_each(|out, &v| {
        if v < minval {
            *out = 0.0;
        } else if v > maxval {
            *out = 1.0;
        }
    });

    Ok(stretched)
}
