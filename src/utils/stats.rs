//! Small numeric helpers shared by the pipeline and the scanner.

/// Normalize `v` in place to zero mean and unit standard deviation.
///
/// Returns the standard deviation measured before scaling. A return of
/// 0.0 (or a non-finite value) means the data were constant or broken;
/// in that case `v` is left mean-subtracted but unscaled.
pub fn normalize(v: &mut [f64]) -> f64 {
    let n = v.len();
    if n == 0 {
        return 0.0;
    }

    let mean = v.iter().sum::<f64>() / n as f64;
    for x in v.iter_mut() {
        *x -= mean;
    }

    let var = v.iter().map(|x| x * x).sum::<f64>() / n as f64;
    let sd = var.sqrt();

    if sd > 0.0 && sd.is_finite() {
        for x in v.iter_mut() {
            *x /= sd;
        }
    }

    sd
}

/// Median of a sample; the mean of the two central values for even sizes.
///
/// Returns 0.0 for an empty sample.
pub fn median(mut v: Vec<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }

    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        0.5 * (v[n / 2 - 1] + v[n / 2])
    }
}

/// Bilinear sample of a row-major w-wide buffer at fractional (x, y).
///
/// The caller guarantees `0 <= x < w-1` and `0 <= y < h-1`.
pub fn interpolate_pixel(x: f64, y: f64, v: &[f64], w: usize) -> f64 {
    let ix = x.floor() as usize;
    let iy = y.floor() as usize;
    let fx = x - ix as f64;
    let fy = y - iy as f64;

    let i00 = v[ix + w * iy];
    let i10 = v[ix + 1 + w * iy];
    let i01 = v[ix + w * (iy + 1)];
    let i11 = v[ix + 1 + w * (iy + 1)];

    i00 * (1.0 - fx) * (1.0 - fy)
        + i10 * fx * (1.0 - fy)
        + i01 * (1.0 - fx) * fy
        + i11 * fx * fy
}
