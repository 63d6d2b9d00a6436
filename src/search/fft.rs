//! 2-D FFT plumbing for the correlation scanner.
//!
//! Row/column passes over `ndarray` planes with `rustfft`, plus the
//! cross-correlation product the scanner scores offsets with.

use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

/// Smallest power of two not below `n`.
pub fn next_pow2(n: usize) -> usize {
    n.next_power_of_two()
}

/// Forward 2-D FFT of a real plane.
pub fn fft2_forward(input: &Array2<f64>) -> Array2<Complex<f64>> {
    let mut c = input.mapv(|v| Complex::new(v, 0.0));
    fft2_in_place(&mut c, false);
    c
}

/// In-place 2-D FFT; the inverse pass includes the 1/(w*h) scaling.
pub fn fft2_in_place(data: &mut Array2<Complex<f64>>, inverse: bool) {
    let (height, width) = data.dim();
    let mut planner = FftPlanner::new();

    let fft_row = if inverse {
        planner.plan_fft_inverse(width)
    } else {
        planner.plan_fft_forward(width)
    };
    for mut row in data.rows_mut() {
        let mut row_data: Vec<Complex<f64>> = row.to_vec();
        fft_row.process(&mut row_data);
        for (i, val) in row_data.iter().enumerate() {
            row[i] = *val;
        }
    }

    let fft_col = if inverse {
        planner.plan_fft_inverse(height)
    } else {
        planner.plan_fft_forward(height)
    };
    for mut col in data.columns_mut() {
        let mut col_data: Vec<Complex<f64>> = col.to_vec();
        fft_col.process(&mut col_data);
        for (i, val) in col_data.iter().enumerate() {
            col[i] = *val;
        }
    }

    if inverse {
        let norm = 1.0 / (width * height) as f64;
        data.mapv_inplace(|v| v * norm);
    }
}

/// Circular cross-correlation from two forward spectra:
/// `out[d] = sum_u a[u] * b[u + d]`, indices wrapped modulo the plane size.
pub fn cross_correlate(
    fa: &Array2<Complex<f64>>,
    fb: &Array2<Complex<f64>>,
) -> Array2<f64> {
    let mut prod = Array2::zeros(fa.dim());
    ndarray::Zip::from(&mut prod)
        .and(fa)
        .and(fb)
        .for_each(|p, a, b| *p = a.conj() * b);

    fft2_in_place(&mut prod, true);
    prod.mapv(|v| v.re)
}
