//! Reference correlation scanner.
//!
//! Rotates side A's point set, splats both sides into zero-padded planes,
//! and scores every candidate offset from FFT cross-correlation products.
//! Angle sweeps fan out across rayon workers; a fine pass around the
//! coarse peak and a 1-D parabolic fit give sub-step angle and sub-pixel
//! offset resolution.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use crate::geometry::{bbox_from_points, Affine, Point};

use super::fft::{cross_correlate, fft2_forward, next_pow2};
use super::{CorRec, RegError, ThumbScanner, ThumbSet};

/// Tunables for [`FftScanner`].
#[derive(Debug, Clone, Copy)]
pub struct ScannerParams {
    /// Sweep results below this correlation are reported as failures.
    pub min_sweep_r: f64,
    /// Disc radius, in working pixels, for the full-resolution
    /// confirmation pass.
    pub full_res_radius: f64,
}

impl Default for ScannerParams {
    fn default() -> Self {
        Self {
            min_sweep_r: 0.1,
            full_res_radius: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Disc {
    ox: f64,
    oy: f64,
    rx: f64,
    ry: f64,
}

/// FFT-based implementation of the engine surface.
pub struct FftScanner {
    params: ScannerParams,
    disc: Option<Disc>,
    use_corr_r: bool,
    /// Linear pre-deformation of side A accumulated by `pretweaks`.
    pre: Affine,
    err: Option<RegError>,
}

impl Default for FftScanner {
    fn default() -> Self {
        Self::new(ScannerParams::default())
    }
}

impl FftScanner {
    pub fn new(params: ScannerParams) -> Self {
        Self {
            params,
            disc: None,
            use_corr_r: false,
            pre: Affine::identity(),
            err: None,
        }
    }

    /// Score every candidate offset at one fixed angle and return the peak.
    fn correlate(&self, angle: f64, thm: &ThumbSet) -> CorRec {
        self.correlate_with(&self.pre, angle, thm)
    }

    fn correlate_with(&self, pre: &Affine, angle: f64, thm: &ThumbSet) -> CorRec {
        let lin = Affine::rotation(angle.to_radians()).compose(pre);

        let mut rec = CorRec {
            t: lin,
            angle,
            ..CorRec::default()
        };

        if thm.apoints.is_empty() || thm.bpoints.is_empty() {
            return rec;
        }

        let ar: Vec<Point> = thm.apoints.iter().map(|p| lin.apply_r_part(*p)).collect();
        let abox = bbox_from_points(&ar);
        let bbox = bbox_from_points(&thm.bpoints);

        let (aw, ah) = (abox.width(), abox.height());
        let (bw, bh) = (bbox.width(), bbox.height());

        if aw.min(ah).min(bw).min(bh) < thm.min_1d as i64 {
            return rec;
        }

        let pw = next_pow2((aw + bw) as usize);
        let ph = next_pow2((ah + bh) as usize);

        let (pa, ma) = render(&ar, &thm.avalues, abox.l, abox.b, ph, pw);
        let (pb, mb) = render(&thm.bpoints, &thm.bvalues, bbox.l, bbox.b, ph, pw);

        let fa = fft2_forward(&pa);
        let fma = fft2_forward(&ma);
        let fb = fft2_forward(&pb);
        let fmb = fft2_forward(&mb);

        let sab = cross_correlate(&fa, &fb);
        let n = cross_correlate(&fma, &fmb);

        // Local-stats planes only when Pearson scoring is requested.
        let local = if self.use_corr_r {
            let fa2 = fft2_forward(&pa.mapv(|v| v * v));
            let fb2 = fft2_forward(&pb.mapv(|v| v * v));
            Some(LocalSums {
                sa: cross_correlate(&fa, &fmb),
                sb: cross_correlate(&fma, &fb),
                sa2: cross_correlate(&fa2, &fmb),
                sb2: cross_correlate(&fma, &fb2),
            })
        } else {
            None
        };

        // An offset index d matches A's plane against B's shifted by d, so
        // the point-space offset is d plus the box-origin difference.
        let base_x = (bbox.l - abox.l) as f64;
        let base_y = (bbox.b - abox.b) as f64;
        let req = thm.req_area as f64;

        let nmax = n.iter().copied().fold(0.0, f64::max);
        if nmax <= 0.0 {
            return rec;
        }

        let score_at = |ix: usize, iy: usize| -> Option<f64> {
            let nn = n[[iy, ix]];
            if nn < req {
                return None;
            }

            let r = match &local {
                Some(l) => {
                    let num = sab[[iy, ix]] - l.sa[[iy, ix]] * l.sb[[iy, ix]] / nn;
                    let va = l.sa2[[iy, ix]] - l.sa[[iy, ix]] * l.sa[[iy, ix]] / nn;
                    let vb = l.sb2[[iy, ix]] - l.sb[[iy, ix]] * l.sb[[iy, ix]] / nn;
                    if va <= 1e-12 || vb <= 1e-12 {
                        return None;
                    }
                    num / (va * vb).sqrt()
                }
                None => sab[[iy, ix]] / nn,
            };

            // Weight by overlap fraction. The raw score is clamped, so on
            // periodic content a sliver overlap can tie the true peak and
            // win on scan order without this.
            Some(r.clamp(-1.0, 1.0) * (nn / nmax))
        };

        let wrap = |i: usize, p: usize| -> f64 {
            if i <= p / 2 {
                i as f64
            } else {
                i as f64 - p as f64
            }
        };

        let in_disc = |x: f64, y: f64| -> bool {
            match self.disc {
                None => true,
                Some(d) => {
                    let rx = d.rx.max(1.0);
                    let ry = d.ry.max(1.0);
                    let ex = (x - d.ox) / rx;
                    let ey = (y - d.oy) / ry;
                    ex * ex + ey * ey <= 1.0
                }
            }
        };

        let mut best_r = f64::NEG_INFINITY;
        let mut best_ix = 0usize;
        let mut best_iy = 0usize;

        for iy in 0..ph {
            let y = wrap(iy, ph) + base_y;
            for ix in 0..pw {
                let x = wrap(ix, pw) + base_x;
                if !in_disc(x, y) {
                    continue;
                }
                if let Some(r) = score_at(ix, iy) {
                    if r > best_r {
                        best_r = r;
                        best_ix = ix;
                        best_iy = iy;
                    }
                }
            }
        }

        if !best_r.is_finite() || best_r == f64::NEG_INFINITY {
            return rec;
        }

        let mut x = wrap(best_ix, pw) + base_x;
        let mut y = wrap(best_iy, ph) + base_y;

        // Sub-pixel peak by separable parabolic fit over valid neighbors.
        if let Some(dx) = parabolic_shift(
            score_at((best_ix + pw - 1) % pw, best_iy),
            best_r,
            score_at((best_ix + 1) % pw, best_iy),
        ) {
            x += dx;
        }
        if let Some(dy) = parabolic_shift(
            score_at(best_ix, (best_iy + ph - 1) % ph),
            best_r,
            score_at(best_ix, (best_iy + 1) % ph),
        ) {
            y += dy;
        }

        rec.r = best_r;
        rec.x = x;
        rec.y = y;
        rec.t.set_xy(x, y);
        rec
    }

    /// Coarse sweep plus a fine pass around the winner.
    fn sweep(&self, center: f64, half_span: f64, step: f64, thm: &ThumbSet) -> CorRec {
        let step = step.max(1e-3);
        let n = (2.0 * half_span / step).round() as usize;
        let angles: Vec<f64> = (0..=n).map(|i| center - half_span + i as f64 * step).collect();

        let coarse = angles
            .par_iter()
            .map(|&a| self.correlate(a, thm))
            .max_by(|a, b| a.r.partial_cmp(&b.r).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or_default();

        let fine_step = step / 5.0;
        if fine_step < 1e-4 {
            return coarse;
        }

        let fine: Vec<f64> = (1..5)
            .flat_map(|i| {
                let d = i as f64 * fine_step;
                [coarse.angle - d, coarse.angle + d]
            })
            .collect();

        fine.par_iter()
            .map(|&a| self.correlate(a, thm))
            .chain(rayon::iter::once(coarse))
            .max_by(|a, b| a.r.partial_cmp(&b.r).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(coarse)
    }
}

struct LocalSums {
    sa: Array2<f64>,
    sb: Array2<f64>,
    sa2: Array2<f64>,
    sb2: Array2<f64>,
}

impl ThumbScanner for FftScanner {
    fn set_disc(&mut self, ox: f64, oy: f64, rx: f64, ry: f64) {
        self.disc = Some(Disc { ox, oy, rx, ry });
    }

    fn clear_disc(&mut self) {
        self.disc = None;
    }

    fn set_use_corr_r(&mut self, use_corr_r: bool) {
        self.use_corr_r = use_corr_r;
    }

    fn r_from_angle(&mut self, best: &mut CorRec, angle: f64, thm: &ThumbSet) {
        *best = self.correlate(angle, thm);
    }

    fn denovo_best_angle(
        &mut self,
        best: &mut CorRec,
        center: f64,
        half_span: f64,
        step: f64,
        thm: &ThumbSet,
    ) -> bool {
        let found = self.sweep(center, half_span, step, thm);
        debug!(
            angle = found.angle,
            r = found.r,
            "denovo sweep best"
        );

        if found.r < self.params.min_sweep_r {
            self.err = Some(RegError::SweepNoAngle);
            return false;
        }

        *best = found;
        self.err = None;
        true
    }

    fn use_prior_angles(
        &mut self,
        best: &mut CorRec,
        n_prior: usize,
        center: f64,
        half_span: f64,
        thm: &ThumbSet,
    ) -> bool {
        let step = (half_span / 4.0).max(0.05);
        let found = self.sweep(center, half_span, step, thm);
        debug!(
            n_prior,
            angle = found.angle,
            r = found.r,
            "prior-constrained sweep best"
        );

        if found.r < self.params.min_sweep_r {
            self.err = Some(RegError::SweepNoAngle);
            return false;
        }

        *best = found;
        self.err = None;
        true
    }

    fn pretweaks(&mut self, r0: f64, angle: f64, thm: &ThumbSet) -> bool {
        // Small scale and skew deformations of side A.
        const TWEAKS: [[f64; 6]; 8] = [
            [0.995, 0.0, 0.0, 0.0, 0.995, 0.0],
            [1.005, 0.0, 0.0, 0.0, 1.005, 0.0],
            [0.995, 0.0, 0.0, 0.0, 1.0, 0.0],
            [1.005, 0.0, 0.0, 0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 0.995, 0.0],
            [1.0, 0.0, 0.0, 0.0, 1.005, 0.0],
            [1.0, 0.01, 0.0, 0.0, 1.0, 0.0],
            [1.0, -0.01, 0.0, 0.0, 1.0, 0.0],
        ];

        let mut best_r = r0;
        let mut best_pre = None;

        for t in TWEAKS {
            let pre = Affine::from_coeffs(t).compose(&self.pre);
            let rec = self.correlate_with(&pre, angle, thm);
            if rec.r > best_r {
                best_r = rec.r;
                best_pre = Some(pre);
            }
        }

        match best_pre {
            Some(pre) => {
                debug!(r0, r = best_r, "pretweak improved correlation");
                self.pre = pre;
                true
            }
            None => false,
        }
    }

    fn post_tweaks(&mut self, best: &mut CorRec, thm: &ThumbSet) {
        for da in [-0.15, -0.1, -0.05, 0.05, 0.1, 0.15] {
            let rec = self.correlate(best.angle + da, thm);
            if rec.r > best.r {
                *best = rec;
            }
        }
    }

    fn finish_at_full_res(&mut self, best: &mut CorRec, thm: &ThumbSet) {
        let saved_disc = self.disc;
        let saved_corr_r = self.use_corr_r;

        let radius = self.params.full_res_radius.max(4.0);
        self.set_disc(best.x, best.y, radius, radius);
        self.use_corr_r = true;

        let rec = self.correlate(best.angle, thm);
        if rec.r > 0.0 {
            *best = rec;
        }

        self.disc = saved_disc;
        self.use_corr_r = saved_corr_r;
    }

    fn err(&self) -> Option<RegError> {
        self.err
    }
}

/// Bilinear splat of a point/value set into a zero-padded plane plus its
/// occupancy mask. Points arrive relative to (ox, oy), which is the floor
/// of their bounding box, so shifted coordinates are non-negative.
fn render(
    points: &[Point],
    values: &[f64],
    ox: i64,
    oy: i64,
    ph: usize,
    pw: usize,
) -> (Array2<f64>, Array2<f64>) {
    let mut img = Array2::zeros((ph, pw));
    let mut mask = Array2::zeros((ph, pw));

    for (p, v) in points.iter().zip(values) {
        let x = p.x - ox as f64;
        let y = p.y - oy as f64;
        let ix = x.floor() as usize;
        let iy = y.floor() as usize;
        let fx = x - ix as f64;
        let fy = y - iy as f64;

        for (dy, wy) in [(0usize, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0usize, 1.0 - fx), (1, fx)] {
                let w = wx * wy;
                if w > 0.0 {
                    img[[iy + dy, ix + dx]] += v * w;
                    mask[[iy + dy, ix + dx]] += w;
                }
            }
        }
    }

    (img, mask)
}

/// Vertex shift of the parabola through (−1, sm), (0, s0), (1, sp),
/// clamped to half a sample; None when either neighbor is invalid or the
/// curvature is degenerate.
fn parabolic_shift(sm: Option<f64>, s0: f64, sp: Option<f64>) -> Option<f64> {
    let sm = sm?;
    let sp = sp?;
    let denom = 2.0 * (sm + sp - 2.0 * s0);
    if denom.abs() < 1e-12 {
        return None;
    }
    Some(((sm - sp) / denom).clamp(-0.5, 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::make_zero_based_points;
    use crate::utils::normalize;

    /// Deterministic smooth texture on a w×h grid.
    fn texture(w: usize, h: usize) -> Vec<f64> {
        (0..w * h)
            .map(|i| {
                let x = (i % w) as f64;
                let y = (i / w) as f64;
                (x * 0.37).sin() * (y * 0.23).cos() + (x * 0.11 + y * 0.19).sin()
            })
            .collect()
    }

    fn shifted_thumbs(w: usize, h: usize, dx: i64, dy: i64) -> ThumbSet {
        let tex = texture(w + 64, h + 64);
        let tw = w + 64;

        let sample = |x: i64, y: i64| tex[(x + 16) as usize + tw * (y + 16) as usize];

        let apoints = make_zero_based_points(w, h);
        let bpoints = make_zero_based_points(w, h);
        let mut avalues: Vec<f64> = apoints
            .iter()
            .map(|p| sample(p.x as i64, p.y as i64))
            .collect();
        // B sees the same scene displaced by (dx, dy): b(p) = a(p - d).
        let mut bvalues: Vec<f64> = bpoints
            .iter()
            .map(|p| sample(p.x as i64 - dx, p.y as i64 - dy))
            .collect();

        normalize(&mut avalues);
        normalize(&mut bvalues);

        ThumbSet {
            apoints,
            bpoints,
            avalues,
            bvalues,
            req_area: (w * h) / 4,
            min_1d: 8,
            decimation: 1,
        }
    }

    #[test]
    fn recovers_pure_translation() {
        let thm = shifted_thumbs(48, 48, 7, -4);
        let mut scanner = FftScanner::default();
        let mut best = CorRec::default();

        scanner.r_from_angle(&mut best, 0.0, &thm);

        assert!(best.r > 0.5, "r = {}", best.r);
        assert!((best.x - 7.0).abs() < 0.75, "x = {}", best.x);
        assert!((best.y + 4.0).abs() < 0.75, "y = {}", best.y);
    }

    #[test]
    fn disc_excludes_distant_peak() {
        let thm = shifted_thumbs(48, 48, 7, -4);
        let mut scanner = FftScanner::default();
        let mut best = CorRec::default();

        // Bound the search far away from the true peak.
        scanner.set_disc(-20.0, 20.0, 5.0, 5.0);
        scanner.r_from_angle(&mut best, 0.0, &thm);

        let d = ((best.x + 20.0).powi(2) + (best.y - 20.0).powi(2)).sqrt();
        assert!(d <= 5.0 + 1.0, "peak escaped the disc: ({}, {})", best.x, best.y);
    }

    #[test]
    fn denovo_sweep_prefers_zero_rotation_for_shift_only_pair() {
        let thm = shifted_thumbs(40, 40, 3, 5);
        let mut scanner = FftScanner::default();
        let mut best = CorRec::default();

        assert!(scanner.denovo_best_angle(&mut best, 0.0, 2.0, 0.5, &thm));
        assert!(best.angle.abs() < 0.5, "angle = {}", best.angle);
        assert!((best.x - 3.0).abs() < 0.75);
        assert!((best.y - 5.0).abs() < 0.75);
        assert!(scanner.err().is_none());
    }

    #[test]
    fn periodic_texture_prefers_the_full_overlap_peak() {
        // Strictly 14-periodic in x, so offsets 3, 3-14, and 3+14 all
        // score at the clamp; only overlap weighting ranks them.
        let w = 48;
        let sample = |x: f64, y: f64| {
            (2.0 * std::f64::consts::PI * x / 14.0).sin() + 0.4 * (0.23 * y).cos()
        };

        let apoints = make_zero_based_points(w, w);
        let bpoints = make_zero_based_points(w, w);
        let mut avalues: Vec<f64> = apoints.iter().map(|p| sample(p.x, p.y)).collect();
        let mut bvalues: Vec<f64> = bpoints.iter().map(|p| sample(p.x - 3.0, p.y)).collect();
        normalize(&mut avalues);
        normalize(&mut bvalues);

        let thm = ThumbSet {
            apoints,
            bpoints,
            avalues,
            bvalues,
            req_area: (w * w) / 4,
            min_1d: 8,
            decimation: 1,
        };

        let mut scanner = FftScanner::default();
        let mut best = CorRec::default();
        scanner.r_from_angle(&mut best, 0.0, &thm);

        assert!((best.x - 3.0).abs() < 0.75, "x = {}", best.x);
        assert!(best.y.abs() < 0.75, "y = {}", best.y);
    }

    #[test]
    fn sweep_fails_on_uncorrelated_noise() {
        let w = 32;
        let apoints = make_zero_based_points(w, w);
        let bpoints = make_zero_based_points(w, w);

        // Deterministic but mutually unrelated high-frequency patterns.
        let mut avalues: Vec<f64> = (0..w * w).map(|i| ((i * 2654435761) % 97) as f64).collect();
        let mut bvalues: Vec<f64> = (0..w * w).map(|i| ((i * 40503 + 31) % 89) as f64).collect();
        normalize(&mut avalues);
        normalize(&mut bvalues);

        let thm = ThumbSet {
            apoints,
            bpoints,
            avalues,
            bvalues,
            // Demand most of the frame so only near-center offsets count.
            req_area: (w * w * 3) / 4,
            min_1d: 8,
            decimation: 1,
        };

        let mut scanner = FftScanner::new(ScannerParams {
            min_sweep_r: 0.9,
            ..ScannerParams::default()
        });
        let mut best = CorRec::default();

        assert!(!scanner.denovo_best_angle(&mut best, 0.0, 1.0, 0.5, &thm));
        assert_eq!(scanner.err(), Some(RegError::SweepNoAngle));
    }
}
