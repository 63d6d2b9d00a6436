//! Thumbnail working-set construction.
//!
//! Copies the cropped regions into a [`ThumbSet`], optionally coarsens
//! the point grid, and normalizes intensities. A degenerate (uniform)
//! region fails here and short-circuits every later search stage.

use tracing::{debug, warn};

use crate::geometry::Point;
use crate::search::{RegError, ThumbSet};
use crate::utils::normalize;

use super::{OverlapPair, PairSession, SubImage};

impl<'a> PairSession<'a> {
    /// Build the search working set at the given decimation factor.
    pub fn make_thumbs(
        &self,
        olp: &OverlapPair,
        decimation: usize,
    ) -> Result<ThumbSet, RegError> {
        let decimation = decimation.max(1);

        let mut thm = ThumbSet {
            apoints: olp.a.points.clone(),
            bpoints: olp.b.points.clone(),
            avalues: olp.a.values.clone(),
            bvalues: olp.b.values.clone(),
            req_area: self.required_overlap(),
            min_1d: self.config().overlap.min_1d_overlap,
            decimation,
        };

        if decimation > 1 {
            (thm.apoints, thm.avalues) = decimate(&olp.a, decimation);
            (thm.bpoints, thm.bvalues) = decimate(&olp.b, decimation);

            thm.req_area /= decimation * decimation;
            thm.min_1d /= decimation;

            debug!(
                apts = thm.apoints.len(),
                req_area = thm.req_area,
                decimation,
                "thumbs decimated"
            );
        }

        let sd = normalize(&mut thm.avalues);
        if sd == 0.0 || !sd.is_finite() {
            warn!(sd, "image A intersection region is degenerate");
            return Err(RegError::DegenerateInput);
        }

        let sd = normalize(&mut thm.bvalues);
        if sd == 0.0 || !sd.is_finite() {
            warn!(sd, "image B intersection region is degenerate");
            return Err(RegError::DegenerateInput);
        }

        Ok(thm)
    }
}

/// Coarsen a region onto a `factor`-pixel grid: occupied cells become
/// single points at the divided coordinates, carrying the mean of the
/// values that landed in them.
fn decimate(sub: &SubImage, factor: usize) -> (Vec<Point>, Vec<f64>) {
    let cw = sub.w.div_ceil(factor);
    let ch = sub.h.div_ceil(factor);

    let mut sums = vec![0.0f64; cw * ch];
    let mut counts = vec![0u32; cw * ch];

    for (p, v) in sub.points.iter().zip(&sub.values) {
        let cx = (p.x as usize / factor).min(cw - 1);
        let cy = (p.y as usize / factor).min(ch - 1);
        sums[cx + cw * cy] += v;
        counts[cx + cw * cy] += 1;
    }

    let mut points = Vec::new();
    let mut values = Vec::new();

    for cy in 0..ch {
        for cx in 0..cw {
            let i = cx + cw * cy;
            if counts[i] > 0 {
                points.push(Point::new(cx as f64, cy as f64));
                values.push(sums[i] / counts[i] as f64);
            }
        }
    }

    (points, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::make_zero_based_points;

    #[test]
    fn decimate_halves_grid() {
        let sub = SubImage {
            origin: Point::default(),
            w: 8,
            h: 8,
            points: make_zero_based_points(8, 8),
            values: (0..64).map(|i| i as f64).collect(),
        };

        let (points, values) = decimate(&sub, 2);
        assert_eq!(points.len(), 16);
        assert_eq!(values.len(), 16);
        // First cell averages pixels (0,0), (1,0), (0,1), (1,1).
        assert_eq!(values[0], (0.0 + 1.0 + 8.0 + 9.0) / 4.0);
        assert!(points.iter().all(|p| p.x < 4.0 && p.y < 4.0));
    }
}
