//! Finishing pass.
//!
//! Strict sequence over an accepted search result: post-tweaks, undo
//! decimation, full-resolution confirmation, intersection-to-image
//! coordinate correction, sanity check against the prior. Each step
//! depends on state mutated by its predecessor; the coordinate correction
//! in particular must run exactly once, after full-resolution refinement
//! and before the sanity check.

use tracing::{info, warn};

use crate::geometry::{Affine, Point};
use crate::search::{CorRec, RegError, ThumbScanner, ThumbSet};
use crate::tables::record_sum_sq_dif;

use super::{OverlapPair, PairSession};

/// Rebase an intersection-relative solution onto image corners.
///
/// The search solved `R(a − aO) + V = b − bO`; rearranged,
/// `R(a) + (V + bO − R(aO)) = b`, so the image-frame translation is
/// `V + bO − R(aO)`.
pub fn isect_to_image_coords(best: &mut CorRec, a_origin: Point, b_origin: Point) {
    let ra = best.t.apply_r_part(a_origin);

    best.x += b_origin.x - ra.x;
    best.y += b_origin.y - ra.y;
    best.t.set_xy(best.x, best.y);
}

impl<'a> PairSession<'a> {
    /// Translation difference between the prior and a candidate result,
    /// and whether the configured limit tolerates it. The limit is
    /// boundary-inclusive and, unless configured otherwise, not enforced
    /// in override-angle mode.
    pub fn check_translation_limit(&self, t_best: &Affine) -> (f64, bool) {
        let ident = self.tab.invert().compose(t_best);
        let (ex, ey) = ident.xy();
        let err = (ex * ex + ey * ey).sqrt();

        let limit = self.config().search.translation_limit;
        let enforced = limit > 0.0
            && (!self.mode.is_override() || self.config().sanity.enforce_in_override);

        (err, !enforced || err <= limit)
    }

    pub(super) fn finish(
        &self,
        scanner: &mut dyn ThumbScanner,
        best: &mut CorRec,
        thm: &mut ThumbSet,
        olp: &OverlapPair,
    ) -> Result<(), RegError> {
        if self.config().search.post_tweak {
            scanner.post_tweaks(best, thm);
        }

        // Undo decimation scaling of the offset.
        let tscl = thm.decimation as f64;
        best.x *= tscl;
        best.y *= tscl;
        best.t.set_xy(best.x, best.y);

        // Full-resolution confirmation on an undecimated working set.
        *thm = self.make_thumbs(olp, 1)?;
        scanner.finish_at_full_res(best, thm);

        isect_to_image_coords(best, olp.a.origin, olp.b.origin);

        if self.config().diagnostics.sum_sq_dif {
            // Working-scale transform; report trouble but never fail the
            // pair over a diagnostic.
            if let Err(e) =
                record_sum_sq_dif(self.table.dir(), &self.a, &self.b, self.px, &best.t)
            {
                warn!("sum-of-squared-difference report failed: {}", e);
            }
        }

        // Back to full-resolution image coordinates.
        best.t.mul_xy(self.px.scl as f64);
        (best.x, best.y) = best.t.xy();

        info!(
            angle = best.angle,
            r = best.r,
            x = best.x,
            y = best.y,
            t = %best.t,
            "full-scale result"
        );

        let (err, ok) = self.check_translation_limit(&best.t);
        info!(err, limit = self.config().search.translation_limit, orig = %self.tab, "prior residual");

        if !ok {
            warn!(err, "result too far from prior transform");
            return Err(RegError::GeometryOutOfBounds);
        }

        Ok(())
    }
}
