//! Disc-limited refinement.
//!
//! For callers that already hold a high-confidence transform: predict the
//! offset between the intersection origins from the prior, bound the
//! search to a disc around it, and accept or reject on correlation alone.

use tracing::{debug, info, warn};

use crate::geometry::Point;
use crate::search::{CorRec, RegError, ThumbScanner, ThumbSet};

use super::{OverlapPair, PairSession};

impl<'a> PairSession<'a> {
    pub(super) fn disc(
        &self,
        scanner: &mut dyn ThumbScanner,
        best: &mut CorRec,
        thm: &ThumbSet,
        olp: &OverlapPair,
    ) -> Result<(), RegError> {
        let cfg = &self.config().search;
        let scl = self.px.scl as f64;
        let tscl = thm.decimation as f64;

        // Predicted offset between intersection origins, in working
        // (decimated) coordinates.
        let delta = self.tab.transform(Point::default());
        let ta_o = self.tab.apply_r_part(olp.a.origin);

        let ox = ((delta.x / scl - olp.b.origin.x + ta_o.x) / tscl).round();
        let oy = ((delta.y / scl - olp.b.origin.y + ta_o.y) / tscl).round();

        let radius = if cfg.translation_limit > 0.0 {
            cfg.translation_limit / (scl * tscl)
        } else {
            self.px.ws.max(self.px.hs) as f64
        };

        debug!(ox, oy, radius, "disc search bounds");

        scanner.set_use_corr_r(true);
        scanner.set_disc(ox, oy, radius, radius);
        scanner.r_from_angle(best, self.starting_angle(), thm);

        info!(
            r = best.r,
            angle = best.angle,
            x = best.x,
            y = best.y,
            "initial disc correlation"
        );

        if self.dbg_cor {
            return Err(RegError::DebugOnly);
        }

        if best.r < cfg.r_thresh {
            if cfg.pretweak {
                scanner.pretweaks(best.r, self.starting_angle(), thm);
                scanner.r_from_angle(best, self.starting_angle(), thm);
                info!(r = best.r, x = best.x, y = best.y, "after pretweak");
            }

            if best.r < cfg.r_thresh {
                warn!(r = best.r, thresh = cfg.r_thresh, "disc correlation below threshold");
                return Err(RegError::LowConfidencePrior);
            }
        }

        let dx = (best.x - ox) * tscl * scl;
        let dy = (best.y - oy) * tscl * scl;
        debug!(
            drift = (dx * dx + dy * dy).sqrt(),
            dx,
            dy,
            "peak distance from prediction"
        );

        Ok(())
    }
}
