//! Sweep orchestration.
//!
//! Chooses between the denovo and prior-constrained sweeps from the
//! resolved prior count; the numeric maximization itself belongs to the
//! engine. The debug flag short-circuits to a single fixed-angle
//! evaluation that never yields a usable result.

use tracing::info;

use crate::search::{CorRec, RegError, ThumbScanner, ThumbSet};

use super::PairSession;

impl<'a> PairSession<'a> {
    pub(super) fn sweep(
        &self,
        scanner: &mut dyn ThumbScanner,
        best: &mut CorRec,
        thm: &ThumbSet,
        n_prior: usize,
    ) -> Result<(), RegError> {
        let cfg = &self.config().search;

        if self.dbg_cor {
            scanner.r_from_angle(best, self.starting_angle(), thm);
            info!(r = best.r, angle = best.angle, "debug correlation evaluation");
            return Err(RegError::DebugOnly);
        }

        let ok = if n_prior > 0 {
            scanner.use_prior_angles(
                best,
                n_prior,
                self.starting_angle(),
                cfg.half_angle_prior,
                thm,
            )
        } else {
            scanner.denovo_best_angle(
                best,
                self.starting_angle(),
                cfg.half_angle_denovo,
                cfg.sweep_step,
                thm,
            )
        };

        if !ok {
            return Err(scanner.err().unwrap_or(RegError::SweepNoAngle));
        }

        Ok(())
    }
}
