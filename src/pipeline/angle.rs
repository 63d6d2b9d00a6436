//! Starting-angle resolution.
//!
//! Sets the session's center angle from the configured mode, rewrites the
//! prior as a clean rotation-plus-translation, and widens the 2-D overlap
//! requirement when rotation shrinks a cross-layer intersection.

use tracing::{debug, info};

use crate::utils::median;

use super::{AngleMode, PairSession};

impl<'a> PairSession<'a> {
    /// Resolve the starting angle.
    ///
    /// Returns the number of prior angles behind it: 0 means run the full
    /// denovo sweep, anything else the prior-constrained sweep.
    pub fn set_starting_angle(&mut self) -> crate::Result<usize> {
        let (vx, vy) = self.tab.xy();

        let n_prior = match self.mode {
            AngleMode::Override { deg } => {
                self.ang0 = deg;
                1
            }
            AngleMode::Derive => {
                self.ang0 = self.tab.rotation_radians().to_degrees();
                0
            }
            AngleMode::PriorTable => {
                let recs = self.table.read_layer_pair(self.a.layer, self.b.layer)?;
                let angles: Vec<f64> =
                    recs.iter().filter(|r| r.is_valid()).map(|r| r.angle).collect();

                if angles.len() >= 4 {
                    let n = angles.len();
                    self.ang0 = median(angles);
                    info!(n_prior = n, ang0 = self.ang0, "median of prior angles");
                    n
                } else {
                    debug!(
                        n_valid = angles.len(),
                        "too few prior angles, deriving from prior transform"
                    );
                    self.ang0 = self.tab.rotation_radians().to_degrees();
                    0
                }
            }
        };

        // Numerical noise near zero would leak into the trigonometric
        // comparisons downstream.
        if self.ang0.abs() < 0.001 {
            self.ang0 = 0.0;
        }

        // Prior becomes R(ang0) + V.
        self.tab = crate::geometry::Affine::rotation_with_translation(
            self.ang0.to_radians(),
            vx,
            vy,
        );

        // A rotated footprint needs a larger raw selection to carry the
        // same usable area across layers.
        if self.a.layer != self.b.layer {
            let a = self.ang0.to_radians();
            let c = a.cos();
            let s = a.sin();
            self.olap2d = (self.olap2d as f64 / (c * c).max(s * s)) as usize;
        }

        debug!(ang0 = self.ang0, n_prior, olap2d = self.olap2d, "starting angle set");
        Ok(n_prior)
    }
}
