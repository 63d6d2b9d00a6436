//! Pairwise thumbnail registration pipeline.
//!
//! One [`PairSession`] owns everything a single tile-pair attempt needs:
//! the tile identities, the prior transform, a borrowed pixel pair, the
//! configuration, and the result table. Components run strictly in order
//! — overlap crop, thumbnail build, starting-angle resolution, search
//! (disc-limited or angle sweep), finish — and every attempt ends with a
//! persisted record, success or typed failure. Sessions share no mutable
//! state; concurrent pairs simply use separate sessions.

pub mod angle;
pub mod disc;
pub mod finish;
pub mod overlap;
pub mod sweep;
pub mod thumbs;

use instant::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::RegistrationConfig;
use crate::geometry::Affine;
use crate::pixels::PixelPair;
use crate::search::{CorRec, RegError, ThumbScanner};
use crate::tables::{PairRecord, PairTable};
use crate::TileId;

pub use finish::isect_to_image_coords;
pub use overlap::{OverlapPair, SubImage};

/// How the starting angle is resolved for a session.
///
/// Each variant carries only what it needs; the prior-table variant keys
/// off the session's layer pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngleMode {
    /// Explicit center angle, degrees; used verbatim.
    Override { deg: f64 },
    /// Extract the angle from the prior transform's rotation part.
    Derive,
    /// Median of previously recorded angles for this layer pair, when at
    /// least four valid records exist; Derive behavior otherwise.
    PriorTable,
}

impl AngleMode {
    pub fn is_override(&self) -> bool {
        matches!(self, AngleMode::Override { .. })
    }
}

/// Which search the session runs after cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    /// Bounded local search around the prior's predicted offset; for
    /// callers that already hold a high-confidence transform.
    Disc,
    /// Denovo or prior-constrained angle sweep.
    Sweep,
}

/// Outcome of one attempt. Always persisted before being returned.
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub best: CorRec,
    pub err: Option<RegError>,
    pub elapsed_ms: f64,
}

impl PairOutcome {
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

/// Per-pair session context.
pub struct PairSession<'a> {
    pub a: TileId,
    pub b: TileId,
    /// Prior transform mapping A onto B in full-resolution coordinates.
    /// Rewritten once by the angle resolver to R(ang0) + translation.
    pub tab: Affine,
    pub px: &'a PixelPair,
    pub mode: AngleMode,
    /// Operator diagnosis: evaluate one correlation and stop.
    pub dbg_cor: bool,

    cfg: &'a RegistrationConfig,
    table: &'a PairTable,
    session_id: Uuid,

    /// Resolved starting angle, degrees.
    ang0: f64,
    /// Working copy of the 2-D overlap threshold; inflated cross-layer.
    olap2d: usize,
}

impl<'a> PairSession<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: TileId,
        b: TileId,
        tab: Affine,
        px: &'a PixelPair,
        mode: AngleMode,
        cfg: &'a RegistrationConfig,
        table: &'a PairTable,
    ) -> Self {
        Self {
            a,
            b,
            tab,
            px,
            mode,
            dbg_cor: false,
            cfg,
            table,
            session_id: Uuid::new_v4(),
            ang0: 0.0,
            olap2d: cfg.overlap.min_2d_overlap,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        self.cfg
    }

    pub fn starting_angle(&self) -> f64 {
        self.ang0
    }

    pub fn required_overlap(&self) -> usize {
        self.olap2d
    }

    /// Run the pipeline over dense rectangular overlap regions.
    ///
    /// Fatal I/O problems surface as `Err`; registration failures come
    /// back inside the outcome, already persisted.
    pub fn run(
        &mut self,
        scanner: &mut dyn ThumbScanner,
        path: SearchPath,
    ) -> crate::Result<PairOutcome> {
        let span = info_span!(
            "pair_session",
            session = %self.session_id,
            a = %self.a,
            b = %self.b,
        );
        let _enter = span.enter();
        let started = Instant::now();

        let n_prior = self.set_starting_angle()?;
        let olp = self.crop_dense();
        self.run_inner(scanner, path, n_prior, olp, started)
    }

    /// Run the pipeline over caller-supplied point sets (for instance,
    /// one connected region per side).
    pub fn run_with_points(
        &mut self,
        scanner: &mut dyn ThumbScanner,
        path: SearchPath,
        apoints: &[crate::geometry::Point],
        bpoints: &[crate::geometry::Point],
    ) -> crate::Result<PairOutcome> {
        let span = info_span!(
            "pair_session",
            session = %self.session_id,
            a = %self.a,
            b = %self.b,
        );
        let _enter = span.enter();
        let started = Instant::now();

        let n_prior = self.set_starting_angle()?;
        let olp = match self.crop_points(apoints, bpoints) {
            Ok(olp) => olp,
            Err(e) => return self.fail(CorRec::default(), e, started),
        };
        self.run_inner(scanner, path, n_prior, olp, started)
    }

    fn run_inner(
        &mut self,
        scanner: &mut dyn ThumbScanner,
        path: SearchPath,
        n_prior: usize,
        olp: OverlapPair,
        started: Instant,
    ) -> crate::Result<PairOutcome> {
        let mut thm = match self.make_thumbs(&olp, self.cfg.thumbs.decimation) {
            Ok(thm) => thm,
            Err(e) => return self.fail(CorRec::default(), e, started),
        };

        let mut best = CorRec::default();

        let searched = match path {
            SearchPath::Disc => self.disc(scanner, &mut best, &thm, &olp),
            SearchPath::Sweep => self.sweep(scanner, &mut best, &thm, n_prior),
        };
        if let Err(e) = searched {
            return self.fail(best, e, started);
        }

        if let Err(e) = self.finish(scanner, &mut best, &mut thm, &olp) {
            return self.fail(best, e, started);
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
        info!(
            angle = best.angle,
            r = best.r,
            x = best.x,
            y = best.y,
            elapsed_ms,
            "pair registered"
        );

        self.tabulate(&best, None, elapsed_ms)?;
        Ok(PairOutcome {
            best,
            err: None,
            elapsed_ms,
        })
    }

    fn fail(
        &self,
        best: CorRec,
        err: RegError,
        started: Instant,
    ) -> crate::Result<PairOutcome> {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
        warn!(%err, angle = best.angle, r = best.r, "pair rejected");

        self.tabulate(&best, Some(err), elapsed_ms)?;
        Ok(PairOutcome {
            best,
            err: Some(err),
            elapsed_ms,
        })
    }

    /// Append the attempt to the result table; failures are auditable.
    fn tabulate(&self, best: &CorRec, err: Option<RegError>, elapsed_ms: f64) -> crate::Result<()> {
        self.table.append(&PairRecord {
            a: self.a,
            b: self.b,
            t: best.t.t,
            angle: best.angle,
            r: best.r,
            err,
            elapsed_ms,
            recorded_at: chrono::Utc::now(),
        })
    }
}
