//! Correlation search engine surface.
//!
//! The registration pipeline drives the engine through the [`ThumbScanner`]
//! trait and never looks inside it; [`FftScanner`] is the crate's reference
//! implementation. Engines may parallelize internally (the reference one
//! fans angle sweeps out across rayon workers) but present a synchronous
//! call surface.

pub mod fft;
pub mod scanner;

use serde::{Deserialize, Serialize};

use crate::geometry::{Affine, Point};

pub use scanner::{FftScanner, ScannerParams};

/// Typed registration failure codes.
///
/// These are persisted with every attempted pair, so downstream consumers
/// can tell "never tried" from "tried and rejected". None of them are
/// retryable within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize,
)]
pub enum RegError {
    /// Overlap region had zero or non-finite variance after normalization.
    #[error("degenerate overlap: zero or non-finite variance")]
    DegenerateInput,

    /// Too few points or too small a 1-D overlap after cropping.
    #[error("insufficient overlap after cropping")]
    InsufficientOverlap,

    /// Disc-limited search never cleared the correlation threshold.
    #[error("correlation from prior transform below threshold")]
    LowConfidencePrior,

    /// Angle sweep reported no qualifying angle.
    #[error("angle sweep found no qualifying angle")]
    SweepNoAngle,

    /// Final transform deviates from the prior beyond the configured limit.
    #[error("result deviates from prior beyond translation limit")]
    GeometryOutOfBounds,

    /// Debug evaluation requested; no usable result was produced.
    #[error("debug correlation evaluation only")]
    DebugOnly,
}

/// One correlation search outcome: the angle evaluated, the peak
/// correlation score in −1..1, the peak offset, and the composed
/// rotation-plus-offset transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorRec {
    pub t: Affine,
    /// Angle in degrees.
    pub angle: f64,
    /// Peak correlation in −1..1.
    pub r: f64,
    pub x: f64,
    pub y: f64,
}

/// The working set an engine searches over: the two (possibly decimated)
/// overlap point/value lists plus the acceptance thresholds.
///
/// Invariants: `points.len() == values.len()` per side; `decimation >= 1`,
/// and when it is `> 1` the coordinates are already divided by it and
/// `req_area` / `min_1d` are scaled down by its square / itself.
#[derive(Debug, Clone, Default)]
pub struct ThumbSet {
    pub apoints: Vec<Point>,
    pub bpoints: Vec<Point>,
    pub avalues: Vec<f64>,
    pub bvalues: Vec<f64>,
    /// Minimum acceptable overlap, in working points.
    pub req_area: usize,
    /// Minimum acceptable 1-D overlap, in working pixels.
    pub min_1d: usize,
    /// Decimation factor applied to the point grid.
    pub decimation: usize,
}

/// Engine capability surface consumed by the pipeline.
pub trait ThumbScanner {
    /// Bound subsequent searches to an ellipse of radii (rx, ry) around
    /// the predicted offset (ox, oy).
    fn set_disc(&mut self, ox: f64, oy: f64, rx: f64, ry: f64);

    /// Clear any disc bound.
    fn clear_disc(&mut self);

    /// Select locally-normalized correlation scoring.
    fn set_use_corr_r(&mut self, use_corr_r: bool);

    /// Evaluate correlation at a fixed angle; fills `best` in place.
    fn r_from_angle(&mut self, best: &mut CorRec, angle: f64, thm: &ThumbSet);

    /// Full-range angle sweep around `center`. Returns false on failure
    /// with a code retrievable through [`ThumbScanner::err`].
    fn denovo_best_angle(
        &mut self,
        best: &mut CorRec,
        center: f64,
        half_span: f64,
        step: f64,
        thm: &ThumbSet,
    ) -> bool;

    /// Narrow sweep seeded by `n_prior` previously recorded angles.
    fn use_prior_angles(
        &mut self,
        best: &mut CorRec,
        n_prior: usize,
        center: f64,
        half_span: f64,
        thm: &ThumbSet,
    ) -> bool;

    /// One pre-adjustment pass: search small deformations of side A for a
    /// better score than `r0` at the given angle. Returns true if the
    /// internal deformation was improved.
    fn pretweaks(&mut self, r0: f64, angle: f64, thm: &ThumbSet) -> bool;

    /// Local post-search perturbation of an accepted result.
    fn post_tweaks(&mut self, best: &mut CorRec, thm: &ThumbSet);

    /// Full-resolution confirmation pass around an accepted offset.
    fn finish_at_full_res(&mut self, best: &mut CorRec, thm: &ThumbSet);

    /// Last typed failure, if any.
    fn err(&self) -> Option<RegError>;
}
