//! Pairwise thumbnail registration for overlapping microscopy tiles.
//!
//! Given two tiles, an approximate prior transform, and a confidence
//! weight, the pipeline crops the likely overlap, builds a reduced
//! working pair, searches for the rotation and offset maximizing
//! normalized correlation, refines at full resolution, sanity-checks
//! against the prior, and persists the outcome — success or typed
//! failure — to an append-only result table.

pub mod config;
pub mod geometry;
pub mod logging;
pub mod pipeline;
pub mod pixels;
pub mod search;
pub mod synth;
pub mod tables;
pub mod utils;

use serde::{Deserialize, Serialize};

pub use config::RegistrationConfig;
pub use geometry::{Affine, Point};
pub use pipeline::{AngleMode, PairOutcome, PairSession, SearchPath};
pub use pixels::PixelPair;
pub use search::{CorRec, FftScanner, RegError, ThumbScanner, ThumbSet};
pub use tables::{PairRecord, PairTable};

/// Tile identity: logging and persistence key only, never registration
/// math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub layer: i32,
    pub tile: i32,
    pub region: i32,
}

impl TileId {
    pub fn new(layer: i32, tile: i32, region: i32) -> Self {
        Self {
            layer,
            tile,
            region,
        }
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}:{}", self.layer, self.tile, self.region)
    }
}

pub type Result<T> = anyhow::Result<T>;
