//! Persisted registration state.
//!
//! One JSON-lines file per ordered layer pair holds every registration
//! attempt: success or typed failure, append-only. Re-running a pair
//! appends a fresh record; readers take the latest entry for an exact
//! identity, or aggregate a layer pair's records (median-of-priors).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::geometry::{make_zero_based_points, Affine};
use crate::pixels::PixelPair;
use crate::search::RegError;
use crate::utils::interpolate_pixel;
use crate::TileId;

/// One registration attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRecord {
    pub a: TileId,
    pub b: TileId,
    /// Final affine, six row-major coefficients.
    pub t: [f64; 6],
    /// Resolved angle, degrees.
    pub angle: f64,
    /// Peak correlation, −1..1.
    pub r: f64,
    /// None on success; the typed failure otherwise.
    pub err: Option<RegError>,
    pub elapsed_ms: f64,
    pub recorded_at: DateTime<Utc>,
}

impl PairRecord {
    pub fn is_valid(&self) -> bool {
        self.err.is_none()
    }
}

/// Append/lookup table rooted at one directory.
#[derive(Debug, Clone)]
pub struct PairTable {
    dir: PathBuf,
}

impl PairTable {
    pub fn new<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn layer_file(&self, layer_a: i32, layer_b: i32) -> PathBuf {
        self.dir
            .join(format!("thmpair_{}_@_{}.jsonl", layer_a, layer_b))
    }

    /// Append one attempt. Records are never rewritten.
    pub fn append(&self, rec: &PairRecord) -> crate::Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.layer_file(rec.a.layer, rec.b.layer))?;

        let line = serde_json::to_string(rec)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }

    /// All records for a layer pair, oldest first. Missing file = empty.
    pub fn read_layer_pair(&self, layer_a: i32, layer_b: i32) -> crate::Result<Vec<PairRecord>> {
        let path = self.layer_file(layer_a, layer_b);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for line in BufReader::new(fs::File::open(&path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PairRecord>(&line) {
                Ok(rec) => out.push(rec),
                Err(e) => warn!(file = %path.display(), "skipping unreadable record: {}", e),
            }
        }

        Ok(out)
    }

    /// Latest record for an exact tile-pair identity, if any.
    pub fn latest_for(&self, a: &TileId, b: &TileId) -> crate::Result<Option<PairRecord>> {
        let recs = self.read_layer_pair(a.layer, b.layer)?;
        Ok(recs.into_iter().rev().find(|r| r.a == *a && r.b == *b))
    }
}

lazy_static::lazy_static! {
    // Advisory lock around the diagnostic report's read-append section.
    static ref DIAG_LOCK: Mutex<()> = Mutex::new(());
}

/// Append a sum-of-squared-difference row for a finished pair.
///
/// Diagnostic only: never read back by the pipeline, and safe to drop.
/// `t` maps A onto B in working-scale coordinates.
pub fn record_sum_sq_dif(
    dir: &Path,
    a: &TileId,
    b: &TileId,
    px: &PixelPair,
    t: &Affine,
) -> crate::Result<()> {
    let (sqd, prd, n) = sum_sq_dif(px, t);

    let _guard = DIAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let path = dir.join(format!("sumsqdif_{}_@_{}.tsv", a.layer, b.layer));
    let fresh = !path.exists();

    let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
    if fresh {
        writeln!(f, "TileA\tTileB\tSQ\tR\tN\tSQ/N\tR/N")?;
    }

    let denom = n.max(1) as f64;
    writeln!(
        f,
        "{}\t{}\t{:.6}\t{:.6}\t{}\t{:.6}\t{:.6}",
        a.tile,
        b.tile,
        sqd,
        prd,
        n,
        sqd / denom,
        prd / denom
    )?;

    Ok(())
}

fn sum_sq_dif(px: &PixelPair, t: &Affine) -> (f64, f64, usize) {
    let mut sqd = 0.0;
    let mut prd = 0.0;
    let mut n = 0usize;

    let w = px.ws;
    let h = px.hs;

    for p in make_zero_based_points(w, h) {
        let i = p.x as usize + w * p.y as usize;
        let q = t.transform(p);

        if q.x >= 0.0 && q.x < (w - 1) as f64 && q.y >= 0.0 && q.y < (h - 1) as f64 {
            let av = px.avs[i];
            let mut d = interpolate_pixel(q.x, q.y, &px.bvs, w);

            n += 1;
            prd += av * d;
            d -= av;
            sqd += d * d;
        }
    }

    (sqd, prd, n)
}
