//! Overlap cropping and thumbnail construction through a live session.

use tile_registration::config::RegistrationConfig;
use tile_registration::geometry::make_zero_based_points;
use tile_registration::search::RegError;
use tile_registration::{Affine, AngleMode, PairSession, PairTable, PixelPair, TileId};

/// Textured same-layer working pair at scale 1.
fn textured_pair(w: usize, h: usize) -> PixelPair {
    let vals: Vec<f64> = (0..w * h)
        .map(|i| {
            let x = (i % w) as f64;
            let y = (i / w) as f64;
            100.0 + 40.0 * (0.37 * x).sin() + 25.0 * (0.23 * y).cos() + 0.1 * x * y
        })
        .collect();

    PixelPair::from_buffers(vals.clone(), vals, w, h, 1).unwrap()
}

fn session<'a>(
    px: &'a PixelPair,
    tab: Affine,
    cfg: &'a RegistrationConfig,
    table: &'a PairTable,
) -> PairSession<'a> {
    PairSession::new(
        TileId::new(0, 0, 0),
        TileId::new(0, 1, 0),
        tab,
        px,
        AngleMode::Derive,
        cfg,
        table,
    )
}

#[test]
fn zero_confidence_uses_whole_images() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);

    let mut cfg = RegistrationConfig::default();
    cfg.overlap.xy_conf = 0.0;

    // A confident-looking prior translation must be ignored entirely.
    let mut tab = Affine::identity();
    tab.set_xy(40.0, 0.0);

    let s = session(&px, tab, &cfg, &table);
    let olp = s.crop_dense();

    assert_eq!(olp.a.w, 64);
    assert_eq!(olp.a.h, 64);
    assert_eq!(olp.b.w, 64);
    assert_eq!(olp.a.origin, Default::default());
    assert_eq!(olp.a.points.len(), 64 * 64);
}

#[test]
fn confident_prior_crops_to_intersection() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);
    let cfg = RegistrationConfig::default();

    // conf 0.75 of a 40-pixel shift predicts a 30-pixel offset, leaving a
    // 34-pixel-wide intersection.
    let mut tab = Affine::identity();
    tab.set_xy(40.0, 0.0);

    let s = session(&px, tab, &cfg, &table);
    let olp = s.crop_dense();

    assert_eq!(olp.a.w, 34);
    assert_eq!(olp.a.h, 64);
    assert_eq!(olp.b.w, 34);

    // A sits 30 pixels into B's frame, so A's left edge overlaps B's
    // right portion.
    assert_eq!(olp.a.origin.x, 0.0);
    assert_eq!(olp.b.origin.x, 30.0);

    // Cropped values still index the original buffers.
    assert_eq!(olp.a.values[0], px.avs[0]);
    assert_eq!(olp.b.values[0], px.bvs[30]);
}

#[test]
fn thin_intersection_falls_back_to_whole_images() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);
    let cfg = RegistrationConfig::default();

    // conf 0.75 of 60 predicts 45, leaving only 19 pixels: under the
    // 1-D minimum of 20.
    let mut tab = Affine::identity();
    tab.set_xy(60.0, 0.0);

    let s = session(&px, tab, &cfg, &table);
    let olp = s.crop_dense();

    assert_eq!(olp.a.w, 64);
    assert_eq!(olp.a.h, 64);
}

#[test]
fn sparse_box_selection_widens_to_whole_images_once() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);

    // The 34x64 intersection holds 2176 points; a 3000-point floor
    // rejects the box but accepts the 4096-point whole images.
    let mut cfg = RegistrationConfig::default();
    cfg.overlap.min_2d_overlap = 3000;

    let mut tab = Affine::identity();
    tab.set_xy(40.0, 0.0);

    let pts = make_zero_based_points(64, 64);
    let s = session(&px, tab, &cfg, &table);
    let olp = s.crop_points(&pts, &pts).unwrap();

    assert_eq!(olp.a.w, 64);
    assert_eq!(olp.a.points.len(), 4096);
}

#[test]
fn too_few_points_even_whole_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);

    let mut cfg = RegistrationConfig::default();
    cfg.overlap.min_2d_overlap = 5000;

    let pts = make_zero_based_points(64, 64);
    let s = session(&px, Affine::identity(), &cfg, &table);

    assert_eq!(
        s.crop_points(&pts, &pts).unwrap_err(),
        RegError::InsufficientOverlap
    );
}

#[test]
fn decimation_scales_thresholds_and_points() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);
    let cfg = RegistrationConfig::default();

    let s = session(&px, Affine::identity(), &cfg, &table);
    let olp = s.crop_dense();

    let full = s.make_thumbs(&olp, 1).unwrap();
    let half = s.make_thumbs(&olp, 2).unwrap();

    assert_eq!(full.apoints.len(), 64 * 64);
    assert_eq!(half.apoints.len(), 32 * 32);
    assert_eq!(half.req_area, full.req_area / 4);
    assert_eq!(half.min_1d, full.min_1d / 2);
    assert_eq!(half.decimation, 2);
}

#[test]
fn thumbs_are_zero_mean_unit_sigma() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();
    let px = textured_pair(64, 64);
    let cfg = RegistrationConfig::default();

    let s = session(&px, Affine::identity(), &cfg, &table);
    let thm = s.make_thumbs(&s.crop_dense(), 1).unwrap();

    let n = thm.avalues.len() as f64;
    let mean: f64 = thm.avalues.iter().sum::<f64>() / n;
    let var: f64 = thm.avalues.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    assert!(mean.abs() < 1e-9);
    assert!((var - 1.0).abs() < 1e-9);
}

#[test]
fn uniform_region_is_degenerate() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();

    let flat = vec![42.0; 64 * 64];
    let px = PixelPair::from_buffers(flat.clone(), flat, 64, 64, 1).unwrap();
    let cfg = RegistrationConfig::default();

    let s = session(&px, Affine::identity(), &cfg, &table);
    let err = s.make_thumbs(&s.crop_dense(), 1).unwrap_err();

    assert_eq!(err, RegError::DegenerateInput);
}
