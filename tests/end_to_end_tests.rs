//! Whole-pipeline recovery of known synthetic transforms.

use tile_registration::config::RegistrationConfig;
use tile_registration::search::RegError;
use tile_registration::synth::{textured_tile, warp_affine};
use tile_registration::{
    Affine, AngleMode, FftScanner, PairSession, PairTable, PixelPair, SearchPath, TileId,
};

#[test]
fn sweep_recovers_rotation_and_shift() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();

    // B sees A's scene rotated 5 degrees and shifted (12, -7).
    let truth = Affine::rotation_with_translation(5.0_f64.to_radians(), 12.0, -7.0);
    let img_a = textured_tile(192, 192, 42);
    let img_b = warp_affine(&img_a, &truth);

    let px = PixelPair::from_images(&img_a, &img_b, 2).unwrap();

    let mut cfg = RegistrationConfig::default();
    cfg.overlap.xy_conf = 0.0;

    let mut session = PairSession::new(
        TileId::new(0, 0, 0),
        TileId::new(0, 1, 0),
        Affine::identity(),
        &px,
        AngleMode::Derive,
        &cfg,
        &table,
    );

    let mut scanner = FftScanner::default();
    let outcome = session.run(&mut scanner, SearchPath::Sweep).unwrap();

    assert!(outcome.is_success(), "err = {:?}", outcome.err);
    assert!(
        (outcome.best.angle - 5.0).abs() < 0.5,
        "angle = {}",
        outcome.best.angle
    );
    assert!(
        (outcome.best.x - 12.0).abs() < 1.0,
        "x = {}",
        outcome.best.x
    );
    assert!(
        (outcome.best.y + 7.0).abs() < 1.0,
        "y = {}",
        outcome.best.y
    );

    // The transform carries the full-resolution translation.
    let (tx, ty) = outcome.best.t.xy();
    assert_eq!((tx, ty), (outcome.best.x, outcome.best.y));

    // One valid record on file.
    let recs = table.read_layer_pair(0, 0).unwrap();
    assert_eq!(recs.len(), 1);
    assert!(recs[0].is_valid());
    assert!((recs[0].angle - outcome.best.angle).abs() < 1e-9);
}

#[test]
fn disc_search_confirms_an_exact_prior() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();

    // Pure translation, with the prior handed in exactly.
    let truth = Affine::rotation_with_translation(0.0, 8.0, -4.0);
    let img_a = textured_tile(192, 192, 7);
    let img_b = warp_affine(&img_a, &truth);

    let px = PixelPair::from_images(&img_a, &img_b, 2).unwrap();
    let cfg = RegistrationConfig::default();

    let mut session = PairSession::new(
        TileId::new(0, 0, 0),
        TileId::new(0, 1, 0),
        truth,
        &px,
        AngleMode::Override { deg: 0.0 },
        &cfg,
        &table,
    );

    let mut scanner = FftScanner::default();
    let outcome = session.run(&mut scanner, SearchPath::Disc).unwrap();

    assert!(outcome.is_success(), "err = {:?}", outcome.err);
    assert!(outcome.best.r > 0.25, "r = {}", outcome.best.r);
    assert!((outcome.best.x - 8.0).abs() < 2.0, "x = {}", outcome.best.x);
    assert!((outcome.best.y + 4.0).abs() < 2.0, "y = {}", outcome.best.y);
}

#[test]
fn disc_rejects_an_unrelated_pair() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();

    // Two tiles that share no scene content; the prior is confident but
    // wrong, so the disc search must reject on correlation.
    let img_a = textured_tile(160, 160, 11);
    let img_b = textured_tile(160, 160, 99);

    let px = PixelPair::from_images(&img_a, &img_b, 2).unwrap();

    let mut cfg = RegistrationConfig::default();
    cfg.search.r_thresh = 0.6;

    let mut session = PairSession::new(
        TileId::new(0, 0, 0),
        TileId::new(0, 1, 0),
        Affine::identity(),
        &px,
        AngleMode::Override { deg: 0.0 },
        &cfg,
        &table,
    );

    let mut scanner = FftScanner::default();
    let outcome = session.run(&mut scanner, SearchPath::Disc).unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.err, Some(RegError::LowConfidencePrior));

    // The rejection is on the record like any other attempt.
    let recs = table.read_layer_pair(0, 0).unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].err, Some(RegError::LowConfidencePrior));
    assert!(!recs[0].is_valid());
}

#[test]
fn diagnostics_report_lands_next_to_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let table = PairTable::new(dir.path()).unwrap();

    let truth = Affine::rotation_with_translation(0.0, 6.0, 2.0);
    let img_a = textured_tile(160, 160, 3);
    let img_b = warp_affine(&img_a, &truth);

    let px = PixelPair::from_images(&img_a, &img_b, 2).unwrap();

    let mut cfg = RegistrationConfig::default();
    cfg.overlap.xy_conf = 0.0;
    cfg.diagnostics.sum_sq_dif = true;

    let mut session = PairSession::new(
        TileId::new(4, 0, 0),
        TileId::new(4, 1, 0),
        Affine::identity(),
        &px,
        AngleMode::Derive,
        &cfg,
        &table,
    );

    let mut scanner = FftScanner::default();
    let outcome = session.run(&mut scanner, SearchPath::Sweep).unwrap();
    assert!(outcome.is_success(), "err = {:?}", outcome.err);

    let report = dir.path().join("sumsqdif_4_@_4.tsv");
    let content = std::fs::read_to_string(report).unwrap();
    let mut lines = content.lines();
    assert!(lines.next().unwrap().starts_with("TileA\t"));
    assert_eq!(lines.count(), 1);
}
