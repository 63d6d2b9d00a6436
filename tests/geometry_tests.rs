//! Transform and coordinate-frame behavior the rest of the pipeline
//! leans on.

use tile_registration::geometry::{boxes_from_shifts, Affine, Point};
use tile_registration::pipeline::isect_to_image_coords;
use tile_registration::search::CorRec;

const EPS: f64 = 1e-9;

#[test]
fn rotation_then_inverse_is_identity() {
    let t = Affine::rotation_with_translation(0.3, 12.5, -4.0);
    let round = t.invert().compose(&t);

    let p = Point::new(17.0, -3.5);
    let q = round.transform(p);
    assert!((q.x - p.x).abs() < EPS);
    assert!((q.y - p.y).abs() < EPS);
}

#[test]
fn compose_applies_right_hand_side_first() {
    let rot = Affine::rotation(std::f64::consts::FRAC_PI_2);
    let mut shift = Affine::identity();
    shift.set_xy(10.0, 0.0);

    // rot ∘ shift: translate, then rotate.
    let t = rot.compose(&shift);
    let q = t.transform(Point::new(0.0, 0.0));
    assert!((q.x - 0.0).abs() < EPS);
    assert!((q.y - 10.0).abs() < EPS);
}

#[test]
fn rotation_angle_is_recovered() {
    for deg in [-4.0, -0.5, 0.0, 1.25, 7.0] {
        let t = Affine::rotation_with_translation((deg as f64).to_radians(), 3.0, -8.0);
        assert!((t.rotation_radians().to_degrees() - deg).abs() < 1e-9);
    }
}

#[test]
fn isect_correction_rebases_onto_image_corners() {
    // The search solved R(a - aO) + V = b - bO over intersection-local
    // coordinates; the image-frame translation must be V + bO - R(aO).
    let angle: f64 = 30.0_f64.to_radians();
    let a_origin = Point::new(10.0, 20.0);
    let b_origin = Point::new(30.0, 5.0);

    let mut best = CorRec {
        t: Affine::rotation_with_translation(angle, 2.0, 3.0),
        angle: 30.0,
        r: 0.9,
        x: 2.0,
        y: 3.0,
    };

    isect_to_image_coords(&mut best, a_origin, b_origin);

    let (c, s) = (angle.cos(), angle.sin());
    let expect_x = 2.0 + 30.0 - (c * 10.0 - s * 20.0);
    let expect_y = 3.0 + 5.0 - (s * 10.0 + c * 20.0);

    assert!((best.x - expect_x).abs() < EPS);
    assert!((best.y - expect_y).abs() < EPS);

    // The transform carries the corrected translation too.
    let (tx, ty) = best.t.xy();
    assert!((tx - best.x).abs() < EPS);
    assert!((ty - best.y).abs() < EPS);

    // Sanity: image-corner points now map consistently with the
    // intersection-local solution.
    let a_local = Point::new(4.0, 6.0);
    let a_image = Point::new(a_local.x + a_origin.x, a_local.y + a_origin.y);

    let local = Affine::rotation_with_translation(angle, 2.0, 3.0).transform(a_local);
    let image = best.t.transform(a_image);

    assert!((image.x - (local.x + b_origin.x)).abs() < EPS);
    assert!((image.y - (local.y + b_origin.y)).abs() < EPS);
}

#[test]
fn identity_correction_with_zero_origins_is_a_no_op() {
    let mut best = CorRec {
        t: Affine::rotation_with_translation(0.1, 5.0, -2.0),
        angle: 0.1_f64.to_degrees(),
        r: 0.5,
        x: 5.0,
        y: -2.0,
    };

    isect_to_image_coords(&mut best, Point::default(), Point::default());
    assert!((best.x - 5.0).abs() < EPS);
    assert!((best.y + 2.0).abs() < EPS);
}

#[test]
fn shifted_overlap_boxes_mirror_each_other() {
    let (ba, bb) = boxes_from_shifts(64, 64, 64, 64, 40, 12);

    assert_eq!(ba.width(), 24);
    assert_eq!(ba.height(), 52);
    assert_eq!(bb.width(), 24);
    assert_eq!(bb.height(), 52);

    // A's overlap hugs its far corner, B's its near corner.
    assert_eq!((ba.l, ba.b), (0, 0));
    assert_eq!((bb.l, bb.b), (40, 12));
    assert_eq!((ba.r, ba.t), (23, 51));
    assert_eq!((bb.r, bb.t), (63, 63));
}
