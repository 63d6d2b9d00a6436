//! Geometric primitives: affine transforms, points, and overlap boxes.

pub mod affine;
pub mod point;

pub use affine::Affine;
pub use point::{bbox_from_points, boxes_from_shifts, make_zero_based_points, IBox, Point};
