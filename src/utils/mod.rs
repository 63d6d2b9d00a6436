pub mod stats;

pub use stats::{interpolate_pixel, median, normalize};
