//! Synthetic tile generation.
//!
//! Deterministic textured tiles and affine warps for the demo command and
//! the test suite. Texture is seeded Gaussian noise smoothed with a box
//! blur so it survives rotation resampling.

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::geometry::{Affine, Point};

/// Seeded smooth random texture.
pub fn textured_tile(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(128.0f64, 60.0).expect("valid distribution");

    let w = width as usize;
    let h = height as usize;
    let noise: Vec<f64> = (0..w * h).map(|_| normal.sample(&mut rng)).collect();

    // 5x5 box blur gives the texture enough spatial correlation to
    // correlate under sub-pixel resampling.
    let blurred = box_blur(&noise, w, h, 2);

    GrayImage::from_fn(width, height, |x, y| {
        let v = blurred[x as usize + w * y as usize];
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// Render the scene of `src` as seen through `t`: the output pixel at
/// `t(p)` shows `src(p)`, i.e. `out(q) = src(t⁻¹(q))`. Samples falling
/// outside the source are filled with mid-gray.
pub fn warp_affine(src: &GrayImage, t: &Affine) -> GrayImage {
    let inv = t.invert();
    let (w, h) = src.dimensions();

    GrayImage::from_fn(w, h, |x, y| {
        let p = inv.transform(Point::new(x as f64, y as f64));

        if p.x >= 0.0 && p.x < (w - 1) as f64 && p.y >= 0.0 && p.y < (h - 1) as f64 {
            Luma([bilinear(src, p.x, p.y).clamp(0.0, 255.0) as u8])
        } else {
            Luma([128])
        }
    })
}

fn bilinear(img: &GrayImage, x: f64, y: f64) -> f64 {
    let ix = x.floor() as u32;
    let iy = y.floor() as u32;
    let fx = x - ix as f64;
    let fy = y - iy as f64;

    let s = |dx: u32, dy: u32| img.get_pixel(ix + dx, iy + dy)[0] as f64;

    s(0, 0) * (1.0 - fx) * (1.0 - fy)
        + s(1, 0) * fx * (1.0 - fy)
        + s(0, 1) * (1.0 - fx) * fy
        + s(1, 1) * fx * fy
}

fn box_blur(v: &[f64], w: usize, h: usize, radius: usize) -> Vec<f64> {
    let r = radius as i64;
    let mut out = vec![0.0; w * h];

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let mut sum = 0.0;
            let mut n = 0u32;
            for dy in -r..=r {
                for dx in -r..=r {
                    let sx = x + dx;
                    let sy = y + dy;
                    if sx >= 0 && sx < w as i64 && sy >= 0 && sy < h as i64 {
                        sum += v[sx as usize + w * sy as usize];
                        n += 1;
                    }
                }
            }
            out[x as usize + w * y as usize] = sum / n as f64;
        }
    }

    out
}
