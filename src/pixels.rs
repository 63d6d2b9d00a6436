//! Reduced-resolution pixel pairs.
//!
//! A `PixelPair` carries two same-size intensity buffers at a shared
//! working scale. Building it (decoding, flat-fielding, scale choice) is
//! the image source's job; the registration session only borrows one.

use image::GrayImage;

/// Two tiles' intensity buffers at working scale `scl`.
///
/// `avs`/`bvs` are row-major, `ws` wide and `hs` tall. One working-scale
/// pixel covers `scl` full-resolution pixels on a side.
#[derive(Debug, Clone)]
pub struct PixelPair {
    pub avs: Vec<f64>,
    pub bvs: Vec<f64>,
    pub ws: usize,
    pub hs: usize,
    pub scl: usize,
}

impl PixelPair {
    /// Build a working pair from two same-size grayscale images by
    /// block-mean downsampling with factor `scl`.
    pub fn from_images(a: &GrayImage, b: &GrayImage, scl: usize) -> crate::Result<Self> {
        anyhow::ensure!(scl >= 1, "scale factor must be >= 1");
        anyhow::ensure!(
            a.dimensions() == b.dimensions(),
            "tile images differ in size: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        );

        let ws = a.width() as usize / scl;
        let hs = a.height() as usize / scl;
        anyhow::ensure!(ws >= 8 && hs >= 8, "images too small at scale {}", scl);

        Ok(Self {
            avs: downsample(a, ws, hs, scl),
            bvs: downsample(b, ws, hs, scl),
            ws,
            hs,
            scl,
        })
    }

    /// Wrap pre-reduced buffers produced elsewhere.
    pub fn from_buffers(
        avs: Vec<f64>,
        bvs: Vec<f64>,
        ws: usize,
        hs: usize,
        scl: usize,
    ) -> crate::Result<Self> {
        anyhow::ensure!(scl >= 1, "scale factor must be >= 1");
        anyhow::ensure!(
            avs.len() == ws * hs && bvs.len() == ws * hs,
            "buffer length does not match {}x{}",
            ws,
            hs
        );
        Ok(Self { avs, bvs, ws, hs, scl })
    }
}

fn downsample(img: &GrayImage, ws: usize, hs: usize, scl: usize) -> Vec<f64> {
    let mut out = vec![0.0; ws * hs];
    let norm = 1.0 / (scl * scl) as f64;

    for y in 0..hs {
        for x in 0..ws {
            let mut sum = 0.0;
            for dy in 0..scl {
                for dx in 0..scl {
                    sum += img.get_pixel((x * scl + dx) as u32, (y * scl + dy) as u32)[0] as f64;
                }
            }
            out[x + ws * y] = sum * norm;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn downsample_averages_blocks() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 0 } else { 200 }]));
        let px = PixelPair::from_images(&img, &img, 2).unwrap();
        assert_eq!((px.ws, px.hs), (8, 8));
        assert_eq!(px.avs[0], 0.0);
        assert_eq!(px.avs[7], 200.0);
    }

    #[test]
    fn mismatched_sizes_rejected() {
        let a = GrayImage::new(16, 16);
        let b = GrayImage::new(16, 18);
        assert!(PixelPair::from_images(&a, &b, 1).is_err());
    }
}
