//! Overlap cropping.
//!
//! Projects one tile's footprint into the other's frame through the prior
//! transform (translation scaled by the confidence weight) and extracts
//! the likely intersection from each side. Zero confidence, or an
//! intersection thinner than the 1-D minimum, falls back to whole images;
//! a point selection below the 2-D minimum widens to whole images once
//! and only then reports insufficient overlap.

use tracing::{debug, info};

use crate::geometry::{bbox_from_points, boxes_from_shifts, make_zero_based_points, IBox, Point};
use crate::search::RegError;

use super::PairSession;

/// One side's cropped overlap region.
///
/// `points` are local to `origin` and live in `[0,w) × [0,h)`;
/// `values[i]` is the intensity at `points[i]`.
#[derive(Debug, Clone, Default)]
pub struct SubImage {
    pub origin: Point,
    pub w: usize,
    pub h: usize,
    pub points: Vec<Point>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct OverlapPair {
    pub a: SubImage,
    pub b: SubImage,
}

impl<'a> PairSession<'a> {
    /// Overlap boxes for both sides from the prior's translation, scaled
    /// by the confidence weight and the working scale.
    fn olap_boxes(&self) -> (IBox, IBox) {
        let delta = self.tab.transform(Point::default());
        let conf = self.config().overlap.xy_conf;
        let scl = self.px.scl as f64;

        let dx = (conf * delta.x / scl) as i64;
        let dy = (conf * delta.y / scl) as i64;

        let w = self.px.ws as i64;
        let h = self.px.hs as i64;

        boxes_from_shifts(w, h, w, h, dx, dy)
    }

    fn min_1d(&self) -> i64 {
        (self.olap1d().max(8)) as i64
    }

    fn olap1d(&self) -> usize {
        self.config().overlap.min_1d_overlap
    }

    /// Point-set crop. Falls back to whole images when confidence is
    /// zero, the intersection is too thin, or the box selection is too
    /// sparse; errors only when even whole images are too sparse.
    pub fn crop_points(
        &self,
        apoints: &[Point],
        bpoints: &[Point],
    ) -> Result<OverlapPair, RegError> {
        if self.config().overlap.xy_conf == 0.0 {
            return self.whole_image_points(apoints, bpoints);
        }

        let (ba, bb) = self.olap_boxes();

        if ba.width() < self.min_1d() || ba.height() < self.min_1d() {
            info!("subimage: 1-D overlap too small, using whole images");
            return self.whole_image_points(apoints, bpoints);
        }

        let a = self.sub_from_box(&self.px.avs, apoints, &ba);
        let b = self.sub_from_box(&self.px.bvs, bpoints, &bb);

        match (a, b) {
            (Some(a), Some(b)) => {
                info!(
                    w = ba.width(),
                    h = ba.height(),
                    "subimage: using intersection"
                );
                Ok(OverlapPair { a, b })
            }
            _ => {
                info!("subimage: 2-D overlap too small, using whole images");
                self.whole_image_points(apoints, bpoints)
            }
        }
    }

    /// Dense rectangular crop; always succeeds.
    pub fn crop_dense(&self) -> OverlapPair {
        if self.config().overlap.xy_conf == 0.0 {
            return self.whole_image_dense();
        }

        let (ba, bb) = self.olap_boxes();

        if ba.width() < self.min_1d() || ba.height() < self.min_1d() {
            info!("subimage: 1-D overlap too small, using whole images");
            return self.whole_image_dense();
        }

        info!(
            w = ba.width(),
            h = ba.height(),
            pix = ba.width() * ba.height(),
            "subimage: using intersection"
        );

        OverlapPair {
            a: self.sub_from_dense_box(&self.px.avs, &ba),
            b: self.sub_from_dense_box(&self.px.bvs, &bb),
        }
    }

    fn whole_image_points(
        &self,
        apoints: &[Point],
        bpoints: &[Point],
    ) -> Result<OverlapPair, RegError> {
        info!(
            apix = apoints.len(),
            bpix = bpoints.len(),
            "subimage: using whole images"
        );

        if apoints.len() <= self.required_overlap() || bpoints.len() <= self.required_overlap() {
            return Err(RegError::InsufficientOverlap);
        }

        Ok(OverlapPair {
            a: self.sub_from_points(&self.px.avs, apoints.to_vec()),
            b: self.sub_from_points(&self.px.bvs, bpoints.to_vec()),
        })
    }

    fn whole_image_dense(&self) -> OverlapPair {
        let w = self.px.ws;
        let h = self.px.hs;
        debug!(pix = w * h, "subimage: using whole images");

        let points = make_zero_based_points(w, h);

        OverlapPair {
            a: SubImage {
                origin: Point::default(),
                w,
                h,
                points: points.clone(),
                values: self.px.avs.clone(),
            },
            b: SubImage {
                origin: Point::default(),
                w,
                h,
                points,
                values: self.px.bvs.clone(),
            },
        }
    }

    /// Rebase a point list onto its own bounding box, sampling values
    /// from the full working buffer.
    fn sub_from_points(&self, buffer: &[f64], points: Vec<Point>) -> SubImage {
        let bbox = bbox_from_points(&points);
        let w = self.px.ws;

        let mut sub = SubImage {
            origin: Point::new(bbox.l as f64, bbox.b as f64),
            w: bbox.width() as usize,
            h: bbox.height() as usize,
            points: Vec::with_capacity(points.len()),
            values: Vec::with_capacity(points.len()),
        };

        for p in points {
            sub.values.push(buffer[p.x as usize + w * p.y as usize]);
            sub.points
                .push(Point::new(p.x - bbox.l as f64, p.y - bbox.b as f64));
        }

        sub
    }

    /// Points of `points` falling inside `bolap`; None when the selection
    /// does not clear the 2-D overlap threshold.
    fn sub_from_box(&self, buffer: &[f64], points: &[Point], bolap: &IBox) -> Option<SubImage> {
        let selected: Vec<Point> = points
            .iter()
            .copied()
            .filter(|p| bolap.contains(*p))
            .collect();

        if selected.len() <= self.required_overlap() {
            return None;
        }

        Some(self.sub_from_points(buffer, selected))
    }

    /// Every pixel of a dense box.
    fn sub_from_dense_box(&self, buffer: &[f64], b: &IBox) -> SubImage {
        let ow = b.width() as usize;
        let oh = b.height() as usize;
        let w = self.px.ws;

        let points = make_zero_based_points(ow, oh);
        let mut values = Vec::with_capacity(ow * oh);

        for p in &points {
            let x = b.l as usize + p.x as usize;
            let y = b.b as usize + p.y as usize;
            values.push(buffer[x + w * y]);
        }

        SubImage {
            origin: Point::new(b.l as f64, b.b as f64),
            w: ow,
            h: oh,
            points,
            values,
        }
    }
}
