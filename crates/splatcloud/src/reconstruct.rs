//! Depth-map unprojection into a splat cloud.
//!
//! There are no camera intrinsics and no per-view pose: every capture is
//! mapped into the same normalized frame,
//!
//!   X = (x / W - 0.5) * 2,   Y = (y / H - 0.5) * 2,   Z = depth
//!
//! so several views of one object interleave instead of fusing.

use crate::capture::{CapturedImage, RgbBuffer};
use crate::depth::{is_usable_depth, DepthMap};
use crate::error::{Result, SplatError};
use crate::model::{PointCloudModel, Splat, DEFAULT_SPLAT_RADIUS};
use log::{debug, info, warn};
use rayon::prelude::*;

#[derive(Clone, Copy, Debug)]
pub struct SplatReconstructor {
    radius: f32,
}

impl Default for SplatReconstructor {
    fn default() -> Self {
        Self {
            radius: DEFAULT_SPLAT_RADIUS,
        }
    }
}

impl SplatReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Radius stamped on every emitted splat; must be positive and finite.
    pub fn with_radius(radius: f32) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SplatError::MalformedInput(format!(
                "splat radius must be positive, got {radius}"
            )));
        }
        Ok(Self { radius })
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Unprojects every positive-depth pixel of every image.
    ///
    /// `depth_maps[i]` belongs to `images[i]` and must hold exactly
    /// `canvas_width * canvas_height` values; any violation fails the whole call
    /// before a single splat is produced. An image that does not decode is
    /// skipped and the remaining images still contribute.
    ///
    /// Splats come out image by image, row-major (y outer, x inner) within an
    /// image, regardless of how the work is spread across threads.
    pub fn reconstruct<D>(
        &self,
        images: &[CapturedImage],
        depth_maps: &[D],
        canvas_width: u32,
        canvas_height: u32,
    ) -> Result<PointCloudModel>
    where
        D: AsRef<[f32]> + Sync,
    {
        if images.len() != depth_maps.len() {
            return Err(SplatError::MalformedInput(format!(
                "{} images but {} depth maps",
                images.len(),
                depth_maps.len()
            )));
        }

        let pixels = (canvas_width as usize)
            .checked_mul(canvas_height as usize)
            .ok_or_else(|| SplatError::MalformedInput("canvas size overflow".into()))?;

        for (index, depth) in depth_maps.iter().enumerate() {
            let len = depth.as_ref().len();
            if len != pixels {
                return Err(SplatError::MalformedInput(format!(
                    "depth map {} holds {} values, canvas {}x{} needs {}",
                    index, len, canvas_width, canvas_height, pixels
                )));
            }
        }

        debug!(
            "Reconstructing {} images on a {}x{} canvas",
            images.len(),
            canvas_width,
            canvas_height
        );

        let per_image: Vec<Vec<Splat>> = images
            .par_iter()
            .zip(depth_maps.par_iter())
            .map(|(image, depth)| match image.decode() {
                Ok(rgb) => {
                    self.unproject_image(&rgb, depth.as_ref(), canvas_width, canvas_height)
                }
                Err(err) => {
                    warn!("Skipping image: {err}");
                    Vec::new()
                }
            })
            .collect();

        let total = per_image.iter().map(Vec::len).sum();
        let mut splats = Vec::with_capacity(total);
        for run in per_image {
            splats.extend(run);
        }

        info!("Reconstructed {} splats from {} images", splats.len(), images.len());

        Ok(PointCloudModel::from_splats(splats))
    }

    /// Same as [`reconstruct`](Self::reconstruct) but with validated depth maps.
    /// The canvas is taken from the first map; every other map must have the
    /// same width and height.
    pub fn reconstruct_maps(
        &self,
        images: &[CapturedImage],
        depth_maps: &[DepthMap],
    ) -> Result<PointCloudModel> {
        let (w, h) = depth_maps
            .first()
            .map(|d| (d.width(), d.height()))
            .unwrap_or((0, 0));

        if let Some((i, d)) = depth_maps
            .iter()
            .enumerate()
            .find(|(_, d)| (d.width(), d.height()) != (w, h))
        {
            return Err(SplatError::MalformedInput(format!(
                "depth map {i} is {}x{}, expected {w}x{h}",
                d.width(),
                d.height()
            )));
        }

        let values: Vec<&[f32]> = depth_maps.iter().map(DepthMap::values).collect();
        self.reconstruct(images, &values, w, h)
    }

    fn unproject_image(&self, rgb: &RgbBuffer, depth: &[f32], width: u32, height: u32) -> Vec<Splat> {
        let w = width as usize;
        let h = height as usize;
        let inv_w = 1.0 / width as f32;
        let inv_h = 1.0 / height as f32;

        let mut out = Vec::with_capacity(depth.iter().filter(|&&d| is_usable_depth(d)).count());

        for y in 0..h {
            let ny = (y as f32 * inv_h - 0.5) * 2.0;
            let row = &depth[y * w..(y + 1) * w];

            for (x, &d) in row.iter().enumerate() {
                if !is_usable_depth(d) {
                    continue;
                }

                let nx = (x as f32 * inv_w - 0.5) * 2.0;
                out.push(Splat::from_checked([nx, ny, d], rgb.sample(x, y), self.radius));
            }
        }

        out
    }
}
