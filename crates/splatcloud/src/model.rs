//! In-memory splat cloud: the output of one reconstruction run.

use crate::error::{Result, SplatError};
use glam::Vec3;
use rayon::prelude::*;
use std::sync::Arc;

/// Radius given to every splat unless the reconstructor is told otherwise.
pub const DEFAULT_SPLAT_RADIUS: f32 = 0.01;

/// One colored, sized point standing in for a small surface patch.
///
/// Layout is plain `f32`s so a renderer can upload a model's splats as-is.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Splat {
    /// Position in the normalized capture frame (x, y in [-1, 1], z = depth).
    pub position: [f32; 3],
    /// Linear RGB in [0, 1].
    pub color: [f32; 3],
    pub radius: f32,
}

impl Splat {
    /// Builds a splat, clamping each color channel into [0, 1].
    ///
    /// The position must be finite and the radius finite and positive.
    pub fn new(position: [f32; 3], color: [f32; 3], radius: f32) -> Result<Self> {
        if !position.iter().all(|c| c.is_finite()) {
            return Err(SplatError::MalformedInput(format!(
                "splat position {position:?} is not finite"
            )));
        }
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(SplatError::MalformedInput(format!(
                "splat radius must be positive and finite, got {radius}"
            )));
        }

        Ok(Self::from_checked(position, color, radius))
    }

    /// Caller guarantees a finite position and a valid radius.
    #[inline]
    pub(crate) fn from_checked(position: [f32; 3], color: [f32; 3], radius: f32) -> Self {
        Self {
            position,
            color: color.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }),
            radius,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Color as 8-bit channels, truncating toward zero (`floor(c * 255)`).
    #[inline]
    pub fn color_u8(&self) -> [u8; 3] {
        self.color.map(|c| (c * 255.0) as u8)
    }
}

/// Axis-aligned extent of a model's splat positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Ordered, read-only sequence of splats.
///
/// Order is image order, then row-major pixel order within each image. Clones
/// share the same storage, so handing the model to an exporter and a viewer at
/// once costs nothing.
#[derive(Clone, Debug, Default)]
pub struct PointCloudModel {
    splats: Arc<[Splat]>,
}

impl PointCloudModel {
    pub fn from_splats(splats: Vec<Splat>) -> Self {
        Self {
            splats: splats.into(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.splats.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.splats.is_empty()
    }

    /// Iterates splats in emission order. Every call replays the same order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Splat> {
        self.splats.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Splat] {
        &self.splats
    }

    /// Raw bytes of the splat array, ready for a vertex buffer upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.splats)
    }

    /// Min/max per axis over all positions, computed on every call.
    /// `None` for an empty model.
    pub fn bounds(&self) -> Option<Bounds> {
        if self.splats.is_empty() {
            return None;
        }

        let (min, max) = self
            .splats
            .par_iter()
            .map(|s| (s.position(), s.position()))
            .reduce(
                || (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
                |(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)),
            );

        Some(Bounds { min, max })
    }
}

impl<'a> IntoIterator for &'a PointCloudModel {
    type Item = &'a Splat;
    type IntoIter = std::slice::Iter<'a, Splat>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
