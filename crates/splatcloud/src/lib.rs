//! splatcloud: colored splat clouds from captured images plus per-image depth.
//!
//! - [`SplatReconstructor`] unprojects every positive-depth pixel into a
//!   [`Splat`] using a normalized, intrinsics-free frame.
//! - [`PointCloudModel`] is the ordered, read-only result (image order, then
//!   row-major pixel order).
//! - [`Exporter`] writes a model as ASCII PLY, vertex-only OBJ, or a minimal
//!   USDZ-style scene archive.
//! - [`DepthSource`] is the seam to whatever estimates depth; [`ScanPipeline`]
//!   chains depth, reconstruction and export as async steps.
//!
//! Views are not registered against each other: captures of one object
//! overlap in the shared frame instead of fusing into one surface.

pub mod capture;
pub mod depth;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod reconstruct;

pub use capture::{CapturedImage, RgbBuffer};
pub use depth::{
    parse_dpth_bytes, read_dpth_file, write_dpth, write_dpth_file, DepthMap, DepthSource,
    SidecarDepthSource,
};
pub use error::{Result, SplatError};
pub use export::{write_obj, write_ply, write_scene_archive, ExportFormat, Exporter};
pub use model::{Bounds, PointCloudModel, Splat, DEFAULT_SPLAT_RADIUS};
pub use pipeline::{DepthPairs, ScanOutcome, ScanPipeline};
pub use reconstruct::SplatReconstructor;
