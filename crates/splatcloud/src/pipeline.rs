//! Capture → depth → reconstruct → export as one async chain.
//!
//! Every stage is blocking work; it runs on tokio's blocking pool so the
//! caller's runtime thread (typically the one driving a UI) stays free and
//! simply awaits a typed result.

use crate::capture::CapturedImage;
use crate::depth::{DepthMap, DepthSource};
use crate::error::{Result, SplatError};
use crate::export::{ExportFormat, Exporter};
use crate::model::PointCloudModel;
use crate::reconstruct::SplatReconstructor;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

/// Images paired with the depth map estimated for each, in capture order.
#[derive(Debug, Default)]
pub struct DepthPairs {
    pub images: Vec<CapturedImage>,
    pub depths: Vec<DepthMap>,
    /// Labels of captures whose depth could not be produced.
    pub skipped: Vec<String>,
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub model: PointCloudModel,
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct ScanPipeline {
    depth_source: Arc<dyn DepthSource>,
    reconstructor: SplatReconstructor,
}

impl ScanPipeline {
    pub fn new(depth_source: Arc<dyn DepthSource>) -> Self {
        Self {
            depth_source,
            reconstructor: SplatReconstructor::default(),
        }
    }

    pub fn with_reconstructor(mut self, reconstructor: SplatReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    /// Asks the depth source about every image. An image without depth is
    /// dropped together with its slot, so the returned vectors stay aligned.
    /// Any error from the source only costs that one image.
    pub async fn estimate_depths(&self, images: Vec<CapturedImage>) -> Result<DepthPairs> {
        let source = Arc::clone(&self.depth_source);

        join_blocking(move || {
            let mut pairs = DepthPairs::default();

            for image in images {
                match source.estimate(&image) {
                    Ok(depth) => {
                        debug!(
                            "Depth for {}: {}x{}, {} valid",
                            image.label(),
                            depth.width(),
                            depth.height(),
                            depth.valid_count()
                        );
                        pairs.images.push(image);
                        pairs.depths.push(depth);
                    }
                    Err(err) => {
                        let err = err.into_depth_unavailable(image.label());
                        warn!("Skipping image: {err}");
                        pairs.skipped.push(image.label().to_owned());
                    }
                }
            }

            Ok(pairs)
        })
        .await
    }

    /// Depth estimation followed by reconstruction. The canvas is the first
    /// depth map's size; maps of any other size fail as malformed input.
    pub async fn reconstruct(&self, images: Vec<CapturedImage>) -> Result<PointCloudModel> {
        let total = images.len();
        let pairs = self.estimate_depths(images).await?;

        info!(
            "{} of {} images have depth ({} skipped)",
            pairs.images.len(),
            total,
            pairs.skipped.len()
        );

        let reconstructor = self.reconstructor;
        join_blocking(move || reconstructor.reconstruct_maps(&pairs.images, &pairs.depths)).await
    }

    /// Full run: reconstruct, then export with `exporter` in `format`.
    pub async fn run(
        &self,
        images: Vec<CapturedImage>,
        exporter: Exporter,
        format: ExportFormat,
    ) -> Result<ScanOutcome> {
        let model = self.reconstruct(images).await?;

        let shared = model.clone();
        let path = join_blocking(move || exporter.export(&shared, format)).await?;

        Ok(ScanOutcome { model, path })
    }
}

async fn join_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(SplatError::Aborted(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(label: &str, w: u32, h: u32) -> CapturedImage {
        CapturedImage::rgb8(label, w, h, vec![255; (w * h * 3) as usize])
    }

    /// Depth 1.0 everywhere, except captures labelled "nodepth".
    fn flat_depth() -> Arc<dyn DepthSource> {
        Arc::new(|img: &CapturedImage| -> Result<DepthMap> {
            if img.label() == "nodepth" {
                return Err(SplatError::DepthUnavailable {
                    label: img.label().to_owned(),
                    reason: "model returned nothing".into(),
                });
            }
            DepthMap::new(2, 2, vec![1.0; 4])
        })
    }

    #[tokio::test]
    async fn missing_depth_drops_only_that_image() {
        let pipeline = ScanPipeline::new(flat_depth());
        let pairs = pipeline
            .estimate_depths(vec![white("a", 2, 2), white("nodepth", 2, 2), white("c", 2, 2)])
            .await
            .unwrap();

        assert_eq!(pairs.images.len(), 2);
        assert_eq!(pairs.depths.len(), 2);
        assert_eq!(pairs.images[1].label(), "c");
        assert_eq!(pairs.skipped, vec!["nodepth".to_owned()]);
    }

    #[tokio::test]
    async fn reconstruct_counts_every_valid_pixel() {
        let pipeline = ScanPipeline::new(flat_depth());
        let model = pipeline
            .reconstruct(vec![white("a", 2, 2), white("nodepth", 2, 2), white("c", 2, 2)])
            .await
            .unwrap();
        assert_eq!(model.len(), 8);
    }

    #[tokio::test]
    async fn no_images_gives_empty_model() {
        let model = ScanPipeline::new(flat_depth())
            .reconstruct(Vec::new())
            .await
            .unwrap();
        assert!(model.is_empty());
    }

    #[tokio::test]
    async fn any_depth_error_skips_only_that_image() {
        let source: Arc<dyn DepthSource> = Arc::new(|img: &CapturedImage| -> Result<DepthMap> {
            match img.label() {
                "shape" => Err(SplatError::MalformedInput("wrong tensor shape".into())),
                "io" => Err(SplatError::Io {
                    path: "weights.bin".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                }),
                _ => DepthMap::new(2, 2, vec![1.0; 4]),
            }
        });
        let pipeline = ScanPipeline::new(source);

        let model = pipeline
            .reconstruct(vec![white("a", 2, 2), white("shape", 2, 2), white("c", 2, 2)])
            .await
            .unwrap();
        assert_eq!(model.len(), 8);

        let pairs = pipeline
            .estimate_depths(vec![white("shape", 2, 2), white("io", 2, 2), white("d", 2, 2)])
            .await
            .unwrap();
        assert_eq!(pairs.skipped, vec!["shape".to_owned(), "io".to_owned()]);
        assert_eq!(pairs.images.len(), 1);
        assert_eq!(pairs.images[0].label(), "d");
    }

    #[tokio::test]
    async fn mismatched_depth_sizes_are_malformed() {
        let source: Arc<dyn DepthSource> = Arc::new(|img: &CapturedImage| -> Result<DepthMap> {
            if img.label() == "big" {
                DepthMap::new(3, 3, vec![1.0; 9])
            } else {
                DepthMap::new(2, 2, vec![1.0; 4])
            }
        });

        let err = ScanPipeline::new(source)
            .reconstruct(vec![white("a", 2, 2), white("big", 3, 3)])
            .await
            .unwrap_err();
        assert!(matches!(err, SplatError::MalformedInput(_)));
    }
}
