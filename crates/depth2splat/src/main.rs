mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Args;
use log::{info, warn};
use splatcloud::{
    CapturedImage, ExportFormat, Exporter, ScanPipeline, SidecarDepthSource, SplatReconstructor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Color captures directly inside `dir`, sorted by file name.
fn collect_captures(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping {}: {}", err.path().unwrap_or(dir).display(), err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|s| IMAGE_EXTENSIONS.contains(&s.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let format: ExportFormat = args.format.into();

    let paths = collect_captures(&args.input_dir);
    if paths.is_empty() {
        warn!("No captures found in {}", args.input_dir.display());
    }
    info!("Processing {} captures from {}", paths.len(), args.input_dir.display());

    // A capture that cannot even be read is treated like one that cannot be decoded.
    let images: Vec<CapturedImage> = paths
        .iter()
        .filter_map(|path| match CapturedImage::open(path) {
            Ok(image) => Some(image),
            Err(err) => {
                warn!("Skipping capture: {err}");
                None
            }
        })
        .collect();

    let depth_source = SidecarDepthSource::new(&args.depth_dir).with_gray_scale(args.depth_scale);
    let reconstructor = SplatReconstructor::with_radius(args.radius)?;
    let pipeline = ScanPipeline::new(Arc::new(depth_source)).with_reconstructor(reconstructor);

    let (model, path) = match &args.output {
        Some(output) => {
            let model = pipeline.reconstruct(images).await?;
            Exporter::default()
                .export_to(&model, format, output)
                .with_context(|| format!("exporting {format}"))?;
            (model, output.clone())
        }
        None => {
            let exporter = args
                .output_dir
                .as_ref()
                .map(Exporter::new)
                .unwrap_or_default();
            let outcome = pipeline
                .run(images, exporter, format)
                .await
                .with_context(|| format!("exporting {format}"))?;
            (outcome.model, outcome.path)
        }
    };

    match model.bounds() {
        Some(b) => info!(
            "Bounds: min({:.3},{:.3},{:.3}) max({:.3},{:.3},{:.3})",
            b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
        ),
        None => warn!("Reconstruction produced no splats"),
    }

    info!("OK {} splats -> {}", model.len(), path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn captures_are_filtered_and_sorted() {
        let dir = std::env::temp_dir().join(format!("depth2splat-collect-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();

        for name in ["b.JPG", "a.png", "notes.txt", "c.jpeg", "nested/z.png"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let names: Vec<String> = collect_captures(&dir)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.jpeg"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_input_dir_yields_no_captures() {
        let dir = std::env::temp_dir().join(format!("depth2splat-absent-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        assert!(collect_captures(&dir).is_empty());
    }

    #[test]
    fn cli_parses_formats() {
        let args = Args::try_parse_from([
            "depth2splat",
            "--format",
            "scene-archive",
            "--radius",
            "0.02",
        ])
        .unwrap();
        assert!(matches!(ExportFormat::from(args.format), ExportFormat::SceneArchive));
        assert_eq!(args.radius, 0.02);
        assert_eq!(args.input_dir, PathBuf::from("captures"));
    }
}
