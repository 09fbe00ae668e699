use clap::{Parser, ValueEnum};
use splatcloud::ExportFormat;
use std::path::PathBuf;

/// Output format of the reconstructed splat cloud.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    /// ASCII PLY with per-vertex 8-bit color.
    Ply,
    /// Vertex-only OBJ; color is dropped.
    Obj,
    /// USDZ-style scene archive (does not carry the points yet).
    SceneArchive,
}

impl From<Format> for ExportFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Ply => ExportFormat::Ply,
            Format::Obj => ExportFormat::Obj,
            Format::SceneArchive => ExportFormat::SceneArchive,
        }
    }
}

/// `depth2splat` - unproject captured images into a colored splat cloud.
///
/// Every image in the input directory is paired with a depth map of the same
/// file stem in the depth directory (`<stem>.dpth`, or a grayscale
/// `<stem>.png`). Images without depth, or that fail to decode, are skipped.
#[derive(Parser, Debug, Clone)]
#[command(name = "depth2splat", version, about, long_about = None)]
pub struct Args {
    /// Directory holding the color captures (png/jpg/jpeg), processed in file name order.
    #[arg(long, default_value = "captures")]
    pub input_dir: PathBuf,

    /// Directory holding one depth map per capture.
    #[arg(long, default_value = "depth")]
    pub depth_dir: PathBuf,

    /// Where to write `ExportedModel.<ext>`; defaults to the system temp directory.
    /// An existing file of the same format is overwritten.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Write to exactly this file instead of the fixed name in `--output-dir`.
    #[arg(long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Ply)]
    pub format: Format,

    /// Radius given to every splat.
    #[arg(long, default_value_t = splatcloud::DEFAULT_SPLAT_RADIUS)]
    pub radius: f32,

    /// Multiplier for grayscale depth PNG samples (0.001 for millimetre maps).
    #[arg(long, default_value_t = 1.0)]
    pub depth_scale: f32,
}
