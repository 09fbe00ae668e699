//! Writers for the interchange formats a splat cloud can leave the process in.
//!
//! - PLY: ASCII, `x y z red green blue` per vertex, colors truncated to u8.
//! - OBJ: `v x y z` records only; color and radius are dropped.
//! - Scene archive: uncompressed zip (USDZ packaging) holding one USDA layer
//!   with an empty root transform. The splats are not embedded.

use crate::error::{Result, SplatError};
use crate::model::PointCloudModel;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Ply,
    Obj,
    SceneArchive,
}

impl ExportFormat {
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Ply => "ply",
            ExportFormat::Obj => "obj",
            ExportFormat::SceneArchive => "usdz",
        }
    }

    /// Fixed file name used by [`Exporter::export`]; reused on every export.
    #[inline]
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Ply => "ExportedModel.ply",
            ExportFormat::Obj => "ExportedModel.obj",
            ExportFormat::SceneArchive => "ExportedModel.usdz",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportFormat::Ply => "ply",
            ExportFormat::Obj => "obj",
            ExportFormat::SceneArchive => "scene-archive",
        };

        f.write_str(s)
    }
}

/// Writes models into a directory under fixed, per-format names.
///
/// Exporting the same format twice overwrites the earlier file. Use
/// [`export_to`](Self::export_to) to pick the destination instead.
#[derive(Clone, Debug)]
pub struct Exporter {
    dir: PathBuf,
}

impl Default for Exporter {
    /// Exports into the system temp directory.
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `export` will put a file of this format.
    pub fn destination(&self, format: ExportFormat) -> PathBuf {
        self.dir.join(format.file_name())
    }

    pub fn export(&self, model: &PointCloudModel, format: ExportFormat) -> Result<PathBuf> {
        let path = self.destination(format);
        self.export_to(model, format, &path)?;
        Ok(path)
    }

    /// Writes to `path`, replacing any existing file. A failed write may leave a
    /// partial file behind.
    pub fn export_to(&self, model: &PointCloudModel, format: ExportFormat, path: &Path) -> Result<()> {
        debug!("Writing {} splats as {} to {}", model.len(), format, path.display());

        let file = File::create(path).map_err(|e| SplatError::io(path, e))?;

        let written = match format {
            ExportFormat::Ply => {
                let mut w = BufWriter::new(file);
                write_ply(&mut w, model).and_then(|_| w.flush())
            }
            ExportFormat::Obj => {
                let mut w = BufWriter::new(file);
                write_obj(&mut w, model).and_then(|_| w.flush())
            }
            ExportFormat::SceneArchive => {
                write_scene_archive(BufWriter::new(file), model).and_then(|mut w| w.flush())
            }
        };
        written.map_err(|e| SplatError::io(path, e))?;

        info!("OK {} splats -> {} ({})", model.len(), path.display(), format);

        Ok(())
    }
}

pub fn write_ply<W: Write>(w: &mut W, model: &PointCloudModel) -> io::Result<()> {
    writeln!(w, "ply")?;
    writeln!(w, "format ascii 1.0")?;
    writeln!(w, "element vertex {}", model.len())?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;
    writeln!(w, "property uchar red")?;
    writeln!(w, "property uchar green")?;
    writeln!(w, "property uchar blue")?;
    writeln!(w, "end_header")?;

    for s in model {
        let [r, g, b] = s.color_u8();
        writeln!(
            w,
            "{} {} {} {} {} {}",
            s.position[0], s.position[1], s.position[2], r, g, b
        )?;
    }

    Ok(())
}

pub fn write_obj<W: Write>(w: &mut W, model: &PointCloudModel) -> io::Result<()> {
    for s in model {
        writeln!(w, "v {} {} {}", s.position[0], s.position[1], s.position[2])?;
    }

    Ok(())
}

/// Name of the single layer inside the archive.
pub const SCENE_LAYER_NAME: &str = "scene.usda";

const EMPTY_SCENE_LAYER: &str = r#"#usda 1.0
(
    defaultPrim = "root"
    metersPerUnit = 1
    upAxis = "Y"
)

def Xform "root"
{
    def Xform "node"
    {
    }
}
"#;

/// Writes the scene container. Only an empty root and one empty child node go
/// in; `model` is accepted for symmetry with the other writers but its
/// geometry is not embedded.
pub fn write_scene_archive<W: Write + Seek>(w: W, model: &PointCloudModel) -> io::Result<W> {
    debug!(
        "Scene archive carries no geometry; {} splats not embedded",
        model.len()
    );

    // USDZ packaging requires stored (uncompressed) entries.
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut zip = ZipWriter::new(w);
    zip.start_file(SCENE_LAYER_NAME, options)
        .map_err(zip_to_io)?;
    zip.write_all(EMPTY_SCENE_LAYER.as_bytes())?;

    zip.finish().map_err(zip_to_io)
}

fn zip_to_io(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Splat, DEFAULT_SPLAT_RADIUS};
    use std::io::{Cursor, Read};

    fn model() -> PointCloudModel {
        PointCloudModel::from_splats(vec![
            Splat::new([-1.0, -1.0, 1.0], [1.0, 0.5, 0.999_999], DEFAULT_SPLAT_RADIUS).unwrap(),
            Splat::new([0.5, 0.0, 2.25], [0.0, 0.2, 1.0], DEFAULT_SPLAT_RADIUS).unwrap(),
        ])
    }

    #[test]
    fn ply_header_is_exact() {
        let mut out = Vec::new();
        write_ply(&mut out, &model()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            &lines[..10],
            &[
                "ply",
                "format ascii 1.0",
                "element vertex 2",
                "property float x",
                "property float y",
                "property float z",
                "property uchar red",
                "property uchar green",
                "property uchar blue",
                "end_header",
            ]
        );
        assert_eq!(lines.len(), 12);
    }

    #[test]
    fn ply_truncates_colors() {
        let mut out = Vec::new();
        write_ply(&mut out, &model()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let body: Vec<&str> = text.lines().skip(10).collect();

        assert_eq!(body[0], "-1 -1 1 255 127 254");
        assert_eq!(body[1], "0.5 0 2.25 0 51 255");
    }

    #[test]
    fn obj_has_only_vertices() {
        let mut out = Vec::new();
        write_obj(&mut out, &model()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text, "v -1 -1 1\nv 0.5 0 2.25\n");
    }

    #[test]
    fn empty_model_ply_declares_zero() {
        let mut out = Vec::new();
        write_ply(&mut out, &PointCloudModel::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("element vertex 0\n"));
        assert!(text.ends_with("end_header\n"));
    }

    #[test]
    fn scene_archive_holds_empty_layer() {
        let cursor = write_scene_archive(Cursor::new(Vec::new()), &model()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_name(SCENE_LAYER_NAME).unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Stored);

        let mut layer = String::new();
        entry.read_to_string(&mut layer).unwrap();
        assert!(layer.starts_with("#usda 1.0"));
        assert!(layer.contains("def Xform \"root\""));
        assert!(!layer.contains("points"));
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::Ply.file_name(), "ExportedModel.ply");
        assert_eq!(ExportFormat::SceneArchive.extension(), "usdz");
        assert_eq!(ExportFormat::SceneArchive.to_string(), "scene-archive");
    }
}
