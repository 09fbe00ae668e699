//! Depth buffers and the sources that produce them.
//!
//! Depth estimation itself happens outside this crate. A [`DepthSource`] is
//! anything that turns a [`CapturedImage`] into a row-major [`DepthMap`]; the
//! bundled [`SidecarDepthSource`] reads maps that were estimated offline and
//! stored next to the captures.
//!
//! DPTH file layout (little-endian):
//!   00  : [u8;4]  magic = b"DPTH"
//!   04  : u32     version = 1
//!   08  : u32     width
//!   0C  : u32     height
//!   10  : f32[width * height]  row-major depth values
//!
//! Values <= 0 mark background / invalid depth.

use crate::capture::CapturedImage;
use crate::error::{Result, SplatError};
use image::DynamicImage;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DPTH_MAGIC: [u8; 4] = *b"DPTH";
pub const DPTH_VERSION: u32 = 1;
const DPTH_HEADER_LEN: usize = 16;

/// Row-major per-pixel depth aligned to one capture.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    /// Fails with `MalformedInput` unless `values.len() == width * height`.
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let want = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| SplatError::MalformedInput("depth dimensions overflow".into()))?;

        if values.len() != want {
            return Err(SplatError::MalformedInput(format!(
                "depth buffer holds {} values, {}x{} needs {}",
                values.len(),
                width,
                height,
                want
            )));
        }

        Ok(Self {
            width,
            height,
            values,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of pixels that will produce a splat.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|&&d| is_usable_depth(d)).count()
    }

    /// Interprets a grayscale image as depth, `depth = sample * scale`.
    ///
    /// Accepts 8- and 16-bit single channel images; anything else is rejected
    /// rather than converted, since a color conversion would rescale the samples.
    pub fn from_gray_image(img: &DynamicImage, scale: f32) -> Result<Self> {
        let (width, height, values): (u32, u32, Vec<f32>) = match img {
            DynamicImage::ImageLuma16(buf) => (
                buf.width(),
                buf.height(),
                buf.as_raw().iter().map(|&v| v as f32 * scale).collect(),
            ),
            DynamicImage::ImageLuma8(buf) => (
                buf.width(),
                buf.height(),
                buf.as_raw().iter().map(|&v| v as f32 * scale).collect(),
            ),
            other => {
                return Err(SplatError::MalformedInput(format!(
                    "depth image must be single-channel, got {:?}",
                    other.color()
                )))
            }
        };

        Self::new(width, height, values)
    }
}

/// A depth value yields a splat only if it is finite and positive.
#[inline]
pub(crate) fn is_usable_depth(d: f32) -> bool {
    d > 0.0 && d.is_finite()
}

/// Produces a depth map for a capture, or explains why it cannot.
///
/// Called once per image; a failure only drops that image from the run.
pub trait DepthSource: Send + Sync {
    fn estimate(&self, image: &CapturedImage) -> Result<DepthMap>;
}

impl<F> DepthSource for F
where
    F: Fn(&CapturedImage) -> Result<DepthMap> + Send + Sync,
{
    fn estimate(&self, image: &CapturedImage) -> Result<DepthMap> {
        self(image)
    }
}

#[inline(always)]
fn need(buf: &[u8], want: usize) -> Result<()> {
    if buf.len() < want {
        Err(bad("truncated DPTH"))
    } else {
        Ok(())
    }
}

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    need(buf, n)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
fn le_u32(buf: &mut &[u8]) -> Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cold]
fn bad(msg: &str) -> SplatError {
    SplatError::MalformedInput(msg.to_owned())
}

/// Parse a DPTH container from a contiguous byte slice.
pub fn parse_dpth_bytes(mut p: &[u8]) -> Result<DepthMap> {
    if take(&mut p, 4)? != &DPTH_MAGIC[..] {
        return Err(bad("bad DPTH magic"));
    }

    if le_u32(&mut p)? != DPTH_VERSION {
        return Err(bad("unsupported DPTH version"));
    }

    let width = le_u32(&mut p)?;
    let height = le_u32(&mut p)?;

    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| bad("DPTH size overflow"))?;
    let byte_len = count.checked_mul(4).ok_or_else(|| bad("DPTH size overflow"))?;
    let raw = take(&mut p, byte_len)?;

    if !p.is_empty() {
        return Err(bad("trailing bytes after DPTH payload"));
    }

    // Zero-copy view when the payload happens to be aligned, portable decode otherwise.
    #[cfg(target_endian = "little")]
    let values = match bytemuck::try_cast_slice::<u8, f32>(raw) {
        Ok(as_f32) => as_f32.to_vec(),
        Err(_) => decode_f32_le(raw),
    };

    #[cfg(not(target_endian = "little"))]
    let values = decode_f32_le(raw);

    DepthMap::new(width, height, values)
}

fn decode_f32_le(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn read_dpth_file<P: AsRef<Path>>(path: P) -> Result<DepthMap> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SplatError::io(path, e))?;
    parse_dpth_bytes(&bytes)
}

pub fn write_dpth<W: Write>(w: &mut W, depth: &DepthMap) -> std::io::Result<()> {
    w.write_all(&DPTH_MAGIC)?;
    w.write_all(&DPTH_VERSION.to_le_bytes())?;
    w.write_all(&depth.width.to_le_bytes())?;
    w.write_all(&depth.height.to_le_bytes())?;

    for v in &depth.values {
        w.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

pub fn write_dpth_file<P: AsRef<Path>>(path: P, depth: &DepthMap) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SplatError::io(path, e))?;
    let mut w = BufWriter::with_capacity(DPTH_HEADER_LEN + depth.values.len() * 4, file);

    write_dpth(&mut w, depth)
        .and_then(|_| w.flush())
        .map_err(|e| SplatError::io(path, e))
}

/// Resolves depth maps stored beside the captures, keyed by file stem.
///
/// For a capture labelled `.../IMG_0001.jpg` it looks for `IMG_0001.dpth` and
/// then `IMG_0001.png` (8/16-bit grayscale, multiplied by `gray_scale`) in the
/// depth directory.
#[derive(Clone, Debug)]
pub struct SidecarDepthSource {
    dir: PathBuf,
    gray_scale: f32,
}

impl SidecarDepthSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            gray_scale: 1.0,
        }
    }

    /// Scale applied to grayscale samples, e.g. `0.001` for millimetre PNGs.
    pub fn with_gray_scale(mut self, scale: f32) -> Self {
        self.gray_scale = scale;
        self
    }

    fn unavailable(capture: &CapturedImage, reason: impl Into<String>) -> SplatError {
        SplatError::DepthUnavailable {
            label: capture.label().to_owned(),
            reason: reason.into(),
        }
    }
}

impl DepthSource for SidecarDepthSource {
    fn estimate(&self, capture: &CapturedImage) -> Result<DepthMap> {
        let stem = Path::new(capture.label())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Self::unavailable(capture, "capture label has no file stem"))?;

        let dpth = self.dir.join(format!("{stem}.dpth"));
        if dpth.is_file() {
            debug!("Reading depth {}", dpth.display());
            return read_dpth_file(&dpth)
                .map_err(|e| Self::unavailable(capture, format!("{}: {e}", dpth.display())));
        }

        let png = self.dir.join(format!("{stem}.png"));
        if png.is_file() {
            debug!("Reading grayscale depth {}", png.display());
            let img = image::open(&png)
                .map_err(|e| Self::unavailable(capture, format!("{}: {e}", png.display())))?;
            return DepthMap::from_gray_image(&img, self.gray_scale)
                .map_err(|e| Self::unavailable(capture, format!("{}: {e}", png.display())));
        }

        Err(Self::unavailable(
            capture,
            format!("no {stem}.dpth or {stem}.png in {}", self.dir.display()),
        ))
    }
}
