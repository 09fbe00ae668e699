//! Captured color images and their decoded RGB8 form.

use crate::error::{Result, SplatError};
use std::path::Path;

#[derive(Clone, Debug)]
enum ImageData {
    /// PNG/JPEG bytes as they came off the capture source.
    Encoded(Vec<u8>),
    /// Tightly packed RGB8, row-major.
    Rgb8 {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
}

/// One color capture, in caller-supplied order.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    label: String,
    data: ImageData,
}

impl CapturedImage {
    pub fn encoded(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            data: ImageData::Encoded(bytes),
        }
    }

    pub fn rgb8(label: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            data: ImageData::Rgb8 {
                width,
                height,
                pixels,
            },
        }
    }

    /// Reads the file without decoding it; decoding happens at reconstruction.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| SplatError::io(path, e))?;
        Ok(Self::encoded(path.display().to_string(), bytes))
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Decodes into a samplable RGB8 buffer.
    pub fn decode(&self) -> Result<RgbBuffer> {
        match &self.data {
            ImageData::Encoded(bytes) => {
                let img = image::load_from_memory(bytes).map_err(|e| SplatError::DecodeFailure {
                    label: self.label.clone(),
                    reason: e.to_string(),
                })?;
                let rgb = img.to_rgb8();
                let (width, height) = rgb.dimensions();
                Ok(RgbBuffer {
                    width,
                    height,
                    pixels: rgb.into_raw(),
                })
            }
            ImageData::Rgb8 {
                width,
                height,
                pixels,
            } => {
                let want = (*width as usize)
                    .checked_mul(*height as usize)
                    .and_then(|n| n.checked_mul(3))
                    .ok_or_else(|| SplatError::DecodeFailure {
                        label: self.label.clone(),
                        reason: format!("{width}x{height} RGB8 buffer size overflows"),
                    })?;
                if pixels.len() != want {
                    return Err(SplatError::DecodeFailure {
                        label: self.label.clone(),
                        reason: format!(
                            "RGB8 buffer holds {} bytes, {}x{} needs {}",
                            pixels.len(),
                            width,
                            height,
                            want
                        ),
                    });
                }
                Ok(RgbBuffer {
                    width: *width,
                    height: *height,
                    pixels: pixels.clone(),
                })
            }
        }
    }
}

/// Decoded RGB8 pixels.
#[derive(Clone, Debug)]
pub struct RgbBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbBuffer {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color at (x, y) normalized to [0, 1]; black outside the image.
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> [f32; 3] {
        if x >= self.width as usize || y >= self.height as usize {
            return [0.0; 3];
        }

        let offset = (y * self.width as usize + x) * 3;
        let px = &self.pixels[offset..offset + 3];
        [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn raw_buffer_samples_normalized_colors() {
        let img = CapturedImage::rgb8("raw", 2, 1, vec![255, 0, 51, 0, 255, 102]);
        let rgb = img.decode().unwrap();
        assert_eq!(rgb.sample(0, 0), [1.0, 0.0, 0.2]);
        assert_eq!(rgb.sample(1, 0), [0.0, 1.0, 0.4]);
    }

    #[test]
    fn out_of_range_samples_black() {
        let rgb = CapturedImage::rgb8("raw", 1, 1, vec![255, 255, 255])
            .decode()
            .unwrap();
        assert_eq!(rgb.sample(1, 0), [0.0; 3]);
        assert_eq!(rgb.sample(0, 5), [0.0; 3]);
    }

    #[test]
    fn short_raw_buffer_is_decode_failure() {
        let err = CapturedImage::rgb8("short", 2, 2, vec![0; 5])
            .decode()
            .unwrap_err();
        assert!(matches!(err, SplatError::DecodeFailure { ref label, .. } if label == "short"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn oversized_dimensions_are_decode_failure() {
        let err = CapturedImage::rgb8("huge", u32::MAX, u32::MAX, Vec::new())
            .decode()
            .unwrap_err();
        assert!(matches!(err, SplatError::DecodeFailure { ref label, .. } if label == "huge"));
    }

    #[test]
    fn png_bytes_decode() {
        let mut png = Vec::new();
        RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]))
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();

        let rgb = CapturedImage::encoded("png", png).decode().unwrap();
        assert_eq!((rgb.width(), rgb.height()), (3, 2));
        assert_eq!(rgb.sample(2, 1), [10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0]);
    }

    #[test]
    fn garbage_bytes_are_decode_failure() {
        let err = CapturedImage::encoded("junk", b"not an image".to_vec())
            .decode()
            .unwrap_err();
        assert!(matches!(err, SplatError::DecodeFailure { .. }));
    }
}
