use crate::core::*;
use image::RgbaImage;
use std::path::Path;

/// Bytes per pixel of every image handled by this crate (RGBA, 8 bits per channel).
pub const BYTES_PER_PIXEL: usize = 4;

/// A read-only RGBA8 image in host memory.
///
/// Rows are `pitch` bytes apart, which may be more than `width * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    pitch: usize,
    data: Vec<u8>,
}

impl SourceImage {
    /// Wraps a pitched RGBA8 buffer. `path` is only used for error reporting.
    pub fn from_raw(
        path: &Path,
        width: u32,
        height: u32,
        pitch: usize,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        let invalid = |reason: String| Error::ImageLoad {
            path: path.to_path_buf(),
            reason,
        };
        if width == 0 || height == 0 {
            return Err(invalid(format!("empty image {}x{}", width, height)));
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if pitch < row_bytes {
            return Err(invalid(format!(
                "row pitch {} is smaller than {} bytes per row",
                pitch, row_bytes
            )));
        }
        let required = pitch * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(invalid(format!(
                "pixel buffer holds {} bytes, {} required",
                data.len(),
                required
            )));
        }
        Ok(Self {
            width,
            height,
            pitch,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    /// The raw, possibly pitched, pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The `width * 4` meaningful bytes of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let begin = y as usize * self.pitch;
        &self.data[begin..begin + self.width as usize * BYTES_PER_PIXEL]
    }

    /// Copies the pixels into a tightly packed image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut packed =
            Vec::with_capacity(self.width as usize * self.height as usize * BYTES_PER_PIXEL);
        for y in 0..self.height {
            packed.extend_from_slice(self.row(y));
        }
        RgbaImage::from_raw(self.width, self.height, packed)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl From<RgbaImage> for SourceImage {
    fn from(image: RgbaImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            width,
            height,
            pitch: width as usize * BYTES_PER_PIXEL,
            data: image.into_raw(),
        }
    }
}
