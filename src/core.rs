use crate::source::SourceImage;
use image::RgbaImage;
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Width and height of an image, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The extent of the `level`-th halving of `self`, clamped to at least 1x1.
    pub fn halved(&self, level: u32) -> Extent {
        let step = 2u64.pow(level + 1);
        Extent {
            width: ((self.width as u64 / step) as u32).max(1),
            height: ((self.height as u64 / step) as u32).max(1),
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A pixel offset into an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Origin {
    pub x: u32,
    pub y: u32,
}

impl Origin {
    pub const ZERO: Origin = Origin { x: 0, y: 0 };

    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis aligned pixel rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub origin: Origin,
    pub extent: Extent,
}

impl Rect {
    pub const fn new(origin: Origin, extent: Extent) -> Self {
        Self { origin, extent }
    }

    /// The rectangle covering all of an image with `extent`.
    pub const fn full(extent: Extent) -> Self {
        Self {
            origin: Origin::ZERO,
            extent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    /// Returns true if `self` lies entirely inside an image of size `bounds`.
    pub fn fits_in(&self, bounds: Extent) -> bool {
        let right = self.origin.x as u64 + self.extent.width as u64;
        let bottom = self.origin.y as u64 + self.extent.height as u64;
        right <= bounds.width as u64 && bottom <= bounds.height as u64
    }

    /// Intersects `self` with an image of size `bounds`.
    pub fn clipped_to(&self, bounds: Extent) -> Rect {
        let x = self.origin.x.min(bounds.width);
        let y = self.origin.y.min(bounds.height);
        let right = (self.origin.x as u64 + self.extent.width as u64).min(bounds.width as u64);
        let bottom = (self.origin.y as u64 + self.extent.height as u64).min(bounds.height as u64);
        Rect {
            origin: Origin { x, y },
            extent: Extent {
                width: (right - x as u64) as u32,
                height: (bottom - y as u64) as u32,
            },
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.extent, self.origin)
    }
}

/// Resampling filter used by a [`ResizePrimitive`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
    Cubic,
}

impl Default for FilterMode {
    fn default() -> Self {
        FilterMode::Linear
    }
}

impl FilterMode {
    /// Maps the numeric `--mode` argument onto a filter.
    ///
    /// `1` selects nearest, `2` selects cubic, and every other value selects linear.
    pub fn from_mode_arg(mode: &str) -> Self {
        match mode.trim() {
            "1" => FilterMode::Nearest,
            "2" => FilterMode::Cubic,
            _ => FilterMode::Linear,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::Nearest => "nearest",
            FilterMode::Linear => "linear",
            FilterMode::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Images that know their own size.
pub trait Surface {
    fn extent(&self) -> Extent;
}

impl Surface for RgbaImage {
    fn extent(&self) -> Extent {
        Extent::new(self.width(), self.height())
    }
}

/// An execution context that owns images and an ordered command stream.
///
/// Commands issued later on the same context observe the effects of every
/// command issued before them. Only [`ImageContext::synchronize`] and
/// [`ImageContext::download`] block the host.
pub trait ImageContext {
    type Image: Surface;

    /// Uploads host pixels into a new image owned by this context.
    fn upload(&self, source: &SourceImage) -> Result<Self::Image, GenerationError>;

    /// Reads an image back into tightly packed RGBA8 host memory.
    fn download(&self, image: &Self::Image) -> Result<RgbaImage, GenerationError>;

    /// Allocates a zero-initialized image.
    fn allocate(&self, extent: Extent) -> Result<Self::Image, GenerationError>;

    /// Waits until every previously issued command has completed.
    fn synchronize(&self) -> Result<(), GenerationError>;
}

/// Resamples a region of an image into a new image.
pub trait ResizePrimitive: ImageContext {
    /// Expectations:
    /// - `src_rect` lies inside `src` and is not empty.
    /// - `dst_extent` is at least 1x1.
    fn resize(
        &self,
        src: &Self::Image,
        src_rect: Rect,
        dst_extent: Extent,
        filter: FilterMode,
    ) -> Result<Self::Image, GenerationError>;
}

/// Copies pixels between images without resampling.
pub trait CopyPrimitive: ImageContext {
    /// Copies `src_rect` of `src` into `dst` with its top left corner at `dst_origin`.
    /// Fails if either region falls outside its image.
    fn copy_region(
        &self,
        src: &Self::Image,
        src_rect: Rect,
        dst: &mut Self::Image,
        dst_origin: Origin,
    ) -> Result<(), GenerationError>;
}

/// An error that occurred while producing a mipmap atlas.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Unable to initialize a compute device: {0}")]
    DeviceInit(String),
    #[error("No input image could be resolved.\nPass one or more paths with `--input <path[,path...]>`.")]
    InputResolution,
    #[error("Unable to load image `{}`: {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },
    #[error("Mipmap generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("Unable to write image `{}`: {reason}", path.display())]
    OutputWrite { path: PathBuf, reason: String },
}

/// A failure of a resize or copy primitive.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("resizing mip level {level} failed: {reason}")]
    Resize { level: u32, reason: String },
    #[error("copying the source image into the atlas failed: {reason}")]
    CopySource { reason: String },
    #[error("copying mip level {level} into the atlas failed: {reason}")]
    CopyLevel { level: u32, reason: String },
    #[error("unable to allocate a {extent} image: {reason}")]
    Allocation { extent: Extent, reason: String },
    #[error("region {region} does not fit in a {bounds} image")]
    OutOfBounds { region: Rect, bounds: Extent },
    #[error("device error: {0}")]
    Device(String),
}
