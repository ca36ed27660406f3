use crate::core::*;
use crate::source::{SourceImage, BYTES_PER_PIXEL};
use image::{imageops, RgbaImage};

/// Runs the resize and copy primitives on the CPU with `image::imageops`.
///
/// Every call completes before it returns, so [`ImageContext::synchronize`] is a no-op.
#[derive(Debug, Default, Copy, Clone)]
pub struct HostContext;

impl HostContext {
    pub fn new() -> Self {
        HostContext
    }
}

fn filter_type(filter: FilterMode) -> imageops::FilterType {
    match filter {
        FilterMode::Nearest => imageops::FilterType::Nearest,
        FilterMode::Linear => imageops::FilterType::Triangle,
        FilterMode::Cubic => imageops::FilterType::CatmullRom,
    }
}

fn check_region(region: Rect, bounds: Extent) -> Result<(), GenerationError> {
    if region.fits_in(bounds) {
        Ok(())
    } else {
        Err(GenerationError::OutOfBounds { region, bounds })
    }
}

impl ImageContext for HostContext {
    type Image = RgbaImage;

    fn upload(&self, source: &SourceImage) -> Result<RgbaImage, GenerationError> {
        Ok(source.to_rgba_image())
    }

    fn download(&self, image: &RgbaImage) -> Result<RgbaImage, GenerationError> {
        Ok(image.clone())
    }

    fn allocate(&self, extent: Extent) -> Result<RgbaImage, GenerationError> {
        if extent.is_empty() {
            return Err(GenerationError::Allocation {
                extent,
                reason: "image would be empty".to_string(),
            });
        }
        Ok(RgbaImage::new(extent.width, extent.height))
    }

    fn synchronize(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}

impl ResizePrimitive for HostContext {
    fn resize(
        &self,
        src: &RgbaImage,
        src_rect: Rect,
        dst_extent: Extent,
        filter: FilterMode,
    ) -> Result<RgbaImage, GenerationError> {
        if dst_extent.is_empty() {
            return Err(GenerationError::Allocation {
                extent: dst_extent,
                reason: "resize target would be empty".to_string(),
            });
        }
        if src_rect.is_empty() {
            return Err(GenerationError::OutOfBounds {
                region: src_rect,
                bounds: src.extent(),
            });
        }
        check_region(src_rect, src.extent())?;
        let filter = filter_type(filter);
        if src_rect == Rect::full(src.extent()) {
            return Ok(imageops::resize(
                src,
                dst_extent.width,
                dst_extent.height,
                filter,
            ));
        }
        let region = imageops::crop_imm(
            src,
            src_rect.origin.x,
            src_rect.origin.y,
            src_rect.extent.width,
            src_rect.extent.height,
        )
        .to_image();
        Ok(imageops::resize(
            &region,
            dst_extent.width,
            dst_extent.height,
            filter,
        ))
    }
}

impl CopyPrimitive for HostContext {
    fn copy_region(
        &self,
        src: &RgbaImage,
        src_rect: Rect,
        dst: &mut RgbaImage,
        dst_origin: Origin,
    ) -> Result<(), GenerationError> {
        check_region(src_rect, src.extent())?;
        check_region(Rect::new(dst_origin, src_rect.extent), dst.extent())?;

        let src_stride = src.width() as usize * BYTES_PER_PIXEL;
        let dst_stride = dst.width() as usize * BYTES_PER_PIXEL;
        let row_bytes = src_rect.extent.width as usize * BYTES_PER_PIXEL;
        let src_pixels = src.as_raw();
        let dst_pixels: &mut [u8] = dst;
        for row in 0..src_rect.extent.height as usize {
            let s = (src_rect.origin.y as usize + row) * src_stride
                + src_rect.origin.x as usize * BYTES_PER_PIXEL;
            let d = (dst_origin.y as usize + row) * dst_stride
                + dst_origin.x as usize * BYTES_PER_PIXEL;
            dst_pixels[d..d + row_bytes].copy_from_slice(&src_pixels[s..s + row_bytes]);
        }
        Ok(())
    }
}
