//! A context that records every primitive call instead of touching pixels.
use crate::core::*;
use crate::source::SourceImage;
use image::RgbaImage;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Upload(Extent),
    Download(Extent),
    Allocate(Extent),
    Synchronize,
    Resize {
        src: Rect,
        dst: Extent,
        filter: FilterMode,
    },
    Copy {
        src: Rect,
        dst_origin: Origin,
    },
}

/// Image handle that tracks how many handles are alive.
#[derive(Debug)]
pub(crate) struct TrackedImage {
    extent: Extent,
    live: Rc<Cell<usize>>,
}

impl Surface for TrackedImage {
    fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for TrackedImage {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingContext {
    fail_resize_on: Option<usize>,
    fail_copy_on: Option<usize>,
    calls: RefCell<Vec<Call>>,
    live: Rc<Cell<usize>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the resize call with zero based index `n`.
    pub fn failing_resize_on(n: usize) -> Self {
        Self {
            fail_resize_on: Some(n),
            ..Self::default()
        }
    }

    /// Fails the copy call with zero based index `n`.
    pub fn failing_copy_on(n: usize) -> Self {
        Self {
            fail_copy_on: Some(n),
            ..Self::default()
        }
    }

    pub fn image(&self, extent: Extent) -> TrackedImage {
        self.live.set(self.live.get() + 1);
        TrackedImage {
            extent,
            live: Rc::clone(&self.live),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn live_images(&self) -> usize {
        self.live.get()
    }

    pub fn resize_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Resize { .. }))
    }

    pub fn copy_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Copy { .. }))
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| f(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl ImageContext for RecordingContext {
    type Image = TrackedImage;

    fn upload(&self, source: &SourceImage) -> Result<TrackedImage, GenerationError> {
        self.record(Call::Upload(source.extent()));
        Ok(self.image(source.extent()))
    }

    fn download(&self, image: &TrackedImage) -> Result<RgbaImage, GenerationError> {
        self.record(Call::Download(image.extent));
        Ok(RgbaImage::new(image.extent.width, image.extent.height))
    }

    fn allocate(&self, extent: Extent) -> Result<TrackedImage, GenerationError> {
        self.record(Call::Allocate(extent));
        Ok(self.image(extent))
    }

    fn synchronize(&self) -> Result<(), GenerationError> {
        self.record(Call::Synchronize);
        Ok(())
    }
}

impl ResizePrimitive for RecordingContext {
    fn resize(
        &self,
        _src: &TrackedImage,
        src_rect: Rect,
        dst_extent: Extent,
        filter: FilterMode,
    ) -> Result<TrackedImage, GenerationError> {
        let n = self.resize_count();
        self.record(Call::Resize {
            src: src_rect,
            dst: dst_extent,
            filter,
        });
        if self.fail_resize_on == Some(n) {
            return Err(GenerationError::Device("injected resize failure".to_string()));
        }
        Ok(self.image(dst_extent))
    }
}

impl CopyPrimitive for RecordingContext {
    fn copy_region(
        &self,
        _src: &TrackedImage,
        src_rect: Rect,
        dst: &mut TrackedImage,
        dst_origin: Origin,
    ) -> Result<(), GenerationError> {
        let n = self.copy_count();
        self.record(Call::Copy {
            src: src_rect,
            dst_origin,
        });
        if self.fail_copy_on == Some(n) {
            return Err(GenerationError::Device("injected copy failure".to_string()));
        }
        let region = Rect::new(dst_origin, src_rect.extent);
        if !region.fits_in(dst.extent) {
            return Err(GenerationError::OutOfBounds {
                region,
                bounds: dst.extent,
            });
        }
        Ok(())
    }
}
