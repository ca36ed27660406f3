/// utilities used throughout the project. Not part of the official API.
use crate::source::BYTES_PER_PIXEL;

/// Row layout of a GPU readback buffer. Rows copied out of a texture must be
/// padded to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadbackDimensions {
    pub width: usize,
    pub height: usize,
    pub unpadded_bytes_per_row: usize,
    pub padded_bytes_per_row: usize,
}

impl ReadbackDimensions {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
        let padded_bytes_per_row_padding = (align - unpadded_bytes_per_row % align) % align;
        let padded_bytes_per_row = unpadded_bytes_per_row + padded_bytes_per_row_padding;
        Self {
            width,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        (self.padded_bytes_per_row * self.height) as u64
    }

    /// The buffer we get back is padded, so only extract what we need
    pub fn unpad(&self, padded_buffer: &[u8]) -> Vec<u8> {
        let mut exact_buffer = Vec::with_capacity(self.unpadded_bytes_per_row * self.height);
        for y in 0..self.height {
            let row_beg = y * self.padded_bytes_per_row;
            let row_end = row_beg + self.unpadded_bytes_per_row;
            exact_buffer.extend_from_slice(&padded_buffer[row_beg..row_end]);
        }
        exact_buffer
    }
}

#[doc(hidden)]
pub fn checkerboard_r8(width: u32, height: u32, n: u32) -> Vec<u8> {
    (0..width * height)
        .map(|id| {
            let x = id % width;
            let y = id / width;
            (((x / n + y / n) % 2) * 255) as u8
        })
        .collect()
}

#[doc(hidden)]
pub fn checkerboard_rgba8(width: u32, height: u32, n: u32) -> Vec<u8> {
    use std::iter;

    checkerboard_r8(width, height, n)
        .into_iter()
        .flat_map(|v| {
            iter::once(v)
                .chain(iter::once(v))
                .chain(iter::once(v))
                .chain(iter::once(255))
        })
        .collect()
}

/// Every pixel gets a distinct color (for images up to 256x256), which makes
/// misplaced copies visible.
#[doc(hidden)]
pub fn gradient_rgba8(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|id| {
            let x = id % width;
            let y = id / width;
            vec![x as u8, y as u8, (x ^ y) as u8, 255]
        })
        .collect()
}

/// Requests a device for tests. Returns `None` when the machine has no usable adapter.
#[doc(hidden)]
#[allow(dead_code)]
pub(crate) fn test_device_context() -> Option<crate::backends::DeviceContext> {
    match futures::executor::block_on(crate::backends::DeviceContext::new()) {
        Ok(context) => Some(context),
        Err(e) => {
            log::warn!("skipping device test: {}", e);
            None
        }
    }
}
