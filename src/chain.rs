use crate::core::*;

/// One resampled image of a [`MipChain`].
#[derive(Debug)]
pub struct MipLevel<I> {
    index: u32,
    extent: Extent,
    image: I,
}

impl<I> MipLevel<I> {
    /// Position in the chain. Level 0 is half the size of the source.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn into_image(self) -> I {
        self.image
    }
}

/// The ordered levels produced by [`MipChainBuilder::build`].
///
/// A chain is never empty and its last level is 1x1. Dropping the chain
/// releases every level.
#[derive(Debug)]
pub struct MipChain<I> {
    levels: Vec<MipLevel<I>>,
}

impl<I> MipChain<I> {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[MipLevel<I>] {
        &self.levels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MipLevel<I>> {
        self.levels.iter()
    }

    pub fn extents(&self) -> Vec<Extent> {
        self.levels.iter().map(MipLevel::extent).collect()
    }

    /// Sum of the heights of every level, i.e. the height of the stacked strip.
    pub fn stacked_height(&self) -> u64 {
        self.levels.iter().map(|level| level.height() as u64).sum()
    }
}

impl<I> IntoIterator for MipChain<I> {
    type Item = MipLevel<I>;
    type IntoIter = std::vec::IntoIter<MipLevel<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.into_iter()
    }
}

impl<'a, I> IntoIterator for &'a MipChain<I> {
    type Item = &'a MipLevel<I>;
    type IntoIter = std::slice::Iter<'a, MipLevel<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

/// Builds a [`MipChain`] by resampling a source image with a [`ResizePrimitive`].
///
/// Every level is resampled directly from the full resolution source, not from
/// the previous level.
#[derive(Debug, Copy, Clone, Default)]
pub struct MipChainBuilder {
    filter: FilterMode,
}

impl MipChainBuilder {
    pub fn new(filter: FilterMode) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// Returns the extent of every level of the chain for a `source` sized image.
    ///
    /// The divisor starts at 2 and doubles until both `width / step` and
    /// `height / step` are at most 1. That last level is always included.
    pub fn level_extents(source: Extent) -> Vec<Extent> {
        let mut extents = Vec::new();
        for level in 0.. {
            let extent = source.halved(level);
            extents.push(extent);
            if extent == Extent::new(1, 1) {
                break;
            }
        }
        extents
    }

    /// Encodes one resize per level and waits for the context to finish them.
    ///
    /// On failure every level built so far is dropped before the error is returned.
    pub fn build<R: ResizePrimitive>(
        &self,
        context: &R,
        source: &R::Image,
    ) -> Result<MipChain<R::Image>, Error> {
        let source_extent = source.extent();
        let source_rect = Rect::full(source_extent);
        let mut levels = Vec::new();
        for (index, extent) in Self::level_extents(source_extent).into_iter().enumerate() {
            let index = index as u32;
            log::debug!(
                "[MipChainBuilder::build] level {} {} -> {} ({})",
                index,
                source_extent,
                extent,
                self.filter
            );
            let image = context
                .resize(source, source_rect, extent, self.filter)
                .map_err(|e| GenerationError::Resize {
                    level: index,
                    reason: e.to_string(),
                })?;
            levels.push(MipLevel {
                index,
                extent,
                image,
            });
        }
        // In-stream ordering already covers the copies that follow; this only
        // holds the host until the resizes are done.
        context.synchronize()?;
        Ok(MipChain { levels })
    }
}
