use crate::chain::MipChain;
use crate::core::*;

/// Where a mip level landed in the atlas.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Placement {
    pub level: u32,
    /// Top left corner requested by the layout.
    pub origin: Origin,
    /// Full size of the level.
    pub extent: Extent,
    /// Part of the level that fits inside the atlas, anchored at `origin`.
    pub copied: Extent,
}

impl Placement {
    pub fn is_clipped(&self) -> bool {
        self.copied != self.extent
    }
}

/// The source image and its mip chain packed into one image.
#[derive(Debug)]
pub struct Atlas<I> {
    image: I,
    source_extent: Extent,
    placements: Vec<Placement>,
}

impl<I> Atlas<I> {
    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn into_image(self) -> I {
        self.image
    }

    pub fn extent(&self) -> Extent {
        AtlasComposer::atlas_extent(self.source_extent)
    }

    pub fn source_extent(&self) -> Extent {
        self.source_extent
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }
}

/// Packs a source image and its [`MipChain`] into an [`Atlas`] with a [`CopyPrimitive`].
///
/// The layout is fixed:
/// - the atlas is `W + W / 2` wide and `H` tall,
/// - the source occupies `[0, W) x [0, H)`,
/// - the levels are stacked top to bottom in chain order starting at `(W, 0)`,
///   left aligned.
///
/// Levels are clipped to the atlas bounds. The floored level heights add up to
/// `H - popcount(H)`, and every level whose floored height is 0 is still one
/// pixel tall, so the strip overflows as soon as there are more of those levels
/// than set bits in `H`. A power of two source at 4:1 already loses its last
/// level. One pixel wide sources have no strip at all.
#[derive(Debug, Copy, Clone, Default)]
pub struct AtlasComposer;

impl AtlasComposer {
    pub fn atlas_extent(source: Extent) -> Extent {
        Extent::new(source.width + source.width / 2, source.height)
    }

    /// Computes the placement of every level without copying anything.
    pub fn layout(source: Extent, levels: &[Extent]) -> Vec<Placement> {
        let atlas_extent = Self::atlas_extent(source);
        let mut y: u64 = 0;
        levels
            .iter()
            .enumerate()
            .map(|(level, &extent)| {
                let origin = Origin::new(source.width, y.min(u32::MAX as u64) as u32);
                y += extent.height as u64;
                let copied = Rect::new(origin, extent).clipped_to(atlas_extent).extent;
                Placement {
                    level: level as u32,
                    origin,
                    extent,
                    copied,
                }
            })
            .collect()
    }

    /// Allocates the atlas, copies `source` and every level of `chain` into it.
    ///
    /// The chain is consumed: its levels are released once copied.
    pub fn compose<C: CopyPrimitive>(
        &self,
        context: &C,
        source: &C::Image,
        chain: MipChain<C::Image>,
    ) -> Result<Atlas<C::Image>, Error> {
        let source_extent = source.extent();
        let atlas_extent = Self::atlas_extent(source_extent);
        let mut atlas = context.allocate(atlas_extent)?;

        context
            .copy_region(source, Rect::full(source_extent), &mut atlas, Origin::ZERO)
            .map_err(|e| GenerationError::CopySource {
                reason: e.to_string(),
            })?;

        let placements = Self::layout(source_extent, &chain.extents());
        for (level, placement) in chain.iter().zip(&placements) {
            if placement.is_clipped() {
                log::warn!(
                    "[AtlasComposer::compose] level {} ({} at {}) does not fit in the {} atlas, copying {}",
                    placement.level,
                    placement.extent,
                    placement.origin,
                    atlas_extent,
                    placement.copied
                );
            }
            if placement.copied.is_empty() {
                continue;
            }
            context
                .copy_region(
                    level.image(),
                    Rect::full(placement.copied),
                    &mut atlas,
                    placement.origin,
                )
                .map_err(|e| GenerationError::CopyLevel {
                    level: placement.level,
                    reason: e.to_string(),
                })?;
        }

        Ok(Atlas {
            image: atlas,
            source_extent,
            placements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::HostContext;
    use crate::chain::MipChainBuilder;
    use crate::testing::{Call, RecordingContext};
    use crate::util::*;
    use crate::SourceImage;
    use image::{GenericImageView, RgbaImage};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_raw(width, height, gradient_rgba8(width, height)).unwrap()
    }

    fn compose_host(
        source: &RgbaImage,
        filter: FilterMode,
    ) -> (Vec<RgbaImage>, Atlas<RgbaImage>) {
        let context = HostContext::new();
        let uploaded = context.upload(&SourceImage::from(source.clone())).unwrap();
        let chain = MipChainBuilder::new(filter)
            .build(&context, &uploaded)
            .unwrap();
        let levels = chain.iter().map(|level| level.image().clone()).collect();
        let atlas = AtlasComposer.compose(&context, &uploaded, chain).unwrap();
        (levels, atlas)
    }

    #[test]
    fn four_by_four() {
        init();
        let source = gradient(4, 4);
        let (levels, atlas) = compose_host(&source, FilterMode::Linear);
        assert_eq!(atlas.extent(), Extent::new(6, 4));
        assert_eq!(atlas.image().dimensions(), (6, 4));
        let placements = atlas.placements();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].origin, Origin::new(4, 0));
        assert_eq!(placements[0].extent, Extent::new(2, 2));
        assert_eq!(placements[1].origin, Origin::new(4, 2));
        assert_eq!(placements[1].extent, Extent::new(1, 1));
        assert!(placements.iter().all(|p| !p.is_clipped()));

        let image = atlas.image();
        for (x, y, pixel) in levels[0].enumerate_pixels() {
            assert_eq!(image.get_pixel(4 + x, y), pixel);
        }
        assert_eq!(image.get_pixel(4, 2), levels[1].get_pixel(0, 0));
        // the rest of the strip is left untouched
        for &(x, y) in &[(5, 2), (4, 3), (5, 3)] {
            assert_eq!(image.get_pixel(x, y).0, [0, 0, 0, 0]);
        }
    }

    #[test]
    fn two_fifty_six() {
        init();
        let source = RgbaImage::from_raw(256, 256, checkerboard_rgba8(256, 256, 16)).unwrap();
        let (levels, atlas) = compose_host(&source, FilterMode::Linear);
        assert_eq!(levels.len(), 8);
        assert_eq!(atlas.extent(), Extent::new(384, 256));
        let ys: Vec<u32> = atlas.placements().iter().map(|p| p.origin.y).collect();
        assert_eq!(ys, vec![0, 128, 192, 224, 240, 248, 252, 254]);
        assert!(atlas.placements().iter().all(|p| p.origin.x == 256));
        assert!(atlas.placements().iter().all(|p| !p.is_clipped()));
    }

    #[test]
    fn source_region_round_trips() {
        init();
        for &(width, height) in &[(1, 1), (5, 3), (7, 9), (33, 17), (64, 64), (100, 1)] {
            let source = gradient(width, height);
            let (_, atlas) = compose_host(&source, FilterMode::Cubic);
            let image = atlas.image();
            assert_eq!(
                image.dimensions(),
                (width + width / 2, height),
                "atlas size for {}x{}",
                width,
                height
            );
            let region = image.view(0, 0, width, height).to_image();
            assert_eq!(region, source, "source region for {}x{}", width, height);
        }
    }

    #[test]
    fn wide_sources_are_clipped() {
        init();
        let placements = AtlasComposer::layout(
            Extent::new(16, 2),
            &MipChainBuilder::level_extents(Extent::new(16, 2)),
        );
        let copied: Vec<_> = placements.iter().map(|p| p.copied).collect();
        assert_eq!(
            copied,
            vec![
                Extent::new(8, 1),
                Extent::new(4, 1),
                Extent::new(2, 0),
                Extent::new(1, 0)
            ]
        );

        let context = RecordingContext::new();
        let source = context.image(Extent::new(16, 2));
        let chain = MipChainBuilder::default().build(&context, &source).unwrap();
        let atlas = AtlasComposer.compose(&context, &source, chain).unwrap();
        assert_eq!(atlas.extent(), Extent::new(24, 2));
        // the source plus the two levels that fit
        assert_eq!(context.copy_count(), 3);
        drop(atlas);
        assert_eq!(context.live_images(), 1);
    }

    #[test]
    fn four_to_one_loses_the_last_level() {
        let source = Extent::new(1024, 256);
        let placements =
            AtlasComposer::layout(source, &MipChainBuilder::level_extents(source));
        assert_eq!(placements.len(), 10);
        let ys: Vec<_> = placements.iter().map(|p| p.origin.y).collect();
        assert_eq!(ys, vec![0, 128, 192, 224, 240, 248, 252, 254, 255, 256]);
        assert!(placements[..9].iter().all(|p| !p.is_clipped()));
        let last = &placements[9];
        assert_eq!(last.extent, Extent::new(1, 1));
        assert!(last.is_clipped());
        assert!(last.copied.is_empty());

        // one level narrower than tall enough to still fit
        let source = Extent::new(512, 256);
        let placements =
            AtlasComposer::layout(source, &MipChainBuilder::level_extents(source));
        assert!(placements.iter().all(|p| !p.is_clipped()));
        let last = placements.last().unwrap();
        assert_eq!(last.origin.y + last.extent.height, 256);
    }

    #[test]
    fn one_pixel_wide_source_has_no_strip() {
        let placements = AtlasComposer::layout(Extent::new(1, 1), &[Extent::new(1, 1)]);
        assert_eq!(placements[0].origin, Origin::new(1, 0));
        assert!(placements[0].copied.is_empty());
    }

    #[test]
    fn copy_order_and_failures() {
        init();
        let context = RecordingContext::new();
        let source = context.image(Extent::new(4, 4));
        let chain = MipChainBuilder::default().build(&context, &source).unwrap();
        AtlasComposer.compose(&context, &source, chain).unwrap();
        let copies: Vec<_> = context
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Copy { .. }))
            .collect();
        assert_eq!(
            copies,
            vec![
                Call::Copy {
                    src: Rect::full(Extent::new(4, 4)),
                    dst_origin: Origin::ZERO
                },
                Call::Copy {
                    src: Rect::full(Extent::new(2, 2)),
                    dst_origin: Origin::new(4, 0)
                },
                Call::Copy {
                    src: Rect::full(Extent::new(1, 1)),
                    dst_origin: Origin::new(4, 2)
                },
            ]
        );

        let context = RecordingContext::failing_copy_on(0);
        let source = context.image(Extent::new(4, 4));
        let chain = MipChainBuilder::default().build(&context, &source).unwrap();
        let res = AtlasComposer.compose(&context, &source, chain);
        assert!(matches!(
            res,
            Err(Error::Generation(GenerationError::CopySource { .. }))
        ));

        let context = RecordingContext::failing_copy_on(2);
        let source = context.image(Extent::new(4, 4));
        let chain = MipChainBuilder::default().build(&context, &source).unwrap();
        let res = AtlasComposer.compose(&context, &source, chain);
        assert!(matches!(
            res,
            Err(Error::Generation(GenerationError::CopyLevel { level: 1, .. }))
        ));
        assert_eq!(context.live_images(), 1);
    }
}
