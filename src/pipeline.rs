use crate::atlas::{AtlasComposer, Placement};
use crate::chain::MipChainBuilder;
use crate::core::*;
use crate::source::SourceImage;
use image::RgbaImage;
use std::fmt;

/// States an image goes through. Any error ends processing of the image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    ChainBuilt,
    Composed,
    Saved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::ChainBuilt => "chain built",
            Stage::Composed => "composed",
            Stage::Saved => "saved",
        };
        f.write_str(name)
    }
}

impl Stage {
    /// What was being done when a job stopped before reaching this stage.
    pub fn action(&self) -> &'static str {
        match self {
            Stage::Loaded => "load",
            Stage::ChainBuilt => "build the mip chain of",
            Stage::Composed => "compose the atlas of",
            Stage::Saved => "save the output of",
        }
    }
}

/// Output of [`MipmapAtlasGenerator::generate`], in host memory.
#[derive(Debug, Clone)]
pub struct GeneratedAtlas {
    pub image: RgbaImage,
    pub placements: Vec<Placement>,
    /// Every mip level, only filled when requested with [`MipmapAtlasGenerator::keep_levels`].
    pub levels: Vec<RgbaImage>,
}

/// Runs one image through upload, chain building, composition and readback.
#[derive(Debug, Copy, Clone, Default)]
pub struct MipmapAtlasGenerator {
    builder: MipChainBuilder,
    keep_levels: bool,
}

impl MipmapAtlasGenerator {
    pub fn new(filter: FilterMode) -> Self {
        Self {
            builder: MipChainBuilder::new(filter),
            keep_levels: false,
        }
    }

    /// Also read every mip level back before the chain is consumed.
    pub fn keep_levels(mut self, keep_levels: bool) -> Self {
        self.keep_levels = keep_levels;
        self
    }

    pub fn filter(&self) -> FilterMode {
        self.builder.filter()
    }

    pub fn generate<C>(&self, context: &C, source: &SourceImage) -> Result<GeneratedAtlas, Error>
    where
        C: ResizePrimitive + CopyPrimitive,
    {
        let src = context.upload(source)?;
        log::debug!("[MipmapAtlasGenerator] {} {}", source.extent(), Stage::Loaded);

        let chain = self.builder.build(context, &src)?;
        log::debug!(
            "[MipmapAtlasGenerator] {} with {} levels",
            Stage::ChainBuilt,
            chain.len()
        );

        let levels = if self.keep_levels {
            chain
                .iter()
                .map(|level| context.download(level.image()))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let atlas = AtlasComposer.compose(context, &src, chain)?;
        log::debug!(
            "[MipmapAtlasGenerator] {} into {}",
            Stage::Composed,
            atlas.extent()
        );

        let image = context.download(atlas.image())?;
        Ok(GeneratedAtlas {
            image,
            placements: atlas.placements().to_vec(),
            levels,
        })
    }
}
