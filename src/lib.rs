/*!
Generate a mipmap chain for an image with [wgpu](https://github.com/gfx-rs/wgpu) and
pack it next to the source in a single atlas image.

The atlas is `W + W / 2` pixels wide and `H` pixels tall. The source occupies the
left `W` columns, the mip levels (`W/2 x H/2`, `W/4 x H/4`, ... down to `1x1`) are
stacked top to bottom in the strip on the right.

## Usage

Add this to your `Cargo.toml`:

```toml
[dependencies]
mipmap-atlas = "0.1"
```

Example usage:

```rust,no_run
use mipmap_atlas::*;
fn example(path: &std::path::Path) -> Result<(), Error> {
    // create a device context once, and reuse it for every image
    let context = futures::executor::block_on(DeviceContext::new())?;
    let source = codec::load_rgba(path)?;
    // build the chain and compose the atlas
    let generator = MipmapAtlasGenerator::new(FilterMode::Linear);
    let atlas = generator.generate(&context, &source)?;
    codec::save_png(std::path::Path::new("atlas.png"), &atlas.image)?;
    Ok(())
}
```

The chain and atlas steps only depend on the [`ResizePrimitive`] and
[`CopyPrimitive`] traits, so they can also run on the CPU with [`HostContext`].
*/
mod atlas;
mod backends;
mod chain;
mod core;
mod pipeline;
mod source;

pub mod codec;

#[doc(hidden)]
pub mod util;

#[cfg(test)]
mod testing;

#[doc(inline)]
pub use crate::atlas::{Atlas, AtlasComposer, Placement};
#[doc(inline)]
pub use crate::backends::{DeviceContext, DeviceImage, HostContext, DEVICE_FORMAT};
#[doc(inline)]
pub use crate::chain::{MipChain, MipChainBuilder, MipLevel};
#[doc(inline)]
pub use crate::core::*;
#[doc(inline)]
pub use crate::pipeline::{GeneratedAtlas, MipmapAtlasGenerator, Stage};
#[doc(inline)]
pub use crate::source::{SourceImage, BYTES_PER_PIXEL};
