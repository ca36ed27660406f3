use crate::core::*;
use crate::source::SourceImage;
use crate::util::ReadbackDimensions;
use image::RgbaImage;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Texture format of every image owned by a [`DeviceContext`].
pub const DEVICE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const IMAGE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// An RGBA8 texture owned by a [`DeviceContext`].
#[derive(Debug)]
pub struct DeviceImage {
    texture: wgpu::Texture,
    extent: Extent,
}

impl DeviceImage {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl Surface for DeviceImage {
    fn extent(&self) -> Extent {
        self.extent
    }
}

/// Normalized source rectangle read by the vertex shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Region {
    rect: [f32; 4],
}

fn extent_3d(extent: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    }
}

fn origin_3d(origin: Origin) -> wgpu::Origin3d {
    wgpu::Origin3d {
        x: origin.x,
        y: origin.y,
        z: 0,
    }
}

fn copy_view(texture: &wgpu::Texture, origin: Origin) -> wgpu::ImageCopyTexture<'_> {
    wgpu::ImageCopyTexture {
        texture,
        mip_level: 0,
        origin: origin_3d(origin),
        aspect: wgpu::TextureAspect::All,
    }
}

/// Runs the resize and copy primitives on a wgpu device.
///
/// Every primitive encodes its own command buffer and submits it to the
/// queue, which executes submissions in order. Resizing is a render pass that
/// draws one triangle sampling the source: nearest and linear filtering come
/// from the sampler, cubic filtering is a 16 tap Catmull-Rom fragment shader.
#[derive(Debug)]
pub struct DeviceContext {
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    sampler_cache: HashMap<FilterMode, wgpu::Sampler>,
    pipeline_cache: HashMap<FilterMode, wgpu::RenderPipeline>,
}

impl DeviceContext {
    /// Picks a high performance adapter and creates the device and queue.
    pub async fn new() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| Error::DeviceInit("no compatible adapter found".to_string()))?;
        let adapter_info = adapter.get_info();
        // Create the logical device and command queue
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("mipmap-atlas-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| Error::DeviceInit(e.to_string()))?;
        log::info!(
            "using adapter `{}` ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );
        Ok(Self::from_device(adapter_info, device, queue))
    }

    /// Creates a context on an existing device. Once created, it can be used
    /// repeatedly for any number of images.
    pub fn from_device(
        adapter_info: wgpu::AdapterInfo,
        device: wgpu::Device,
        queue: wgpu::Queue,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mipmap-atlas-resize-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/resize.wgsl").into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mipmap-atlas-resize-bg-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mipmap-atlas-resize-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let mut sampler_cache = HashMap::new();
        let mut pipeline_cache = HashMap::new();
        for &filter in &[FilterMode::Nearest, FilterMode::Linear, FilterMode::Cubic] {
            // The cubic shader reads texels directly, its sampler is bound but unused.
            let filter_mode = match filter {
                FilterMode::Linear => wgpu::FilterMode::Linear,
                FilterMode::Nearest | FilterMode::Cubic => wgpu::FilterMode::Nearest,
            };
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(&format!("mipmap-atlas-sampler-{}", filter)),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter_mode,
                min_filter: filter_mode,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });
            let fragment_entry_point = match filter {
                FilterMode::Nearest | FilterMode::Linear => "fs_sample",
                FilterMode::Cubic => "fs_cubic",
            };
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("mipmap-atlas-resize-pipeline-{}", filter)),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: fragment_entry_point,
                    compilation_options: Default::default(),
                    targets: &[Some(DEVICE_FORMAT.into())],
                }),
                multiview: None,
            });
            sampler_cache.insert(filter, sampler);
            pipeline_cache.insert(filter, pipeline);
        }

        Self {
            adapter_info,
            device,
            queue,
            layout,
            sampler_cache,
            pipeline_cache,
        }
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Runs `f` inside validation and out-of-memory error scopes so that
    /// device errors come back as values instead of reaching the uncaptured
    /// error handler.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> Result<T, GenerationError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = futures::executor::block_on(self.device.pop_error_scope());
        let out_of_memory = futures::executor::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(e) => Err(GenerationError::Device(e.to_string())),
            None => Ok(value),
        }
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_image(&self, extent: Extent, label: &str) -> Result<DeviceImage, GenerationError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if extent.is_empty() || extent.width > max || extent.height > max {
            return Err(GenerationError::Allocation {
                extent,
                reason: format!("texture sides must be within 1..={}", max),
            });
        }
        let texture = self
            .scoped(|| {
                self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: extent_3d(extent),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEVICE_FORMAT,
                    usage: IMAGE_USAGE,
                    view_formats: &[],
                })
            })
            .map_err(|e| GenerationError::Allocation {
                extent,
                reason: e.to_string(),
            })?;
        Ok(DeviceImage { texture, extent })
    }
}

impl ImageContext for DeviceContext {
    type Image = DeviceImage;

    fn upload(&self, source: &SourceImage) -> Result<DeviceImage, GenerationError> {
        let image = self.create_image(source.extent(), "mipmap-atlas-source")?;
        self.scoped(|| {
            self.queue.write_texture(
                copy_view(&image.texture, Origin::ZERO),
                source.data(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(source.pitch() as u32),
                    rows_per_image: Some(source.height()),
                },
                extent_3d(source.extent()),
            )
        })?;
        Ok(image)
    }

    fn download(&self, image: &DeviceImage) -> Result<RgbaImage, GenerationError> {
        let dimensions =
            ReadbackDimensions::new(image.extent.width as usize, image.extent.height as usize);
        let buffer = self.scoped(|| {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mipmap-atlas-readback"),
                size: dimensions.buffer_size(),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("mipmap-atlas-readback"),
                });
            encoder.copy_texture_to_buffer(
                copy_view(&image.texture, Origin::ZERO),
                wgpu::ImageCopyBuffer {
                    buffer: &buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(dimensions.padded_bytes_per_row as u32),
                        rows_per_image: Some(image.extent.height),
                    },
                },
                extent_3d(image.extent),
            );
            self.submit(encoder);
            buffer
        })?;

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        // Poll the device in a blocking manner so that the map callback runs.
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match futures::executor::block_on(receiver) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GenerationError::Device(e.to_string())),
            Err(_) => {
                return Err(GenerationError::Device(
                    "readback buffer was dropped before it was mapped".to_string(),
                ))
            }
        }
        let exact_buffer = {
            let padded_buffer = buffer_slice.get_mapped_range();
            dimensions.unpad(&padded_buffer)
        };
        buffer.unmap();
        RgbaImage::from_raw(image.extent.width, image.extent.height, exact_buffer).ok_or_else(
            || GenerationError::Device(format!("short readback for a {} image", image.extent)),
        )
    }

    fn allocate(&self, extent: Extent) -> Result<DeviceImage, GenerationError> {
        self.create_image(extent, "mipmap-atlas-image")
    }

    fn synchronize(&self) -> Result<(), GenerationError> {
        let _ = self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }
}

impl ResizePrimitive for DeviceContext {
    fn resize(
        &self,
        src: &DeviceImage,
        src_rect: Rect,
        dst_extent: Extent,
        filter: FilterMode,
    ) -> Result<DeviceImage, GenerationError> {
        if src_rect.is_empty() || !src_rect.fits_in(src.extent) {
            return Err(GenerationError::OutOfBounds {
                region: src_rect,
                bounds: src.extent,
            });
        }
        let pipeline = self
            .pipeline_cache
            .get(&filter)
            .ok_or_else(|| GenerationError::Device(format!("no pipeline for {}", filter)))?;
        let sampler = self
            .sampler_cache
            .get(&filter)
            .ok_or_else(|| GenerationError::Device(format!("no sampler for {}", filter)))?;
        let dst = self.create_image(dst_extent, "mipmap-atlas-level")?;

        let src_width = src.extent.width as f32;
        let src_height = src.extent.height as f32;
        let region = Region {
            rect: [
                src_rect.origin.x as f32 / src_width,
                src_rect.origin.y as f32 / src_height,
                src_rect.extent.width as f32 / src_width,
                src_rect.extent.height as f32 / src_height,
            ],
        };
        self.scoped(|| {
            let region_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("mipmap-atlas-region"),
                    contents: bytemuck::bytes_of(&region),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let src_view = src
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let dst_view = dst
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: region_buffer.as_entire_binding(),
                    },
                ],
            });
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("mipmap-atlas-resize"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: None,
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &dst_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            self.submit(encoder);
        })?;
        Ok(dst)
    }
}

impl CopyPrimitive for DeviceContext {
    fn copy_region(
        &self,
        src: &DeviceImage,
        src_rect: Rect,
        dst: &mut DeviceImage,
        dst_origin: Origin,
    ) -> Result<(), GenerationError> {
        if !src_rect.fits_in(src.extent) {
            return Err(GenerationError::OutOfBounds {
                region: src_rect,
                bounds: src.extent,
            });
        }
        let dst_region = Rect::new(dst_origin, src_rect.extent);
        if !dst_region.fits_in(dst.extent) {
            return Err(GenerationError::OutOfBounds {
                region: dst_region,
                bounds: dst.extent,
            });
        }
        self.scoped(|| {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("mipmap-atlas-copy"),
                });
            encoder.copy_texture_to_texture(
                copy_view(&src.texture, src_rect.origin),
                copy_view(&dst.texture, dst_origin),
                extent_3d(src_rect.extent),
            );
            self.submit(encoder);
        })
    }
}
