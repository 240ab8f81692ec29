// SPDX-License-Identifier: GPL-3.0-only

//! Delegated conversion backend on a wgpu compute shader
//!
//! The canonical frame is uploaded as a raw byte buffer, converted by one
//! invocation per pixel and read back into the caller's destination. The
//! destination is only written after the readback mapping succeeded, so a
//! lost device never leaves a half-written frame behind.

use super::ColorConvertBackend;
use crate::constants::PACKED_BYTES_PER_PIXEL;
use crate::errors::ConvertError;
use crate::media::formats::{ChannelOrder, ColorRange};
use crate::media::normalizer::CanonicalFrame;
use tracing::{debug, info};
use wgpu_compute as wgpu;

const WORKGROUP_SIZE: u32 = 16;

/// Uniform block shared with the shader
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ConvertParams {
    width: u32,
    height: u32,
    order: u32,
    range: u32,
    chroma: u32,
    _pad: [u32; 3],
}

/// Buffers sized for one frame geometry
struct FrameBuffers {
    width: u32,
    height: u32,
    src: wgpu::Buffer,
    dst: wgpu::Buffer,
    readback: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU colour conversion context
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    adapter_name: String,
    buffers: Option<FrameBuffers>,
    /// Scratch used when the frame length is not a multiple of 4
    upload: Vec<u8>,
    released: bool,
}

impl GpuBackend {
    /// Create the device and compute pipeline
    pub fn new() -> Result<Self, String> {
        pollster::block_on(Self::init())
    }

    async fn init() -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected for frame conversion"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pose_stream_converter"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| format!("Failed to create GPU device: {}", e))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("nv21_to_packed"),
            source: wgpu::ShaderSource::Wgsl(include_str!("nv21_to_packed.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nv21_to_packed_layout"),
            entries: &[
                // Canonical frame bytes
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Packed output, one u32 per pixel
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
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
            label: Some("nv21_to_packed_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("nv21_to_packed_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            adapter_name: adapter_info.name,
            buffers: None,
            upload: Vec::new(),
            released: false,
        })
    }

    /// Make sure frame buffers match the geometry, recreating them if not
    fn ensure_buffers(&mut self, width: u32, height: u32) {
        if let Some(ref buffers) = self.buffers
            && buffers.width == width
            && buffers.height == height
        {
            return;
        }

        let pixels = width as u64 * height as u64;
        let src_size = align4(CanonicalFrame::buffer_len(width, height)) as u64;
        let dst_size = pixels * PACKED_BYTES_PER_PIXEL as u64;

        let src = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canonical_frame"),
            size: src_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let dst = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("packed_frame"),
            size: dst_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("packed_readback"),
            size: dst_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let params = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("convert_params"),
            size: std::mem::size_of::<ConvertParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("nv21_to_packed_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dst.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        debug!(width, height, "Allocated GPU conversion buffers");
        self.buffers = Some(FrameBuffers {
            width,
            height,
            src,
            dst,
            readback,
            params,
            bind_group,
        });
    }

    async fn run(
        &mut self,
        frame: &CanonicalFrame,
        order: ChannelOrder,
        range: ColorRange,
        dst: &mut [u8],
    ) -> Result<(), ConvertError> {
        let (width, height) = (frame.width(), frame.height());
        self.ensure_buffers(width, height);
        let Some(ref buffers) = self.buffers else {
            return Err(ConvertError::ConversionFailed(
                "GPU buffers unavailable".into(),
            ));
        };

        // write_buffer needs a length aligned to 4 bytes
        let bytes = frame.as_bytes();
        let upload: &[u8] = if bytes.len() % 4 == 0 {
            bytes
        } else {
            self.upload.clear();
            self.upload.extend_from_slice(bytes);
            self.upload.resize(align4(bytes.len()), 0);
            &self.upload
        };

        let params = ConvertParams {
            width,
            height,
            order: order.gpu_code(),
            range: range.gpu_code(),
            chroma: frame.chroma_order().gpu_code(),
            _pad: [0; 3],
        };
        self.queue.write_buffer(&buffers.src, 0, upload);
        self.queue
            .write_buffer(&buffers.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("nv21_to_packed_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("nv21_to_packed_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&buffers.bind_group), &[]);
            pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        let size = dst.len() as u64;
        encoder.copy_buffer_to_buffer(&buffers.dst, 0, &buffers.readback, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffers.readback.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ConvertError::ConversionFailed(format!("GPU poll failed: {}", e)))?;
        receiver
            .await
            .map_err(|_| ConvertError::ConversionFailed("Failed to receive map result".into()))?
            .map_err(|e| ConvertError::ConversionFailed(format!("Buffer mapping failed: {}", e)))?;

        {
            let mapped = slice.get_mapped_range();
            dst.copy_from_slice(&mapped[..dst.len()]);
        }
        buffers.readback.unmap();
        Ok(())
    }
}

impl ColorConvertBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn convert(
        &mut self,
        frame: &CanonicalFrame,
        order: ChannelOrder,
        range: ColorRange,
        dst: &mut [u8],
    ) -> Result<(), ConvertError> {
        if self.released {
            return Err(ConvertError::ConversionFailed(
                "GPU context has been released".into(),
            ));
        }
        let expected =
            frame.width() as usize * frame.height() as usize * PACKED_BYTES_PER_PIXEL;
        if dst.len() != expected || frame.as_bytes().is_empty() {
            return Err(ConvertError::ConversionFailed(format!(
                "destination holds {} bytes, {} required",
                dst.len(),
                expected
            )));
        }
        pollster::block_on(self.run(frame, order, range, dst))
    }

    fn release(&mut self) {
        if !self.released {
            info!(adapter = %self.adapter_name, "Releasing GPU conversion context");
            self.buffers = None;
            self.upload = Vec::new();
            self.released = true;
        }
    }
}

#[inline]
fn align4(len: usize) -> usize {
    len.div_ceil(4) * 4
}
