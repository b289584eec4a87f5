//! GPU device management

use pointfeat_core::{Error, Result};
use wgpu::util::DeviceExt;

/// Threads per workgroup of every compute shader in this crate
pub const WORKGROUP_SIZE: u32 = 64;

/// Largest workgroup count allowed along one dispatch dimension
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// GPU context for managing compute operations
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Create a context on the highest performance adapter
    pub async fn new() -> Result<Self> {
        let instance = create_instance();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::Gpu("Failed to find suitable adapter".to_string()))?;

        Self::from_adapter(adapter).await
    }

    /// Create a context on the `ordinal`-th adapter reported by the system
    pub async fn with_ordinal(ordinal: usize) -> Result<Self> {
        let instance = create_instance();
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let available = adapters.len();
        let adapter = adapters.into_iter().nth(ordinal).ok_or_else(|| {
            Error::Gpu(format!(
                "GPU adapter {} not found ({} available)",
                ordinal, available
            ))
        })?;

        Self::from_adapter(adapter).await
    }

    async fn from_adapter(adapter: wgpu::Adapter) -> Result<Self> {
        let info = adapter.get_info();
        log::info!("Using GPU adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("pointfeat GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| Error::Gpu(format!("Failed to create device: {}", e)))?;

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Name of the adapter backing this context
    pub fn adapter_name(&self) -> String {
        self.adapter.get_info().name
    }

    /// Create a buffer from data
    pub fn create_buffer_init<T: bytemuck::Pod>(
        &self,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage,
        })
    }

    /// Create an empty buffer
    pub fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Create a compute pipeline with a layout derived from the shader
    pub fn create_compute_pipeline(
        &self,
        label: &str,
        shader: &wgpu::ShaderModule,
        entry_point: &str,
    ) -> wgpu::ComputePipeline {
        self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: shader,
            entry_point,
            compilation_options: Default::default(),
        })
    }

    /// Create a shader module from WGSL source
    pub fn create_shader_module(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }

    /// Create a bind group
    pub fn create_bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        entries: &[wgpu::BindGroupEntry],
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries,
        })
    }

    /// Fail if a storage binding of `size` bytes exceeds the device limits
    pub fn check_binding_size(&self, label: &str, size: u64) -> Result<()> {
        let limits = self.device.limits();
        let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if size > max {
            return Err(Error::Gpu(format!(
                "{} buffer needs {} bytes, device allows {}",
                label, size, max
            )));
        }
        Ok(())
    }

    /// Copy `buffer` into a staging buffer and read it back
    pub async fn read_buffer<T: bytemuck::Pod>(&self, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
        let size = buffer.size();
        let staging_buffer = self.create_buffer(
            "Staging Buffer",
            size,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = flume::bounded(1);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv_async()
            .await
            .map_err(|_| Error::Gpu("Failed to receive mapping result".to_string()))?
            .map_err(|e| Error::Gpu(format!("Failed to map staging buffer: {}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let values = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();

        Ok(values)
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        ..Default::default()
    })
}

/// Workgroup grid covering `num_items` invocations
///
/// Returns `(x, y, row_stride)`: grids wider than one dimension allows wrap
/// into `y`, and a shader recovers its item as `x + y * row_stride`.
pub fn dispatch_dimensions(num_items: usize) -> (u32, u32, u32) {
    let groups = num_items.div_ceil(WORKGROUP_SIZE as usize).max(1) as u64;
    let max = MAX_WORKGROUPS_PER_DIMENSION as u64;
    if groups <= max {
        let x = groups as u32;
        (x, 1, x * WORKGROUP_SIZE)
    } else {
        let y = groups.div_ceil(max) as u32;
        (MAX_WORKGROUPS_PER_DIMENSION, y, MAX_WORKGROUPS_PER_DIMENSION * WORKGROUP_SIZE)
    }
}
