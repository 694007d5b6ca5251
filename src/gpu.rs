use crate::error::FlockingError;

/// Instance, adapter, device and queue shared by every stage.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Opens a device able to present to `surface`.
    pub async fn for_surface(
        instance: wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, FlockingError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await?;
        Self::open(instance, adapter).await
    }

    /// Opens a device without any window, for tests and offline stepping.
    pub async fn headless() -> Result<Self, FlockingError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        Self::open(instance, adapter).await
    }

    async fn open(instance: wgpu::Instance, adapter: wgpu::Adapter) -> Result<Self, FlockingError> {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(FlockingError::Unsupported {
                adapter: info.name,
                reason: "compute shaders are not available".into(),
            });
        }
        log::info!("using {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Flocking Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        // Runtime GPU errors are reported and the frame loop carries on
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("GPU error: {error}");
        }));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Runs `create` inside a validation error scope, turning any validation
    /// failure into a fatal [`FlockingError::Shader`] carrying the diagnostic.
    pub fn validated<T>(&self, stage: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, FlockingError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(FlockingError::Shader {
                stage: stage.to_string(),
                diagnostic: error.to_string(),
            }),
            None => Ok(value),
        }
    }

    pub fn shader_module(&self, label: &str, source: &str) -> Result<wgpu::ShaderModule, FlockingError> {
        self.validated(label, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })
    }

    /// Blocks until the mapped range of `buffer` is readable and copies it out.
    pub fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<[f32; 4]>, FlockingError> {
        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| FlockingError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|err| FlockingError::Readback(err.to_string()))?
            .map_err(|err| FlockingError::Readback(err.to_string()))?;

        let records = {
            let data = slice.get_mapped_range();
            bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(&data)
        };
        buffer.unmap();
        Ok(records)
    }
}
