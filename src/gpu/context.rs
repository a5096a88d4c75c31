//! GPU device and queue acquisition.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Owns the wgpu device and queue shared by all streams and buffers.
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

/// One row of the adapter listing.
#[derive(Debug, Clone)]
pub struct AdapterEntry {
    pub index: usize,
    pub name: String,
    pub backend: String,
    pub device_type: String,
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

impl GpuContext {
    /// Initialize a context, optionally pinned to an adapter index.
    pub async fn new(device_index: Option<usize>) -> Result<Self> {
        let instance = new_instance();

        let adapter = match device_index {
            Some(index) => {
                let mut adapters: Vec<wgpu::Adapter> = instance
                    .enumerate_adapters(wgpu::Backends::all())
                    .into_iter()
                    .collect();
                if index >= adapters.len() {
                    return Err(Error::config(format!(
                        "device index {} out of range ({} adapters available)",
                        index,
                        adapters.len()
                    )));
                }
                adapters.swap_remove(index)
            }
            None => instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok_or_else(|| Error::gpu("no GPU adapter found"))?,
        };

        let adapter_info = adapter.get_info();
        log::info!(
            "using adapter '{}' ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("helios-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| Error::gpu(format!("failed to request device: {}", e)))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Blocking wrapper around [`GpuContext::new`].
    pub fn new_blocking(device_index: Option<usize>) -> Result<Self> {
        futures::executor::block_on(Self::new(device_index))
    }

    /// Get or initialize the process-wide context on the default adapter.
    pub async fn get_or_init() -> Result<Arc<Self>> {
        static CONTEXT: RwLock<Option<Arc<GpuContext>>> = RwLock::new(None);

        {
            let ctx = CONTEXT.read();
            if let Some(ctx) = ctx.as_ref() {
                return Ok(Arc::clone(ctx));
            }
        }

        let mut ctx = CONTEXT.write();
        if let Some(ctx) = ctx.as_ref() {
            return Ok(Arc::clone(ctx));
        }

        let new = Arc::new(Self::new(None).await?);
        *ctx = Some(Arc::clone(&new));
        Ok(new)
    }

    /// Blocking wrapper around [`GpuContext::get_or_init`].
    pub fn get_or_init_blocking() -> Result<Arc<Self>> {
        futures::executor::block_on(Self::get_or_init())
    }

    /// Enumerate the available adapters for device listing.
    pub fn adapters() -> Vec<AdapterEntry> {
        let instance = new_instance();
        instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .enumerate()
            .map(|(index, adapter)| {
                let info = adapter.get_info();
                AdapterEntry {
                    index,
                    name: info.name,
                    backend: format!("{:?}", info.backend),
                    device_type: format!("{:?}", info.device_type),
                }
            })
            .collect()
    }

    /// Get device reference
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get queue reference
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get adapter info
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Adapter name, for reporting.
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    pub(crate) fn shared_device(&self) -> Arc<wgpu::Device> {
        Arc::clone(&self.device)
    }

    pub(crate) fn shared_queue(&self) -> Arc<wgpu::Queue> {
        Arc::clone(&self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_init() {
        // Requires a GPU, so it may be skipped in CI
        if let Ok(ctx) = GpuContext::new(None).await {
            assert!(!ctx.device_name().is_empty());
            assert!(ctx.device().limits().max_compute_workgroup_size_x > 0);
        }
    }

    #[test]
    fn test_out_of_range_device_index() {
        let result = GpuContext::new_blocking(Some(usize::MAX));
        assert!(result.is_err());
    }
}
