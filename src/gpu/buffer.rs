//! GPU buffer management with pooling and staged readback.

use crate::error::{Error, Result};
use crate::gpu::stream::CommandStream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn align_copy_size(size: usize) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    (size as u64 + align - 1) / align * align
}

/// Device-local buffer usable as a kernel binding.
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: usize,
    device: Arc<wgpu::Device>,
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer").field("size", &self.size).finish()
    }
}

impl GpuBuffer {
    /// Create a storage buffer of `size` bytes.
    pub fn new(device: Arc<wgpu::Device>, size: usize) -> Self {
        Self::with_usage(
            device,
            size,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            "helios-storage-buffer",
        )
    }

    /// Create a uniform buffer of `size` bytes for kernel parameters.
    pub fn uniform(device: Arc<wgpu::Device>, size: usize) -> Self {
        Self::with_usage(
            device,
            size,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            "helios-uniform-buffer",
        )
    }

    fn with_usage(
        device: Arc<wgpu::Device>,
        size: usize,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_copy_size(size),
            usage,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            size,
            device,
        }
    }

    /// Stage `data` for upload. The write lands on the timeline with the
    /// next submission on the queue.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8]) -> Result<()> {
        if data.len() > self.size {
            return Err(Error::gpu(format!(
                "write of {} bytes exceeds buffer size {}",
                data.len(),
                self.size
            )));
        }
        queue.write_buffer(&self.buffer, 0, data);
        Ok(())
    }

    /// Copy the buffer contents back to the host, blocking until the data
    /// is mapped.
    pub fn read(&self, stream: &CommandStream) -> Result<Vec<u8>> {
        let readback = ReadbackBuffer::new(Arc::clone(&self.device), self.size);
        let mut encoder = stream.encoder();
        readback.encode_copy(&mut encoder, self);
        let event = stream.submit(encoder);
        stream.wait(&event);
        readback.resolve()
    }

    /// Get the underlying wgpu buffer
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Get buffer size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get device reference
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

/// Host-mappable staging buffer for reading kernel output.
pub struct ReadbackBuffer {
    staging: wgpu::Buffer,
    size: usize,
    device: Arc<wgpu::Device>,
}

impl std::fmt::Debug for ReadbackBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadbackBuffer")
            .field("size", &self.size)
            .finish()
    }
}

impl ReadbackBuffer {
    /// Create a staging buffer able to hold `size` bytes.
    pub fn new(device: Arc<wgpu::Device>, size: usize) -> Self {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("helios-staging-buffer"),
            size: align_copy_size(size),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            staging,
            size,
            device,
        }
    }

    /// Record a device-to-staging copy into `encoder`.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, src: &GpuBuffer) {
        let len = align_copy_size(self.size.min(src.size));
        encoder.copy_buffer_to_buffer(src.buffer(), 0, &self.staging, 0, len);
    }

    /// Map the staging buffer and copy its contents out. The copy that
    /// fills it must already be submitted; this blocks until the map
    /// callback resolves.
    pub fn resolve(&self) -> Result<Vec<u8>> {
        let slice = self.staging.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| Error::gpu("buffer map callback dropped"))?
            .map_err(|e| Error::gpu(format!("buffer map failed: {:?}", e)))?;

        let data = slice.get_mapped_range()[..self.size].to_vec();
        self.staging.unmap();
        Ok(data)
    }
}

/// Buffer pool for reusing storage buffers, keyed by size.
pub struct BufferPool {
    device: Arc<wgpu::Device>,
    free_buffers: Mutex<HashMap<usize, Vec<GpuBuffer>>>,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool").finish()
    }
}

impl BufferPool {
    /// Create a new buffer pool
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self {
            device,
            free_buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a storage buffer of the given size
    pub fn acquire(&self, size: usize) -> GpuBuffer {
        let mut buffers = self.free_buffers.lock();

        if let Some(pool) = buffers.get_mut(&size) {
            if let Some(buffer) = pool.pop() {
                return buffer;
            }
        }

        GpuBuffer::new(Arc::clone(&self.device), size)
    }

    /// Return a buffer to the pool
    pub fn release(&self, buffer: GpuBuffer) {
        let mut buffers = self.free_buffers.lock();
        buffers
            .entry(buffer.size)
            .or_insert_with(Vec::new)
            .push(buffer);
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.free_buffers.lock().values().map(Vec::len).sum()
    }

    /// Clear all cached buffers
    pub fn clear(&self) {
        self.free_buffers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::context::GpuContext;

    #[test]
    fn test_align_copy_size() {
        assert_eq!(align_copy_size(0), 0);
        assert_eq!(align_copy_size(1), 4);
        assert_eq!(align_copy_size(4), 4);
        assert_eq!(align_copy_size(5), 8);
        assert_eq!(align_copy_size(1024), 1024);
    }

    #[test]
    fn test_write_read_round_trip() {
        // Requires a GPU, so it may be skipped in CI
        let Ok(ctx) = GpuContext::new_blocking(None) else {
            return;
        };
        let stream = CommandStream::new(&ctx, "buffer-test");
        let buffer = GpuBuffer::new(ctx.shared_device(), 256);

        let data: Vec<u8> = (0..=255).collect();
        buffer.write(ctx.queue(), &data).unwrap();
        let back = buffer.read(&stream).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_oversized_write_rejected() {
        let Ok(ctx) = GpuContext::new_blocking(None) else {
            return;
        };
        let buffer = GpuBuffer::new(ctx.shared_device(), 16);
        let result = buffer.write(ctx.queue(), &[0u8; 32]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_reuses_released_buffers() {
        let Ok(ctx) = GpuContext::new_blocking(None) else {
            return;
        };
        let pool = BufferPool::new(ctx.shared_device());

        let buffer = pool.acquire(1024);
        assert_eq!(pool.idle_count(), 0);

        pool.release(buffer);
        assert_eq!(pool.idle_count(), 1);

        let _again = pool.acquire(1024);
        assert_eq!(pool.idle_count(), 0);
    }
}
