//! Submission streams and completion events.
//!
//! wgpu exposes a single in-order queue; a [`CommandStream`] is a handle
//! onto that timeline. Synchronous strategies wait on each submission's
//! [`Event`], pipelined strategies batch submissions and wait once on the
//! last event.

use super::context::GpuContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle for submitting encoded command buffers.
pub struct CommandStream {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    label: String,
}

impl std::fmt::Debug for CommandStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStream")
            .field("label", &self.label)
            .finish()
    }
}

/// Completion handle for one submission.
#[derive(Debug, Clone)]
pub struct Event {
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

impl Event {
    /// Non-blocking completion check. Only advances once the device has
    /// been polled.
    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn submission_index(&self) -> wgpu::SubmissionIndex {
        self.index.clone()
    }
}

impl CommandStream {
    /// Create a stream on the context's queue.
    pub fn new(ctx: &GpuContext, label: impl Into<String>) -> Self {
        Self {
            device: ctx.shared_device(),
            queue: ctx.shared_queue(),
            label: label.into(),
        }
    }

    /// Create a fresh command encoder for this stream.
    pub fn encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(self.label.as_str()),
            })
    }

    /// Submit an encoder and return its completion event. Any pending
    /// `write_buffer` data is flushed with the submission.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) -> Event {
        let index = self.queue.submit(Some(encoder.finish()));
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        self.queue
            .on_submitted_work_done(move || flag.store(true, Ordering::Release));
        log::trace!("{}: submitted", self.label);
        Event { index, done }
    }

    /// Flush pending buffer writes without recording any commands.
    pub fn flush(&self) -> Event {
        self.submit(self.encoder())
    }

    /// Block until the given submission has completed.
    pub fn wait(&self, event: &Event) {
        self.device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(event.submission_index()));
        event.done.store(true, Ordering::Release);
    }

    /// Block until all submitted work has completed.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Get the underlying queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get the underlying device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_and_wait() {
        // Requires a GPU, so it may be skipped in CI
        let Ok(ctx) = GpuContext::new_blocking(None) else {
            return;
        };
        let stream = CommandStream::new(&ctx, "test-stream");

        let event = stream.flush();
        stream.wait(&event);
        assert!(event.is_complete());
    }

    #[test]
    fn test_multiple_streams_share_timeline() {
        let Ok(ctx) = GpuContext::new_blocking(None) else {
            return;
        };
        let a = CommandStream::new(&ctx, "stream-a");
        let b = CommandStream::new(&ctx, "stream-b");

        let first = a.flush();
        let second = b.flush();
        b.wait(&second);
        // The queue is in-order, so the earlier submission is done too.
        a.wait(&first);
        assert!(first.is_complete() && second.is_complete());
    }
}
