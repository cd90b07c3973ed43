//! Push buffer and GPU transport
//!
//! Commands are accumulated as method/data word pairs and handed to a
//! [`GpuTransport`]. Synchronization is a busy wait: the driver spins until
//! the transport reports the GPU caught up, and the time spent spinning is
//! charged to the current batch's sync time.

use std::time::{Duration, Instant};

use pyrite_core::{GlError, Result};
use tracing::trace;

/// Command stream consumer.
///
/// The production transport feeds a DMA pusher; tests use [`NullTransport`],
/// which consumes everything immediately.
pub trait GpuTransport {
    /// Hand a span of method/data words to the GPU.
    fn submit(&mut self, words: &[u32]);

    /// True when the GPU has consumed every submitted word.
    fn is_idle(&self) -> bool;

    /// True while a framebuffer flip is still queued.
    fn flip_pending(&self) -> bool;
}

/// Transport that swallows the stream; the GPU is always idle.
#[derive(Debug, Default)]
pub struct NullTransport {
    pub consumed_words: u64,
}

impl GpuTransport for NullTransport {
    fn submit(&mut self, words: &[u32]) {
        self.consumed_words += words.len() as u64;
    }

    fn is_idle(&self) -> bool {
        true
    }

    fn flip_pending(&self) -> bool {
        false
    }
}

/// Timing and size counters for one batch, measured at [`PushBuffer::reset`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchStats {
    /// Bytes of command words built since the previous reset
    pub bytes: usize,
    /// Wall time spent building the batch
    pub build_time: Duration,
    /// Wall time spent busy-waiting for the GPU to drain it
    pub sync_time: Duration,
}

/// Bounded command word accumulator in front of a [`GpuTransport`].
pub struct PushBuffer {
    words: Vec<u32>,
    capacity: usize,
    transport: Box<dyn GpuTransport>,
    batch_started_at: Instant,
}

impl PushBuffer {
    pub fn new(capacity_words: usize, transport: Box<dyn GpuTransport>) -> Self {
        Self {
            words: Vec::with_capacity(capacity_words),
            capacity: capacity_words,
            transport,
            batch_started_at: Instant::now(),
        }
    }

    /// Append one method/data pair.
    pub fn push(&mut self, method: u32, data: u32) -> Result<()> {
        if self.words.len() + 2 > self.capacity {
            return Err(GlError::PushOverflow(self.capacity));
        }
        self.words.push(method);
        self.words.push(data);
        Ok(())
    }

    /// Append one method with a float payload.
    pub fn push_f32(&mut self, method: u32, data: f32) -> Result<()> {
        self.push(method, data.to_bits())
    }

    /// Append floats to consecutive register addresses starting at `method`.
    pub fn push_f32s(&mut self, method: u32, data: &[f32]) -> Result<()> {
        let words: &[u32] = bytemuck::cast_slice(data);
        for (i, &word) in words.iter().enumerate() {
            self.push(method + 4 * i as u32, word)?;
        }
        Ok(())
    }

    /// Append a 16-element matrix at `method`.
    pub fn push_matrix(&mut self, method: u32, m: &[f32; 16]) -> Result<()> {
        self.push_f32s(method, m)
    }

    /// Submit everything accumulated so far and spin until the GPU is idle.
    pub fn wait_idle(&mut self) {
        self.flush();
        while !self.transport.is_idle() {
            std::hint::spin_loop();
        }
    }

    /// Spin until any queued framebuffer flip has completed.
    pub fn wait_flip(&mut self) {
        self.flush();
        while self.transport.flip_pending() {
            std::hint::spin_loop();
        }
    }

    fn flush(&mut self) {
        if !self.words.is_empty() {
            self.transport.submit(&self.words);
        }
    }

    /// Drain the batch and start a new one, returning its counters.
    pub fn reset(&mut self) -> BatchStats {
        let build_time = self.batch_started_at.elapsed();
        let bytes = self.words.len() * 4;
        let sync_start = Instant::now();
        self.wait_idle();
        let sync_time = sync_start.elapsed();
        trace!(bytes, ?build_time, ?sync_time, "push buffer reset");
        self.words.clear();
        self.batch_started_at = Instant::now();
        BatchStats { bytes, build_time, sync_time }
    }

    /// Words accumulated since the last reset.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len_words(&self) -> usize {
        self.words.len()
    }
}

impl std::fmt::Debug for PushBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushBuffer")
            .field("words", &self.words.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pb(capacity: usize) -> PushBuffer {
        PushBuffer::new(capacity, Box::new(NullTransport::default()))
    }

    #[test]
    fn test_push_pairs() {
        let mut pb = test_pb(16);
        pb.push(0x0100, 7).unwrap();
        pb.push_f32(0x0104, 1.0).unwrap();
        assert_eq!(pb.words(), &[0x0100, 7, 0x0104, 1.0f32.to_bits()]);
    }

    #[test]
    fn test_push_f32s_increments_method() {
        let mut pb = test_pb(16);
        pb.push_f32s(0x0310, &[0.5, 0.25]).unwrap();
        assert_eq!(pb.words()[0], 0x0310);
        assert_eq!(pb.words()[2], 0x0314);
    }

    #[test]
    fn test_overflow_is_fatal() {
        let mut pb = test_pb(2);
        pb.push(0x0100, 0).unwrap();
        assert_eq!(pb.push(0x0104, 0), Err(GlError::PushOverflow(2)));
    }

    #[test]
    fn test_reset_reports_and_clears() {
        let mut pb = test_pb(16);
        pb.push(0x0100, 0).unwrap();
        let stats = pb.reset();
        assert_eq!(stats.bytes, 8);
        assert_eq!(pb.len_words(), 0);
        let stats = pb.reset();
        assert_eq!(stats.bytes, 0);
    }
}
