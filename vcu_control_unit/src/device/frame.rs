//! Bus frames and the bounded per-device frame queue.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Maximum payload of one frame.
pub const MAX_PAYLOAD: usize = 8;

/// Frame construction or queueing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds 8")]
    PayloadTooLong(usize),

    #[error("frame queue full (capacity {0})")]
    QueueFull(usize),

    #[error("no device registered for frame id {0:#05x}")]
    UnknownId(u16),
}

/// One bus frame: 11-bit identifier plus up to eight payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanFrame {
    pub id: u16,
    pub data: [u8; MAX_PAYLOAD],
    pub len: u8,
}

impl CanFrame {
    pub fn new(id: u16, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            data,
            len: payload.len() as u8,
        })
    }

    /// Full eight-byte frame.
    #[inline]
    pub const fn full(id: u16, data: [u8; MAX_PAYLOAD]) -> Self {
        Self {
            id,
            data,
            len: MAX_PAYLOAD as u8,
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(MAX_PAYLOAD)]
    }

    #[inline]
    pub const fn is_full(&self) -> bool {
        self.len as usize == MAX_PAYLOAD
    }

    // ── Little-endian field access ──

    #[inline]
    pub fn u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    #[inline]
    pub fn i16_le(&self, offset: usize) -> i16 {
        i16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    #[inline]
    pub fn u32_le(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    #[inline]
    pub fn put_u16_le(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn put_i16_le(&mut self, offset: usize, value: i16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn put_u32_le(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Scale a fixed-point field to engineering units.
#[inline]
pub fn scaled(raw: i16, scale: f32) -> f32 {
    f32::from(raw) * scale
}

/// Engineering value to a saturated fixed-point field.
#[inline]
pub fn fixed(value: f32, scale: f32) -> i16 {
    (value / scale)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

/// Bounded multi-producer frame queue. Never blocks producers.
#[derive(Debug)]
pub struct FrameQueue {
    frames: Mutex<VecDeque<CanFrame>>,
    ready: Condvar,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Enqueue without waiting. Fails when the queue is full.
    pub fn push(&self, frame: CanFrame) -> Result<(), FrameError> {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            return Err(FrameError::QueueFull(self.capacity));
        }
        frames.push_back(frame);
        self.ready.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<CanFrame> {
        self.frames.lock().pop_front()
    }

    /// Dequeue, waiting up to `timeout` for a frame.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<CanFrame> {
        let mut frames = self.frames.lock();
        if frames.is_empty() {
            let _ = self.ready.wait_for(&mut frames, timeout);
        }
        frames.pop_front()
    }
}
