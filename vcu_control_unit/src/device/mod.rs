//! Device frame plumbing.
//!
//! Bus frames are routed into one bounded [`FrameQueue`] per device. A
//! [`DeviceTask`] per device drains its queue once per tick and writes the
//! decoded values into the vehicle state under a single lock acquisition.
//! Outbound command frames are drained by a [`TransmitTask`] or by the
//! simulated inverter.
//!
//! - [`frame`] - frame type, fixed-point helpers and the queue
//! - [`inverter`] - inverter broadcasts and the command frame
//! - [`bms`] - BMS broadcasts

pub mod bms;
pub mod frame;
pub mod inverter;

use std::sync::Arc;

use heapless::Vec as HVec;
use tracing::{trace, warn};
use vcu_common::vehicle::state::VehicleStateData;

pub use bms::BmsDecoder;
pub use frame::{CanFrame, FrameError, FrameQueue};
pub use inverter::{InverterCommand, InverterDecoder};

use crate::context::VcuContext;
use crate::cycle::PeriodicTask;
use crate::vehicle_state::VehicleState;

/// Most frames one device task decodes per tick.
pub const MAX_FRAMES_PER_TICK: usize = 32;

/// Byte-buffer decoder for one device.
pub trait FrameDecoder: Send {
    fn name(&self) -> &'static str;

    /// True if `id` belongs to this device.
    fn accepts(&self, id: u16) -> bool;

    /// Decode `frame` into `data`. Returns false if the frame was ignored.
    fn decode(&self, frame: &CanFrame, data: &mut VehicleStateData) -> bool;
}

// ─── Routing ────────────────────────────────────────────────────────

/// Dispatches incoming bus frames to the owning device's queue.
#[derive(Debug, Clone)]
pub struct FrameRouter {
    inverter: Arc<FrameQueue>,
    bms: Arc<FrameQueue>,
    bms_decoder: BmsDecoder,
}

impl FrameRouter {
    pub fn new(inverter: Arc<FrameQueue>, bms: Arc<FrameQueue>, bms_base_id: u16) -> Self {
        Self {
            inverter,
            bms,
            bms_decoder: BmsDecoder::new(bms_base_id),
        }
    }

    pub fn route(&self, frame: CanFrame) -> Result<(), FrameError> {
        if InverterDecoder.accepts(frame.id) {
            self.inverter.push(frame)
        } else if self.bms_decoder.accepts(frame.id) {
            self.bms.push(frame)
        } else {
            Err(FrameError::UnknownId(frame.id))
        }
    }
}

// ─── Device Task ────────────────────────────────────────────────────

/// Periodic task draining one device queue into the vehicle state.
pub struct DeviceTask<D> {
    ctx: VcuContext,
    queue: Arc<FrameQueue>,
    decoder: D,
    state: Arc<VehicleState>,
    decoded: u64,
    dropped: u64,
}

impl<D: FrameDecoder> DeviceTask<D> {
    pub fn new(ctx: &VcuContext, queue: Arc<FrameQueue>, decoder: D, state: Arc<VehicleState>) -> Self {
        Self {
            ctx: ctx.module(decoder.name()),
            queue,
            decoder,
            state,
            decoded: 0,
            dropped: 0,
        }
    }

    /// Frames written into the vehicle state so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Frames discarded because the vehicle state lock was unavailable.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Drain pending frames and apply them. Returns the number decoded.
    pub fn poll(&mut self) -> usize {
        let mut batch: HVec<CanFrame, MAX_FRAMES_PER_TICK> = HVec::new();
        while !batch.is_full() {
            match self.queue.try_pop() {
                Some(frame) => {
                    let _ = batch.push(frame);
                }
                None => break,
            }
        }
        if batch.is_empty() {
            return 0;
        }

        let decoder = &self.decoder;
        match self
            .state
            .write(|data| batch.iter().filter(|f| decoder.decode(f, data)).count())
        {
            Ok(n) => {
                self.decoded += n as u64;
                trace!(parent: self.ctx.span(), frames = batch.len(), decoded = n, "frames applied");
                n
            }
            Err(e) => {
                self.dropped += batch.len() as u64;
                warn!(parent: self.ctx.span(), frames = batch.len(), "frames dropped: {e}");
                0
            }
        }
    }
}

impl<D: FrameDecoder> PeriodicTask for DeviceTask<D> {
    fn name(&self) -> &'static str {
        self.decoder.name()
    }

    fn step(&mut self) {
        self.poll();
    }
}

// ─── Transmit ───────────────────────────────────────────────────────

/// Drains the outbound command queue.
///
/// No bus driver is attached on a workstation build: frames are counted and
/// logged at trace level.
pub struct TransmitTask {
    ctx: VcuContext,
    queue: Arc<FrameQueue>,
    sent: u64,
}

impl TransmitTask {
    pub fn new(ctx: &VcuContext, queue: Arc<FrameQueue>) -> Self {
        Self {
            ctx: ctx.module("transmit"),
            queue,
            sent: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl PeriodicTask for TransmitTask {
    fn name(&self) -> &'static str {
        "transmit"
    }

    fn step(&mut self) {
        while let Some(frame) = self.queue.try_pop() {
            self.sent += 1;
            trace!(parent: self.ctx.span(), id = frame.id, data = ?frame.payload(), "tx");
        }
    }
}
