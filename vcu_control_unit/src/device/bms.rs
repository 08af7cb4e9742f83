//! Battery management system broadcast decoding.
//!
//! Three frames starting at a configurable base identifier:
//!
//! | Offset | Content |
//! |---|---|
//! | +0 | pack current (0.1 A, i16), pack voltage (0.1 V, u16), SOC (0.5 %), fault flag, counter |
//! | +1 | highest/lowest cell voltage (0.0001 V, u16) with cell IDs, populated cells |
//! | +2 | highest/lowest cell temperature (1 °C, i8) with cell IDs, failsafe status |

use vcu_common::vehicle::state::VehicleStateData;

use super::FrameDecoder;
use super::frame::{CanFrame, fixed, scaled};

pub const OFFSET_PACK: u16 = 0;
pub const OFFSET_CELL_VOLTAGE: u16 = 1;
pub const OFFSET_CELL_TEMP: u16 = 2;

const TENTHS: f32 = 0.1;
const CELL_VOLT_SCALE: f32 = 0.0001;
const SOC_SCALE: f32 = 0.5;

/// Decoder for the BMS broadcast frames.
#[derive(Debug, Clone, Copy)]
pub struct BmsDecoder {
    base_id: u16,
}

impl BmsDecoder {
    pub const fn new(base_id: u16) -> Self {
        Self { base_id }
    }

    #[inline]
    pub const fn base_id(&self) -> u16 {
        self.base_id
    }
}

impl FrameDecoder for BmsDecoder {
    fn name(&self) -> &'static str {
        "bms"
    }

    fn accepts(&self, id: u16) -> bool {
        id >= self.base_id && id <= self.base_id + OFFSET_CELL_TEMP
    }

    fn decode(&self, frame: &CanFrame, data: &mut VehicleStateData) -> bool {
        if !frame.is_full() || !self.accepts(frame.id) {
            return false;
        }
        let battery = &mut data.battery;
        match frame.id - self.base_id {
            OFFSET_PACK => {
                battery.dc_current = scaled(frame.i16_le(0), TENTHS);
                battery.dc_voltage = f32::from(frame.u16_le(2)) * TENTHS;
                battery.state_of_charge = f32::from(frame.data[4]) * SOC_SCALE;
                battery.bms_fault_indicator = frame.data[5] & 0x01 != 0;
                battery.health_counter = frame.data[6];
            }
            OFFSET_CELL_VOLTAGE => {
                battery.max_cell_voltage = f32::from(frame.u16_le(0)) * CELL_VOLT_SCALE;
                battery.max_cell_voltage_id = frame.data[2];
                battery.min_cell_voltage = f32::from(frame.u16_le(3)) * CELL_VOLT_SCALE;
                battery.min_cell_voltage_id = frame.data[5];
                battery.populated_cells = frame.data[6];
            }
            OFFSET_CELL_TEMP => {
                battery.max_cell_temp = f32::from(frame.data[0] as i8);
                battery.max_cell_temp_id = frame.data[1];
                battery.min_cell_temp = f32::from(frame.data[2] as i8);
                battery.min_cell_temp_id = frame.data[3];
                battery.failsafe_status = frame.u16_le(4);
            }
            _ => return false,
        }
        true
    }
}

// ─── Encoding ───────────────────────────────────────────────────────

/// Pack-level values carried in the `+0` frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PackReport {
    pub current: f32,
    pub voltage: f32,
    pub state_of_charge: f32,
    pub fault: bool,
    pub counter: u8,
}

/// Cell extremes carried in the `+1` and `+2` frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellReport {
    pub max_voltage: f32,
    pub max_voltage_id: u8,
    pub min_voltage: f32,
    pub min_voltage_id: u8,
    pub populated_cells: u8,
    pub max_temp: i8,
    pub max_temp_id: u8,
    pub min_temp: i8,
    pub min_temp_id: u8,
    pub failsafe_status: u16,
}

fn unsigned(value: f32, scale: f32) -> u16 {
    (value / scale).round().clamp(0.0, f32::from(u16::MAX)) as u16
}

impl PackReport {
    pub fn encode(&self, base_id: u16) -> CanFrame {
        let mut frame = CanFrame::full(base_id + OFFSET_PACK, [0; 8]);
        frame.put_i16_le(0, fixed(self.current, TENTHS));
        frame.put_u16_le(2, unsigned(self.voltage, TENTHS));
        frame.data[4] = (self.state_of_charge / SOC_SCALE).round().clamp(0.0, 255.0) as u8;
        frame.data[5] = u8::from(self.fault);
        frame.data[6] = self.counter;
        frame
    }
}

impl CellReport {
    pub fn encode(&self, base_id: u16) -> [CanFrame; 2] {
        let mut volts = CanFrame::full(base_id + OFFSET_CELL_VOLTAGE, [0; 8]);
        volts.put_u16_le(0, unsigned(self.max_voltage, CELL_VOLT_SCALE));
        volts.data[2] = self.max_voltage_id;
        volts.put_u16_le(3, unsigned(self.min_voltage, CELL_VOLT_SCALE));
        volts.data[5] = self.min_voltage_id;
        volts.data[6] = self.populated_cells;

        let mut temps = CanFrame::full(base_id + OFFSET_CELL_TEMP, [0; 8]);
        temps.data[0] = self.max_temp as u8;
        temps.data[1] = self.max_temp_id;
        temps.data[2] = self.min_temp as u8;
        temps.data[3] = self.min_temp_id;
        temps.put_u16_le(4, self.failsafe_status);
        [volts, temps]
    }
}
