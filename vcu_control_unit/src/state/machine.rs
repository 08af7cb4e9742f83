//! Vehicle supervisory state machine: states, actions and the pure
//! transition function.
//!
//! Init → LvStartup → LvReady → HvCharging → ActiveNeutral → ActiveForward
//! → ActiveReverse → ActiveNeutral, with `Fault` as a sink.
//!
//! `LvStartup` tolerates LV_ERROR while the LV system settles. Every later
//! state treats LV_ERROR like FAULT.

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};
use vcu_common::vehicle::control::Direction;
use vcu_common::vehicle::fault::FaultStatus;

/// Maximum side effects produced by one transition.
pub const MAX_ACTIONS: usize = 4;

/// Supervisory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VsmState {
    /// Before the first tick.
    Init = 0,
    /// LV system coming up; LV errors tolerated.
    LvStartup = 1,
    /// LV healthy, waiting for the driver to request HV.
    LvReady = 2,
    /// Inverter enabled, waiting for precharge to complete.
    HvCharging = 3,
    ActiveNeutral = 4,
    ActiveForward = 5,
    ActiveReverse = 6,
    /// Sink. Torque off, inverter disabled, ECU error asserted.
    Fault = 7,
}

impl VsmState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::LvStartup),
            2 => Some(Self::LvReady),
            3 => Some(Self::HvCharging),
            4 => Some(Self::ActiveNeutral),
            5 => Some(Self::ActiveForward),
            6 => Some(Self::ActiveReverse),
            7 => Some(Self::Fault),
            _ => None,
        }
    }

    /// True in the three driving states.
    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::ActiveNeutral | Self::ActiveForward | Self::ActiveReverse
        )
    }
}

impl Default for VsmState {
    fn default() -> Self {
        Self::Init
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsmAction {
    EnableInverter,
    DisableInverter,
    SetTorqueEnabled(bool),
    SetDirection(Direction),
    SetEcuError(bool),
}

/// Per-tick inputs sampled by the VSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionInputs {
    /// Debounced dash button went from released to pressed this tick.
    pub button_rising_edge: bool,
    /// Inverter broadcast `Ready`.
    pub inverter_ready: bool,
    /// Time spent in the current state at the start of this tick [ms].
    pub elapsed_ms: u64,
    /// Maximum HV precharge time [ms].
    pub hv_charge_timeout_ms: u32,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: VsmState,
    pub actions: HVec<VsmAction, MAX_ACTIONS>,
}

impl Transition {
    fn stay(state: VsmState) -> Self {
        Self {
            next: state,
            actions: HVec::new(),
        }
    }

    fn to(next: VsmState) -> Self {
        let mut t = Self::stay(next);
        t.push_entry_actions();
        t
    }

    fn push(&mut self, action: VsmAction) {
        let pushed = self.actions.push(action).is_ok();
        debug_assert!(pushed, "transition action list exceeds {MAX_ACTIONS}");
    }

    fn push_entry_actions(&mut self) {
        use VsmAction::*;
        match self.next {
            VsmState::ActiveNeutral => {
                self.push(SetTorqueEnabled(false));
                self.push(SetDirection(Direction::Neutral));
            }
            VsmState::ActiveForward => {
                self.push(SetDirection(Direction::Forward));
                self.push(SetTorqueEnabled(true));
            }
            VsmState::ActiveReverse => {
                self.push(SetDirection(Direction::Reverse));
                self.push(SetTorqueEnabled(true));
            }
            VsmState::Fault => {
                self.push(SetTorqueEnabled(false));
                self.push(DisableInverter);
                self.push(SetEcuError(true));
            }
            VsmState::Init | VsmState::LvStartup | VsmState::LvReady | VsmState::HvCharging => {}
        }
    }
}

/// Pure transition function.
///
/// `status` is this tick's fault classification; it is evaluated before any
/// input-driven transition so a FAULT moves to `Fault` on the same tick.
pub fn transition(state: VsmState, status: FaultStatus, inputs: &TransitionInputs) -> Transition {
    use VsmState::*;

    let faulted = matches!(status, FaultStatus::Fault);
    let lv_error = matches!(status, FaultStatus::LvError);

    match state {
        Init => Transition::to(LvStartup),
        Fault => Transition::stay(Fault),
        LvStartup if faulted => Transition::to(Fault),
        LvStartup if lv_error => Transition::stay(LvStartup),
        LvStartup => Transition::to(LvReady),
        _ if faulted || lv_error => Transition::to(Fault),
        LvReady if inputs.button_rising_edge => {
            let mut t = Transition::to(HvCharging);
            t.push(VsmAction::EnableInverter);
            t
        }
        LvReady => Transition::stay(LvReady),
        HvCharging if inputs.inverter_ready => Transition::to(ActiveNeutral),
        HvCharging if inputs.elapsed_ms > u64::from(inputs.hv_charge_timeout_ms) => {
            Transition::to(Fault)
        }
        HvCharging => Transition::stay(HvCharging),
        ActiveNeutral if inputs.button_rising_edge => Transition::to(ActiveForward),
        ActiveForward if inputs.button_rising_edge => Transition::to(ActiveReverse),
        ActiveReverse if inputs.button_rising_edge => Transition::to(ActiveNeutral),
        ActiveNeutral | ActiveForward | ActiveReverse => Transition::stay(state),
    }
}
