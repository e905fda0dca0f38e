//! Caps Lock key definitions and change tracking
//!
//! Provides the macOS key code and flag mask for Caps Lock, the platform
//! neutral input event record, the filter that turns an event into a
//! candidate state, and the dedup gate that decides whether a candidate is a
//! real change.

use serde::{Deserialize, Serialize};

/// Virtual key code of the physical Caps Lock key
pub const CAPS_LOCK_KEYCODE: u16 = 57;

/// Modifier flag masks from macOS CGEventFlags
pub mod flags {
    /// kCGEventFlagMaskAlphaShift, set while Caps Lock is engaged
    pub const ALPHA_SHIFT: u64 = 0x0001_0000;
}

/// Logical state of the Caps Lock modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsState {
    On,
    Off,
}

impl CapsState {
    /// Read the Caps Lock bit out of a modifier flag bitset
    pub fn from_flags(bits: u64) -> Self {
        Self::from(bits & flags::ALPHA_SHIFT != 0)
    }
}

impl From<bool> for CapsState {
    fn from(on: bool) -> Self {
        if on {
            CapsState::On
        } else {
            CapsState::Off
        }
    }
}

impl std::fmt::Display for CapsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapsState::On => write!(f, "Caps Lock On"),
            CapsState::Off => write!(f, "Caps Lock Off"),
        }
    }
}

/// Why the OS switched the tap off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    Timeout,
    UserInput,
}

/// A raw event as delivered by the event tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// One or more modifier bits changed; carries the full bitset
    FlagsChanged { flags: u64 },
    /// A key went down
    KeyDown { keycode: u16 },
    /// The OS disabled the tap as a safety measure
    TapDisabled(DisableReason),
}

/// Compute the candidate Caps Lock state for a raw event.
///
/// Key-down of Caps Lock reads the live modifier flags through
/// `current_flags`, since the OS may not have toggled the bit yet when the
/// event is delivered and may suppress the flags-changed event entirely on
/// rapid presses. `current_flags` is only called for that case.
pub fn candidate_state(event: &InputEvent, current_flags: impl FnOnce() -> u64) -> Option<CapsState> {
    match *event {
        InputEvent::FlagsChanged { flags } => Some(CapsState::from_flags(flags)),
        InputEvent::KeyDown { keycode } if keycode == CAPS_LOCK_KEYCODE => {
            Some(CapsState::from_flags(current_flags()))
        }
        InputEvent::KeyDown { .. } | InputEvent::TapDisabled(_) => None,
    }
}

/// Holds the last observed Caps Lock state and filters out repeats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeGate {
    last: Option<CapsState>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last confirmed state, `None` before the first reading
    pub fn last(&self) -> Option<CapsState> {
        self.last
    }

    /// Record a baseline without reporting it as a change
    pub fn prime(&mut self, state: CapsState) {
        self.last = Some(state);
    }

    /// Returns the candidate if it differs from the last observed state,
    /// updating the record in the same step.
    pub fn observe(&mut self, candidate: CapsState) -> Option<CapsState> {
        if self.last == Some(candidate) {
            return None;
        }
        self.last = Some(candidate);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_event(on: bool) -> InputEvent {
        InputEvent::FlagsChanged {
            flags: if on { flags::ALPHA_SHIFT | 0x100 } else { 0x100 },
        }
    }

    #[test]
    fn test_flags_changed_reads_alpha_shift_bit() {
        let never = || -> u64 { panic!("flags-changed must not query live flags") };
        assert_eq!(candidate_state(&flags_event(true), never), Some(CapsState::On));
        assert_eq!(candidate_state(&flags_event(false), never), Some(CapsState::Off));
    }

    #[test]
    fn test_caps_key_down_queries_live_flags() {
        let event = InputEvent::KeyDown {
            keycode: CAPS_LOCK_KEYCODE,
        };
        let mut queried = false;
        let state = candidate_state(&event, || {
            queried = true;
            flags::ALPHA_SHIFT
        });
        assert!(queried);
        assert_eq!(state, Some(CapsState::On));
    }

    #[test]
    fn test_other_key_down_ignored() {
        let event = InputEvent::KeyDown { keycode: 0 };
        assert_eq!(candidate_state(&event, || flags::ALPHA_SHIFT), None);
    }

    #[test]
    fn test_tap_disabled_is_not_a_state() {
        for reason in [DisableReason::Timeout, DisableReason::UserInput] {
            let event = InputEvent::TapDisabled(reason);
            assert_eq!(candidate_state(&event, || flags::ALPHA_SHIFT), None);
        }
    }

    #[test]
    fn test_gate_emits_first_reading() {
        let mut gate = ChangeGate::new();
        assert_eq!(gate.last(), None);
        assert_eq!(gate.observe(CapsState::Off), Some(CapsState::Off));
        assert_eq!(gate.last(), Some(CapsState::Off));
    }

    #[test]
    fn test_gate_drops_repeats() {
        let mut gate = ChangeGate::new();
        gate.prime(CapsState::On);
        assert_eq!(gate.observe(CapsState::On), None);
        assert_eq!(gate.observe(CapsState::Off), Some(CapsState::Off));
        assert_eq!(gate.observe(CapsState::Off), None);
    }

    #[test]
    fn test_gate_emits_once_per_value_change() {
        let sequences: &[&[bool]] = &[
            &[false, true],
            &[true, true, true],
            &[false, true, true, false, false, true],
            &[true, false, true, false, true, false],
            &[false, false, false, true, true, true, false],
        ];

        for seq in sequences {
            let mut gate = ChangeGate::new();
            gate.prime(seq[0].into());

            let emitted = seq
                .iter()
                .filter_map(|&on| gate.observe(on.into()))
                .count();
            let changes = seq.windows(2).filter(|w| w[0] != w[1]).count();

            assert_eq!(emitted, changes, "sequence {:?}", seq);
        }
    }

    #[test]
    fn test_caps_state_display() {
        assert_eq!(CapsState::On.to_string(), "Caps Lock On");
        assert_eq!(CapsState::from(false).to_string(), "Caps Lock Off");
    }
}
