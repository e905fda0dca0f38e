//! Caps Lock detection
//!
//! Uses a macOS CGEventTap to observe Caps Lock presses and modifier flag
//! changes system-wide, and reports each confirmed state change once.

mod detector;
mod keys;
mod permission;
mod tap;

pub use detector::CapsLockDetector;
pub use keys::{CapsState, DisableReason};
pub use permission::{Permission, SystemPermission};
pub use tap::{EventTapBackend, TapBackend, TapError, TapMessage, TapSender, TapSignal};
