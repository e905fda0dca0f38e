//! Transient overlay presentation
//!
//! Provides the presenter state machine with three phases:
//! - Hidden: no surface
//! - Visible: shown, hide timer pending
//! - FadingOut: fade-out in flight, interruptible by a new change

mod machine;
mod renderer;
mod timer;

pub use machine::Presenter;
pub use renderer::{LogRenderer, OverlayRenderer, RenderError, SurfaceId};
