//! Overlay surface operations
//!
//! The presenter drives a surface through four operations and does not care
//! how it is drawn. Opacity animations are assumed to finish after the
//! requested duration; the presenter schedules its own completion for them.

use std::time::Duration;

use tracing::{debug, info};

use crate::capslock::CapsState;

/// Handle to a surface created by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create overlay surface: {0}")]
    SurfaceCreation(String),
}

pub trait OverlayRenderer {
    /// Create a surface showing `initial`, fully transparent
    fn create_surface(&mut self, initial: CapsState) -> Result<SurfaceId, RenderError>;

    /// Replace the content of a live surface
    fn update_content(&mut self, surface: SurfaceId, state: CapsState);

    /// Animate to `alpha` over `duration`
    fn set_opacity(&mut self, surface: SurfaceId, alpha: f64, duration: Duration);

    fn remove_surface(&mut self, surface: SurfaceId);
}

/// Renderer that reports surface operations through the log
#[derive(Debug, Default)]
pub struct LogRenderer {
    next_id: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayRenderer for LogRenderer {
    fn create_surface(&mut self, initial: CapsState) -> Result<SurfaceId, RenderError> {
        self.next_id += 1;
        let surface = SurfaceId(self.next_id);
        debug!(%surface, "overlay surface created");
        info!(%surface, "{}", initial);
        Ok(surface)
    }

    fn update_content(&mut self, surface: SurfaceId, state: CapsState) {
        info!(%surface, "{}", state);
    }

    fn set_opacity(&mut self, surface: SurfaceId, alpha: f64, duration: Duration) {
        debug!(
            %surface,
            alpha,
            duration_ms = duration.as_millis() as u64,
            "overlay opacity"
        );
    }

    fn remove_surface(&mut self, surface: SurfaceId) {
        debug!(%surface, "overlay surface removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_renderer_hands_out_fresh_ids() {
        let mut renderer = LogRenderer::new();
        let a = renderer.create_surface(CapsState::On).unwrap();
        renderer.remove_surface(a);
        let b = renderer.create_surface(CapsState::Off).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "surface#2");
    }
}
