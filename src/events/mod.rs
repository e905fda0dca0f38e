//! Events module for overlay transitions
//!
//! Every transition of the presenter is published as a [`HudEvent`] so the
//! rest of the agent can log or observe the overlay without touching it.

use serde::{Deserialize, Serialize};

use crate::capslock::CapsState;

/// Events emitted by the presenter during transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HudEvent {
    /// Overlay created and fading in
    Shown { caps: CapsState },

    /// Content replaced while visible; hide timer restarted
    Updated { caps: CapsState },

    /// Fade-out interrupted by a new change; back to fully visible
    Restored { caps: CapsState },

    /// Hide timer fired, fading out
    FadeOutStarted,

    /// Fade-out finished and the surface was removed
    Hidden,
}

impl std::fmt::Display for HudEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HudEvent::Shown { caps } => write!(f, "SHOWN ({})", caps),
            HudEvent::Updated { caps } => write!(f, "UPDATED ({})", caps),
            HudEvent::Restored { caps } => write!(f, "RESTORED ({})", caps),
            HudEvent::FadeOutStarted => write!(f, "FADE_OUT_STARTED"),
            HudEvent::Hidden => write!(f, "HIDDEN"),
        }
    }
}
