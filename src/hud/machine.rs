//! Overlay presentation state machine
//!
//! Handles transitions between Hidden, Visible and FadingOut in response to
//! Caps Lock changes, the hide timer and fade-out completion. Time is passed
//! in explicitly; the caller sleeps until [`Presenter::next_wakeup`] and
//! hands the wake-up back through [`Presenter::on_wakeup`].

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::renderer::{OverlayRenderer, SurfaceId};
use super::timer::Deadline;
use crate::capslock::CapsState;
use crate::config::HudTiming;
use crate::events::HudEvent;

/// Visual state of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No surface on screen
    #[default]
    Hidden,
    /// Fully visible (or fading in) until the hide timer fires
    Visible { caps: CapsState },
    /// Fade-out animation in flight
    FadingOut { caps: CapsState },
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Hidden => write!(f, "Hidden"),
            Phase::Visible { caps } => write!(f, "Visible({})", caps),
            Phase::FadingOut { caps } => write!(f, "FadingOut({})", caps),
        }
    }
}

/// Something the presenter wants to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Hide timer deadline
    Hide { generation: u64, at: Instant },
    /// Fade-out animation finishes
    FadeComplete { generation: u64, at: Instant },
}

impl Wakeup {
    pub fn at(&self) -> Instant {
        match *self {
            Wakeup::Hide { at, .. } | Wakeup::FadeComplete { at, .. } => at,
        }
    }
}

/// Owns the single overlay session: its surface, hide timer and fade
pub struct Presenter<R> {
    renderer: R,
    timing: HudTiming,
    phase: Phase,
    surface: Option<SurfaceId>,
    /// Opacity the surface was last told to animate to
    target_alpha: f64,
    hide_timer: Deadline,
    fade_done: Deadline,
    event_tx: broadcast::Sender<HudEvent>,
}

impl<R: OverlayRenderer> Presenter<R> {
    pub fn new(renderer: R, timing: HudTiming, event_tx: broadcast::Sender<HudEvent>) -> Self {
        Self {
            renderer,
            timing,
            phase: Phase::Hidden,
            surface: None,
            target_alpha: 0.0,
            hide_timer: Deadline::new(),
            fade_done: Deadline::new(),
            event_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_timer.pending().map(|(_, at)| at)
    }

    /// React to a confirmed Caps Lock change
    pub fn on_change(&mut self, caps: CapsState, now: Instant) {
        self.show(caps, now);
    }

    /// Show `caps` and restart the hold. Re-showing the same state only
    /// re-asserts content and restarts the timer.
    pub fn show(&mut self, caps: CapsState, now: Instant) {
        match self.phase {
            Phase::Hidden => {
                let surface = match self.surface {
                    Some(surface) => {
                        self.renderer.update_content(surface, caps);
                        surface
                    }
                    None => match self.renderer.create_surface(caps) {
                        Ok(surface) => surface,
                        Err(e) => {
                            warn!(error = %e, "overlay not shown");
                            return;
                        }
                    },
                };
                self.surface = Some(surface);
                self.fade_to(surface, 1.0, self.timing.fade_in);
                self.arm_hide(caps, now);
                self.transition_to(Phase::Visible { caps }, HudEvent::Shown { caps });
            }
            Phase::Visible { .. } => {
                let Some(surface) = self.surface else { return };
                self.renderer.update_content(surface, caps);
                self.arm_hide(caps, now);
                self.transition_to(Phase::Visible { caps }, HudEvent::Updated { caps });
            }
            Phase::FadingOut { .. } => {
                let Some(surface) = self.surface else { return };
                self.fade_done.cancel();
                self.renderer.update_content(surface, caps);
                self.fade_to(surface, 1.0, self.timing.fade_in);
                self.arm_hide(caps, now);
                self.transition_to(Phase::Visible { caps }, HudEvent::Restored { caps });
            }
        }
    }

    /// Start fading out now. Ignored unless visible.
    pub fn hide(&mut self, now: Instant) {
        let Phase::Visible { caps } = self.phase else {
            debug!(phase = %self.phase, "hide ignored");
            return;
        };
        let Some(surface) = self.surface else { return };

        self.hide_timer.cancel();
        self.fade_to(surface, 0.0, self.timing.fade_out);
        self.fade_done.arm(now + self.timing.fade_out);
        self.transition_to(Phase::FadingOut { caps }, HudEvent::FadeOutStarted);
    }

    /// The earliest pending wake-up, if any
    pub fn next_wakeup(&self) -> Option<Wakeup> {
        if let Some((generation, at)) = self.hide_timer.pending() {
            return Some(Wakeup::Hide { generation, at });
        }
        self.fade_done
            .pending()
            .map(|(generation, at)| Wakeup::FadeComplete { generation, at })
    }

    /// Handle a wake-up previously returned by `next_wakeup`
    pub fn on_wakeup(&mut self, wakeup: Wakeup, now: Instant) {
        match wakeup {
            Wakeup::Hide { generation, .. } => {
                if self.hide_timer.fire(generation) {
                    self.hide(now);
                } else {
                    debug!(generation, "stale hide timer ignored");
                }
            }
            Wakeup::FadeComplete { generation, .. } => self.finish_fade(generation),
        }
    }

    /// Drop the timers and the surface. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.hide_timer.cancel();
        self.fade_done.cancel();
        if let Some(surface) = self.surface.take() {
            self.renderer.remove_surface(surface);
        }
        self.target_alpha = 0.0;
        if self.phase != Phase::Hidden {
            self.transition_to(Phase::Hidden, HudEvent::Hidden);
        }
    }

    fn finish_fade(&mut self, generation: u64) {
        if !self.fade_done.fire(generation) {
            debug!(generation, "stale fade completion ignored");
            return;
        }

        // A re-show may have raced ahead of this completion
        if !matches!(self.phase, Phase::FadingOut { .. }) || self.target_alpha > 0.0 {
            debug!(phase = %self.phase, "overlay visible again, keeping surface");
            return;
        }

        if let Some(surface) = self.surface.take() {
            self.renderer.remove_surface(surface);
        }
        self.transition_to(Phase::Hidden, HudEvent::Hidden);
    }

    fn fade_to(&mut self, surface: SurfaceId, alpha: f64, duration: std::time::Duration) {
        self.target_alpha = alpha;
        self.renderer.set_opacity(surface, alpha, duration);
    }

    /// Replace any pending hide timer with one for this state's hold
    fn arm_hide(&mut self, caps: CapsState, now: Instant) {
        let hold = self.timing.hold_for(caps);
        let generation = self.hide_timer.arm(now + hold);
        debug!(generation, hold_ms = hold.as_millis() as u64, "hide timer armed");
    }

    fn transition_to(&mut self, phase: Phase, event: HudEvent) {
        info!(from = %self.phase, to = %phase, "overlay transition");
        self.phase = phase;

        debug!(%event, "emitting hud event");
        let _ = self.event_tx.send(event);
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}
