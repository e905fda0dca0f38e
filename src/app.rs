//! Presentation loop
//!
//! The one place where detector and presenter state is mutated. Tap
//! messages, the presenter's wake-ups, the permission poll and the shutdown
//! signal are multiplexed here, so no two transitions ever run concurrently.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::info;

use crate::capslock::{CapsLockDetector, Permission, TapBackend, TapMessage};
use crate::config::Config;
use crate::events::HudEvent;
use crate::hud::{OverlayRenderer, Presenter};

pub struct App<P, T, R> {
    detector: CapsLockDetector<P, T>,
    presenter: Presenter<R>,
    tap_rx: mpsc::UnboundedReceiver<TapMessage>,
}

impl<P, T, R> App<P, T, R>
where
    P: Permission,
    T: TapBackend,
    R: OverlayRenderer,
{
    pub fn new(
        permission: P,
        backend: T,
        renderer: R,
        config: &Config,
        event_tx: broadcast::Sender<HudEvent>,
    ) -> Self {
        // Unbounded so the tap callback never blocks
        let (tap_tx, tap_rx) = mpsc::unbounded_channel();

        Self {
            detector: CapsLockDetector::new(
                permission,
                backend,
                config.permission_poll_interval,
                tap_tx,
            ),
            presenter: Presenter::new(renderer, config.timing, event_tx),
            tap_rx,
        }
    }

    /// Start the detector and process events until `shutdown` resolves,
    /// then detach the tap and remove the overlay.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.detector.start(Instant::now());
        info!(detector = %self.detector.state(), "presentation loop started");

        tokio::pin!(shutdown);

        loop {
            let wakeup = self.presenter.next_wakeup();
            let poll = self.detector.next_poll();
            let now = Instant::now();

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }

                Some(msg) = self.tap_rx.recv() => {
                    if let Some(caps) = self.detector.handle_message(msg) {
                        self.presenter.on_change(caps, Instant::now());
                    }
                }

                _ = sleep_until(wakeup.map_or(now, |w| w.at())), if wakeup.is_some() => {
                    if let Some(wakeup) = wakeup {
                        self.presenter.on_wakeup(wakeup, Instant::now());
                    }
                }

                _ = sleep_until(poll.unwrap_or(now)), if poll.is_some() => {
                    self.detector.poll_permission(Instant::now());
                }
            }
        }

        self.detector.stop();
        self.presenter.shutdown();
        info!("presentation loop stopped");
    }
}
