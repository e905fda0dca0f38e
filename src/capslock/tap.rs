//! Global event tap for Caps Lock activity
//!
//! The tap runs on a dedicated thread with its own CFRunLoop. Its callback
//! only classifies the raw event and hands a single message to the
//! presentation loop; all state lives on the other side of the channel.

use tokio::sync::mpsc;

use super::keys::{CapsState, DisableReason};

#[cfg(target_os = "macos")]
pub use macos::EventTapBackend;
#[cfg(not(target_os = "macos"))]
pub use unsupported::EventTapBackend;

/// What the tap thread reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapSignal {
    /// Tap is live; carries the OS caps state at attach time
    Attached { initial: CapsState },
    /// A filtered event produced this candidate state
    Candidate(CapsState),
    /// The OS disabled the tap and it has been switched back on
    Reenabled(DisableReason),
}

/// A signal tagged with the attach session that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapMessage {
    pub session: u64,
    pub signal: TapSignal,
}

/// Sending half handed to a backend on attach
#[derive(Debug, Clone)]
pub struct TapSender {
    session: u64,
    tx: mpsc::UnboundedSender<TapMessage>,
}

impl TapSender {
    pub fn new(session: u64, tx: mpsc::UnboundedSender<TapMessage>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Never blocks. Returns false once the presentation loop is gone.
    pub fn send(&self, signal: TapSignal) -> bool {
        self.tx
            .send(TapMessage {
                session: self.session,
                signal,
            })
            .is_ok()
    }
}

/// Errors that can occur while attaching the tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("event tap is already attached")]
    AlreadyAttached,

    #[error("failed to create event tap - check Accessibility permissions")]
    TapCreation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("failed to spawn tap thread: {0}")]
    ThreadSpawn(String),

    #[error("global event taps are not supported on this platform")]
    Unsupported,
}

/// A live subscription to the system input stream
pub trait TapBackend {
    /// Install the tap. Returns once the tap is live or has failed.
    fn attach(&mut self, sender: TapSender) -> Result<(), TapError>;

    /// Remove the tap. No signal is sent after this returns. Safe to call
    /// when nothing is attached.
    fn detach(&mut self);
}

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use core_foundation::base::TCFType;
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{debug, error, info, warn};

    use super::{TapBackend, TapError, TapSender, TapSignal};
    use crate::capslock::keys::{candidate_state, CapsState, DisableReason, InputEvent};

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGEventTapEnable(tap: *mut c_void, enable: bool);
        fn CGEventSourceFlagsState(state_id: i32) -> u64;
    }

    /// kCGEventSourceStateCombinedSessionState
    const COMBINED_SESSION_STATE: i32 = 0;

    /// How long the run loop runs before the stop flag is checked again
    const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

    /// Live modifier flags, independent of any event payload
    fn current_flags() -> u64 {
        unsafe { CGEventSourceFlagsState(COMBINED_SESSION_STATE) }
    }

    fn set_tap_enabled(port: &AtomicPtr<c_void>, enable: bool) {
        let port = port.load(Ordering::SeqCst);
        if !port.is_null() {
            unsafe { CGEventTapEnable(port, enable) };
        }
    }

    /// CGEventTap backend running on its own thread
    pub struct EventTapBackend {
        running: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    }

    impl EventTapBackend {
        pub fn new() -> Self {
            Self {
                running: Arc::new(AtomicBool::new(false)),
                thread: None,
            }
        }
    }

    impl Default for EventTapBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TapBackend for EventTapBackend {
        fn attach(&mut self, sender: TapSender) -> Result<(), TapError> {
            if self.thread.is_some() {
                return Err(TapError::AlreadyAttached);
            }

            self.running.store(true, Ordering::SeqCst);
            let running = Arc::clone(&self.running);
            let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

            let handle = thread::Builder::new()
                .name("capslock-tap".to_string())
                .spawn(move || {
                    info!(session = sender.session(), "tap thread started");
                    run_event_loop(sender, running, ready_tx);
                    info!("tap thread stopped");
                })
                .map_err(|e| {
                    self.running.store(false, Ordering::SeqCst);
                    TapError::ThreadSpawn(e.to_string())
                })?;

            let result = ready_rx.recv().unwrap_or(Err(TapError::TapCreation));
            match result {
                Ok(()) => {
                    self.thread = Some(handle);
                    Ok(())
                }
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    if handle.join().is_err() {
                        warn!("tap thread panicked during setup");
                    }
                    Err(e)
                }
            }
        }

        fn detach(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.thread.take() {
                if handle.join().is_err() {
                    warn!("tap thread panicked");
                }
                debug!("event tap detached");
            }
        }
    }

    impl Drop for EventTapBackend {
        fn drop(&mut self) {
            self.detach();
        }
    }

    /// Create the tap, report readiness, then run the CFRunLoop until stopped
    fn run_event_loop(
        sender: TapSender,
        running: Arc<AtomicBool>,
        ready: std_mpsc::SyncSender<Result<(), TapError>>,
    ) {
        let port = Arc::new(AtomicPtr::new(std::ptr::null_mut()));
        let callback_port = Arc::clone(&port);
        let callback_sender = sender.clone();

        // Runs on the privileged callback context - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
                             -> Option<CGEvent> {
            let input = match event_type {
                CGEventType::FlagsChanged => InputEvent::FlagsChanged {
                    flags: event.get_flags().bits(),
                },
                CGEventType::KeyDown => InputEvent::KeyDown {
                    keycode: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE)
                        as u16,
                },
                CGEventType::TapDisabledByTimeout => {
                    InputEvent::TapDisabled(DisableReason::Timeout)
                }
                CGEventType::TapDisabledByUserInput => {
                    InputEvent::TapDisabled(DisableReason::UserInput)
                }
                _ => return Some(event.clone()),
            };

            if let InputEvent::TapDisabled(reason) = input {
                set_tap_enabled(&callback_port, true);
                callback_sender.send(TapSignal::Reenabled(reason));
            } else if let Some(candidate) = candidate_state(&input, current_flags) {
                callback_sender.send(TapSignal::Candidate(candidate));
            }

            Some(event.clone())
        };

        let tap = match CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::FlagsChanged, CGEventType::KeyDown],
            callback,
        ) {
            Ok(tap) => tap,
            Err(()) => {
                error!("failed to create event tap - is Accessibility permission granted?");
                let _ = ready.send(Err(TapError::TapCreation));
                return;
            }
        };

        port.store(
            tap.mach_port.as_concrete_TypeRef() as *mut c_void,
            Ordering::SeqCst,
        );

        let source = match tap.mach_port.create_runloop_source(0) {
            Ok(source) => source,
            Err(()) => {
                error!("failed to create run loop source for event tap");
                port.store(std::ptr::null_mut(), Ordering::SeqCst);
                let _ = ready.send(Err(TapError::RunLoopSource));
                return;
            }
        };

        let run_loop = CFRunLoop::get_current();
        unsafe {
            run_loop.add_source(&source, kCFRunLoopCommonModes);
        }
        tap.enable();

        let initial = CapsState::from_flags(current_flags());
        sender.send(TapSignal::Attached { initial });
        info!(%initial, "event tap created and enabled");
        let _ = ready.send(Ok(()));

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
            }
        }

        set_tap_enabled(&port, false);
        unsafe {
            run_loop.remove_source(&source, kCFRunLoopCommonModes);
        }
        port.store(std::ptr::null_mut(), Ordering::SeqCst);
    }
}

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use super::{TapBackend, TapError, TapSender};

    /// Stand-in for platforms without a global event tap; never attaches
    #[derive(Debug, Default)]
    pub struct EventTapBackend;

    impl EventTapBackend {
        pub fn new() -> Self {
            Self
        }
    }

    impl TapBackend for EventTapBackend {
        fn attach(&mut self, _sender: TapSender) -> Result<(), TapError> {
            Err(TapError::Unsupported)
        }

        fn detach(&mut self) {}
    }
}
