//! Fakes for the permission, tap and renderer seams

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::capslock::{CapsState, Permission, TapBackend, TapError, TapSender, TapSignal};
use crate::hud::{OverlayRenderer, RenderError, SurfaceId};

#[derive(Debug, Clone, Default)]
pub struct FakePermission {
    granted: Arc<AtomicBool>,
    prompts: Arc<AtomicUsize>,
}

impl FakePermission {
    pub fn granted() -> Self {
        let permission = Self::default();
        permission.grant();
        permission
    }

    pub fn denied() -> Self {
        Self::default()
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.granted.store(false, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl Permission for FakePermission {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_with_prompt(&self) {
        self.prompts.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct TapInner {
    initial: Option<CapsState>,
    fail_next: bool,
    sender: Option<TapSender>,
    attaches: usize,
    detaches: usize,
}

/// Tap that hands its sender back to the test
#[derive(Debug, Clone, Default)]
pub struct FakeTap {
    inner: Arc<Mutex<TapInner>>,
}

impl FakeTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `initial` on attach, like the OS tap does
    pub fn with_initial(initial: CapsState) -> Self {
        let tap = Self::default();
        tap.inner.lock().unwrap().initial = Some(initial);
        tap
    }

    pub fn fail_next_attach(&self) {
        self.inner.lock().unwrap().fail_next = true;
    }

    pub fn sender(&self) -> Option<TapSender> {
        self.inner.lock().unwrap().sender.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().unwrap().sender.is_some()
    }

    pub fn attaches(&self) -> usize {
        self.inner.lock().unwrap().attaches
    }

    pub fn detaches(&self) -> usize {
        self.inner.lock().unwrap().detaches
    }

    /// Send through the live session; false when detached
    pub fn emit(&self, signal: TapSignal) -> bool {
        match self.sender() {
            Some(sender) => sender.send(signal),
            None => false,
        }
    }
}

impl TapBackend for FakeTap {
    fn attach(&mut self, sender: TapSender) -> Result<(), TapError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next {
            inner.fail_next = false;
            return Err(TapError::TapCreation);
        }
        if inner.sender.is_some() {
            return Err(TapError::AlreadyAttached);
        }
        if let Some(initial) = inner.initial {
            sender.send(TapSignal::Attached { initial });
        }
        inner.sender = Some(sender);
        inner.attaches += 1;
        Ok(())
    }

    fn detach(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.sender.take().is_some() {
            inner.detaches += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Create(SurfaceId, CapsState),
    Update(SurfaceId, CapsState),
    Opacity(SurfaceId, f64, Duration),
    Remove(SurfaceId),
}

#[derive(Debug, Default)]
struct RenderLog {
    ops: Vec<(Instant, RenderOp)>,
    next_id: u64,
    fail_next: bool,
}

/// Renderer that records every call with the (possibly paused) clock
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_create(&self) {
        self.log.lock().unwrap().fail_next = true;
    }

    pub fn ops(&self) -> Vec<RenderOp> {
        self.timed_ops().into_iter().map(|(_, op)| op).collect()
    }

    pub fn timed_ops(&self) -> Vec<(Instant, RenderOp)> {
        self.log.lock().unwrap().ops.clone()
    }

    pub fn count(&self, pred: impl Fn(&RenderOp) -> bool) -> usize {
        self.log.lock().unwrap().ops.iter().filter(|(_, op)| pred(op)).count()
    }

    pub fn created(&self) -> Vec<SurfaceId> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RenderOp::Create(surface, _) => Some(surface),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: RenderOp) {
        self.log.lock().unwrap().ops.push((Instant::now(), op));
    }
}

impl OverlayRenderer for RecordingRenderer {
    fn create_surface(&mut self, initial: CapsState) -> Result<SurfaceId, RenderError> {
        let surface = {
            let mut log = self.log.lock().unwrap();
            if log.fail_next {
                log.fail_next = false;
                return Err(RenderError::SurfaceCreation("window server unavailable".into()));
            }
            log.next_id += 1;
            SurfaceId(log.next_id)
        };
        self.record(RenderOp::Create(surface, initial));
        Ok(surface)
    }

    fn update_content(&mut self, surface: SurfaceId, state: CapsState) {
        self.record(RenderOp::Update(surface, state));
    }

    fn set_opacity(&mut self, surface: SurfaceId, alpha: f64, duration: Duration) {
        self.record(RenderOp::Opacity(surface, alpha, duration));
    }

    fn remove_surface(&mut self, surface: SurfaceId) {
        self.record(RenderOp::Remove(surface));
    }
}
