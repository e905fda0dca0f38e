//! Cancellable one-shot deadline guarded by a generation counter

use tokio::time::Instant;

/// A single pending deadline. Arming replaces whatever was pending, and a
/// firing only counts if it carries the current generation.
#[derive(Debug, Default)]
pub struct Deadline {
    generation: u64,
    at: Option<Instant>,
}

impl Deadline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `at`, invalidating any previous arming
    pub fn arm(&mut self, at: Instant) -> u64 {
        self.generation += 1;
        self.at = Some(at);
        self.generation
    }

    pub fn cancel(&mut self) {
        if self.at.take().is_some() {
            self.generation += 1;
        }
    }

    /// Generation and instant of the pending deadline
    pub fn pending(&self) -> Option<(u64, Instant)> {
        self.at.map(|at| (self.generation, at))
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Consume the deadline if `generation` is still current
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.at.is_none() || generation != self.generation {
            return false;
        }
        self.at = None;
        true
    }
}
