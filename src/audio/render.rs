use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::chain::SignalChain;
use super::decode::SampleBuffer;
use crate::error::Result;

pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Holds at most one completion callback. Firing consumes it.
#[derive(Clone, Default)]
pub struct CompletionSlot {
    inner: Arc<Mutex<Option<CompletionCallback>>>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<CompletionCallback>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn attach(&self, callback: CompletionCallback) {
        *self.slot() = Some(callback);
    }

    /// Remove the callback without running it.
    pub fn detach(&self) {
        self.slot().take();
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    /// Run the callback if one is still attached. Returns whether it ran.
    pub fn fire(&self) -> bool {
        // Take under the lock, call outside it.
        let callback = self.slot().take();
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Everything a backend needs to start rendering one buffer.
pub struct RenderRequest {
    pub buffer: Arc<SampleBuffer>,
    /// Start position in seconds.
    pub offset: f64,
    /// Playback speed; 1.0 is normal.
    pub rate: f64,
    pub chain: SignalChain,
    pub completion: CompletionSlot,
}

pub trait RenderBackend {
    fn start(&mut self, request: RenderRequest) -> Result<Box<dyn RenderNode>>;
}

/// A running render node. Stopping must not fire the completion slot.
pub trait RenderNode: Send {
    fn stop(&mut self);
}
