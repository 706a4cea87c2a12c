//! Playback transport for a single decoded buffer.
//!
//! Position is never read back from the renderer. While playing it is
//! `(now - start_reference) * rate` on the shared clock; otherwise it is the
//! stored `paused_offset`. Every teardown detaches the completion callback before
//! stopping the node, so only a node that runs out on its own reports an end.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{EngineError, Result};

use super::chain::SignalChain;
use super::clock::Clock;
use super::decode::SampleBuffer;
use super::render::{CompletionSlot, RenderBackend, RenderNode, RenderRequest};
use super::types::TransportState;

/// Slowest and fastest playback rates.
pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 4.0;

/// Called with the node id when a node reaches the end of its buffer.
pub type EndNotifier = Arc<dyn Fn(u64) + Send + Sync>;

struct ActiveNode {
    id: u64,
    handle: Box<dyn RenderNode>,
    completion: CompletionSlot,
}

pub struct Transport<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    chain: SignalChain,
    on_end: EndNotifier,
    epsilon: f64,
    buffer: Option<Arc<SampleBuffer>>,
    duration: f64,
    state: TransportState,
    paused_offset: f64,
    start_reference: f64,
    volume: f32,
    rate: f64,
    node: Option<ActiveNode>,
    next_node_id: u64,
    render_starts: u64,
}

impl<B> fmt::Debug for Transport<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state)
            .field("duration", &self.duration)
            .field("paused_offset", &self.paused_offset)
            .field("start_reference", &self.start_reference)
            .field("volume", &self.volume)
            .field("rate", &self.rate)
            .field("node", &self.node.as_ref().map(|n| n.id))
            .finish()
    }
}

impl<B: RenderBackend> Transport<B> {
    pub fn new(
        backend: B,
        clock: Arc<dyn Clock>,
        chain: SignalChain,
        epsilon: f64,
        on_end: EndNotifier,
    ) -> Self {
        let volume = chain.volume();
        Self {
            backend,
            clock,
            chain,
            on_end,
            epsilon: epsilon.max(0.0),
            buffer: None,
            duration: 0.0,
            state: TransportState::Stopped,
            paused_offset: 0.0,
            start_reference: 0.0,
            volume,
            rate: 1.0,
            node: None,
            next_node_id: 0,
            render_starts: 0,
        }
    }

    /// Make `buffer` the one to play. Stops whatever is rendering.
    pub fn set_buffer(&mut self, buffer: Option<Arc<SampleBuffer>>) {
        self.teardown();
        self.duration = buffer.as_ref().map_or(0.0, |b| b.duration());
        self.buffer = buffer;
        self.state = TransportState::Stopped;
        self.paused_offset = 0.0;
        self.start_reference = 0.0;
    }

    pub fn set_duration(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.duration = duration;
        }
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Start or resume. `Ok(false)` means it was already playing.
    pub fn play(&mut self) -> Result<bool> {
        if self.state == TransportState::Playing {
            return Ok(false);
        }
        if self.buffer.is_none() {
            return Err(EngineError::NoTrack);
        }
        self.teardown();

        let latest = (self.duration - self.epsilon).max(0.0);
        let wanted = self.paused_offset.clamp(0.0, latest);
        let offset = match self.start_node(self.render_offset(wanted)) {
            Ok(()) => wanted,
            Err(first) => {
                warn!(offset = wanted, error = %first, "render start failed, retrying from 0");
                if let Err(second) = self.start_node(0.0) {
                    self.state = TransportState::Stopped;
                    self.paused_offset = 0.0;
                    return Err(match second {
                        EngineError::RenderStart(_) => second,
                        other => EngineError::RenderStart(other.to_string()),
                    });
                }
                0.0
            }
        };

        self.start_reference = self.clock.now() - offset / self.rate;
        self.state = TransportState::Playing;
        debug!(offset, rate = self.rate, "transport playing");
        Ok(true)
    }

    /// Returns false if nothing was playing.
    pub fn pause(&mut self) -> bool {
        if self.state != TransportState::Playing {
            return false;
        }
        let elapsed = (self.clock.now() - self.start_reference) * self.rate;
        let position = if elapsed.is_finite() && elapsed >= 0.0 && elapsed < self.duration {
            elapsed
        } else {
            self.position()
        };
        let latest = (self.duration - self.epsilon).max(0.0);
        self.paused_offset = position.clamp(0.0, latest);
        self.teardown();
        self.state = TransportState::Paused;
        debug!(offset = self.paused_offset, "transport paused");
        true
    }

    /// Rewind to 0. Returns whether it was playing.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.state == TransportState::Playing;
        self.teardown();
        self.state = TransportState::Stopped;
        self.paused_offset = 0.0;
        self.start_reference = 0.0;
        was_playing
    }

    /// Jump to `t` seconds, clamped into the track. Returns the new position.
    pub fn seek(&mut self, t: f64) -> Result<f64> {
        if self.buffer.is_none() {
            return Err(EngineError::NoTrack);
        }
        let target = if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, self.duration)
        };
        let was_playing = self.state == TransportState::Playing;
        self.teardown();
        self.paused_offset = target;
        self.state = TransportState::Paused;
        if was_playing {
            self.play()?;
        }
        Ok(self.position())
    }

    pub fn position(&self) -> f64 {
        match self.state {
            TransportState::Playing => {
                ((self.clock.now() - self.start_reference) * self.rate).clamp(0.0, self.duration)
            }
            TransportState::Paused | TransportState::Stopped => self.paused_offset,
        }
    }

    /// Clamp into `[0, 1]` and apply right away. Returns the stored value.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        self.chain.set_volume(volume);
        volume
    }

    /// Change the playback rate, clamped to `[MIN_RATE, MAX_RATE]`.
    ///
    /// Returns the new rate, or `None` when nothing changed. A playing
    /// transport restarts from its current position at the new rate.
    pub fn set_rate(&mut self, rate: f64) -> Result<Option<f64>> {
        if rate.is_nan() {
            return Ok(None);
        }
        let rate = rate.clamp(MIN_RATE, MAX_RATE);
        if rate == self.rate {
            return Ok(None);
        }
        if self.state == TransportState::Playing {
            let position = self.position();
            self.teardown();
            self.paused_offset = position;
            self.state = TransportState::Paused;
            self.rate = rate;
            self.play()?;
        } else {
            self.rate = rate;
        }
        debug!(rate, "playback rate changed");
        Ok(Some(rate))
    }

    /// A node ran out of samples. Ignored unless `node` is the active one.
    pub fn finish_natural(&mut self, node: u64) -> bool {
        match &self.node {
            Some(active) if active.id == node => {}
            _ => {
                debug!(node, "ignoring end of a retired render node");
                return false;
            }
        }
        self.node = None;
        self.state = TransportState::Stopped;
        self.paused_offset = 0.0;
        self.start_reference = 0.0;
        true
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn paused_offset(&self) -> f64 {
        self.paused_offset
    }

    pub fn start_reference(&self) -> f64 {
        self.start_reference
    }

    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }

    /// Id of the render node currently running, if any.
    pub fn active_node(&self) -> Option<u64> {
        self.node.as_ref().map(|n| n.id)
    }

    /// How many render nodes have been started so far.
    pub fn render_starts(&self) -> u64 {
        self.render_starts
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Where rendering can start for a track position. Tag durations can run
    /// past the decoded audio; such positions start on the last moment of the buffer.
    fn render_offset(&self, position: f64) -> f64 {
        let audible = self.buffer.as_ref().map_or(0.0, |b| b.duration());
        position.min((audible - self.epsilon).max(0.0))
    }

    fn start_node(&mut self, offset: f64) -> Result<()> {
        let buffer = self.buffer.clone().ok_or(EngineError::NoTrack)?;
        self.next_node_id += 1;
        let id = self.next_node_id;

        let completion = CompletionSlot::new();
        let notify = Arc::clone(&self.on_end);
        completion.attach(Box::new(move || notify(id)));

        let handle = self.backend.start(RenderRequest {
            buffer,
            offset,
            rate: self.rate,
            chain: self.chain.clone(),
            completion: completion.clone(),
        })?;
        self.render_starts += 1;
        self.node = Some(ActiveNode {
            id,
            handle,
            completion,
        });
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.completion.detach();
            node.handle.stop();
        }
    }
}

impl<B> Drop for Transport<B> {
    fn drop(&mut self) {
        if let Some(mut node) = self.node.take() {
            node.completion.detach();
            node.handle.stop();
        }
    }
}
