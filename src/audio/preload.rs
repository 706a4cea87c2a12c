//! Gapless preloading: single-flight bookkeeping for the next track's decode.
//!
//! The preloader never decodes by itself. The engine asks it whether a decode
//! is needed ([`Preloader::request`]), runs the decode on a worker, and feeds
//! the result back ([`Preloader::complete`]). At most one decode is in flight;
//! a request for a different target while one is running waits for it and is
//! handed back to the engine afterwards.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

use super::decode::LoadedTrack;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTarget {
    pub index: usize,
    pub path: PathBuf,
    /// Playlist generation the target was computed against.
    pub generation: u64,
}

impl PreloadTarget {
    fn matches(&self, index: usize, path: &Path, generation: u64) -> bool {
        self.index == index && self.path == path && self.generation == generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// A decoded buffer for this target is already waiting.
    Ready,
    /// The decode for this target is already running.
    Joined,
    /// Another decode is running; this target goes next.
    Queued,
    /// Start a decode and report back with this ticket.
    Start(u64),
}

#[derive(Debug, Default)]
pub struct Preloader {
    pending: Option<(PreloadTarget, LoadedTrack)>,
    in_flight: Option<(u64, PreloadTarget)>,
    waiting: Option<PreloadTarget>,
    next_ticket: u64,
}

impl Preloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, target: PreloadTarget) -> Request {
        if let Some((ready, _)) = &self.pending
            && *ready == target
        {
            return Request::Ready;
        }
        match &self.in_flight {
            Some((_, running)) if *running == target => Request::Joined,
            Some(_) => {
                self.waiting = Some(target);
                Request::Queued
            }
            None => {
                self.next_ticket += 1;
                let ticket = self.next_ticket;
                // Only one buffer is kept; the old one is no use for this cycle.
                self.pending = None;
                self.in_flight = Some((ticket, target));
                Request::Start(ticket)
            }
        }
    }

    /// Record a finished decode. Returns a queued target the engine should request next.
    pub fn complete(
        &mut self,
        ticket: u64,
        result: Result<LoadedTrack>,
        generation: u64,
    ) -> Option<PreloadTarget> {
        match &self.in_flight {
            Some((running, _)) if *running == ticket => {}
            _ => {
                debug!(ticket, "dropping result of a cancelled preload");
                return None;
            }
        }
        let (_, target) = self.in_flight.take()?;

        match result {
            Ok(loaded) if target.generation == generation => {
                debug!(index = target.index, path = %target.path.display(), "preload ready");
                self.pending = Some((target, loaded));
            }
            Ok(_) => {
                debug!(path = %target.path.display(), "discarding preload for a replaced playlist");
            }
            Err(e) => {
                warn!(path = %target.path.display(), error = %e, "preload failed");
            }
        }

        self.waiting.take().filter(|t| t.generation == generation)
    }

    /// Hand over the pending buffer if it is for exactly this entry.
    pub fn take(&mut self, index: usize, path: &Path, generation: u64) -> Option<LoadedTrack> {
        match &self.pending {
            Some((target, _)) if target.matches(index, path, generation) => {
                self.pending.take().map(|(_, loaded)| loaded)
            }
            _ => None,
        }
    }

    /// Drop anything computed against another playlist generation.
    ///
    /// A decode still running is left alone; its result is discarded when it lands.
    pub fn invalidate(&mut self, generation: u64) {
        if self
            .pending
            .as_ref()
            .is_some_and(|(t, _)| t.generation != generation)
        {
            debug!("discarding stale preload");
            self.pending = None;
        }
        if self
            .waiting
            .as_ref()
            .is_some_and(|t| t.generation != generation)
        {
            self.waiting = None;
        }
    }

    /// Forget everything, including the decode in flight.
    pub fn clear(&mut self) {
        self.pending = None;
        self.in_flight = None;
        self.waiting = None;
    }

    pub fn pending_target(&self) -> Option<&PreloadTarget> {
        self.pending.as_ref().map(|(t, _)| t)
    }

    pub fn in_flight(&self) -> Option<&PreloadTarget> {
        self.in_flight.as_ref().map(|(_, t)| t)
    }
}
