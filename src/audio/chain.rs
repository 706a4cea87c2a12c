//! Signal chain: routing between the source, the ten filter stages and the
//! output gain.
//!
//! The graph is described by a [`Routing`] tag and rebuilt from it by
//! [`topology`]. Switching routing swaps the whole edge list in one step; the
//! render node keeps running and only the path its samples take changes.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::Source;
use tracing::debug;

use super::equalizer::{BAND_COUNT, Equalizer, FilterBank};
use super::render::CompletionSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// source -> gain -> output
    Direct,
    /// source -> band 0 .. band 9 -> gain -> output
    Filtered,
}

impl Routing {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Filtered } else { Self::Direct }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Direct => 0,
            Self::Filtered => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        if v == 1 { Self::Filtered } else { Self::Direct }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Source,
    Band(usize),
    Gain,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Node,
    pub to: Node,
}

/// The edges for a routing mode.
pub fn topology(routing: Routing) -> Vec<Edge> {
    let mut nodes = vec![Node::Source];
    if routing == Routing::Filtered {
        nodes.extend((0..BAND_COUNT).map(Node::Band));
    }
    nodes.push(Node::Gain);
    nodes.push(Node::Output);
    nodes
        .windows(2)
        .map(|pair| Edge {
            from: pair[0],
            to: pair[1],
        })
        .collect()
}

struct ChainShared {
    equalizer: Equalizer,
    routing: AtomicU8,
    volume_bits: AtomicU32,
    edges: Mutex<Vec<Edge>>,
}

/// Shared between the control thread and every render node built from it.
#[derive(Clone)]
pub struct SignalChain {
    shared: Arc<ChainShared>,
}

impl SignalChain {
    pub fn new(equalizer: Equalizer, routing: Routing) -> Self {
        Self {
            shared: Arc::new(ChainShared {
                equalizer,
                routing: AtomicU8::new(routing.to_u8()),
                volume_bits: AtomicU32::new(1.0f32.to_bits()),
                edges: Mutex::new(topology(routing)),
            }),
        }
    }

    /// Rewire to `routing`. Returns false if it was already in place.
    pub fn reconnect(&self, routing: Routing) -> bool {
        let mut edges = self
            .shared
            .edges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.routing() == routing {
            return false;
        }
        *edges = topology(routing);
        self.shared.routing.store(routing.to_u8(), Ordering::Release);
        debug!(?routing, "signal chain rewired");
        true
    }

    pub fn routing(&self) -> Routing {
        Routing::from_u8(self.shared.routing.load(Ordering::Acquire))
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.shared
            .edges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared
            .volume_bits
            .store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume_bits.load(Ordering::Relaxed))
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.shared.equalizer
    }

    /// Wrap `input` so it runs through this chain and reports its own end.
    pub fn wrap<I: Source>(&self, input: I, completion: CompletionSlot) -> ChainSource<I> {
        ChainSource::new(input, self.clone(), completion)
    }
}

/// Render-side source: routing, equalizer and volume applied per sample.
pub struct ChainSource<I: Source> {
    input: I,
    chain: SignalChain,
    filters: FilterBank,
    completion: CompletionSlot,
    channels: usize,
    channel: usize,
    filtering: bool,
    finished: bool,
}

impl<I: Source> ChainSource<I> {
    fn new(input: I, chain: SignalChain, completion: CompletionSlot) -> Self {
        let channels = input.channels().max(1);
        let filters = FilterBank::new(chain.equalizer().clone(), input.sample_rate(), channels);
        Self {
            input,
            chain,
            filters,
            completion,
            channels: channels as usize,
            channel: 0,
            filtering: false,
            finished: false,
        }
    }
}

impl<I: Source> Iterator for ChainSource<I> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let Some(sample) = self.input.next() else {
            if !self.finished {
                self.finished = true;
                self.completion.fire();
            }
            return None;
        };

        // Routing and gains are only re-read at frame boundaries.
        if self.channel == 0 {
            let filtering = self.chain.routing() == Routing::Filtered;
            if filtering && !self.filtering {
                self.filters.clear_history();
            }
            self.filtering = filtering;
            if filtering {
                self.filters.refresh();
            }
        }

        let shaped = if self.filtering {
            self.filters.process(self.channel, sample)
        } else {
            sample
        };
        self.channel = (self.channel + 1) % self.channels;
        Some(shaped * self.chain.volume())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.input.size_hint()
    }
}

impl<I: Source> Source for ChainSource<I> {
    fn current_span_len(&self) -> Option<usize> {
        self.input.current_span_len()
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.input.channels()
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.input.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.input.total_duration()
    }
}
