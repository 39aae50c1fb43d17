//! Event types and sinks for observing a device.
//!
//! This module defines [`DeviceEvent`] and a set of sinks and adapters to emit, collect, or
//! forward events while a [`crate::device::Device`] mutates. Events are always delivered
//! after the device lock has been released, so a sink may read back into the device
//! synchronously without deadlocking.
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::Sender;

use crate::config::DeviceConfig;
use crate::device::Tint;
use crate::sample::SampleId;

/// Describes changes of device state.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// Emitted once when a device is started.
    Started {
        /// The configuration the device runs with.
        config: DeviceConfig,
    },

    /// Emitted when the device is stopped and its token cancelled.
    Stopped,

    /// Emitted after grid and placement were replaced by an empty state.
    Cleared,

    /// Emitted after the grid grew.
    GridGrown {
        /// Row count after growth.
        rows: usize,
        /// Column count after growth.
        cols: usize,
    },

    /// Emitted after each mutating unit of work; renderers redraw on it.
    Changed,

    /// Emitted when a droplet is placed on a pad.
    SamplePlaced {
        sample: SampleId,
        row: usize,
        col: usize,
    },

    /// Emitted when a droplet is taken off a pad.
    SampleRemoved {
        sample: SampleId,
        row: usize,
        col: usize,
    },

    /// Emitted when a droplet reached the end of its route.
    RouteFinished {
        sample: SampleId,
        /// Number of hops taken.
        hops: usize,
    },

    /// Emitted after each lock-step round of a batch.
    RoundCompleted {
        /// Zero-based round index within the batch.
        round: usize,
        /// Routes that advanced one pad this round.
        advanced: usize,
        /// Routes still unfinished after this round.
        remaining: usize,
    },

    /// Emitted when the global droplet tint changes.
    TintChanged { tint: Tint },

    /// Non-fatal warning.
    Warning {
        /// Context string (e.g. operation name, sample id).
        context: String,
        /// Human-readable message.
        message: String,
    },
}

/// Discriminant of [`DeviceEvent`], used by sinks to filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    Started,
    Stopped,
    Cleared,
    GridGrown,
    Changed,
    SamplePlaced,
    SampleRemoved,
    RouteFinished,
    RoundCompleted,
    TintChanged,
    Warning,
}

impl DeviceEvent {
    pub fn kind(&self) -> DeviceEventKind {
        match self {
            DeviceEvent::Started { .. } => DeviceEventKind::Started,
            DeviceEvent::Stopped => DeviceEventKind::Stopped,
            DeviceEvent::Cleared => DeviceEventKind::Cleared,
            DeviceEvent::GridGrown { .. } => DeviceEventKind::GridGrown,
            DeviceEvent::Changed => DeviceEventKind::Changed,
            DeviceEvent::SamplePlaced { .. } => DeviceEventKind::SamplePlaced,
            DeviceEvent::SampleRemoved { .. } => DeviceEventKind::SampleRemoved,
            DeviceEvent::RouteFinished { .. } => DeviceEventKind::RouteFinished,
            DeviceEvent::RoundCompleted { .. } => DeviceEventKind::RoundCompleted,
            DeviceEvent::TintChanged { .. } => DeviceEventKind::TintChanged,
            DeviceEvent::Warning { .. } => DeviceEventKind::Warning,
        }
    }
}

/// A generic event sink that accepts [`DeviceEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: DeviceEvent);

    /// Whether the sink cares about events of `kind`. Emitters skip building unwanted events.
    #[inline]
    fn wants(&self, _kind: DeviceEventKind) -> bool {
        true
    }

    fn send_many<I>(&mut self, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = DeviceEvent>,
    {
        for e in events {
            self.send(e);
        }
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: DeviceEvent) {}

    #[inline]
    fn wants(&self, _kind: DeviceEventKind) -> bool {
        false
    }
}

/// Shares one sink between the device and an observer holding another handle.
impl<S: EventSink> EventSink for Arc<Mutex<S>> {
    fn send(&mut self, event: DeviceEvent) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(event);
    }

    fn wants(&self, kind: DeviceEventKind) -> bool {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .wants(kind)
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(DeviceEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(DeviceEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(DeviceEvent),
{
    #[inline]
    fn send(&mut self, event: DeviceEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<DeviceEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<DeviceEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[DeviceEvent] {
        &self.events
    }

    /// Number of collected events of `kind`.
    pub fn count(&self, kind: DeviceEventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: DeviceEvent) {
        self.events.push(event);
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: DeviceEvent) {
        let kind = event.kind();
        let mut targets: Vec<usize> = (0..self.sinks.len())
            .filter(|&i| self.sinks[i].wants(kind))
            .collect();
        let Some(last) = targets.pop() else {
            return;
        };
        for i in targets {
            self.sinks[i].send(event.clone());
        }
        self.sinks[last].send(event);
    }

    fn wants(&self, kind: DeviceEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

/// Event sink that forwards events over a channel to a renderer or UI thread.
///
/// Sends never block. A disconnected receiver silently drops events.
pub struct ChannelSink {
    pub tx: Sender<DeviceEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<DeviceEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    #[inline]
    fn send(&mut self, event: DeviceEvent) {
        let _ = self.tx.send(event);
    }
}
