//! The device handle.
//!
//! A [`Device`] owns the grid, the placement map and the global tint behind a single mutex,
//! together with its configuration, cancellation token and event sink. All operations take
//! `&self`, so one protocol thread can drive the device while a renderer thread reads
//! [`Device::snapshot`] concurrently.
//!
//! Mutations queue their events while the lock is held; the queue is flushed to the sink only
//! after the lock is released.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::events::{DeviceEvent, EventSink};
use crate::grid::{Animation, Grid, PlaceId};
use crate::placement::Placement;
use crate::routing::path::{path_axis_first, Route};
use crate::sample::{Sample, SampleId};

pub mod alloc;
pub mod snapshot;

pub use snapshot::{CellView, DeviceSnapshot, Tint};

/// Grid, placement and presentation state guarded by the device mutex.
pub(crate) struct ChipState {
    pub(crate) grid: Grid,
    pub(crate) placement: Placement,
    pub(crate) tint: Tint,
    snapshot: Option<Arc<DeviceSnapshot>>,
    pending: Vec<DeviceEvent>,
}

impl ChipState {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            placement: Placement::new(),
            tint: Tint::Normal,
            snapshot: None,
            pending: Vec::new(),
        }
    }

    fn invalidate(&mut self) {
        self.snapshot = None;
    }

    pub(crate) fn push_event(&mut self, event: DeviceEvent) {
        self.pending.push(event);
    }

    /// Queues the "device changed" redraw notification.
    pub(crate) fn changed(&mut self) {
        self.pending.push(DeviceEvent::Changed);
    }

    pub(crate) fn grow_to(&mut self, rows: usize, cols: usize) {
        if self.grid.grow_to(rows, cols) {
            self.invalidate();
            let (rows, cols) = self.grid.dimensions();
            self.pending.push(DeviceEvent::GridGrown { rows, cols });
        }
    }

    pub(crate) fn ensure(&mut self, row: usize, col: usize) -> PlaceId {
        self.grow_to(row + 1, col + 1);
        self.grid.ensure(row, col)
    }

    pub(crate) fn coords(&self, at: PlaceId) -> Result<(usize, usize)> {
        self.grid.coords(at)
    }

    /// Places `sample` on `at`, consuming any reservation of the pad.
    pub(crate) fn place(&mut self, sample: Sample, at: PlaceId) -> Result<()> {
        let (row, col) = self.grid.coords(at)?;
        self.placement.insert(sample, at)?;
        self.grid.get_mut(at)?.reserved = false;
        self.invalidate();
        self.pending.push(DeviceEvent::SamplePlaced {
            sample: sample.id,
            row,
            col,
        });
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: SampleId) -> Result<(PlaceId, Sample)> {
        let (at, sample) = self
            .placement
            .take(id)
            .ok_or(Error::NotPlaced { sample: id })?;
        let (row, col) = self.grid.coords(at)?;
        self.invalidate();
        self.pending.push(DeviceEvent::SampleRemoved {
            sample: id,
            row,
            col,
        });
        Ok((at, sample))
    }

    pub(crate) fn extract(&mut self, at: PlaceId) -> Result<Sample> {
        let (row, col) = self.grid.coords(at)?;
        let sample = self
            .placement
            .take_at(at)
            .ok_or(Error::NotOccupied { row, col })?;
        self.invalidate();
        self.pending.push(DeviceEvent::SampleRemoved {
            sample: sample.id,
            row,
            col,
        });
        Ok(sample)
    }

    pub(crate) fn occupant(&self, at: PlaceId) -> Result<Sample> {
        let (row, col) = self.grid.coords(at)?;
        self.placement
            .occupant(at)
            .copied()
            .ok_or(Error::NotOccupied { row, col })
    }

    pub(crate) fn position(&self, id: SampleId) -> Result<PlaceId> {
        self.placement
            .position(id)
            .ok_or(Error::NotPlaced { sample: id })
    }

    pub(crate) fn set_animation(&mut self, at: PlaceId, animation: Animation) -> Result<()> {
        let place = self.grid.get_mut(at)?;
        if place.animation != animation {
            place.animation = animation;
            self.invalidate();
        }
        Ok(())
    }

    pub(crate) fn set_tint(&mut self, tint: Tint) {
        if self.tint != tint {
            self.tint = tint;
            self.invalidate();
            self.pending.push(DeviceEvent::TintChanged { tint });
        }
    }

    pub(crate) fn path(
        &mut self,
        from: PlaceId,
        to: PlaceId,
        horizontal_first: bool,
    ) -> Result<Route> {
        let (fr, fc) = self.grid.coords(from)?;
        let (tr, tc) = self.grid.coords(to)?;
        self.grow_to(fr.max(tr) + 1, fc.max(tc) + 1);
        path_axis_first(&mut self.grid, from, to, horizontal_first)
    }

    pub(crate) fn snapshot(&mut self) -> Arc<DeviceSnapshot> {
        if let Some(snapshot) = &self.snapshot {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(DeviceSnapshot::capture(self));
        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }
}

/// Handle to one running biochip.
pub struct Device {
    config: DeviceConfig,
    state: Mutex<ChipState>,
    sink: Mutex<Box<dyn EventSink + Send>>,
    cancel: CancelToken,
    ephemeral: AtomicU64,
}

impl Device {
    /// Starts a device with the default shape and zones, paced by the given delays.
    pub fn start(phase_delay_ms: u64, step_delay_ms: u64) -> Result<Self> {
        Self::launch(DeviceConfig::from_millis(phase_delay_ms, step_delay_ms), ())
    }

    /// Starts a device with an explicit configuration and no event sink.
    pub fn with_config(config: DeviceConfig) -> Result<Self> {
        Self::launch(config, ())
    }

    /// Starts a device with an explicit configuration and event sink.
    pub fn launch(config: DeviceConfig, sink: impl EventSink + Send + 'static) -> Result<Self> {
        config.validate()?;
        info!(
            "Starting device {} x {} | phase delay: {:?} | step delay: {:?}.",
            config.rows, config.cols, config.phase_delay, config.step_delay
        );
        let device = Self {
            state: Mutex::new(ChipState::new(config.rows, config.cols)),
            sink: Mutex::new(Box::new(sink)),
            cancel: CancelToken::new(),
            ephemeral: AtomicU64::new(0),
            config,
        };
        device.emit(DeviceEvent::Started {
            config: device.config.clone(),
        });
        Ok(device)
    }

    /// Replaces the device's own token by one owned by the protocol layer.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replaces the event sink.
    pub fn set_sink(&self, sink: impl EventSink + Send + 'static) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Box::new(sink);
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_executing(&self) -> bool {
        self.cancel.is_executing()
    }

    /// Cancels every in-flight operation at its next phase boundary.
    pub fn stop(&self) {
        info!("Stopping device.");
        self.cancel.cancel();
        self.emit(DeviceEvent::Stopped);
    }

    /// Replaces grid, placement and tint by a fresh state, keeping configuration and sink.
    pub fn clear(&self) {
        info!("Clearing device.");
        self.with_state(|state| {
            *state = ChipState::new(self.config.rows, self.config.cols);
            state.push_event(DeviceEvent::Cleared);
            state.changed();
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the device lock, then delivers the events it queued.
    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut ChipState) -> T) -> T {
        let (result, events) = {
            let mut state = self.lock_state();
            let result = f(&mut state);
            (result, std::mem::take(&mut state.pending))
        };
        self.emit_all(events);
        result
    }

    pub(crate) fn read_state<T>(&self, f: impl FnOnce(&ChipState) -> T) -> T {
        f(&self.lock_state())
    }

    pub(crate) fn emit(&self, event: DeviceEvent) {
        self.emit_all(vec![event]);
    }

    fn emit_all(&self, events: Vec<DeviceEvent>) {
        if events.is_empty() {
            return;
        }
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            if sink.wants(event.kind()) {
                sink.send(event);
            }
        }
    }

    /// Sleeps for `delay` unless it is zero.
    pub(crate) fn pace(&self, delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Creates an intermediate droplet for merge/split folding.
    pub(crate) fn ephemeral_sample(&self, volume: f64, temperature: f64) -> Sample {
        let n = self.ephemeral.fetch_add(1, Ordering::Relaxed);
        Sample::new(SampleId::ephemeral(n), volume, temperature)
    }

    /// Grows the grid to at least `rows * cols`.
    pub fn grow_to(&self, rows: usize, cols: usize) {
        self.with_state(|state| state.grow_to(rows, cols));
    }

    /// Id of the pad at `(row, col)`, growing the grid to cover it.
    pub fn pad(&self, row: usize, col: usize) -> PlaceId {
        self.with_state(|state| state.ensure(row, col))
    }

    /// `(row, col)` of a pad.
    pub fn coords(&self, at: PlaceId) -> Result<(usize, usize)> {
        self.read_state(|state| state.coords(at))
    }

    /// `(rows, cols)` of the grid.
    pub fn dimensions(&self) -> (usize, usize) {
        self.read_state(|state| state.grid.dimensions())
    }

    /// Places `sample` on `at`.
    pub fn place(&self, sample: Sample, at: PlaceId) -> Result<()> {
        self.check()?;
        self.with_state(|state| {
            state.place(sample, at)?;
            state.changed();
            Ok(())
        })
    }

    /// Takes a droplet off the grid by identity, returning the pad it vacated.
    pub fn remove(&self, id: SampleId) -> Result<PlaceId> {
        self.check()?;
        self.with_state(|state| {
            let (at, _) = state.remove(id)?;
            state.changed();
            Ok(at)
        })
    }

    /// Takes whatever droplet sits on `at` off the grid.
    pub fn extract(&self, at: PlaceId) -> Result<Sample> {
        self.check()?;
        self.with_state(|state| {
            let sample = state.extract(at)?;
            state.changed();
            Ok(sample)
        })
    }

    /// Like [`Device::extract`], logging the discarded droplet.
    pub fn clear_pad(&self, at: PlaceId) -> Result<Sample> {
        let sample = self.extract(at)?;
        warn!("Cleared sample {} from {}.", sample.id, at);
        Ok(sample)
    }

    /// Swaps the droplet identity on a pad without moving it.
    pub fn replace(&self, old: SampleId, new: Sample) -> Result<PlaceId> {
        self.check()?;
        self.with_state(|state| {
            let (at, _) = state.remove(old)?;
            state.place(new, at)?;
            state.changed();
            Ok(at)
        })
    }

    pub fn is_occupied(&self, at: PlaceId) -> bool {
        self.read_state(|state| state.placement.is_occupied(at))
    }

    pub fn is_placed(&self, id: SampleId) -> bool {
        self.read_state(|state| state.placement.is_placed(id))
    }

    pub fn is_at(&self, id: SampleId, at: PlaceId) -> bool {
        self.read_state(|state| state.placement.is_at(id, at))
    }

    pub fn position_of(&self, id: SampleId) -> Option<PlaceId> {
        self.read_state(|state| state.placement.position(id))
    }

    pub fn occupant(&self, at: PlaceId) -> Option<Sample> {
        self.read_state(|state| state.placement.occupant(at).copied())
    }

    /// Droplet at `(row, col)`, if the pad exists and is occupied.
    pub fn occupant_at(&self, row: usize, col: usize) -> Option<Sample> {
        self.read_state(|state| {
            let at = state.grid.id_at(row, col)?;
            state.placement.occupant(at).copied()
        })
    }

    /// Number of droplets on the grid.
    pub fn sample_count(&self) -> usize {
        self.read_state(|state| state.placement.len())
    }

    pub fn is_reserved(&self, at: PlaceId) -> bool {
        self.read_state(|state| state.grid.get(at).is_ok_and(|p| p.reserved))
    }

    pub fn animation(&self, at: PlaceId) -> Result<Animation> {
        self.read_state(|state| state.grid.get(at).map(|p| p.animation))
    }

    pub fn tint(&self) -> Tint {
        self.read_state(|state| state.tint)
    }

    pub fn set_tint(&self, tint: Tint) {
        self.with_state(|state| {
            state.set_tint(tint);
            state.changed();
        });
    }

    /// Consistent read-only view for renderers. Cached until the next mutation.
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.lock_state().snapshot()
    }

    /// Axis-aligned L-shaped route from `from` to `to`.
    pub fn path(&self, from: PlaceId, to: PlaceId, horizontal_first: bool) -> Result<Route> {
        self.with_state(|state| state.path(from, to, horizontal_first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DeviceEventKind, VecSink};

    fn sample(id: u64) -> Sample {
        Sample::new(SampleId::new(id), 1.0, 295.0)
    }

    fn shared_sink() -> Arc<Mutex<VecSink>> {
        Arc::new(Mutex::new(VecSink::new()))
    }

    #[test]
    fn start_uses_default_shape() {
        let device = Device::start(0, 0).expect("valid config");
        assert_eq!(device.dimensions(), (11, 21));
        assert!(device.is_executing());
        assert_eq!(device.tint(), Tint::Normal);
    }

    #[test]
    fn launch_rejects_invalid_config() {
        let config = DeviceConfig::default().with_shape(0, 0);
        assert!(matches!(
            Device::launch(config, ()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn place_remove_and_extract_keep_maps_in_sync() {
        let device = Device::start(0, 0).unwrap();
        let a = device.pad(1, 1);
        let b = device.pad(2, 2);

        device.place(sample(1), a).unwrap();
        device.place(sample(2), b).unwrap();
        assert!(device.is_at(SampleId::new(1), a));

        assert_eq!(device.remove(SampleId::new(1)).unwrap(), a);
        assert!(!device.is_occupied(a));
        assert_eq!(device.extract(b).unwrap().id, SampleId::new(2));
        assert_eq!(device.sample_count(), 0);

        assert!(matches!(
            device.remove(SampleId::new(1)),
            Err(Error::NotPlaced { .. })
        ));
        assert!(matches!(
            device.extract(b),
            Err(Error::NotOccupied { row: 2, col: 2 })
        ));
    }

    #[test]
    fn clear_pad_hands_back_the_droplet() {
        let device = Device::start(0, 0).unwrap();
        let at = device.pad(3, 3);
        device.place(sample(7), at).unwrap();
        assert_eq!(device.clear_pad(at).unwrap().id, SampleId::new(7));
        assert!(device.clear_pad(at).is_err());
    }

    #[test]
    fn placement_consumes_reservation() {
        let device = Device::start(0, 0).unwrap();
        let at = device.reserve_in_column(0, 0).unwrap();
        assert!(device.is_reserved(at));
        device.place(sample(1), at).unwrap();
        assert!(!device.is_reserved(at));
    }

    #[test]
    fn cancelled_device_refuses_mutation() {
        let device = Device::start(0, 0).unwrap();
        let at = device.pad(0, 0);
        device.stop();
        assert!(matches!(
            device.place(sample(1), at),
            Err(Error::Cancelled)
        ));
        assert!(!device.is_occupied(at));
    }

    #[test]
    fn clear_resets_state_and_keeps_config() {
        let config = DeviceConfig::default().with_shape(3, 3);
        let device = Device::launch(config, ()).unwrap();
        device.place(sample(1), device.pad(0, 0)).unwrap();
        device.grow_to(8, 8);

        device.clear();
        assert_eq!(device.dimensions(), (3, 3));
        assert_eq!(device.sample_count(), 0);
        assert_eq!(device.config().rows, 3);
    }

    #[test]
    fn events_are_delivered_after_mutation() {
        let sink = shared_sink();
        let device = Device::launch(DeviceConfig::default(), Arc::clone(&sink)).unwrap();
        device.place(sample(1), device.pad(0, 0)).unwrap();
        device.grow_to(20, 30);
        device.set_tint(Tint::Processing);

        let sink = sink.lock().unwrap();
        assert_eq!(sink.count(DeviceEventKind::Started), 1);
        assert_eq!(sink.count(DeviceEventKind::SamplePlaced), 1);
        assert_eq!(sink.count(DeviceEventKind::GridGrown), 1);
        assert_eq!(sink.count(DeviceEventKind::TintChanged), 1);
        assert!(sink.count(DeviceEventKind::Changed) >= 2);
    }

    #[test]
    fn sink_may_read_back_into_device() {
        let device = Arc::new(Device::start(0, 0).unwrap());
        let observer = Arc::clone(&device);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_sink = Arc::clone(&seen);
        device.set_sink(crate::events::FnSink::new(move |event| {
            if let DeviceEvent::Changed = event {
                seen_by_sink
                    .lock()
                    .unwrap()
                    .push(observer.snapshot().occupied().count());
            }
        }));

        device.place(sample(1), device.pad(0, 0)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn snapshot_is_cached_until_mutation() {
        let device = Device::start(0, 0).unwrap();
        let first = device.snapshot();
        let again = device.snapshot();
        assert!(Arc::ptr_eq(&first, &again));

        device.place(sample(1), device.pad(0, 0)).unwrap();
        let after = device.snapshot();
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(after.occupied().count(), 1);
    }

    #[test]
    fn replace_swaps_identity_in_place() {
        let device = Device::start(0, 0).unwrap();
        let at = device.pad(4, 4);
        device.place(sample(1), at).unwrap();
        assert_eq!(device.replace(SampleId::new(1), sample(2)).unwrap(), at);
        assert!(device.is_at(SampleId::new(2), at));
        assert_eq!(device.occupant_at(4, 4).map(|s| s.id), Some(SampleId::new(2)));
        assert!(device.occupant_at(40, 4).is_none());
        assert!(!device.is_placed(SampleId::new(1)));
    }
}
