//! Animated single-pad and two-pad droplet primitives.
//!
//! These do not check clearance; callers position the droplets first.
use tracing::trace;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::grid::{Animation, DropletSize, PlaceId};
use crate::sample::Sample;

impl Device {
    /// Sets the animation tag of `at` and announces the change.
    fn animate(&self, at: PlaceId, animation: Animation) -> Result<()> {
        self.check()?;
        self.with_state(|state| {
            state.set_animation(at, animation)?;
            state.changed();
            Ok(())
        })
    }

    /// Places `sample` on `at` and grows it in: quarter, half, then full size.
    pub fn appear(&self, sample: Sample, at: PlaceId) -> Result<()> {
        self.check()?;
        self.with_state(|state| -> Result<()> {
            state.place(sample, at)?;
            state.set_animation(at, Animation::Size(DropletSize::Quarter))?;
            state.changed();
            Ok(())
        })?;
        self.pace(self.config().phase_delay);
        self.animate(at, Animation::Size(DropletSize::Half))?;
        self.pace(self.config().phase_delay);
        self.animate(at, Animation::Idle)?;
        self.pace(self.config().step_delay);
        trace!("Sample {} appeared on {}.", sample.id, at);
        Ok(())
    }

    /// Shrinks the droplet on `at` out and takes it off the grid.
    pub fn disappear(&self, at: PlaceId) -> Result<Sample> {
        let sample = self.read_state(|state| state.occupant(at))?;
        self.animate(at, Animation::Size(DropletSize::Half))?;
        self.pace(self.config().phase_delay);
        self.animate(at, Animation::Size(DropletSize::Quarter))?;
        self.pace(self.config().phase_delay);
        self.check()?;
        self.with_state(|state| -> Result<()> {
            state.extract(at)?;
            state.set_animation(at, Animation::Idle)?;
            state.changed();
            Ok(())
        })?;
        self.pace(self.config().step_delay);
        trace!("Sample {} disappeared from {}.", sample.id, at);
        Ok(sample)
    }

    /// Pulls the droplets on two neighbouring pads together and leaves `merged` on `left`.
    pub fn merge_adjacent(&self, merged: Sample, left: PlaceId, right: PlaceId) -> Result<()> {
        self.check()?;
        let direction = self.direction(left, right)?;
        self.read_state(|state| -> Result<()> {
            state.occupant(left)?;
            state.occupant(right)?;
            Ok(())
        })?;

        self.with_state(|state| -> Result<()> {
            state.set_animation(left, Animation::Pull(direction))?;
            state.set_animation(right, Animation::Pull(direction.opposite()))?;
            state.changed();
            Ok(())
        })?;
        self.pace(self.config().phase_delay);

        self.check()?;
        self.with_state(|state| -> Result<()> {
            state.extract(left)?;
            state.extract(right)?;
            state.set_animation(left, Animation::Idle)?;
            state.set_animation(right, Animation::Idle)?;
            state.place(merged, left)?;
            state.changed();
            Ok(())
        })?;
        self.pace(self.config().step_delay);
        Ok(())
    }

    /// Stretches the droplet on `left` across `right` and separates it into two droplets.
    pub fn split_adjacent(
        &self,
        left_sample: Sample,
        right_sample: Sample,
        left: PlaceId,
        right: PlaceId,
    ) -> Result<()> {
        self.check()?;
        let direction = self.direction(left, right)?;
        self.read_state(|state| -> Result<()> {
            state.occupant(left)?;
            if state.placement.is_occupied(right) {
                let (row, col) = state.coords(right)?;
                return Err(Error::InvariantViolation(format!(
                    "cannot split onto occupied pad ({row}, {col})"
                )));
            }
            Ok(())
        })?;

        self.animate(left, Animation::Split(direction))?;
        self.pace(self.config().phase_delay);

        self.check()?;
        self.with_state(|state| -> Result<()> {
            state.extract(left)?;
            state.place(left_sample, left)?;
            state.place(right_sample, right)?;
            state.set_animation(left, Animation::Idle)?;
            state.set_animation(right, Animation::Arrive(direction))?;
            state.changed();
            Ok(())
        })?;
        self.pace(self.config().phase_delay);

        self.animate(right, Animation::Idle)?;
        self.pace(self.config().step_delay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::DeviceConfig;
    use crate::events::{DeviceEvent, FnSink};
    use crate::sample::SampleId;

    fn device() -> Device {
        Device::launch(DeviceConfig::default().with_shape(4, 4), ()).unwrap()
    }

    fn sample(id: u64, volume: f64) -> Sample {
        Sample::new(SampleId::new(id), volume, 300.0)
    }

    #[test]
    fn appear_and_disappear_leave_pad_idle() {
        let device = device();
        let at = device.pad(1, 1);

        device.appear(sample(1, 0.5), at).unwrap();
        assert!(device.is_at(SampleId::new(1), at));
        assert_eq!(device.animation(at).unwrap(), Animation::Idle);

        let gone = device.disappear(at).unwrap();
        assert_eq!(gone.id, SampleId::new(1));
        assert!(!device.is_occupied(at));
        assert_eq!(device.animation(at).unwrap(), Animation::Idle);
    }

    /// Records the animation tag of `at` every time the device announces a change.
    fn record_animations(device: &Arc<Device>, at: PlaceId) -> Arc<Mutex<Vec<Animation>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let weak = Arc::downgrade(device);
        device.set_sink(FnSink::new(move |event| {
            let (DeviceEvent::Changed, Some(device)) = (event, weak.upgrade()) else {
                return;
            };
            if let Ok(animation) = device.animation(at) {
                log.lock().unwrap().push(animation);
            }
        }));
        seen
    }

    #[test]
    fn appear_grows_and_disappear_shrinks() {
        let device = Arc::new(device());
        let at = device.pad(2, 2);
        let seen = record_animations(&device, at);

        device.appear(sample(1, 0.5), at).unwrap();
        assert_eq!(
            std::mem::take(&mut *seen.lock().unwrap()),
            vec![
                Animation::Size(DropletSize::Quarter),
                Animation::Size(DropletSize::Half),
                Animation::Idle,
            ]
        );

        device.disappear(at).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Animation::Size(DropletSize::Half),
                Animation::Size(DropletSize::Quarter),
                Animation::Idle,
            ]
        );
    }

    #[test]
    fn disappear_requires_an_occupant() {
        let device = device();
        assert!(matches!(
            device.disappear(device.pad(2, 3)),
            Err(Error::NotOccupied { row: 2, col: 3 })
        ));
    }

    #[test]
    fn merge_adjacent_keeps_left_pad() {
        let device = device();
        let left = device.pad(0, 1);
        let right = device.pad(0, 2);
        device.place(sample(1, 0.5), left).unwrap();
        device.place(sample(2, 0.25), right).unwrap();

        device.merge_adjacent(sample(3, 0.75), left, right).unwrap();
        assert!(device.is_at(SampleId::new(3), left));
        assert!(!device.is_occupied(right));
        assert_eq!(device.sample_count(), 1);
        assert_eq!(device.animation(right).unwrap(), Animation::Idle);
    }

    #[test]
    fn merge_adjacent_validates_inputs() {
        let device = device();
        let left = device.pad(0, 0);
        let right = device.pad(0, 1);
        device.place(sample(1, 0.5), left).unwrap();

        assert!(matches!(
            device.merge_adjacent(sample(3, 0.5), left, right),
            Err(Error::NotOccupied { row: 0, col: 1 })
        ));
        assert!(matches!(
            device.merge_adjacent(sample(3, 0.5), left, device.pad(1, 1)),
            Err(Error::InvariantViolation(_))
        ));
        assert!(device.is_at(SampleId::new(1), left));
    }

    #[test]
    fn split_adjacent_fills_both_pads() {
        let device = device();
        let left = device.pad(2, 0);
        let right = device.pad(2, 1);
        device.place(sample(1, 1.0), left).unwrap();

        device
            .split_adjacent(sample(2, 0.4), sample(3, 0.6), left, right)
            .unwrap();
        assert!(device.is_at(SampleId::new(2), left));
        assert!(device.is_at(SampleId::new(3), right));
        assert!(!device.is_placed(SampleId::new(1)));
        assert_eq!(device.animation(right).unwrap(), Animation::Idle);
    }

    #[test]
    fn split_adjacent_refuses_occupied_target() {
        let device = device();
        let left = device.pad(2, 0);
        let right = device.pad(2, 1);
        device.place(sample(1, 1.0), left).unwrap();
        device.place(sample(9, 1.0), right).unwrap();

        assert!(matches!(
            device.split_adjacent(sample(2, 0.5), sample(3, 0.5), left, right),
            Err(Error::InvariantViolation(_))
        ));
        assert!(device.is_at(SampleId::new(1), left));
    }
}
