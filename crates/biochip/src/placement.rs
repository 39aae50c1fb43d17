//! Bijective occupancy map between droplets and pads.
//!
//! [`Placement`] is the sole authority on what is where. Both directions are updated
//! together, so `sample -> pad` and `pad -> sample` are exact inverses at all times.
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::grid::PlaceId;
use crate::sample::{Sample, SampleId};

#[derive(Clone, Debug, Default)]
pub struct Placement {
    by_sample: HashMap<SampleId, PlaceId>,
    by_place: HashMap<PlaceId, Sample>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sample` on `at`. Fails if either side is already taken.
    pub fn insert(&mut self, sample: Sample, at: PlaceId) -> Result<()> {
        if let Some(current) = self.by_sample.get(&sample.id) {
            return Err(Error::InvariantViolation(format!(
                "sample {} is already placed on {}",
                sample.id, current
            )));
        }
        if let Some(occupant) = self.by_place.get(&at) {
            return Err(Error::InvariantViolation(format!(
                "{} is already occupied by sample {}",
                at, occupant.id
            )));
        }
        self.by_sample.insert(sample.id, at);
        self.by_place.insert(at, sample);
        Ok(())
    }

    /// Removes a droplet by identity, returning the pad it vacated and its record.
    pub fn take(&mut self, id: SampleId) -> Option<(PlaceId, Sample)> {
        let at = self.by_sample.remove(&id)?;
        let sample = self.by_place.remove(&at)?;
        Some((at, sample))
    }

    /// Removes whatever droplet sits on `at`.
    pub fn take_at(&mut self, at: PlaceId) -> Option<Sample> {
        let sample = self.by_place.remove(&at)?;
        self.by_sample.remove(&sample.id);
        Some(sample)
    }

    pub fn is_occupied(&self, at: PlaceId) -> bool {
        self.by_place.contains_key(&at)
    }

    pub fn is_placed(&self, id: SampleId) -> bool {
        self.by_sample.contains_key(&id)
    }

    pub fn is_at(&self, id: SampleId, at: PlaceId) -> bool {
        self.by_sample.get(&id) == Some(&at)
    }

    pub fn position(&self, id: SampleId) -> Option<PlaceId> {
        self.by_sample.get(&id).copied()
    }

    pub fn occupant(&self, at: PlaceId) -> Option<&Sample> {
        self.by_place.get(&at)
    }

    /// Occupied pads and their droplets, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Sample)> + '_ {
        self.by_place.iter().map(|(at, sample)| (*at, sample))
    }

    pub fn len(&self) -> usize {
        self.by_place.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_place.is_empty()
    }

    /// Checks that both maps are exact inverses of each other.
    pub fn is_consistent(&self) -> bool {
        self.by_sample.len() == self.by_place.len()
            && self
                .by_sample
                .iter()
                .all(|(id, at)| self.by_place.get(at).is_some_and(|s| s.id == *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u64) -> Sample {
        Sample::new(SampleId::new(id), 1.0, 295.0)
    }

    #[test]
    fn insert_then_take_round_trips_both_maps() {
        let mut placement = Placement::new();
        placement.insert(sample(1), PlaceId(4)).unwrap();

        assert!(placement.is_placed(SampleId::new(1)));
        assert!(placement.is_occupied(PlaceId(4)));
        assert!(placement.is_at(SampleId::new(1), PlaceId(4)));
        assert!(placement.is_consistent());

        let (at, taken) = placement.take(SampleId::new(1)).expect("placed");
        assert_eq!(at, PlaceId(4));
        assert_eq!(taken.id, SampleId::new(1));
        assert!(placement.is_empty());
        assert!(placement.is_consistent());
    }

    #[test]
    fn double_placement_is_rejected() {
        let mut placement = Placement::new();
        placement.insert(sample(1), PlaceId(0)).unwrap();

        assert!(matches!(
            placement.insert(sample(1), PlaceId(1)),
            Err(Error::InvariantViolation(_))
        ));
        assert!(matches!(
            placement.insert(sample(2), PlaceId(0)),
            Err(Error::InvariantViolation(_))
        ));
        assert_eq!(placement.len(), 1);
        assert!(placement.is_consistent());
    }

    #[test]
    fn take_at_clears_reverse_entry() {
        let mut placement = Placement::new();
        placement.insert(sample(9), PlaceId(3)).unwrap();

        let taken = placement.take_at(PlaceId(3)).expect("occupied");
        assert_eq!(taken.id, SampleId::new(9));
        assert!(!placement.is_placed(SampleId::new(9)));
        assert!(placement.take_at(PlaceId(3)).is_none());
        assert!(placement.take(SampleId::new(9)).is_none());
    }
}
