//! Compound operations issued by the protocol layer.
//!
//! Each operation is a sequence of allocations, pathfinding and scheduler calls. Routes
//! bound for a zone travel horizontally first; routes returning to staging travel vertically
//! first, which retraces an outbound zone route. All moves between zones use a clearance of
//! one pad.
//!
//! Nothing is rolled back on failure. An operation that fails partway leaves every hop and
//! identity swap it already committed in place, but hands back the reservations it has not
//! used yet. Inputs are checked before anything is reserved.
use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info};

use crate::device::{Device, Tint};
use crate::error::{Error, Result};
use crate::grid::{PlaceId, Zone};
use crate::routing::Route;
use crate::sample::{Sample, SampleId};

const TRANSIT_CLEARANCE: usize = 1;
const WORK_AREA_CLEARANCE: usize = 0;

/// Continuation of [`Device::start_equilibrate`].
///
/// Holds the pads the incubated droplets came from; hand it back to
/// [`Device::end_equilibrate`] to return them.
#[must_use = "an incubation must be ended with `Device::end_equilibrate`"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Incubation {
    go_backs: Vec<PlaceId>,
    duration: Duration,
}

impl Incubation {
    /// Pads to return to, in input order.
    pub fn go_backs(&self) -> &[PlaceId] {
        &self.go_backs
    }

    /// Incubation time requested by the protocol.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

fn require_inputs(operation: &str, count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvariantViolation(format!(
            "{operation} needs at least one sample"
        )));
    }
    Ok(())
}

fn require_pairs(operation: &str, ins: usize, outs: usize) -> Result<()> {
    require_inputs(operation, ins)?;
    if ins != outs {
        return Err(Error::InvariantViolation(format!(
            "{operation} got {ins} input(s) but {outs} output(s)"
        )));
    }
    Ok(())
}

/// Volume-weighted mean temperature of two droplets.
fn mixed_temperature(a: &Sample, b: &Sample) -> f64 {
    let volume = a.volume + b.volume;
    if volume <= 0.0 {
        return a.temperature;
    }
    (a.temperature * a.volume + b.temperature * b.volume) / volume
}

impl Device {
    fn located(&self, ids: &[SampleId]) -> Result<Vec<(PlaceId, Sample)>> {
        self.read_state(|state| {
            ids.iter()
                .map(|&id| {
                    let at = state.position(id)?;
                    Ok((at, state.occupant(at)?))
                })
                .collect()
        })
    }

    /// Fails on repeated ids, and on outputs that are already placed unless the operation
    /// consumes them as inputs.
    fn require_fresh(
        &self,
        operation: &str,
        ins: &[SampleId],
        outs: impl IntoIterator<Item = SampleId>,
    ) -> Result<()> {
        let mut consumed = HashSet::with_capacity(ins.len());
        for id in ins {
            if !consumed.insert(*id) {
                return Err(Error::InvariantViolation(format!(
                    "{operation} lists sample {id} twice"
                )));
            }
        }
        let mut produced = HashSet::new();
        for id in outs {
            if !produced.insert(id) {
                return Err(Error::InvariantViolation(format!(
                    "{operation} produces sample {id} twice"
                )));
            }
            if !consumed.contains(&id) && self.is_placed(id) {
                return Err(Error::InvariantViolation(format!(
                    "{operation} produces sample {id}, which is already placed"
                )));
            }
        }
        Ok(())
    }

    fn row_of(&self, at: PlaceId) -> Result<usize> {
        Ok(self.coords(at)?.0)
    }

    /// One row of `width` pads in `zone`, at or below `row`.
    fn work_row(&self, zone: Zone, row: usize, width: usize, reserve: bool) -> Result<Vec<PlaceId>> {
        let column = self.zone_column(zone);
        let area = if reserve {
            self.reserve_area(column, row, 1, width)?
        } else {
            self.free_area(column, row, 1, width)?
        };
        area.into_iter()
            .next()
            .ok_or_else(|| Error::InvariantViolation("allocator returned an empty row".into()))
    }

    fn routes_to(
        &self,
        pairs: impl IntoIterator<Item = (PlaceId, PlaceId)>,
        horizontal_first: bool,
    ) -> Result<Vec<Route>> {
        pairs
            .into_iter()
            .map(|(from, to)| self.path(from, to, horizontal_first))
            .collect()
    }

    /// Reserves a staging pad, places `sample` on it and grows it in.
    pub fn introduce(&self, sample: Sample) -> Result<PlaceId> {
        self.check()?;
        self.require_fresh("introduce", &[], [sample.id])?;
        info!("Introducing sample {}.", sample.id);
        let at = self.reserve_in_column(self.zone_column(Zone::Staging), 0)?;
        self.releasing(&[at], || self.appear(sample, at))?;
        Ok(at)
    }

    /// Merges `ins` into one droplet `out` and parks it in staging.
    ///
    /// The inputs gather on alternate pads of a mixing-zone row and are folded left to right
    /// into the anchor pad. `out` keeps its identity and temperature; its volume becomes the
    /// sum of the input volumes.
    pub fn merge(&self, out: Sample, ins: &[SampleId]) -> Result<PlaceId> {
        self.check()?;
        require_inputs("merge", ins.len())?;
        self.require_fresh("merge", ins, [out.id])?;
        info!("Merging {} sample(s) into {}.", ins.len(), out.id);

        let inputs = self.located(ins)?;
        let row = self.row_of(inputs[0].0)?;
        let slots = self.work_row(Zone::Mixing, row, 2 * ins.len() - 1, true)?;

        self.releasing(&slots, || -> Result<()> {
            let routes = self.routes_to(
                inputs.iter().enumerate().map(|(i, (at, _))| (*at, slots[2 * i])),
                true,
            )?;
            self.follow_routes(&routes, TRANSIT_CLEARANCE)?;

            let mut running = inputs[0].1;
            for (i, (_, next)) in inputs.iter().enumerate().skip(1) {
                let gap = self.path(slots[2 * i], slots[1], true)?;
                self.follow_route(&gap, WORK_AREA_CLEARANCE)?;
                let merged = self.ephemeral_sample(
                    running.volume + next.volume,
                    mixed_temperature(&running, next),
                );
                self.merge_adjacent(merged, slots[0], slots[1])?;
                debug!("Folded {} into {} (volume {}).", next.id, merged.id, merged.volume);
                running = merged;
            }
            self.replace(running.id, out.with_volume(running.volume))?;
            Ok(())
        })?;
        self.release_unused(&slots)?;

        let staging = self.reserve_in_column(self.zone_column(Zone::Staging), row)?;
        self.releasing(&[staging], || {
            let home = self.path(slots[0], staging, false)?;
            self.follow_route(&home, TRANSIT_CLEARANCE)
        })?;
        Ok(staging)
    }

    /// Splits `input` into `outs` and parks every output in staging.
    ///
    /// Outputs are peeled off right to left with their own volumes; `outs[0]` receives the
    /// remainder. Returns the staging pads in output order.
    pub fn split(&self, input: SampleId, outs: &[Sample]) -> Result<Vec<PlaceId>> {
        self.check()?;
        require_inputs("split", outs.len())?;
        self.require_fresh("split", &[input], outs.iter().map(|s| s.id))?;
        info!("Splitting sample {} into {} output(s).", input, outs.len());

        let (origin, source) = self.located(&[input])?[0];
        let peeled: f64 = outs[1..].iter().map(|s| s.volume).sum();
        if peeled > source.volume {
            return Err(Error::InvariantViolation(format!(
                "cannot peel volume {peeled} off sample {input} holding {}",
                source.volume
            )));
        }

        let row = self.row_of(origin)?;
        let slots = self.work_row(Zone::Mixing, row, 2 * outs.len() - 1, true)?;
        self.releasing(&slots, || -> Result<()> {
            let inbound = self.path(origin, slots[0], true)?;
            self.follow_route(&inbound, TRANSIT_CLEARANCE)?;

            let mut running = source;
            for i in (1..outs.len()).rev() {
                let rest =
                    self.ephemeral_sample(running.volume - outs[i].volume, running.temperature);
                self.split_adjacent(rest, outs[i], slots[0], slots[1])?;
                let peel = self.path(slots[1], slots[2 * i], true)?;
                self.follow_route(&peel, WORK_AREA_CLEARANCE)?;
                debug!("Peeled {} off {} (volume {} left).", outs[i].id, running.id, rest.volume);
                running = rest;
            }
            self.replace(running.id, outs[0].with_volume(running.volume))?;
            Ok(())
        })?;
        self.release_unused(&slots)?;

        let targets =
            self.reserve_many_in_column(self.zone_column(Zone::Staging), row, outs.len())?;
        self.releasing(&targets, || {
            let routes = self.routes_to(
                targets.iter().enumerate().map(|(i, &to)| (slots[2 * i], to)),
                false,
            )?;
            self.follow_routes(&routes, TRANSIT_CLEARANCE)
        })?;
        Ok(targets)
    }

    /// Moves `ins` to a scratch row of the mixing zone and removes them one by one.
    pub fn dispose(&self, ins: &[SampleId]) -> Result<Vec<Sample>> {
        self.check()?;
        require_inputs("dispose", ins.len())?;
        self.require_fresh("dispose", ins, [])?;
        info!("Disposing {} sample(s).", ins.len());

        let inputs = self.located(ins)?;
        let row = self.row_of(inputs[0].0)?;
        let scratch = self.work_row(Zone::Mixing, row, 2 * ins.len() - 1, false)?;
        let routes = self.routes_to(
            inputs.iter().enumerate().map(|(i, (at, _))| (*at, scratch[2 * i])),
            true,
        )?;
        self.follow_routes(&routes, TRANSIT_CLEARANCE)?;

        (0..ins.len())
            .map(|i| self.disappear(scratch[2 * i]))
            .collect()
    }

    /// Moves each `ins[i]` to the zone matching `outs[i]`'s temperature, then swaps in `outs[i]`.
    pub fn regulate(&self, ins: &[SampleId], outs: &[Sample]) -> Result<Vec<PlaceId>> {
        self.check()?;
        require_pairs("regulate", ins.len(), outs.len())?;
        self.require_fresh("regulate", ins, outs.iter().map(|s| s.id))?;
        info!("Regulating {} sample(s).", ins.len());

        let inputs = self.located(ins)?;
        let claims: Vec<_> = inputs
            .iter()
            .zip(outs)
            .map(|((at, _), out)| {
                let zone = self.config().regulation_zone(out.temperature);
                debug!("Sample {} heads to the {} zone.", out.id, zone);
                (*at, self.zone_column(zone))
            })
            .collect();
        let targets = self.claim_in_columns(&claims)?;
        self.releasing(&targets, || {
            let routes = self.routes_to(
                inputs.iter().zip(&targets).map(|((at, _), &to)| (*at, to)),
                true,
            )?;
            self.follow_routes(&routes, TRANSIT_CLEARANCE)
        })?;

        for (id, out) in ins.iter().zip(outs) {
            self.replace(*id, *out)?;
        }
        Ok(targets)
    }

    /// Swaps identities in place; used when only volume or concentration changed.
    pub fn concentrate(&self, ins: &[SampleId], outs: &[Sample]) -> Result<()> {
        self.check()?;
        require_pairs("concentrate", ins.len(), outs.len())?;
        self.require_fresh("concentrate", ins, outs.iter().map(|s| s.id))?;
        info!("Concentrating {} sample(s).", ins.len());
        for (id, out) in ins.iter().zip(outs) {
            self.replace(*id, *out)?;
        }
        Ok(())
    }

    /// Moves `ins` to the zone matching their current temperature for an external
    /// incubation and switches the device to the processing tint.
    ///
    /// The vacated pads stay reserved until [`Device::end_equilibrate`] brings the droplets
    /// back.
    pub fn start_equilibrate(&self, ins: &[SampleId], duration: Duration) -> Result<Incubation> {
        self.check()?;
        require_inputs("equilibrate", ins.len())?;
        self.require_fresh("equilibrate", ins, [])?;
        info!("Equilibrating {} sample(s) for {:?}.", ins.len(), duration);

        let inputs = self.located(ins)?;
        let claims: Vec<_> = inputs
            .iter()
            .map(|(at, sample)| {
                let zone = self.config().incubation_zone(sample.temperature);
                (*at, self.zone_column(zone))
            })
            .collect();
        let targets = self.claim_in_columns(&claims)?;
        self.releasing(&targets, || {
            let routes = self.routes_to(
                inputs.iter().zip(&targets).map(|((at, _), &to)| (*at, to)),
                true,
            )?;
            self.follow_routes(&routes, TRANSIT_CLEARANCE)
        })?;

        let go_backs: Vec<PlaceId> = inputs.into_iter().map(|(at, _)| at).collect();
        self.reserve_vacant(&go_backs)?;
        self.set_tint(Tint::Processing);
        Ok(Incubation { go_backs, duration })
    }

    /// Ends an incubation: restores the normal tint, swaps `ins[i]` for `outs[i]` in place
    /// and returns every droplet to the pad it came from.
    pub fn end_equilibrate(
        &self,
        incubation: Incubation,
        ins: &[SampleId],
        outs: &[Sample],
    ) -> Result<Vec<PlaceId>> {
        self.check()?;
        require_pairs("equilibrate", ins.len(), outs.len())?;
        self.require_fresh("equilibrate", ins, outs.iter().map(|s| s.id))?;
        if incubation.go_backs.len() != ins.len() {
            return Err(Error::InvariantViolation(format!(
                "incubation holds {} sample(s), {} given back",
                incubation.go_backs.len(),
                ins.len()
            )));
        }
        info!(
            "Ending incubation of {} sample(s) after {:?}.",
            ins.len(),
            incubation.duration
        );

        self.set_tint(Tint::Normal);
        let mut current = Vec::with_capacity(ins.len());
        for (id, out) in ins.iter().zip(outs) {
            current.push(self.replace(*id, *out)?);
        }
        self.releasing(&incubation.go_backs, || {
            let routes = self.routes_to(
                current.into_iter().zip(incubation.go_backs.iter().copied()),
                false,
            )?;
            self.follow_routes(&routes, TRANSIT_CLEARANCE)
        })?;
        Ok(incubation.go_backs)
    }
}
