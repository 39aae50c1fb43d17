//! Lock-step batch stepping.
//!
//! All routes of a batch share one phase clock. At the start of each round every unfinished
//! route is gated once: it may hop this round if [`can_step_to`] holds for its next pad and
//! no route gated before it already claimed that pad. Gated-in routes then run the four
//! phases together, with one announcement and one pause per phase for the whole batch.
use std::collections::HashSet;

use tracing::{debug, warn};

use crate::device::{ChipState, Device};
use crate::error::{Error, Result};
use crate::events::DeviceEvent;
use crate::grid::{Direction, PlaceId};
use crate::routing::path::Route;
use crate::routing::scheduler::{apply_phase, can_step_to, Phase};
use crate::sample::SampleId;

/// A hop admitted into the current round.
#[derive(Clone, Copy, Debug)]
struct Hop {
    route: usize,
    direction: Direction,
    from: PlaceId,
    to: PlaceId,
}

/// Gates every unfinished route against the state at the start of the round.
fn admit(
    state: &ChipState,
    routes: &[Route],
    cursors: &[usize],
    clearance: usize,
) -> Result<Vec<Hop>> {
    let mut claimed = HashSet::new();
    let mut hops = Vec::new();
    for (index, (route, &cursor)) in routes.iter().zip(cursors).enumerate() {
        let Some((from, to)) = route.hop(cursor) else {
            continue;
        };
        if claimed.contains(&to)
            || !can_step_to(&state.grid, &state.placement, from, to, clearance)?
        {
            continue;
        }
        claimed.insert(to);
        let coords = route.coords();
        hops.push(Hop {
            route: index,
            direction: Direction::between(coords[cursor], coords[cursor + 1])?,
            from,
            to,
        });
    }
    Ok(hops)
}

fn unfinished(routes: &[Route], cursors: &[usize]) -> usize {
    routes
        .iter()
        .zip(cursors)
        .filter(|(route, &cursor)| cursor < route.hops())
        .count()
}

impl Device {
    /// Advances every route to its destination in synchronized rounds.
    ///
    /// A route whose gate fails sits out the round. If a round admits no route while some
    /// are unfinished, the batch fails with [`Error::Deadlock`]; hops already taken are kept.
    pub fn follow_routes(&self, routes: &[Route], clearance: usize) -> Result<()> {
        self.check()?;
        let samples = self.read_state(|state| {
            routes
                .iter()
                .map(|route| state.occupant(route.origin()).map(|s| s.id))
                .collect::<Result<Vec<SampleId>>>()
        })?;
        let origins: HashSet<PlaceId> = routes.iter().map(Route::origin).collect();
        if origins.len() != routes.len() {
            return Err(Error::InvariantViolation(
                "two routes of a batch start on the same pad".into(),
            ));
        }

        let mut cursors = vec![0; routes.len()];
        let mut round = 0;
        loop {
            let remaining = unfinished(routes, &cursors);
            if remaining == 0 {
                break;
            }
            self.check()?;
            let hops = self.read_state(|state| admit(state, routes, &cursors, clearance))?;
            if hops.is_empty() {
                warn!(
                    "Batch deadlocked in round {} with {} route(s) unfinished.",
                    round, remaining
                );
                self.emit(DeviceEvent::Warning {
                    context: "follow_routes".into(),
                    message: format!("no route could advance in round {round}"),
                });
                return Err(Error::Deadlock { remaining });
            }

            for phase in Phase::ALL {
                self.check()?;
                self.with_state(|state| -> Result<()> {
                    for hop in &hops {
                        apply_phase(state, phase, hop.direction, hop.from, hop.to)?;
                    }
                    state.changed();
                    Ok(())
                })?;
                self.pace(phase.delay(self.config()));
            }

            for hop in &hops {
                cursors[hop.route] += 1;
                let route = &routes[hop.route];
                if cursors[hop.route] == route.hops() {
                    self.emit(DeviceEvent::RouteFinished {
                        sample: samples[hop.route],
                        hops: route.hops(),
                    });
                }
            }
            let remaining = unfinished(routes, &cursors);
            debug!(
                "Round {}: {} route(s) advanced, {} remaining.",
                round,
                hops.len(),
                remaining
            );
            self.emit(DeviceEvent::RoundCompleted {
                round,
                advanced: hops.len(),
                remaining,
            });
            round += 1;
        }
        Ok(())
    }
}
