use std::time::Duration;

use biochip::prelude::*;
use biochip_examples::{init_tracing, render_snapshot_to_png, RenderConfig};
use tracing::info;

const CYCLES: usize = 3;
const DENATURE: f64 = 368.0;
const ANNEAL: f64 = 305.0;
const HOLD: f64 = 288.0;

struct Batch {
    ids: Vec<SampleId>,
    next: u64,
}

impl Batch {
    /// Fresh identities for the same droplets at a new temperature.
    fn at(&mut self, temperature: f64) -> Vec<Sample> {
        self.ids
            .iter()
            .map(|_| {
                self.next += 1;
                Sample::new(SampleId::new(self.next), 0.5, temperature)
            })
            .collect()
    }

    fn adopt(&mut self, outs: &[Sample]) {
        self.ids = outs.iter().map(|s| s.id).collect();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let device = Device::start(1, 2)?;
    let rc = RenderConfig::new(device.config().zones);

    let mut batch = Batch {
        ids: Vec::new(),
        next: 100,
    };
    for id in 1..=2 {
        let sample = Sample::new(SampleId::new(id), 0.5, 295.0);
        device.introduce(sample)?;
        batch.ids.push(sample.id);
    }

    for cycle in 0..CYCLES {
        let hot = batch.at(DENATURE);
        device.regulate(&batch.ids, &hot)?;
        batch.adopt(&hot);

        let incubation = device.start_equilibrate(&batch.ids, Duration::from_millis(50))?;
        if cycle == 0 {
            render_snapshot_to_png(&device.snapshot(), &rc, "thermal-cycle-incubating.png")?;
        }
        // Stand-in for the external incubation.
        std::thread::sleep(incubation.duration());
        let held = batch.at(DENATURE);
        device.end_equilibrate(incubation, &batch.ids, &held)?;
        batch.adopt(&held);

        let warm = batch.at(ANNEAL);
        device.regulate(&batch.ids, &warm)?;
        batch.adopt(&warm);
        info!("Cycle {} done.", cycle + 1);
    }

    let cold = batch.at(HOLD);
    device.regulate(&batch.ids, &cold)?;
    render_snapshot_to_png(&device.snapshot(), &rc, "thermal-cycle-done.png")?;
    Ok(())
}
