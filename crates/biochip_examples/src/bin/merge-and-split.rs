use biochip::prelude::*;
use biochip_examples::{init_tracing, render_snapshot_to_png, RenderConfig};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let device = Device::start(0, 0)?;
    let rc = RenderConfig::new(device.config().zones).with_cell_size(32);
    let mut rng = StdRng::seed_from_u64(2024);

    // Three droplets of random volume enter the staging column.
    let ins: Vec<SampleId> = (1..=3).map(SampleId::new).collect();
    for id in &ins {
        let volume = 0.25 + rng.random::<f64>() * 0.5;
        device.introduce(Sample::new(*id, volume, 295.0))?;
    }
    render_snapshot_to_png(&device.snapshot(), &rc, "merge-and-split-introduced.png")?;

    let merged = SampleId::new(10);
    let at = device.merge(Sample::new(merged, 0.0, 295.0), &ins)?;
    let total = device.occupant(at).map(|s| s.volume).unwrap_or_default();
    info!("Merged {} droplets into {} with volume {:.3}.", ins.len(), merged, total);
    render_snapshot_to_png(&device.snapshot(), &rc, "merge-and-split-merged.png")?;

    // The first output receives whatever the other two leave behind.
    let outs = [
        Sample::new(SampleId::new(20), 0.0, 295.0),
        Sample::new(SampleId::new(21), total / 3.0, 295.0),
        Sample::new(SampleId::new(22), total / 3.0, 295.0),
    ];
    let targets = device.split(merged, &outs)?;
    for at in &targets {
        if let Some(sample) = device.occupant(*at) {
            info!("{} holds {:.3} at {:?}.", sample.id, sample.volume, device.coords(*at)?);
        }
    }
    render_snapshot_to_png(&device.snapshot(), &rc, "merge-and-split-split.png")?;

    let ids: Vec<SampleId> = outs.iter().map(|s| s.id).collect();
    let disposed = device.dispose(&ids)?;
    info!(
        "Disposed {} droplets; {} left on the grid.",
        disposed.len(),
        device.sample_count()
    );

    Ok(())
}
