use std::sync::Arc;
use std::thread;

use biochip::prelude::*;
use biochip_examples::{init_tracing, render_snapshot_to_png, RenderConfig};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let (tx, rx) = crossbeam_channel::unbounded();
    let config = DeviceConfig::from_millis(1, 2);
    let device = Arc::new(Device::launch(config, ChannelSink::new(tx))?);

    // Renderer thread: drains events and samples the device after every change.
    let renderer = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            let mut frames = 0usize;
            let mut peak = 0usize;
            let mut rounds = 0usize;
            for event in rx {
                match event {
                    DeviceEvent::Changed => {
                        frames += 1;
                        peak = peak.max(device.snapshot().occupied().count());
                    }
                    DeviceEvent::RoundCompleted { .. } => rounds += 1,
                    DeviceEvent::Warning { context, message } => {
                        tracing::warn!("{context}: {message}");
                    }
                    _ => {}
                }
            }
            (frames, peak, rounds)
        })
    };

    let ins: Vec<SampleId> = (1..=4).map(SampleId::new).collect();
    for id in &ins {
        device.introduce(Sample::new(*id, 0.25, 295.0))?;
    }
    device.merge(Sample::new(SampleId::new(9), 0.0, 295.0), &ins)?;

    // Dropping the channel sink closes the stream and ends the renderer loop.
    device.set_sink(());
    let (frames, peak, rounds) = renderer
        .join()
        .map_err(|_| anyhow::anyhow!("renderer thread panicked"))?;
    info!(
        "Renderer saw {} frames, {} batch rounds, at most {} droplets at once.",
        frames, rounds, peak
    );

    let rc = RenderConfig::new(device.config().zones);
    render_snapshot_to_png(&device.snapshot(), &rc, "event-bus-final.png")?;
    Ok(())
}
