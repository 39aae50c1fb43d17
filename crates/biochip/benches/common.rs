#![allow(dead_code)]

use std::time::Duration;

use biochip::prelude::{Device, DeviceConfig, Sample, SampleId};
use criterion::{Criterion, Throughput};

// A batch of 64 lanes of 32 hops runs 2048 hops under one lock per phase; keep the sample
// count modest so the largest inputs finish in the measurement window.
pub const SAMPLE_SIZE: usize = 30;
pub const WARM_UP: Duration = Duration::from_millis(500);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(3);

/// Parallel lanes per batch, one droplet each.
pub const LANE_COUNTS: [usize; 4] = [1, 4, 16, 64];
/// Hops per lane in batch benches.
pub const LANE_LENGTH: usize = 32;
/// Hops of a single route; the default device is 21 pads wide, so the longer ones grow it.
pub const ROUTE_LENGTHS: [usize; 3] = [8, 64, 256];
/// Staging reservations per iteration; each takes two rows, so most of them grow the grid.
pub const RESERVATION_COUNTS: [usize; 3] = [16, 128, 1024];
/// Work-row widths of `2n - 1` slots for merges of 2, 5 and 9 inputs.
pub const AREA_WIDTHS: [usize; 3] = [3, 9, 17];

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

/// One element per hop or per allocated pad.
pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// Unpaced device of the given shape.
pub fn device(rows: usize, cols: usize) -> Device {
    Device::with_config(DeviceConfig::default().with_shape(rows, cols)).expect("valid config")
}

pub fn droplet(id: u64) -> Sample {
    Sample::new(SampleId::new(id), 1.0, 295.0)
}
