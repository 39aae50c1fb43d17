#![forbid(unsafe_code)]

mod rendering;

pub use rendering::{init_tracing, render_snapshot, render_snapshot_to_png, RenderConfig};
