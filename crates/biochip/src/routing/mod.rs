//! Pathfinding and the single-route and lock-step batch schedulers.
pub mod batch;
pub mod path;
pub mod scheduler;

pub use path::{path_axis_first, path_horizontal_first, path_vertical_first, Route};
pub use scheduler::{can_step_to, direction};
