//! Droplet choreography: animated primitives and the compound operations built on them.
pub mod ops;
pub mod primitives;

pub use ops::Incubation;
