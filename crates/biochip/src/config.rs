//! Device configuration: pacing, initial grid shape, zone layout and thermal thresholds.
use std::time::Duration;

use crate::error::{Error, Result};
use crate::grid::zone::{Zone, ZoneLayout};

pub const DEFAULT_ROWS: usize = 11;
pub const DEFAULT_COLS: usize = 21;
pub const DEFAULT_COLD_THRESHOLD: f64 = 293.0;
pub const DEFAULT_HOT_THRESHOLD: f64 = 313.0;
pub const DEFAULT_MAX_GROWTH_STEPS: usize = 4096;

/// Configuration for a [`crate::device::Device`].
#[non_exhaustive]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Pause after each of the first three actuation phases of a hop.
    pub phase_delay: Duration,
    /// Pause after the last actuation phase of a hop.
    pub step_delay: Duration,
    /// Initial number of pad rows.
    pub rows: usize,
    /// Initial number of pad columns.
    pub cols: usize,
    /// Column offsets of the named zones.
    pub zones: ZoneLayout,
    /// Below this temperature (Kelvin) a droplet belongs in the staging zone.
    pub cold_threshold: f64,
    /// Above this temperature (Kelvin) a droplet belongs in the hot zone.
    pub hot_threshold: f64,
    /// Upper bound on grow-and-retry iterations of a single free-pad search.
    pub max_growth_steps: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            phase_delay: Duration::ZERO,
            step_delay: Duration::ZERO,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            zones: ZoneLayout::default(),
            cold_threshold: DEFAULT_COLD_THRESHOLD,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            max_growth_steps: DEFAULT_MAX_GROWTH_STEPS,
        }
    }
}

impl DeviceConfig {
    /// Creates a default configuration paced by the given delays in milliseconds.
    pub fn from_millis(phase_delay_ms: u64, step_delay_ms: u64) -> Self {
        Self::default()
            .with_phase_delay(Duration::from_millis(phase_delay_ms))
            .with_step_delay(Duration::from_millis(step_delay_ms))
    }

    /// Sets the delay after actuation phases 0 to 2.
    pub fn with_phase_delay(mut self, phase_delay: Duration) -> Self {
        self.phase_delay = phase_delay;
        self
    }

    /// Sets the delay after actuation phase 3.
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    /// Sets the initial grid shape.
    pub fn with_shape(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Sets the zone layout.
    pub fn with_zones(mut self, zones: ZoneLayout) -> Self {
        self.zones = zones;
        self
    }

    /// Sets the cold and hot thresholds (Kelvin).
    pub fn with_thresholds(mut self, cold: f64, hot: f64) -> Self {
        self.cold_threshold = cold;
        self.hot_threshold = hot;
        self
    }

    /// Sets the growth bound for free-pad searches.
    pub fn with_max_growth_steps(mut self, steps: usize) -> Self {
        self.max_growth_steps = steps;
        self
    }

    /// Zone a droplet of the given temperature should be parked in by `regulate`.
    pub fn regulation_zone(&self, temperature: f64) -> Zone {
        if temperature < self.cold_threshold {
            Zone::Staging
        } else if temperature > self.hot_threshold {
            Zone::Hot
        } else {
            Zone::Warm
        }
    }

    /// Zone a droplet of the given temperature incubates in during equilibration.
    pub fn incubation_zone(&self, temperature: f64) -> Zone {
        if temperature < self.cold_threshold {
            Zone::Mixing
        } else if temperature > self.hot_threshold {
            Zone::Hot
        } else {
            Zone::Warm
        }
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidConfig(
                "grid shape must be > 0 in both dimensions".into(),
            ));
        }
        if !self.cold_threshold.is_finite() || !self.hot_threshold.is_finite() {
            return Err(Error::InvalidConfig("thresholds must be finite".into()));
        }
        if self.cold_threshold > self.hot_threshold {
            return Err(Error::InvalidConfig(
                "cold_threshold must not exceed hot_threshold".into(),
            ));
        }
        if self.zones.max_column() > u16::MAX as usize {
            return Err(Error::InvalidConfig(
                "zone columns must fit in u16 range".into(),
            ));
        }
        if self.max_growth_steps == 0 {
            return Err(Error::InvalidConfig("max_growth_steps must be > 0".into()));
        }

        Ok(())
    }
}
