//! Settings of a simulation run, typically loaded from a JSON file.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::{is_valid_time, Error, Result, SchedulerKind, Strategy, Time};

/// Time-warp specific settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWarpConfig {
    /// How far behind the latest processed tick an injected input may be stamped.
    pub max_lag: Time,
    /// Number of ticks between fossil collections.
    pub fossil_interval: usize,
}

impl Default for TimeWarpConfig {
    fn default() -> Self {
        Self {
            max_lag: 10.0,
            fossil_interval: 1,
        }
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated time at which the run stops.
    pub duration: Time,
    /// Synchronization strategy.
    pub strategy: Strategy,
    /// Scheduler used by every coordinator.
    pub scheduler: SchedulerKind,
    /// Number of worker threads; more than one enables concurrent steps in the parallel
    /// strategies.
    pub workers: usize,
    /// Time-warp settings, ignored by the other strategies.
    pub time_warp: TimeWarpConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: 60.0,
            strategy: Strategy::default(),
            scheduler: SchedulerKind::default(),
            workers: 1,
            time_warp: TimeWarpConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Loads and validates a configuration from JSON. Missing fields take default values.
    ///
    /// # Example
    ///
    /// ```
    /// # use devs::{SchedulerKind, SimulationConfig, Strategy};
    /// # fn main() -> devs::Result<()> {
    /// let input = r#"{
    ///     "duration": 100,
    ///     "strategy": "time_warp",
    ///     "scheduler": "calendar_queue",
    ///     "time_warp": { "max_lag": 2.5 }
    /// }"#;
    /// let config = SimulationConfig::from_json(input.as_bytes())?;
    /// assert_eq!(config.duration, 100.0);
    /// assert_eq!(config.strategy, Strategy::TimeWarp);
    /// assert_eq!(config.scheduler, SchedulerKind::CalendarQueue);
    /// assert_eq!(config.time_warp.max_lag, 2.5);
    /// assert_eq!(config.time_warp.fossil_interval, 1);
    /// assert_eq!(config.workers, 1);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the input cannot be parsed, and [`Error::InvalidConfig`] if
    /// it fails [validation](Self::validate).
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if any of these is true:
    /// - duration is negative or not finite,
    /// - there are no workers,
    /// - the maximum lag is negative or not finite,
    /// - the fossil interval is zero.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if !is_valid_time(self.duration) || !self.duration.is_finite() {
            return invalid(format!("duration must be finite and non-negative ({})", self.duration));
        }
        if self.workers == 0 {
            return invalid(String::from("at least one worker is required"));
        }
        let lag = self.time_warp.max_lag;
        if !is_valid_time(lag) || !lag.is_finite() {
            return invalid(format!("max lag must be finite and non-negative ({})", lag));
        }
        if self.time_warp.fossil_interval == 0 {
            return invalid(String::from("fossil interval must be positive"));
        }
        Ok(())
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Time) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Sets the number of workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the time-warp settings.
    #[must_use]
    pub fn with_time_warp(mut self, time_warp: TimeWarpConfig) -> Self {
        self.time_warp = time_warp;
        self
    }
}
