use serde::{Deserialize, Serialize};

/// Synchronization strategy shared by every processor of a simulation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sequential: one imminent model per coordinator steps at each tick, chosen by the select
    /// function of the coupled model.
    #[default]
    Classic,
    /// Bag-synchronized: outputs of all imminent models are collected first, then every affected
    /// model transitions exactly once.
    Parallel,
    /// Parallel with state snapshots, allowing the simulation to roll back when an input arrives
    /// in the past.
    TimeWarp,
}

impl Strategy {
    /// Checks if processors collect outputs before transitions.
    #[must_use]
    pub fn uses_bags(self) -> bool {
        !matches!(self, Self::Classic)
    }

    /// Checks if simulators save snapshots.
    #[must_use]
    pub fn saves_snapshots(self) -> bool {
        matches!(self, Self::TimeWarp)
    }
}
