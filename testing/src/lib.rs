//! Deterministic random inputs for queue and scheduler tests.

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss
)]

use std::collections::BTreeMap;

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

/// Produces times on a grid: multiples of `step` between 0 and `(slots - 1) * step`.
///
/// Drawing from a coarse grid makes equal timestamps frequent, which is what exercises the tie
/// handling of the queues.
pub struct GridDistribution {
    slots: Uniform<u32>,
    step: f64,
}

impl GridDistribution {
    /// Constructs a distribution over `slots` grid points `step` apart.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is zero.
    #[must_use]
    pub fn new(slots: u32, step: f64) -> Self {
        Self {
            slots: Uniform::new(0, slots),
            step,
        }
    }
}

impl Distribution<f64> for GridDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        f64::from(self.slots.sample(rng)) * self.step
    }
}

/// Draws `n` timestamps uniformly from `[0, max)`.
pub fn timestamps<R: Rng + ?Sized>(rng: &mut R, n: usize, max: f64) -> Vec<f64> {
    let dist = Uniform::new(0.0, max);
    (0..n).map(|_| dist.sample(rng)).collect()
}

/// One operation on a scheduler of items identified by `id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceOp {
    /// Schedule item `id`, not currently scheduled, at `time`.
    Schedule {
        /// Item identifier.
        id: usize,
        /// Scheduled time.
        time: f64,
    },
    /// Remove item `id`, currently scheduled at `time`.
    Unschedule {
        /// Item identifier.
        id: usize,
        /// Time at which it is scheduled.
        time: f64,
    },
    /// Move item `id` from time `from` to time `to`.
    Reschedule {
        /// Item identifier.
        id: usize,
        /// Current time of the item.
        from: f64,
        /// New time of the item.
        to: f64,
    },
    /// Read the minimum time.
    Read,
    /// Remove all items scheduled at the minimum time.
    PopImminent,
}

/// Generates a consistent trace of `len` operations over items `0..ids`, seeded with `seed`.
///
/// Times never go back: every scheduled time is at or after the last popped time, as in a
/// simulation. Times are drawn from a grid so that ties are common.
#[must_use]
pub fn random_trace(seed: u64, len: usize, ids: usize) -> Vec<TraceOp> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let delta = GridDistribution::new(40, 0.5);
    let mut scheduled: BTreeMap<usize, f64> = BTreeMap::new();
    let mut now = 0.0;
    let mut trace = Vec::with_capacity(len);
    while trace.len() < len {
        let op = match rng.gen_range(0..10) {
            0..=3 => {
                let id = rng.gen_range(0..ids);
                if scheduled.contains_key(&id) {
                    continue;
                }
                let time = now + delta.sample(&mut rng);
                scheduled.insert(id, time);
                TraceOp::Schedule { id, time }
            }
            4 => {
                let Some((&id, &time)) = scheduled.iter().nth(rng.gen_range(0..ids.max(1)))
                else {
                    continue;
                };
                scheduled.remove(&id);
                TraceOp::Unschedule { id, time }
            }
            5 | 6 => {
                let Some((&id, &from)) = scheduled.iter().nth(rng.gen_range(0..ids.max(1)))
                else {
                    continue;
                };
                let to = now + delta.sample(&mut rng);
                scheduled.insert(id, to);
                TraceOp::Reschedule { id, from, to }
            }
            7 => TraceOp::Read,
            _ => {
                if let Some(min) = scheduled.values().copied().reduce(f64::min) {
                    now = min;
                    scheduled.retain(|_, time| *time != min);
                }
                TraceOp::PopImminent
            }
        };
        trace.push(op);
    }
    trace
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_grid() {
        let mut rng = ChaChaRng::seed_from_u64(17);
        let dist = GridDistribution::new(4, 0.25);
        for _ in 0..100 {
            let value = dist.sample(&mut rng);
            assert!([0.0, 0.25, 0.5, 0.75].contains(&value));
        }
    }

    #[test]
    fn test_trace_is_deterministic_and_consistent() {
        let trace = random_trace(3, 600, 50);
        assert_eq!(trace, random_trace(3, 600, 50));
        assert_eq!(trace.len(), 600);
        let mut scheduled = BTreeMap::new();
        for op in trace {
            match op {
                TraceOp::Schedule { id, time } => {
                    assert!(scheduled.insert(id, time).is_none());
                }
                TraceOp::Unschedule { id, time } => {
                    assert_eq!(scheduled.remove(&id), Some(time));
                }
                TraceOp::Reschedule { id, from, to } => {
                    assert_eq!(scheduled.insert(id, to), Some(from));
                }
                TraceOp::Read => {}
                TraceOp::PopImminent => {
                    if let Some(min) = scheduled.values().copied().reduce(f64::min) {
                        scheduled.retain(|_, time| *time != min);
                    }
                }
            }
        }
    }
}
