use delegate::delegate;

use crate::scheduler::{Entry, Scheduler};
use crate::{Time, Timed, INFINITY};

const DEFAULT_THRESHOLD: usize = 50;
const DEFAULT_MAX_RUNGS: usize = 8;

/// Bucket array covering `[start, start + width * buckets.len())`.
#[derive(Debug, Clone)]
struct Rung<T> {
    start: Time,
    current: Time,
    width: Time,
    current_bucket: usize,
    buckets: Vec<Vec<T>>,
    size: usize,
}

impl<T: Timed> Rung<T> {
    fn new(start: Time, width: Time, bucket_count: usize) -> Self {
        Self {
            start,
            current: start,
            width,
            current_bucket: 0,
            buckets: std::iter::repeat_with(Vec::new).take(bucket_count).collect(),
            size: 0,
        }
    }

    fn bucket_index(&self, time: Time) -> usize {
        let last = self.buckets.len() - 1;
        let index = if !time.is_finite() {
            last
        } else if self.width <= 0.0 {
            0
        } else {
            (((time - self.start) / self.width) as usize).min(last)
        };
        index.max(self.current_bucket)
    }

    /// Whether `time` belongs to one of the buckets not yet taken.
    fn accepts(&self, time: Time) -> bool {
        self.current_bucket < self.buckets.len() && time >= self.current
    }

    fn push(&mut self, item: T) {
        let index = self.bucket_index(item.time_next());
        self.buckets[index].push(item);
        self.size += 1;
    }

    /// Takes the next non-empty bucket and moves the rung past it.
    fn take_next_bucket(&mut self) -> Option<Vec<T>> {
        if self.size == 0 {
            return None;
        }
        while self.buckets.get(self.current_bucket)?.is_empty() {
            self.current_bucket += 1;
        }
        let bucket = std::mem::take(&mut self.buckets[self.current_bucket]);
        self.size -= bucket.len();
        self.current_bucket += 1;
        self.current = self.start + self.width * self.current_bucket as Time;
        Some(bucket)
    }
}

/// Minimum time and maximum finite time of `items`, if they are far enough apart to be spread
/// over buckets.
fn span<T: Timed>(items: &[T]) -> Option<(Time, Time)> {
    let min = items
        .iter()
        .map(Timed::time_next)
        .fold(INFINITY, Time::min);
    let max = items
        .iter()
        .map(Timed::time_next)
        .filter(|t| t.is_finite())
        .fold(Time::NEG_INFINITY, Time::max);
    (max > min).then_some((min, max))
}

fn sort_descending<T: Timed>(items: &mut [T]) {
    items.sort_by(|a, b| b.time_next().total_cmp(&a.time_next()));
}

fn remove_unordered<T: PartialEq>(items: &mut Vec<T>, item: &T) -> Option<T> {
    let position = items.iter().position(|e| e == item)?;
    Some(items.swap_remove(position))
}

/// Ladder queue: a three-tier priority queue with amortized constant time operations.
///
/// - **Top** is an unsorted list collecting items at or after `top_start`.
/// - **Rungs** are bucket arrays of decreasing width. The first rung is built from the top when
///   everything below is exhausted, and a bucket holding more than `threshold` items is spread
///   over a new, finer rung rather than sorted.
/// - **Bottom** is a short sorted list from which items are dequeued.
///
/// Each transfer of the top into the rungs starts a new *epoch*.
#[derive(Debug, Clone)]
pub struct LadderQueue<T> {
    threshold: usize,
    max_rungs: usize,
    top: Vec<T>,
    top_max: Time,
    top_start: Time,
    rungs: Vec<Rung<T>>,
    bottom: Vec<T>,
    epoch: usize,
    size: usize,
}

impl<T: Timed + PartialEq> Default for LadderQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MAX_RUNGS)
    }
}

impl<T: Timed + PartialEq> LadderQueue<T> {
    /// Constructs an empty queue sorting at most `threshold` items at once and using at most
    /// `max_rungs` rungs.
    #[must_use]
    pub fn new(threshold: usize, max_rungs: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            max_rungs: max_rungs.max(1),
            top: Vec::new(),
            top_max: 0.0,
            top_start: 0.0,
            rungs: Vec::new(),
            bottom: Vec::new(),
            epoch: 0,
            size: 0,
        }
    }

    /// Number of items in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Checks if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of items in the top tier.
    #[must_use]
    pub fn top_size(&self) -> usize {
        self.top.len()
    }

    /// Number of items in the bottom tier.
    #[must_use]
    pub fn bottom_size(&self) -> usize {
        self.bottom.len()
    }

    /// Number of items in each active rung, coarsest first.
    #[must_use]
    pub fn rung_sizes(&self) -> Vec<usize> {
        self.rungs.iter().map(|r| r.size).collect()
    }

    /// Number of rungs in use.
    #[must_use]
    pub fn active_rungs(&self) -> usize {
        self.rungs.len()
    }

    /// Number of times the top tier was transferred down.
    #[must_use]
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Inserts an item.
    pub fn push(&mut self, item: T) {
        let time = item.time_next();
        self.size += 1;
        if time >= self.top_start {
            self.top_max = self.top_max.max(time);
            self.top.push(item);
            return;
        }
        if let Some(rung) = self.rungs.iter_mut().find(|r| r.accepts(time)) {
            rung.push(item);
            return;
        }
        let position = self
            .bottom
            .iter()
            .rposition(|e| e.time_next() > time)
            .map_or(0, |j| j + 1);
        self.bottom.insert(position, item);
        if self.bottom.len() > self.threshold && self.rungs.len() < self.max_rungs {
            if let Some((min, max)) = span(&self.bottom) {
                let items = std::mem::take(&mut self.bottom);
                self.spawn_rung(items, min, max);
            }
        }
    }

    /// Returns the soonest item without removing it.
    pub fn peek(&mut self) -> Option<&T> {
        self.prepare();
        self.bottom.last()
    }

    /// Removes and returns the soonest item.
    pub fn pop(&mut self) -> Option<T> {
        self.prepare();
        let item = self.bottom.pop()?;
        self.size -= 1;
        Some(item)
    }

    /// Removes an item equal to `item` and returns it, if present.
    pub fn delete(&mut self, item: &T) -> Option<T> {
        let removed = self
            .delete_located(item)
            .or_else(|| self.delete_anywhere(item))?;
        self.size -= 1;
        Some(removed)
    }

    fn delete_located(&mut self, item: &T) -> Option<T> {
        let time = item.time_next();
        if time >= self.top_start {
            return remove_unordered(&mut self.top, item);
        }
        if let Some(rung) = self.rungs.iter_mut().find(|r| r.accepts(time)) {
            let index = rung.bucket_index(time);
            let removed = remove_unordered(&mut rung.buckets[index], item)?;
            rung.size -= 1;
            return Some(removed);
        }
        let position = self.bottom.iter().position(|e| e == item)?;
        Some(self.bottom.remove(position))
    }

    fn delete_anywhere(&mut self, item: &T) -> Option<T> {
        if let Some(removed) = remove_unordered(&mut self.top, item) {
            return Some(removed);
        }
        for rung in &mut self.rungs {
            if let Some(removed) = rung
                .buckets
                .iter_mut()
                .find_map(|bucket| remove_unordered(bucket, item))
            {
                rung.size -= 1;
                return Some(removed);
            }
        }
        let position = self.bottom.iter().position(|e| e == item)?;
        Some(self.bottom.remove(position))
    }

    fn spawn_rung(&mut self, items: Vec<T>, min: Time, max: Time) {
        let count = items.len();
        let mut rung = Rung::new(min, (max - min) / count as Time, count + 1);
        for item in items {
            rung.push(item);
        }
        self.rungs.push(rung);
    }

    /// Refills the bottom tier if it is empty.
    fn prepare(&mut self) {
        while self.bottom.is_empty() {
            if let Some(rung) = self.rungs.last_mut() {
                let Some(mut bucket) = rung.take_next_bucket() else {
                    self.rungs.pop();
                    continue;
                };
                if bucket.len() > self.threshold && self.rungs.len() < self.max_rungs {
                    if let Some((min, max)) = span(&bucket) {
                        self.spawn_rung(bucket, min, max);
                        continue;
                    }
                }
                sort_descending(&mut bucket);
                self.bottom = bucket;
            } else {
                if self.top.is_empty() {
                    return;
                }
                let mut items = std::mem::take(&mut self.top);
                self.top_start = self.top_max;
                self.epoch += 1;
                match span(&items) {
                    Some((min, max)) if items.len() > 1 => self.spawn_rung(items, min, max),
                    _ => {
                        sort_descending(&mut items);
                        self.bottom = items;
                    }
                }
            }
        }
    }
}

/// Scheduler backed by a [`LadderQueue`].
#[derive(Debug, Default, Clone)]
pub struct LadderQueueScheduler {
    queue: LadderQueue<Entry>,
}

impl LadderQueueScheduler {
    delegate! {
        to self.queue {
            /// Number of rungs in use.
            #[must_use]
            pub fn active_rungs(&self) -> usize;
            /// Number of times the top tier was transferred down.
            #[must_use]
            pub fn epoch(&self) -> usize;
        }
    }
}

impl Scheduler for LadderQueueScheduler {
    fn schedule(&mut self, entry: Entry) {
        self.queue.push(entry);
    }

    fn unschedule(&mut self, entry: Entry) -> Option<Entry> {
        self.queue.delete(&entry)
    }

    fn read(&mut self) -> Option<Time> {
        self.queue.peek().map(Timed::time_next)
    }

    fn imminent(&mut self, time: Time) -> Vec<Entry> {
        let mut imminent = Vec::new();
        while self.read() == Some(time) {
            imminent.extend(self.queue.pop());
        }
        imminent
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
