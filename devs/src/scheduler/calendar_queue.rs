use delegate::delegate;

use crate::scheduler::{Entry, Scheduler};
use crate::{Time, Timed};

const DEFAULT_BUCKET_COUNT: usize = 2;
const DEFAULT_BUCKET_WIDTH: Time = 1.0;
const MAX_WIDTH_SAMPLES: usize = 25;

/// Calendar queue: a bucket array where each bucket covers one "day" of width `bucket_width`, and
/// the whole array one "year".
///
/// Items hash into buckets by their time modulo the year length, giving expected constant time
/// insertion and removal. The bucket count doubles when the queue holds more than twice as many
/// items as buckets and halves when it holds fewer than half minus two. On every resize, the
/// bucket width is re-estimated by sampling the separation of the soonest items.
///
/// Each bucket is kept sorted in descending order, so its soonest item is the last one.
#[derive(Debug, Clone)]
pub struct CalendarQueue<T> {
    buckets: Vec<Vec<T>>,
    width: Time,
    size: usize,
    last_bucket: usize,
    last_priority: Time,
    bucket_top: Time,
    shrink_threshold: usize,
    expand_threshold: usize,
    resize_enabled: bool,
}

impl<T: Timed + PartialEq> Default for CalendarQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_COUNT, DEFAULT_BUCKET_WIDTH, 0.0)
    }
}

fn bucket_top(priority: Time, width: Time) -> Time {
    ((priority / width).floor() + 1.5) * width
}

impl<T: Timed + PartialEq> CalendarQueue<T> {
    /// Constructs an empty queue with `bucket_count` buckets of width `bucket_width`, positioned
    /// at `start_priority`.
    #[must_use]
    pub fn new(bucket_count: usize, bucket_width: Time, start_priority: Time) -> Self {
        let mut queue = Self {
            buckets: Vec::new(),
            width: bucket_width,
            size: 0,
            last_bucket: 0,
            last_priority: start_priority,
            bucket_top: 0.0,
            shrink_threshold: 0,
            expand_threshold: 0,
            resize_enabled: true,
        };
        queue.local_init(bucket_count.max(DEFAULT_BUCKET_COUNT), bucket_width, start_priority);
        queue
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

    /// Current number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Current bucket width.
    #[must_use]
    pub fn bucket_width(&self) -> Time {
        self.width
    }

    /// Inserts an item.
    pub fn push(&mut self, item: T) {
        let time = item.time_next();
        let index = self.bucket_index(time);
        let bucket = &mut self.buckets[index];
        let position = bucket
            .iter()
            .rposition(|e| e.time_next() > time)
            .map_or(0, |j| j + 1);
        bucket.insert(position, item);
        if time < self.last_priority {
            self.last_bucket = index;
            self.last_priority = time;
            self.bucket_top = bucket_top(time, self.width);
        }
        self.size += 1;
        if self.size > self.expand_threshold {
            self.resize(2 * self.buckets.len());
        }
    }

    /// Returns the soonest item without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        if self.size == 0 {
            return None;
        }
        let count = self.buckets.len();
        let mut index = self.last_bucket;
        let mut top = self.bucket_top;
        for _ in 0..count {
            if let Some(item) = self.buckets[index].last() {
                if item.time_next() < top {
                    return Some(item);
                }
            }
            index = (index + 1) % count;
            top += self.width;
        }
        self.lowest_bucket()
            .and_then(|index| self.buckets[index].last())
    }

    /// Removes and returns the soonest item.
    pub fn pop(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        let count = self.buckets.len();
        let mut index = self.last_bucket;
        for _ in 0..count {
            let found = self.buckets[index]
                .last()
                .map_or(false, |item| item.time_next() < self.bucket_top);
            if found {
                return self.take_from(index);
            }
            index = (index + 1) % count;
            self.bucket_top += self.width;
        }
        // A whole year went by without a hit: search directly.
        let index = self.lowest_bucket()?;
        let item = self.take_from(index);
        self.bucket_top = bucket_top(self.last_priority, self.width);
        item
    }

    /// Removes an item equal to `item` and returns it, if present.
    pub fn delete(&mut self, item: &T) -> Option<T> {
        let index = self.bucket_index(item.time_next());
        let bucket = &mut self.buckets[index];
        let position = bucket.iter().position(|e| e == item)?;
        let removed = bucket.remove(position);
        self.size -= 1;
        if self.size < self.shrink_threshold {
            self.resize(self.buckets.len() / 2);
        }
        Some(removed)
    }

    fn bucket_index(&self, time: Time) -> usize {
        // Saturates for infinite times.
        let virtual_bucket = (time / self.width) as usize;
        virtual_bucket % self.buckets.len()
    }

    fn lowest_bucket(&self) -> Option<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(index, bucket)| bucket.last().map(|item| (index, item.time_next())))
            .fold(None, |lowest: Option<(usize, Time)>, (index, time)| match lowest {
                Some((_, min)) if min <= time => lowest,
                _ => Some((index, time)),
            })
            .map(|(index, _)| index)
    }

    fn take_from(&mut self, index: usize) -> Option<T> {
        let item = self.buckets[index].pop()?;
        self.last_bucket = index;
        self.last_priority = item.time_next();
        self.size -= 1;
        if self.size < self.shrink_threshold {
            self.resize(self.buckets.len() / 2);
        }
        Some(item)
    }

    fn local_init(&mut self, bucket_count: usize, bucket_width: Time, start_priority: Time) {
        self.buckets = std::iter::repeat_with(Vec::new).take(bucket_count).collect();
        self.width = bucket_width;
        self.last_priority = start_priority;
        self.last_bucket = self.bucket_index(start_priority);
        self.bucket_top = bucket_top(start_priority, bucket_width);
        self.shrink_threshold = (bucket_count / 2).saturating_sub(2);
        self.expand_threshold = 2 * bucket_count;
    }

    fn resize(&mut self, bucket_count: usize) {
        if !self.resize_enabled {
            return;
        }
        let bucket_count = bucket_count.max(DEFAULT_BUCKET_COUNT);
        let width = self.estimate_width();
        log::trace!(
            "calendar queue resize: {} -> {} buckets, width {} -> {}",
            self.buckets.len(),
            bucket_count,
            self.width,
            width
        );
        let old = std::mem::take(&mut self.buckets);
        self.local_init(bucket_count, width, self.last_priority);
        self.size = 0;
        self.resize_enabled = false;
        for item in old.into_iter().flatten() {
            self.push(item);
        }
        self.resize_enabled = true;
    }

    /// Estimates a bucket width from the separation of the soonest items.
    ///
    /// The sampled items are always put back, and the dequeue position is restored afterwards.
    fn estimate_width(&mut self) -> Time {
        if self.size < 2 {
            return DEFAULT_BUCKET_WIDTH;
        }
        let sample_size = if self.size <= 5 {
            self.size
        } else {
            (5 + self.size / 10).min(MAX_WIDTH_SAMPLES)
        };
        let saved = (self.last_bucket, self.last_priority, self.bucket_top);
        self.resize_enabled = false;
        let samples: Vec<T> = std::iter::from_fn(|| self.pop())
            .take(sample_size)
            .collect();
        let separations: Vec<Time> = samples
            .windows(2)
            .map(|w| w[1].time_next() - w[0].time_next())
            .filter(|d| d.is_finite())
            .collect();
        for item in samples {
            self.push(item);
        }
        let (last_bucket, last_priority, top) = saved;
        self.last_bucket = last_bucket;
        self.last_priority = last_priority;
        self.bucket_top = top;
        self.resize_enabled = true;

        let mean = |values: &[Time]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<Time>() / values.len() as Time
            }
        };
        let average = mean(&separations);
        let filtered: Vec<Time> = separations
            .iter()
            .copied()
            .filter(|d| *d < 2.0 * average)
            .collect();
        let filtered_average = mean(&filtered);
        if filtered_average > 0.0 {
            filtered_average * 3.0
        } else if average > 0.0 {
            average * 2.0
        } else {
            DEFAULT_BUCKET_WIDTH
        }
    }
}

/// Scheduler backed by a [`CalendarQueue`].
#[derive(Debug, Default, Clone)]
pub struct CalendarQueueScheduler {
    queue: CalendarQueue<Entry>,
}

impl CalendarQueueScheduler {
    delegate! {
        to self.queue {
            /// Current number of buckets.
            #[must_use]
            pub fn bucket_count(&self) -> usize;
            /// Current bucket width.
            #[must_use]
            pub fn bucket_width(&self) -> Time;
        }
    }
}

impl Scheduler for CalendarQueueScheduler {
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::INFINITY;
    use float_cmp::approx_eq;
    use rand::SeedableRng;
    use rstest::rstest;
    use testing::timestamps;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Ev(Time);

    impl Timed for Ev {
        fn time_next(&self) -> Time {
            self.0
        }
    }

    fn drain(queue: &mut CalendarQueue<Ev>) -> Vec<Time> {
        std::iter::from_fn(|| queue.pop()).map(|e| e.0).collect()
    }

    #[rstest]
    #[case(100)]
    #[case(500)]
    #[case(5000)]
    fn test_pops_in_order(#[case] n: usize) {
        let mut rng = rand_chacha::ChaChaRng::seed_from_u64(n as u64);
        let mut queue = CalendarQueue::default();
        for time in timestamps(&mut rng, n, 1000.0) {
            queue.push(Ev(time));
        }
        assert_eq!(queue.len(), n);
        let times = drain(&mut queue);
        assert_eq!(times.len(), n);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_resizes() {
        let mut queue = CalendarQueue::default();
        for i in 0..100 {
            queue.push(Ev(f64::from(i) * 0.5));
        }
        assert!(queue.bucket_count() >= 32);
        assert!(approx_eq!(f64, queue.bucket_width(), 1.5, epsilon = 1e-9));
        for _ in 0..95 {
            queue.pop();
        }
        assert!(queue.bucket_count() < 32);
        assert_eq!(drain(&mut queue), vec![47.5, 48.0, 48.5, 49.0, 49.5]);
    }

    #[test]
    fn test_peek_matches_pop() {
        let mut queue = CalendarQueue::default();
        for time in [7.0, 3.5, 9.25, 3.5, 0.1, 120.0] {
            queue.push(Ev(time));
        }
        while let Some(peeked) = queue.peek().copied() {
            assert_eq!(queue.pop(), Some(peeked));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_earlier_push_after_pop() {
        let mut queue = CalendarQueue::default();
        queue.push(Ev(10.0));
        queue.push(Ev(20.0));
        assert_eq!(queue.pop(), Some(Ev(10.0)));
        queue.push(Ev(5.0));
        queue.push(Ev(15.0));
        assert_eq!(drain(&mut queue), vec![5.0, 15.0, 20.0]);
    }

    #[test]
    fn test_delete() {
        let mut queue = CalendarQueue::default();
        for time in [1.0, 2.0, 3.0, 2.0] {
            queue.push(Ev(time));
        }
        assert_eq!(queue.delete(&Ev(2.0)), Some(Ev(2.0)));
        assert_eq!(queue.delete(&Ev(4.0)), None);
        assert_eq!(queue.len(), 3);
        assert_eq!(drain(&mut queue), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_infinite_items() {
        let mut queue = CalendarQueue::default();
        queue.push(Ev(INFINITY));
        queue.push(Ev(2.0));
        queue.push(Ev(INFINITY));
        assert_eq!(queue.peek(), Some(&Ev(2.0)));
        assert_eq!(drain(&mut queue), vec![2.0, INFINITY, INFINITY]);
    }
}
