use crate::scheduler::{Entry, Scheduler};
use crate::Time;

/// Unsorted list that caches its minimum.
///
/// Scheduling is constant time; removing the minimum requires a scan to find the next one.
/// Best suited for coordinators with only a handful of children.
#[derive(Debug, Default, Clone)]
pub struct MinimalListScheduler {
    entries: Vec<Entry>,
    min: Option<Entry>,
}

impl MinimalListScheduler {
    fn update_min(&mut self) {
        self.min = self.entries.iter().min().copied();
    }
}

impl Scheduler for MinimalListScheduler {
    fn schedule(&mut self, entry: Entry) {
        self.entries.push(entry);
        if self.min.map_or(true, |min| entry < min) {
            self.min = Some(entry);
        }
    }

    fn unschedule(&mut self, entry: Entry) -> Option<Entry> {
        let index = self.entries.iter().position(|e| *e == entry)?;
        let removed = self.entries.swap_remove(index);
        if self.min == Some(removed) {
            self.update_min();
        }
        Some(removed)
    }

    fn read(&mut self) -> Option<Time> {
        self.min.map(|e| e.time())
    }

    fn imminent(&mut self, time: Time) -> Vec<Entry> {
        if self.read() != Some(time) {
            return Vec::new();
        }
        let (mut imminent, rest): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| e.time() == time);
        self.entries = rest;
        self.update_min();
        imminent.sort();
        imminent
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_min_cache() {
        let mut scheduler = MinimalListScheduler::default();
        scheduler.schedule(Entry::new(3.0, 0));
        scheduler.schedule(Entry::new(1.0, 1));
        scheduler.schedule(Entry::new(2.0, 2));
        assert_eq!(scheduler.read(), Some(1.0));
        scheduler.unschedule(Entry::new(1.0, 1));
        assert_eq!(scheduler.read(), Some(2.0));
        scheduler.unschedule(Entry::new(3.0, 0));
        assert_eq!(scheduler.read(), Some(2.0));
        assert_eq!(scheduler.imminent(2.0), vec![Entry::new(2.0, 2)]);
        assert_eq!(scheduler.read(), None);
    }
}
