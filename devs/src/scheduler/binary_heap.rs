use crate::scheduler::{Entry, Scheduler};
use crate::Time;

/// Array kept in reverse order, so the soonest entry is the last element.
///
/// The insertion point is found by binary search, and imminent entries are popped off the tail
/// in constant time each. Removal of an arbitrary entry is a binary search too, since entries are
/// totally ordered by time and then by child index.
#[derive(Debug, Default, Clone)]
pub struct BinaryHeapScheduler {
    entries: Vec<Entry>,
}

impl BinaryHeapScheduler {
    fn search(&self, entry: &Entry) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|other| other.cmp(entry).reverse())
    }
}

impl Scheduler for BinaryHeapScheduler {
    fn schedule(&mut self, entry: Entry) {
        let index = match self.search(&entry) {
            Ok(index) | Err(index) => index,
        };
        self.entries.insert(index, entry);
    }

    fn unschedule(&mut self, entry: Entry) -> Option<Entry> {
        let index = self.search(&entry).ok()?;
        Some(self.entries.remove(index))
    }

    fn read(&mut self) -> Option<Time> {
        self.entries.last().map(Entry::time)
    }

    fn imminent(&mut self, time: Time) -> Vec<Entry> {
        let split = self
            .entries
            .iter()
            .rposition(|e| e.time() != time)
            .map_or(0, |i| i + 1);
        let mut imminent = self.entries.split_off(split);
        imminent.reverse();
        imminent
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
