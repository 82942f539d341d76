use crate::scheduler::{Entry, Scheduler};
use crate::Time;

/// Keeps entries in a vector sorted in descending order, so the soonest entry is the last one.
///
/// Insertion scans linearly from the back, which makes it cheap when new entries tend to be due
/// soon, and the imminent entries are popped off the tail.
#[derive(Debug, Default, Clone)]
pub struct SortedListScheduler {
    entries: Vec<Entry>,
}

impl Scheduler for SortedListScheduler {
    fn schedule(&mut self, entry: Entry) {
        let index = self
            .entries
            .iter()
            .rposition(|e| *e > entry)
            .map_or(0, |i| i + 1);
        self.entries.insert(index, entry);
    }

    fn unschedule(&mut self, entry: Entry) -> Option<Entry> {
        let index = self.entries.iter().rposition(|e| *e == entry)?;
        Some(self.entries.remove(index))
    }

    fn read(&mut self) -> Option<Time> {
        self.entries.last().map(Entry::time)
    }

    fn imminent(&mut self, time: Time) -> Vec<Entry> {
        let mut imminent = Vec::new();
        while self.entries.last().map(Entry::time) == Some(time) {
            imminent.extend(self.entries.pop());
        }
        imminent
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
