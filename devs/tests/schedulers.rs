use devs::{Entry, Scheduler, SchedulerKind, Time};
use rstest::rstest;
use testing::{random_trace, TraceOp};

/// Minimum over a plain vector of entries.
fn reference_min(reference: &[Entry]) -> Option<Time> {
    reference.iter().map(Entry::time).reduce(f64::min)
}

fn replay(scheduler: &mut dyn Scheduler, trace: &[TraceOp]) {
    let mut reference: Vec<Entry> = Vec::new();
    for (step, op) in trace.iter().enumerate() {
        match *op {
            TraceOp::Schedule { id, time } => {
                scheduler.schedule(Entry::new(time, id));
                reference.push(Entry::new(time, id));
            }
            TraceOp::Unschedule { id, time } => {
                assert_eq!(
                    scheduler.unschedule(Entry::new(time, id)),
                    Some(Entry::new(time, id)),
                    "step {}",
                    step
                );
                reference.retain(|entry| entry.id != id);
            }
            TraceOp::Reschedule { id, from, to } => {
                scheduler.reschedule(Entry::new(from, id), to);
                reference.retain(|entry| entry.id != id);
                reference.push(Entry::new(to, id));
            }
            TraceOp::Read => {
                assert_eq!(scheduler.read(), reference_min(&reference), "step {}", step);
            }
            TraceOp::PopImminent => {
                if let Some(min) = reference_min(&reference) {
                    let mut expected: Vec<Entry> = reference
                        .iter()
                        .filter(|entry| entry.time() == min)
                        .copied()
                        .collect();
                    expected.sort();
                    assert_eq!(
                        scheduler.read_imminent(min).len(),
                        expected.len(),
                        "step {}",
                        step
                    );
                    let mut imminent = scheduler.imminent(min);
                    imminent.sort();
                    assert_eq!(imminent, expected, "step {}", step);
                    reference.retain(|entry| entry.time() != min);
                }
            }
        }
        assert_eq!(scheduler.len(), reference.len(), "step {}", step);
    }
    assert_eq!(scheduler.read(), reference_min(&reference));
}

#[rstest]
fn test_matches_linear_scan(
    #[values(
        SchedulerKind::SortedList,
        SchedulerKind::MinimalList,
        SchedulerKind::BinaryHeap,
        SchedulerKind::SplayTree,
        SchedulerKind::CalendarQueue,
        SchedulerKind::LadderQueue
    )]
    kind: SchedulerKind,
    #[values(1, 2, 3, 4)] seed: u64,
    #[values(8, 200)] ids: usize,
) {
    let trace = random_trace(seed, 1000, ids);
    let mut scheduler = kind.build();
    replay(scheduler.as_mut(), &trace);
}

#[rstest]
fn test_build_with(
    #[values(
        SchedulerKind::SortedList,
        SchedulerKind::MinimalList,
        SchedulerKind::BinaryHeap,
        SchedulerKind::SplayTree,
        SchedulerKind::CalendarQueue,
        SchedulerKind::LadderQueue
    )]
    kind: SchedulerKind,
) {
    let times = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
    let mut scheduler = kind.build_with(
        times
            .iter()
            .enumerate()
            .map(|(id, &time)| Entry::new(time, id)),
    );
    let mut popped = Vec::new();
    while let Some(time) = scheduler.read() {
        let mut imminent = scheduler.imminent(time);
        imminent.sort();
        popped.extend(imminent.into_iter().map(|entry| entry.id));
    }
    assert_eq!(popped, vec![1, 3, 6, 0, 2, 4, 7, 5]);
    assert!(scheduler.is_empty());
}
