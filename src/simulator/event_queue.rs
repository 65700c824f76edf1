//! Wake-up queue and virtual clock for the furnace simulator

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Index of a process registered with the simulation clock.
pub type ProcessId = usize;

/// A process asking to be resumed at virtual time `at`.
///
/// Wake-ups are ordered by:
/// 1. Time (earlier first)
/// 2. Sequence number (FIFO for wake-ups at the same time)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeUp {
    pub at: Duration,
    pub sequence: u64,
    pub process: ProcessId,
}

impl Ord for WakeUp {
    // Reversed so the max-heap pops the earliest wake-up first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for WakeUp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending wake-ups, earliest first.
#[derive(Debug, Default)]
pub struct SimEventQueue {
    queue: BinaryHeap<WakeUp>,
    next_sequence: u64,
}

impl SimEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Duration, process: ProcessId) -> WakeUp {
        let wake = WakeUp {
            at,
            sequence: self.next_sequence,
            process,
        };
        self.next_sequence += 1;
        self.queue.push(wake);
        wake
    }

    pub fn peek(&self) -> Option<&WakeUp> {
        self.queue.peek()
    }

    pub fn pop(&mut self) -> Option<WakeUp> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Simulation clock
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    current_time: Duration,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.current_time
    }

    /// Move to `t`. Virtual time never goes backwards.
    pub fn advance_to(&mut self, t: Duration) {
        self.current_time = self.current_time.max(t);
    }
}
