//! Multi-rate scheduling on top of a single tick
//!
//! Every periodic action of the client has its own countdown. Each tick
//! advances all of them by the elapsed time and reports the ones that ran out,
//! only those are then reloaded.

use core::time::Duration;

use arrayvec::ArrayVec;

/// The periodic actions of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
    Announce,
    Sync,
    PDelayReq,
    /// Listening timeout, or loss of the master
    Watchdog,
}

const TASK_COUNT: usize = 4;

impl Task {
    fn index(self) -> usize {
        match self {
            Task::Announce => 0,
            Task::Sync => 1,
            Task::PDelayReq => 2,
            Task::Watchdog => 3,
        }
    }

    fn from_index(index: usize) -> Self {
        match index {
            0 => Task::Announce,
            1 => Task::Sync,
            2 => Task::PDelayReq,
            _ => Task::Watchdog,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Countdown {
    active: bool,
    repeat: bool,
    period: Duration,
    remaining: Duration,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Scheduler {
    table: [Countdown; TASK_COUNT],
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `task` every `period`, the first time after `first`
    pub(crate) fn every(&mut self, task: Task, period: Duration, first: Duration) {
        self.table[task.index()] = Countdown {
            active: true,
            repeat: true,
            period,
            remaining: first,
        };
    }

    /// Run `task` once after `delay`
    pub(crate) fn once(&mut self, task: Task, delay: Duration) {
        self.table[task.index()] = Countdown {
            active: true,
            repeat: false,
            period: delay,
            remaining: delay,
        };
    }

    /// Restart the countdown of `task` from its full period, if it is running
    pub(crate) fn kick(&mut self, task: Task) {
        let entry = &mut self.table[task.index()];
        if entry.active {
            entry.remaining = entry.period;
        }
    }

    pub(crate) fn stop_all(&mut self) {
        self.table = Default::default();
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, task: Task) -> bool {
        self.table[task.index()].active
    }

    /// Let `elapsed` pass and return the tasks that are due, in table order.
    ///
    /// A task that fell behind by more than one period still runs only once.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> ArrayVec<Task, TASK_COUNT> {
        let mut due = ArrayVec::new();

        for (index, entry) in self.table.iter_mut().enumerate() {
            if !entry.active {
                continue;
            }

            if entry.remaining <= elapsed {
                due.push(Task::from_index(index));
                if entry.repeat {
                    entry.remaining = entry.period;
                } else {
                    entry.active = false;
                }
            } else {
                entry.remaining -= elapsed;
            }
        }

        due
    }
}
