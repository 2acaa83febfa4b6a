// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Deferred, uncancellable tasks for note-off sends.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    // Reversed so the max-heap pops the earliest job first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Runs tasks after a delay on a single background thread. Scheduled tasks cannot
/// be cancelled; once the scheduler is dropped, pending tasks still run when due.
pub(crate) struct Scheduler {
    tx: Sender<(Duration, Task)>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Err(e) = thread::Builder::new()
            .name("midi-scheduler".to_string())
            .spawn(move || run(rx))
        {
            error!(err = e.to_string(), "Unable to start the MIDI scheduler thread.");
        }
        Scheduler { tx }
    }

    /// Runs the task once the delay has elapsed.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send((delay, Box::new(task))).is_err() {
            error!("MIDI scheduler is not running, dropping deferred task.");
        }
    }
}

fn run(rx: Receiver<(Duration, Task)>) {
    let mut pending: BinaryHeap<Job> = BinaryHeap::new();
    let mut seq: u64 = 0;
    let mut open = true;

    loop {
        let now = Instant::now();
        while pending.peek().is_some_and(|job| job.due <= now) {
            if let Some(job) = pending.pop() {
                (job.task)();
            }
        }

        let now = Instant::now();
        let timeout = pending
            .peek()
            .map(|job| job.due.saturating_duration_since(now));
        if !open {
            match timeout {
                Some(timeout) => {
                    thread::sleep(timeout);
                    continue;
                }
                None => break,
            }
        }

        let received = match timeout {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((delay, task)) => {
                seq += 1;
                pending.push(Job {
                    due: Instant::now() + delay,
                    seq,
                    task,
                });
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!(pending = pending.len(), "MIDI scheduler closed, draining.");
                open = false;
            }
        }
    }
}
