//! File/code adapted from https://github.com/jamjamjon/usls

use std::time::Duration;

/// Running total of stage durations, one slot per stage index.
#[derive(Debug, Default, Clone)]
pub struct TimeCalc {
    n: usize,
    duration: Vec<Duration>,
}

impl TimeCalc {
    pub fn total(&self) -> Duration {
        self.duration.iter().sum::<Duration>()
    }

    /// Number of complete rounds recorded, i.e. how many times stage 0 was added.
    pub fn count(&self) -> usize {
        self.n
    }

    /// Average time of one round, `None` before anything was recorded.
    pub fn avg(&self) -> Option<Duration> {
        if self.n == 0 {
            return None;
        }
        Some(self.total() / self.n as u32)
    }

    pub fn avg_i(&self, i: usize) -> Option<Duration> {
        if self.n == 0 {
            return None;
        }
        self.duration.get(i).map(|d| *d / self.n as u32)
    }

    pub fn add_or_push(&mut self, i: usize, x: Duration) {
        match self.duration.get_mut(i) {
            Some(elem) => *elem += x,
            None => self.duration.push(x),
        }
        if i == 0 {
            self.n += 1;
        }
    }

    pub fn clear(&mut self) {
        self.n = Default::default();
        self.duration = Default::default();
    }
}
