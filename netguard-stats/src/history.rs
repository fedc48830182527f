//! Rolling traffic series for the volume-over-time view.

use std::collections::VecDeque;

use serde::Serialize;

/// Samples kept by default.
pub const HISTORY_CAPACITY: usize = 20;

/// One trailing-window sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Unix seconds when the sample was taken.
    pub at: u64,
    pub count: u64,
}

/// Bounded series of samples, oldest first. Pushing past capacity evicts the
/// oldest sample.
#[derive(Debug, Clone)]
pub struct TrafficHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for TrafficHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl TrafficHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, at: u64, count: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at, count });
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn peak(&self) -> u64 {
        self.samples.iter().map(|s| s.count).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One block character per sample, scaled to the peak.
    pub fn sparkline(&self) -> String {
        const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
        let peak = self.peak();
        self.samples
            .iter()
            .map(|s| {
                if peak == 0 {
                    BLOCKS[0]
                } else {
                    let idx = (s.count * (BLOCKS.len() as u64 - 1) + peak / 2) / peak;
                    BLOCKS[idx as usize]
                }
            })
            .collect()
    }
}
