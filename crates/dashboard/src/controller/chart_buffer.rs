use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use common::models::{BufferPolicy, Sample, SignalReport};

const PREALLOCATED: usize = 64;

/// Samples in arrival order. Rolling buffers never hold more than their
/// capacity; snapshot buffers hold whatever the last fetch returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBuffer {
    policy: BufferPolicy,
    samples: VecDeque<Sample>,
    next_index: u64,
}

impl ChartBuffer {
    pub fn new(policy: BufferPolicy) -> Self {
        let policy = match policy {
            BufferPolicy::Rolling { capacity } => BufferPolicy::Rolling {
                capacity: capacity.max(1),
            },
            BufferPolicy::Snapshot => BufferPolicy::Snapshot,
        };
        let initial = match policy {
            BufferPolicy::Rolling { capacity } => capacity.min(PREALLOCATED),
            BufferPolicy::Snapshot => 0,
        };

        Self {
            policy,
            samples: VecDeque::with_capacity(initial),
            next_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.next_index = 0;
    }

    /// Appends a sample, evicting from the front past capacity.
    pub fn push(&mut self, mut sample: Sample) {
        sample.sequence_index = self.next_index;
        self.next_index += 1;
        self.samples.push_back(sample);

        if let BufferPolicy::Rolling { capacity } = self.policy {
            while self.samples.len() > capacity {
                self.samples.pop_front();
            }
        }
    }

    /// Folds a successful report into the buffer and returns how many samples
    /// it contributed. A report without anything plottable contributes nothing.
    pub fn absorb(&mut self, report: &SignalReport, received_at: DateTime<Utc>) -> usize {
        match self.policy {
            BufferPolicy::Rolling { .. } => {
                let sample = report
                    .chart
                    .last()
                    .and_then(|candle| Sample::from_candle(self.next_index, candle, received_at))
                    .or_else(|| {
                        report.price.and_then(|price| {
                            Sample::from_price(self.next_index, price, received_at)
                        })
                    });

                match sample {
                    Some(sample) => {
                        self.push(sample);
                        1
                    }
                    None => 0,
                }
            }
            BufferPolicy::Snapshot => {
                self.clear();
                for candle in &report.chart {
                    let sample = Sample::from_candle(self.next_index, candle, received_at);
                    if let Some(sample) = sample {
                        self.push(sample);
                    }
                }
                self.samples.len()
            }
        }
    }
}
