use std::collections::VecDeque;

use crate::types::TemperatureSample;

/// Fixed-capacity FIFO of recent valid readings.
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl TrendBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends a reading, evicting the oldest once full. Disconnected samples are dropped.
    pub fn push(&mut self, sample: TemperatureSample) -> bool {
        let Some(celsius) = sample.celsius() else {
            return false;
        };
        self.samples.push_back(celsius);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }

    /// Average change per sample between the oldest and newest reading, `0.0` with fewer
    /// than two samples.
    pub fn trend(&self) -> f32 {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) if self.samples.len() >= 2 => {
                (newest - oldest) / (self.samples.len() - 1) as f32
            }
            _ => 0.0,
        }
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

    pub fn oldest(&self) -> Option<f32> {
        self.samples.front().copied()
    }

    pub fn newest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
