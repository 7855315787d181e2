use std::collections::VecDeque;
use crate::stream::StreamError;
/// Rolling store of readings for one axis, addressed by absolute sample index.
///
/// Holds at most `capacity` readings; older ones are evicted as new ones arrive.
#[derive(Clone, Debug)]
pub struct ChannelBuffer {
    name: String,
    readings: VecDeque<f64>,
    capacity: usize,
    total_pushed: u64,
}
impl ChannelBuffer {
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::Config(
                "channel buffer capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            readings: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        })
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Readings currently retained.
    pub fn len(&self) -> usize {
        self.readings.len()
    }
    /// Readings pushed since the stream started, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }
    /// Absolute index of the oldest retained reading.
    pub fn first_retained_index(&self) -> u64 {
        self.total_pushed - self.readings.len() as u64
    }
    pub fn push(&mut self, value: f64) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(value);
        self.total_pushed += 1;
    }
    /// Copies the absolute index range `[start, end)`.
    pub fn copy_range(&self, start: u64, end: u64) -> Result<Vec<f64>, StreamError> {
        let insufficient = || StreamError::InsufficientData {
            channel: self.name.clone(),
            start,
            end,
            available: self.readings.len(),
        };
        if start > end || end > self.total_pushed || start < self.first_retained_index() {
            return Err(insufficient());
        }
        let offset = (start - self.first_retained_index()) as usize;
        let count = (end - start) as usize;
        Ok(self.readings.range(offset..offset + count).copied().collect())
    }
}
