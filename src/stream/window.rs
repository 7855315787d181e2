use ndarray::{Array2, ArrayView1, Axis};
use crate::stream::{FrameSynchronizer, StreamError, WindowTrigger};
use crate::types::{ChannelId, CHANNEL_COUNT};
/// Owned copy of one window: channels x samples.
#[derive(Clone, Debug)]
pub struct Window {
    pub trigger: WindowTrigger,
    pub samples: Array2<f64>,
}
impl Window {
    pub fn channel(&self, id: ChannelId) -> ArrayView1<'_, f64> {
        self.samples.index_axis(Axis(0), id.index())
    }
}
/// Copies the `W` readings a trigger refers to out of the live buffers.
#[derive(Clone, Copy, Debug)]
pub struct WindowExtractor {
    window_size: usize,
}
impl WindowExtractor {
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }
    pub fn extract(
        &self,
        frames: &FrameSynchronizer,
        trigger: &WindowTrigger,
    ) -> Result<Window, StreamError> {
        let start = trigger.end_index.saturating_sub(self.window_size as u64);
        let mut samples = Array2::zeros((CHANNEL_COUNT, self.window_size));
        for (mut row, buffer) in samples.axis_iter_mut(Axis(0)).zip(frames.channels()) {
            if buffer.len() < self.window_size {
                return Err(StreamError::InsufficientData {
                    channel: buffer.name().to_owned(),
                    start,
                    end: trigger.end_index,
                    available: buffer.len(),
                });
            }
            let values = buffer.copy_range(start, trigger.end_index)?;
            if values.len() != self.window_size {
                return Err(StreamError::InsufficientData {
                    channel: buffer.name().to_owned(),
                    start,
                    end: trigger.end_index,
                    available: values.len(),
                });
            }
            for (slot, value) in row.iter_mut().zip(values) {
                *slot = value;
            }
        }
        Ok(Window {
            trigger: WindowTrigger {
                start_index: start,
                ..*trigger
            },
            samples,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_channel_names;
    use crate::stream::{RawSample, WindowScheduler};
    fn feed(sync: &mut FrameSynchronizer, from: u64, to: u64) {
        for i in from..to {
            let v = i as f64;
            sync.accept(&RawSample::complete([v, -v, v, -v, v, -v])).unwrap();
        }
    }
    #[test]
    fn window_covers_the_trigger_range() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        let mut scheduler = WindowScheduler::new(8, 0.5).unwrap();
        let extractor = WindowExtractor::new(8);
        let mut windows = Vec::new();
        for i in 0..16u64 {
            feed(&mut sync, i, i + 1);
            if let Some(trigger) = scheduler.on_sample_accepted() {
                windows.push(extractor.extract(&sync, &trigger).unwrap());
            }
        }
        assert_eq!(windows.len(), 3);
        let last = &windows[2];
        assert_eq!(last.trigger.start_index, 8);
        assert_eq!(last.samples.ncols(), 8);
        let acc_x: Vec<f64> = last.channel(ChannelId::AccX).to_vec();
        assert_eq!(acc_x, (8..16).map(|v| v as f64).collect::<Vec<_>>());
        assert_eq!(last.channel(ChannelId::GyroZ)[0], -8.0);
    }
    #[test]
    fn window_is_a_snapshot() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        feed(&mut sync, 0, 4);
        let trigger = WindowTrigger {
            ordinal: 0,
            start_index: 0,
            end_index: 4,
        };
        let window = WindowExtractor::new(4).extract(&sync, &trigger).unwrap();
        feed(&mut sync, 4, 8);
        assert_eq!(window.channel(ChannelId::AccX).to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    }
    #[test]
    fn short_buffers_are_reported() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        feed(&mut sync, 0, 3);
        let trigger = WindowTrigger {
            ordinal: 0,
            start_index: 0,
            end_index: 3,
        };
        assert!(matches!(
            WindowExtractor::new(4).extract(&sync, &trigger),
            Err(StreamError::InsufficientData { available: 3, .. })
        ));
    }
    #[test]
    fn evicted_range_is_reported() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 4).unwrap();
        feed(&mut sync, 0, 10);
        let stale = WindowTrigger {
            ordinal: 0,
            start_index: 0,
            end_index: 4,
        };
        assert!(matches!(
            WindowExtractor::new(4).extract(&sync, &stale),
            Err(StreamError::InsufficientData { .. })
        ));
    }
}
