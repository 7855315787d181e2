use crate::stream::{ChannelBuffer, RawSample, StreamError};
use crate::types::CHANNEL_COUNT;
/// Keeps the six axis buffers of one stream length-aligned.
#[derive(Clone, Debug)]
pub struct FrameSynchronizer {
    channel_names: Vec<String>,
    channels: Vec<ChannelBuffer>,
}
impl FrameSynchronizer {
    pub fn new(channel_names: Vec<String>, capacity: usize) -> Result<Self, StreamError> {
        if channel_names.len() != CHANNEL_COUNT {
            return Err(StreamError::Config(format!(
                "expected {CHANNEL_COUNT} channel names, got {}",
                channel_names.len()
            )));
        }
        let channels = channel_names
            .iter()
            .map(|name| ChannelBuffer::with_capacity(name.clone(), capacity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            channel_names,
            channels,
        })
    }
    /// Appends one sample to every channel, or to none of them.
    pub fn accept(&mut self, raw: &RawSample) -> Result<(), StreamError> {
        let sample = raw.validate(&self.channel_names)?;
        for (buffer, value) in self.channels.iter_mut().zip(sample.values) {
            buffer.push(value);
        }
        debug_assert!(self.is_aligned());
        Ok(())
    }
    pub fn channels(&self) -> &[ChannelBuffer] {
        &self.channels
    }
    pub fn total_accepted(&self) -> u64 {
        self.channels[0].total_pushed()
    }
    pub fn is_aligned(&self) -> bool {
        let first = &self.channels[0];
        self.channels
            .iter()
            .all(|c| c.len() == first.len() && c.total_pushed() == first.total_pushed())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_channel_names;
    use crate::types::ChannelId;
    fn sample(v: f64) -> RawSample {
        RawSample::complete([v, v + 1.0, v + 2.0, v + 3.0, v + 4.0, v + 5.0])
    }
    #[test]
    fn accepted_samples_land_in_every_channel() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        for i in 0..5 {
            sync.accept(&sample(i as f64)).unwrap();
            assert!(sync.is_aligned());
        }
        assert!(sync.channels().iter().all(|c| c.len() == 5));
        assert_eq!(sync.total_accepted(), 5);
        assert_eq!(
            sync.channels()[ChannelId::GyroZ.index()].copy_range(4, 5).unwrap(),
            vec![9.0]
        );
    }
    #[test]
    fn incomplete_sample_touches_no_channel() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        sync.accept(&sample(0.0)).unwrap();
        let err = sync
            .accept(&sample(1.0).without(ChannelId::GyroY))
            .unwrap_err();
        assert!(matches!(err, StreamError::MissingField { ref channel } if channel == "gyroRotationY"));
        assert!(sync.is_aligned());
        assert_eq!(sync.total_accepted(), 1);
    }
    #[test]
    fn non_finite_values_are_rejected() {
        let mut sync = FrameSynchronizer::new(default_channel_names(), 8).unwrap();
        let mut raw = sample(0.0);
        raw.values[2] = Some(f64::NAN);
        assert!(matches!(
            sync.accept(&raw),
            Err(StreamError::NonFinite { .. })
        ));
        assert_eq!(sync.total_accepted(), 0);
    }
    #[test]
    fn requires_six_channel_names() {
        let names = vec!["a".to_string(); 5];
        assert!(matches!(
            FrameSynchronizer::new(names, 8),
            Err(StreamError::Config(_))
        ));
    }
}
