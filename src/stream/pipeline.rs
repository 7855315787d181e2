use std::sync::Arc;
use ndarray::Array1;
use crate::config::FilterConfig;
use crate::stream::filter::{median_filter, Butterworth};
use crate::stream::{
    FeatureExtractor, FeatureLayout, FeatureVector, StatisticalFeatures, StreamError, Window,
};
use crate::types::ChannelId;
/// Signal derived from one channel of a window before it is reduced to statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    /// Motion-only part (accelerometer: gravity removed; gyroscope: the smoothed signal).
    Body,
    /// Slow accelerometer part tracking the device orientation.
    Gravity,
}
impl Component {
    fn name(self) -> &'static str {
        match self {
            Component::Body => "body",
            Component::Gravity => "gravity",
        }
    }
}
/// Turns a window into a feature vector: median filter, zero-phase low-pass smoothing,
/// gravity separation on accelerometer axes, then per-signal statistics.
pub struct FeaturePipeline {
    median_kernel: usize,
    motion: Butterworth,
    gravity: Butterworth,
    extractor: Arc<dyn FeatureExtractor>,
    layout: FeatureLayout,
}
impl FeaturePipeline {
    pub fn new(
        config: &FilterConfig,
        window_size: usize,
        sample_rate_hz: f64,
    ) -> Result<Self, StreamError> {
        let extractor = Arc::new(StatisticalFeatures::new(window_size, sample_rate_hz));
        Self::with_extractor(config, sample_rate_hz, extractor)
    }
    pub fn with_extractor(
        config: &FilterConfig,
        sample_rate_hz: f64,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self, StreamError> {
        // Reject the kernel up front rather than on the first window.
        median_filter(&[], config.median_kernel)?;
        let motion = Butterworth::lowpass(config.order, config.motion_cutoff_hz, sample_rate_hz)?;
        let gravity = Butterworth::lowpass(config.order, config.gravity_cutoff_hz, sample_rate_hz)?;
        let layout = Self::layout_for(extractor.as_ref());
        Ok(Self {
            median_kernel: config.median_kernel,
            motion,
            gravity,
            extractor,
            layout,
        })
    }
    /// Channel order first, then component, then statistic.
    pub fn layout_for(extractor: &dyn FeatureExtractor) -> FeatureLayout {
        let mut names = Vec::new();
        for channel in ChannelId::ALL {
            for component in Self::components(channel) {
                for stat in extractor.statistic_names() {
                    names.push(format!(
                        "{}.{}.{}",
                        channel.short_name(),
                        component.name(),
                        stat
                    ));
                }
            }
        }
        FeatureLayout::new(names)
    }
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }
    fn components(channel: ChannelId) -> &'static [Component] {
        if channel.is_accelerometer() {
            &[Component::Body, Component::Gravity]
        } else {
            &[Component::Body]
        }
    }
    /// Filtered signals for one channel, in `components` order.
    pub fn separate(
        &self,
        channel: ChannelId,
        raw: &[f64],
    ) -> Result<Vec<(Component, Vec<f64>)>, StreamError> {
        let denoised = median_filter(raw, self.median_kernel)?;
        let smoothed = self.motion.filtfilt(&denoised);
        if !channel.is_accelerometer() {
            return Ok(vec![(Component::Body, smoothed)]);
        }
        let gravity = self.gravity.filtfilt(&smoothed);
        let body = smoothed.iter().zip(&gravity).map(|(s, g)| s - g).collect();
        Ok(vec![(Component::Body, body), (Component::Gravity, gravity)])
    }
    pub fn process(&self, window: &Window) -> Result<FeatureVector, StreamError> {
        let mut values = Vec::with_capacity(self.layout.len());
        for channel in ChannelId::ALL {
            let raw = window.channel(channel).to_vec();
            for (_, signal) in self.separate(channel, &raw)? {
                self.extractor.extract(&signal, &mut values);
            }
        }
        if values.len() != self.layout.len() {
            return Err(StreamError::ModelInput {
                expected: self.layout.len(),
                actual: values.len(),
            });
        }
        log::trace!(
            "window {} -> {} features",
            window.trigger.ordinal,
            values.len()
        );
        Ok(FeatureVector {
            values: Array1::from(values),
            layout: self.layout.clone(),
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::WindowTrigger;
    use ndarray::Array2;
    fn window_from(rows: [f64; 6], len: usize) -> Window {
        let samples = Array2::from_shape_fn((6, len), |(c, _)| rows[c]);
        Window {
            trigger: WindowTrigger {
                ordinal: 0,
                start_index: 0,
                end_index: len as u64,
            },
            samples,
        }
    }
    #[test]
    fn layout_has_nine_signals() {
        let pipeline = FeaturePipeline::new(&FilterConfig::default(), 128, 50.0).unwrap();
        assert_eq!(pipeline.layout().len(), 9 * StatisticalFeatures::NAMES.len());
        assert_eq!(pipeline.layout().names()[0], "acc_x.body.mean");
        assert_eq!(pipeline.layout().names()[6], "acc_x.gravity.mean");
        assert_eq!(
            pipeline.layout().names().last().map(String::as_str),
            Some("gyro_z.body.zcr")
        );
    }
    #[test]
    fn zero_window_gives_zero_features() {
        let pipeline = FeaturePipeline::new(&FilterConfig::default(), 128, 50.0).unwrap();
        let features = pipeline.process(&window_from([0.0; 6], 128)).unwrap();
        assert_eq!(features.len(), pipeline.layout().len());
        assert!(features.values.iter().all(|v| v.abs() < 1e-12));
    }
    #[test]
    fn constant_gravity_ends_up_in_gravity_component() {
        let pipeline = FeaturePipeline::new(&FilterConfig::default(), 128, 50.0).unwrap();
        let features = pipeline
            .process(&window_from([0.0, 0.0, 9.81, 0.5, 0.0, 0.0], 128))
            .unwrap();
        let gravity_mean = features.get("acc_z.gravity.mean").unwrap();
        let body_mean = features.get("acc_z.body.mean").unwrap();
        let body_std = features.get("acc_z.body.std").unwrap();
        assert!((gravity_mean - 9.81).abs() < 1e-6);
        assert!(body_mean.abs() < 1e-6);
        assert!(body_std.abs() < 1e-6);
        assert!((features.get("gyro_x.body.mean").unwrap() - 0.5).abs() < 1e-6);
    }
    #[test]
    fn smoothing_is_stable_on_constant_signals() {
        let pipeline = FeaturePipeline::new(&FilterConfig::default(), 64, 50.0).unwrap();
        let raw = vec![3.25; 64];
        let once = pipeline.separate(ChannelId::GyroY, &raw).unwrap();
        let twice = pipeline.separate(ChannelId::GyroY, &once[0].1).unwrap();
        for (a, b) in once[0].1.iter().zip(&twice[0].1) {
            assert!((a - 3.25).abs() < 1e-9);
            assert!((a - b).abs() < 1e-9);
        }
    }
    #[test]
    fn invalid_filter_settings_are_rejected() {
        let mut config = FilterConfig::default();
        config.motion_cutoff_hz = 30.0;
        assert!(matches!(
            FeaturePipeline::new(&config, 128, 50.0),
            Err(StreamError::Filter(_))
        ));
        let mut config = FilterConfig::default();
        config.median_kernel = 4;
        assert!(matches!(
            FeaturePipeline::new(&config, 128, 50.0),
            Err(StreamError::Filter(_))
        ));
    }
}
