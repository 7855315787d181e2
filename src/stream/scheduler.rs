use crate::stream::StreamError;
/// Index range `[start_index, end_index)` that became ready on one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowTrigger {
    /// 0 for the first window of the stream.
    pub ordinal: u64,
    pub start_index: u64,
    pub end_index: u64,
}
/// Counter-only bookkeeping deciding when a window is ready.
///
/// The first window fires at sample `W`, then one fires every `step` samples, where
/// `step = floor(W * overlap_fraction)` (or `W` for a zero fraction).
#[derive(Clone, Debug)]
pub struct WindowScheduler {
    window_size: usize,
    step: u64,
    total_count: u64,
    last_trigger_index: u64,
    emitted: u64,
}
impl WindowScheduler {
    pub fn new(window_size: usize, overlap_fraction: f64) -> Result<Self, StreamError> {
        if window_size == 0 {
            return Err(StreamError::Config(
                "window_size must be greater than zero".into(),
            ));
        }
        if !overlap_fraction.is_finite() || !(0.0..1.0).contains(&overlap_fraction) {
            return Err(StreamError::Config(format!(
                "overlap_fraction must lie in [0, 1), got {overlap_fraction}"
            )));
        }
        let step = if overlap_fraction == 0.0 {
            window_size as u64
        } else {
            (window_size as f64 * overlap_fraction).floor() as u64
        };
        if step == 0 {
            return Err(StreamError::Config(format!(
                "floor({window_size} * {overlap_fraction}) is zero; a window would fire on every sample"
            )));
        }
        Ok(Self {
            window_size,
            step,
            total_count: 0,
            last_trigger_index: 0,
            emitted: 0,
        })
    }
    /// Call exactly once per sample the synchronizer accepted.
    pub fn on_sample_accepted(&mut self) -> Option<WindowTrigger> {
        self.total_count += 1;
        let ready = if self.last_trigger_index == 0 {
            self.total_count == self.window_size as u64
        } else {
            self.total_count == self.last_trigger_index + self.step
        };
        if !ready {
            return None;
        }
        self.last_trigger_index = self.total_count;
        let trigger = WindowTrigger {
            ordinal: self.emitted,
            start_index: self.total_count - self.window_size as u64,
            end_index: self.total_count,
        };
        self.emitted += 1;
        Some(trigger)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn trigger_points(window_size: usize, overlap: f64, samples: u64) -> Vec<u64> {
        let mut scheduler = WindowScheduler::new(window_size, overlap).unwrap();
        (0..samples)
            .filter_map(|_| scheduler.on_sample_accepted())
            .map(|t| t.end_index)
            .collect()
    }
    #[test]
    fn half_overlap_fires_every_half_window() {
        assert_eq!(trigger_points(128, 0.5, 320), vec![128, 192, 256, 320]);
    }
    #[test]
    fn triggers_form_an_arithmetic_sequence() {
        for (w, f) in [(128, 0.5), (100, 0.25), (7, 0.9), (50, 0.1), (3, 0.5)] {
            let step = (w as f64 * f).floor() as u64;
            let points = trigger_points(w, f, 1_000);
            assert_eq!(points[0], w as u64, "w={w} f={f}");
            for pair in points.windows(2) {
                assert_eq!(pair[1] - pair[0], step, "w={w} f={f}");
            }
            let expected = (1_000 - w as u64) / step + 1;
            assert_eq!(points.len() as u64, expected, "w={w} f={f}");
        }
    }
    #[test]
    fn zero_fraction_gives_back_to_back_windows() {
        assert_eq!(trigger_points(10, 0.0, 35), vec![10, 20, 30]);
    }
    #[test]
    fn fewer_than_window_samples_never_fire() {
        assert!(trigger_points(128, 0.5, 127).is_empty());
        assert_eq!(trigger_points(128, 0.5, 128).len(), 1);
        assert_eq!(trigger_points(128, 0.5, 128 + 64).len(), 2);
    }
    #[test]
    fn trigger_carries_full_range_and_ordinal() {
        let mut scheduler = WindowScheduler::new(4, 0.5).unwrap();
        let triggers: Vec<_> = (0..8).filter_map(|_| scheduler.on_sample_accepted()).collect();
        assert_eq!(
            triggers,
            vec![
                WindowTrigger { ordinal: 0, start_index: 0, end_index: 4 },
                WindowTrigger { ordinal: 1, start_index: 2, end_index: 6 },
                WindowTrigger { ordinal: 2, start_index: 4, end_index: 8 },
            ]
        );
        assert_eq!(scheduler.emitted, 3);
        assert_eq!(scheduler.last_trigger_index, 8);
        assert_eq!(scheduler.total_count, 8);
    }
    #[test]
    fn rejects_degenerate_configurations() {
        assert!(matches!(WindowScheduler::new(0, 0.5), Err(StreamError::Config(_))));
        assert!(matches!(WindowScheduler::new(128, 1.0), Err(StreamError::Config(_))));
        assert!(matches!(WindowScheduler::new(128, -0.1), Err(StreamError::Config(_))));
        assert!(matches!(WindowScheduler::new(128, f64::NAN), Err(StreamError::Config(_))));
        // floor(3 * 0.2) == 0
        assert!(matches!(WindowScheduler::new(3, 0.2), Err(StreamError::Config(_))));
    }
}
