use std::sync::Arc;
use ndarray::Array1;
use crate::stream::SpectrumBuilder;
/// Ordered names of every entry in a feature vector, e.g. `acc_x.body.mean`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureLayout {
    names: Arc<[String]>,
}
impl FeatureLayout {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names: names.into(),
        }
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
/// Fixed-length summary of one window in layout order.
#[derive(Clone, Debug)]
pub struct FeatureVector {
    pub values: Array1<f64>,
    pub layout: FeatureLayout,
}
impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<f64> {
        let position = self.layout.names().iter().position(|n| n == name)?;
        self.values.get(position).copied()
    }
}
/// Reduces one filtered signal to a fixed set of statistics.
pub trait FeatureExtractor: Send + Sync {
    /// Names of the statistics, in the order `extract` writes them.
    fn statistic_names(&self) -> &[&'static str];
    fn extract(&self, signal: &[f64], out: &mut Vec<f64>);
}
/// mean, std, min, max, dominant frequency, zero-crossing rate.
#[derive(Debug)]
pub struct StatisticalFeatures {
    spectrum: SpectrumBuilder,
}
impl StatisticalFeatures {
    pub const NAMES: [&'static str; 6] = ["mean", "std", "min", "max", "dominant_hz", "zcr"];
    pub fn new(window_size: usize, sample_rate_hz: f64) -> Self {
        Self {
            spectrum: SpectrumBuilder::new(window_size, sample_rate_hz),
        }
    }
}
impl FeatureExtractor for StatisticalFeatures {
    fn statistic_names(&self) -> &[&'static str] {
        &Self::NAMES
    }
    fn extract(&self, signal: &[f64], out: &mut Vec<f64>) {
        if signal.is_empty() {
            out.extend([0.0; 6]);
            return;
        }
        let n = signal.len() as f64;
        let mean = signal.iter().sum::<f64>() / n;
        let variance = signal.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let min = signal.iter().copied().fold(f64::INFINITY, f64::min);
        let max = signal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let dominant = self.spectrum.compute(signal).dominant_frequency_hz();
        out.extend([
            mean,
            variance.sqrt(),
            min,
            max,
            dominant,
            zero_crossing_rate(signal, mean),
        ]);
    }
}
/// Fraction of consecutive pairs that cross the signal's mean.
pub fn zero_crossing_rate(signal: &[f64], mean: f64) -> f64 {
    if signal.len() < 2 {
        return 0.0;
    }
    let crossings = signal
        .windows(2)
        .filter(|pair| {
            let a = pair[0] - mean;
            let b = pair[1] - mean;
            (a < 0.0 && b >= 0.0) || (a >= 0.0 && b < 0.0)
        })
        .count();
    crossings as f64 / (signal.len() - 1) as f64
}
