use std::sync::Arc;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
/// One-sided magnitude spectrum of a single signal.
#[derive(Clone, Debug)]
pub struct FrequencySpectrum {
    pub frequencies_hz: Vec<f64>,
    pub magnitudes: Vec<f64>,
}
impl FrequencySpectrum {
    /// Frequency of the strongest non-DC bin, 0.0 for flat or too-short signals.
    pub fn dominant_frequency_hz(&self) -> f64 {
        self.magnitudes
            .iter()
            .zip(&self.frequencies_hz)
            .skip(1)
            .filter(|(m, _)| **m > f64::EPSILON)
            .max_by(|a, b| a.0.total_cmp(b.0))
            .map(|(_, f)| *f)
            .unwrap_or(0.0)
    }
}
/// Plans the FFT once for a fixed window length and reuses it for every window.
#[derive(Clone)]
pub struct SpectrumBuilder {
    fft_size: usize,
    sample_rate_hz: f64,
    fft: Arc<dyn Fft<f64>>,
}
impl SpectrumBuilder {
    pub fn new(fft_size: usize, sample_rate_hz: f64) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size.max(1));
        Self {
            fft_size,
            sample_rate_hz,
            fft,
        }
    }
    /// Mean is removed first so the DC bin does not mask motion content.
    pub fn compute(&self, signal: &[f64]) -> FrequencySpectrum {
        let bins = self.fft_size / 2;
        let frequencies_hz = (0..bins)
            .map(|k| k as f64 * self.sample_rate_hz / self.fft_size as f64)
            .collect();
        if self.fft_size == 0 {
            return FrequencySpectrum {
                frequencies_hz,
                magnitudes: Vec::new(),
            };
        }
        let mean = if signal.is_empty() {
            0.0
        } else {
            signal.iter().sum::<f64>() / signal.len() as f64
        };
        let mut buffer: Vec<Complex64> = signal
            .iter()
            .take(self.fft_size)
            .map(|v| Complex64::new(v - mean, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex64::new(0.0, 0.0));
        self.fft.process(&mut buffer);
        let magnitudes = buffer
            .iter()
            .take(bins)
            .map(|c| c.norm() / self.fft_size as f64)
            .collect();
        FrequencySpectrum {
            frequencies_hz,
            magnitudes,
        }
    }
}
impl std::fmt::Debug for SpectrumBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumBuilder")
            .field("fft_size", &self.fft_size)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    #[test]
    fn finds_dominant_tone() {
        let fs = 50.0;
        let builder = SpectrumBuilder::new(128, fs);
        // 12.5 Hz sits exactly on bin 32.
        let signal: Vec<f64> = (0..128)
            .map(|i| 3.0 + (2.0 * PI * 12.5 * i as f64 / fs).sin())
            .collect();
        let spectrum = builder.compute(&signal);
        assert_eq!(spectrum.frequencies_hz.len(), 64);
        assert!((spectrum.dominant_frequency_hz() - 12.5).abs() < 1e-9);
    }
    #[test]
    fn flat_signal_has_no_dominant_frequency() {
        let builder = SpectrumBuilder::new(64, 50.0);
        assert_eq!(builder.compute(&[4.0; 64]).dominant_frequency_hz(), 0.0);
    }
}
