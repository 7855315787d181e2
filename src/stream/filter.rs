use std::f64::consts::PI;
use crate::stream::StreamError;
#[derive(Clone, Copy, Debug, PartialEq)]
struct SectionCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}
impl SectionCoeffs {
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}
#[derive(Clone, Copy, Debug, Default)]
struct SectionState {
    z1: f64,
    z2: f64,
}
#[derive(Clone, Copy, Debug)]
struct Section {
    coeffs: SectionCoeffs,
    state: SectionState,
}
impl Section {
    fn new(coeffs: SectionCoeffs) -> Self {
        Self {
            coeffs,
            state: SectionState::default(),
        }
    }
    /// Loads the state the section would settle in after a long run of `input`.
    fn settle(&mut self, input: f64) {
        let c = self.coeffs;
        let output = c.dc_gain() * input;
        self.state.z1 = output - c.b0 * input;
        self.state.z2 = c.b2 * input - c.a2 * output;
    }
    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }
}
/// Butterworth low-pass as a cascade of second-order sections (plus one first-order
/// section for odd orders), designed by the bilinear transform with prewarping.
#[derive(Clone, Debug)]
pub struct Butterworth {
    order: usize,
    sections: Vec<SectionCoeffs>,
}
impl Butterworth {
    pub fn lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self, StreamError> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(StreamError::Filter(format!(
                "sampling frequency must be positive, got {sample_rate_hz}"
            )));
        }
        if order == 0 {
            return Err(StreamError::Filter("filter order must be at least 1".into()));
        }
        let nyquist = sample_rate_hz * 0.5;
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(StreamError::Filter(format!(
                "cutoff {cutoff_hz} Hz must lie strictly between 0 and Nyquist ({nyquist} Hz)"
            )));
        }
        let warped = (PI * cutoff_hz / sample_rate_hz).tan();
        let mut sections = Vec::with_capacity(order.div_ceil(2));
        for k in 0..order / 2 {
            // Analog pole angle; conjugate pairs share a Q.
            let angle = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            let q = -1.0 / (2.0 * angle.cos());
            sections.push(second_order_lowpass(warped, q));
        }
        if order % 2 == 1 {
            sections.push(first_order_lowpass(warped));
        }
        Ok(Self { order, sections })
    }
    /// Causal single pass starting from rest.
    #[cfg(test)]
    fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut sections: Vec<Section> = self.sections.iter().copied().map(Section::new).collect();
        signal
            .iter()
            .map(|&x| sections.iter_mut().fold(x, |v, s| s.process(v)))
            .collect()
    }
    /// Zero-phase forward-backward filtering with odd-extension padding and
    /// steady-state initial conditions at both ends.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        if signal.len() < 2 {
            return signal.to_vec();
        }
        let pad = (3 * (self.order + 1)).min(signal.len() - 1);
        let padded = odd_extend(signal, pad);
        let forward = self.run_settled(padded.iter().copied());
        let mut backward = self.run_settled(forward.iter().rev().copied());
        backward.reverse();
        backward[pad..pad + signal.len()].to_vec()
    }
    fn run_settled(&self, input: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut input = input.peekable();
        let Some(&first) = input.peek() else {
            return Vec::new();
        };
        let mut sections: Vec<Section> = self.sections.iter().copied().map(Section::new).collect();
        let mut level = first;
        for section in &mut sections {
            section.settle(level);
            level *= section.coeffs.dc_gain();
        }
        input
            .map(|x| sections.iter_mut().fold(x, |v, s| s.process(v)))
            .collect()
    }
}
fn odd_extend(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));
    out
}
fn second_order_lowpass(warped: f64, q: f64) -> SectionCoeffs {
    let k2 = warped * warped;
    let a0 = 1.0 + warped / q + k2;
    let b0 = k2 / a0;
    SectionCoeffs {
        b0,
        b1: 2.0 * b0,
        b2: b0,
        a1: 2.0 * (k2 - 1.0) / a0,
        a2: (1.0 - warped / q + k2) / a0,
    }
}
fn first_order_lowpass(warped: f64) -> SectionCoeffs {
    let b0 = warped / (1.0 + warped);
    SectionCoeffs {
        b0,
        b1: b0,
        b2: 0.0,
        a1: (warped - 1.0) / (warped + 1.0),
        a2: 0.0,
    }
}
/// Sliding median over an odd kernel; positions past either edge read as zero.
pub fn median_filter(signal: &[f64], kernel: usize) -> Result<Vec<f64>, StreamError> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(StreamError::Filter(format!(
            "median kernel must be odd and positive, got {kernel}"
        )));
    }
    let half = kernel / 2;
    let mut scratch = Vec::with_capacity(kernel);
    let out = (0..signal.len())
        .map(|i| {
            scratch.clear();
            for offset in 0..kernel {
                let idx = (i + offset).checked_sub(half);
                scratch.push(idx.and_then(|j| signal.get(j)).copied().unwrap_or(0.0));
            }
            scratch.sort_by(|a, b| a.total_cmp(b));
            scratch[half]
        })
        .collect();
    Ok(out)
}
#[cfg(test)]
mod tests {
    use super::*;
    fn sine(freq_hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / fs).sin())
            .collect()
    }
    fn rms(signal: &[f64]) -> f64 {
        (signal.iter().map(|v| v * v).sum::<f64>() / signal.len() as f64).sqrt()
    }
    #[test]
    fn third_order_has_two_sections_and_unit_dc_gain() {
        let filter = Butterworth::lowpass(3, 20.0, 50.0).unwrap();
        assert_eq!(filter.sections.len(), 2);
        for section in &filter.sections {
            assert!((section.dc_gain() - 1.0).abs() < 1e-9);
        }
    }
    #[test]
    fn filtfilt_keeps_constant_signal() {
        for cutoff in [20.0, 0.3] {
            let filter = Butterworth::lowpass(3, cutoff, 50.0).unwrap();
            let out = filter.filtfilt(&[9.81; 128]);
            assert_eq!(out.len(), 128);
            for v in out {
                assert!((v - 9.81).abs() < 1e-8, "cutoff {cutoff}: {v}");
            }
        }
    }
    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let filter = Butterworth::lowpass(3, 2.0, 50.0).unwrap();
        let low = filter.filtfilt(&sine(0.5, 50.0, 512));
        let high = filter.filtfilt(&sine(15.0, 50.0, 512));
        assert!(rms(&low[100..400]) > 0.6);
        assert!(rms(&high[100..400]) < 0.01);
    }
    #[test]
    fn filtfilt_has_no_phase_lag() {
        let filter = Butterworth::lowpass(3, 10.0, 50.0).unwrap();
        let input = sine(1.0, 50.0, 400);
        let out = filter.filtfilt(&input);
        for i in 100..300 {
            assert!((out[i] - input[i]).abs() < 0.01);
        }
        let causal = filter.filter(&input);
        let lagged = (100..300).any(|i| (causal[i] - input[i]).abs() > 0.02);
        assert!(lagged);
    }
    #[test]
    fn rejects_cutoff_at_or_above_nyquist() {
        assert!(matches!(
            Butterworth::lowpass(3, 25.0, 50.0),
            Err(StreamError::Filter(_))
        ));
        assert!(Butterworth::lowpass(3, 0.0, 50.0).is_err());
        assert!(Butterworth::lowpass(0, 5.0, 50.0).is_err());
        assert!(Butterworth::lowpass(3, 5.0, 0.0).is_err());
    }
    #[test]
    fn median_removes_single_spike() {
        let out = median_filter(&[1.0, 1.0, 50.0, 1.0, 1.0], 3).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }
    #[test]
    fn median_pads_edges_with_zero() {
        let out = median_filter(&[3.0, -1.0, 2.0], 3).unwrap();
        assert_eq!(out, vec![0.0, 2.0, 0.0]);
        assert!(median_filter(&[1.0], 4).is_err());
    }
}
