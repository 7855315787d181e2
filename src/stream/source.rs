#[cfg(test)]
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io::{BufRead, Read};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use crate::stream::StreamError;
use crate::types::{ChannelId, CHANNEL_COUNT};
/// One decoded packet. A channel is `None` when the packet did not carry it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSample {
    pub values: [Option<f64>; CHANNEL_COUNT],
}
impl RawSample {
    pub fn complete(values: [f64; CHANNEL_COUNT]) -> Self {
        Self {
            values: values.map(Some),
        }
    }
    pub fn without(mut self, channel: ChannelId) -> Self {
        self.values[channel.index()] = None;
        self
    }
    /// Checks every channel before producing a `Sample`; nothing is partially accepted.
    pub fn validate(&self, channel_names: &[String]) -> Result<Sample, StreamError> {
        let mut values = [0.0; CHANNEL_COUNT];
        for channel in ChannelId::ALL {
            let name = || {
                channel_names
                    .get(channel.index())
                    .cloned()
                    .unwrap_or_else(|| channel.short_name().to_owned())
            };
            match self.values[channel.index()] {
                None => return Err(StreamError::MissingField { channel: name() }),
                Some(v) if !v.is_finite() => return Err(StreamError::NonFinite { channel: name() }),
                Some(v) => values[channel.index()] = v,
            }
        }
        Ok(Sample { values })
    }
}
/// One instant's readings for all six axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub values: [f64; CHANNEL_COUNT],
}
/// Maps a JSON packet onto the six axes using the configured field names.
#[derive(Clone, Debug)]
pub struct SampleDecoder {
    channel_names: Vec<String>,
}
impl SampleDecoder {
    pub fn new(channel_names: Vec<String>) -> Self {
        Self { channel_names }
    }
    pub fn decode_line(&self, line: &str) -> Result<RawSample, StreamError> {
        let value: Value = serde_json::from_str(line)?;
        self.decode_value(&value)
    }
    pub fn decode_value(&self, value: &Value) -> Result<RawSample, StreamError> {
        let object = value
            .as_object()
            .ok_or_else(|| StreamError::Malformed("packet is not a JSON object".into()))?;
        let mut raw = RawSample::default();
        for (slot, name) in raw.values.iter_mut().zip(&self.channel_names) {
            *slot = match object.get(name) {
                None | Some(Value::Null) => None,
                Some(Value::Number(n)) => n.as_f64(),
                // Some phone loggers ship every reading as a string.
                Some(Value::String(s)) => Some(s.trim().parse::<f64>().map_err(|_| {
                    StreamError::Malformed(format!("field `{name}` is not numeric: {s:?}"))
                })?),
                Some(other) => {
                    return Err(StreamError::Malformed(format!(
                        "field `{name}` has unexpected type: {other}"
                    )))
                }
            };
        }
        Ok(raw)
    }
}
/// Producer of decoded samples. `Ok(None)` marks a clean end of stream.
pub trait SampleSource {
    fn next_sample(&mut self) -> Result<Option<RawSample>, StreamError>;
}
/// In-memory source for deterministic playback in tests.
#[cfg(test)]
pub struct ManualSource {
    queue: VecDeque<Result<RawSample, StreamError>>,
}
#[cfg(test)]
impl ManualSource {
    pub fn new(samples: impl IntoIterator<Item = RawSample>) -> Self {
        Self {
            queue: samples.into_iter().map(Ok).collect(),
        }
    }
    /// Queues items verbatim, errors included.
    pub fn from_items(items: impl IntoIterator<Item = Result<RawSample, StreamError>>) -> Self {
        Self {
            queue: items.into_iter().collect(),
        }
    }
}
#[cfg(test)]
impl SampleSource for ManualSource {
    fn next_sample(&mut self) -> Result<Option<RawSample>, StreamError> {
        self.queue.pop_front().transpose()
    }
}
/// Newline-delimited JSON packets from any buffered reader (TCP stream, file).
///
/// Lines are read as raw bytes and capped at `max_line_bytes`; an over-long or
/// non-UTF-8 line is reported as malformed and reading resumes at the next newline.
pub struct JsonLineSource<R: BufRead> {
    reader: R,
    decoder: SampleDecoder,
    line: Vec<u8>,
    max_line_bytes: u64,
}
impl<R: BufRead> JsonLineSource<R> {
    pub fn new(reader: R, decoder: SampleDecoder, max_line_bytes: usize) -> Self {
        Self {
            reader,
            decoder,
            line: Vec::new(),
            max_line_bytes: max_line_bytes.max(1) as u64,
        }
    }
    /// Consumes input up to and including the next newline.
    fn discard_rest_of_line(&mut self) -> Result<(), StreamError> {
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.reader.consume(end + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }
}
impl<R: BufRead> SampleSource for JsonLineSource<R> {
    fn next_sample(&mut self) -> Result<Option<RawSample>, StreamError> {
        loop {
            self.line.clear();
            let read = (&mut self.reader)
                .take(self.max_line_bytes)
                .read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            if self.line.last() != Some(&b'\n') && read as u64 == self.max_line_bytes {
                self.discard_rest_of_line()?;
                return Err(StreamError::Malformed(format!(
                    "packet exceeds {} bytes",
                    self.max_line_bytes
                )));
            }
            let text = std::str::from_utf8(&self.line)
                .map_err(|e| StreamError::Malformed(format!("packet is not UTF-8: {e}")))?;
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            log::trace!("packet: {trimmed}");
            return self.decoder.decode_line(trimmed).map(Some);
        }
    }
}
/// Seeded synthetic walking-like motion: gravity on Z, a step cadence on every axis, noise.
pub struct SimulatedSource {
    rng: StdRng,
    sampling_frequency: f64,
    remaining: u64,
    emitted: u64,
    cadence_hz: f64,
    missing_every: Option<u64>,
}
impl SimulatedSource {
    pub fn new(seed: u64, sampling_frequency: f64, samples: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sampling_frequency,
            remaining: samples,
            emitted: 0,
            cadence_hz: 1.8,
            missing_every: None,
        }
    }
    /// Drops the gyroscope Z reading from every `n`th packet.
    pub fn with_missing_every(mut self, n: u64) -> Self {
        self.missing_every = (n > 0).then_some(n);
        self
    }
}
impl SampleSource for SimulatedSource {
    fn next_sample(&mut self) -> Result<Option<RawSample>, StreamError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.emitted += 1;
        let t = self.emitted as f64 / self.sampling_frequency;
        let phase = 2.0 * PI * self.cadence_hz * t;
        let mut noise = || self.rng.gen_range(-0.05_f64..0.05);
        let sample = RawSample::complete([
            0.3 * phase.sin() + noise(),
            0.2 * (phase * 0.5).cos() + noise(),
            9.81 + 1.2 * phase.sin() + noise(),
            0.4 * phase.cos() + noise(),
            0.1 * phase.sin() + noise(),
            0.05 * (2.0 * phase).sin() + noise(),
        ]);
        match self.missing_every {
            Some(n) if self.emitted % n == 0 => Ok(Some(sample.without(ChannelId::GyroZ))),
            _ => Ok(Some(sample)),
        }
    }
}
