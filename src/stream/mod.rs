// src/stream/mod.rs
pub mod buffer;
pub mod error;
pub mod features;
pub mod fft;
pub mod filter;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod sync;
pub mod window;
// Flat re-exports so callers can write `stream::WindowScheduler`.
pub use buffer::ChannelBuffer;
pub use error::StreamError;
pub use features::{FeatureExtractor, FeatureLayout, FeatureVector, StatisticalFeatures};
pub use fft::SpectrumBuilder;
pub use pipeline::FeaturePipeline;
pub use scheduler::{WindowScheduler, WindowTrigger};
#[cfg(test)]
pub use source::ManualSource;
pub use source::{JsonLineSource, RawSample, SampleDecoder, SampleSource, SimulatedSource};
pub use sync::FrameSynchronizer;
pub use window::{Window, WindowExtractor};
