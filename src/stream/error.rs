use thiserror::Error;
/// Coarse error classes used to decide how far a failure propagates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or incomplete sample. The sample is dropped and the session keeps streaming.
    Schema,
    /// Invalid startup parameters. The session never starts.
    Config,
    /// Scheduler and buffers disagree. Fatal to the session.
    InsufficientData,
    /// Filter design rejected. Fatal to the session.
    Filter,
    /// Feature vector does not match the model. Fatal to the session.
    ModelInput,
    /// Scoring failed for one window. Recorded, session continues.
    Inference,
    /// Underlying stream or log file failed.
    Transport,
    /// Session state machine was driven out of order.
    Logic,
}
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("sample is missing channel `{channel}`")]
    MissingField { channel: String },
    #[error("channel `{channel}` carries a non-finite value")]
    NonFinite { channel: String },
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("channel `{channel}` cannot serve samples {start}..{end}: {available} retained")]
    InsufficientData {
        channel: String,
        start: u64,
        end: u64,
        available: usize,
    },
    #[error("filter design rejected: {0}")]
    Filter(String),
    #[error("feature vector shape mismatch: expected {expected} features, got {actual}")]
    ModelInput { expected: usize, actual: usize },
    #[error("feature `{actual}` found at position {position}, model expects `{expected}`")]
    FeatureOrder {
        position: usize,
        expected: String,
        actual: String,
    },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("illegal session transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::types::SessionState,
        to: crate::types::SessionState,
    },
    #[error("processing stage stopped unexpectedly")]
    StageClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::MissingField { .. }
            | StreamError::NonFinite { .. }
            | StreamError::Malformed(_) => ErrorKind::Schema,
            StreamError::Config(_) => ErrorKind::Config,
            StreamError::InsufficientData { .. } => ErrorKind::InsufficientData,
            StreamError::Filter(_) => ErrorKind::Filter,
            StreamError::ModelInput { .. } | StreamError::FeatureOrder { .. } => {
                ErrorKind::ModelInput
            }
            StreamError::Inference(_) => ErrorKind::Inference,
            StreamError::Io(_) => ErrorKind::Transport,
            StreamError::InvalidTransition { .. } | StreamError::StageClosed => ErrorKind::Logic,
        }
    }
    /// Errors that affect a single sample or window; everything else ends the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Schema | ErrorKind::Inference)
    }
}
impl From<serde_json::Error> for StreamError {
    fn from(value: serde_json::Error) -> Self {
        StreamError::Malformed(value.to_string())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn schema_and_inference_errors_are_recoverable() {
        let missing = StreamError::MissingField {
            channel: "gyroRotationZ".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::Schema);
        assert!(missing.is_recoverable());
        assert!(StreamError::Inference("boom".into()).is_recoverable());
    }
    #[test]
    fn invariant_and_pipeline_errors_are_fatal() {
        let desync = StreamError::InsufficientData {
            channel: "acc_x".into(),
            start: 0,
            end: 128,
            available: 12,
        };
        assert_eq!(desync.kind(), ErrorKind::InsufficientData);
        assert!(!desync.is_recoverable());
        assert!(!StreamError::Filter("cutoff".into()).is_recoverable());
        assert!(!StreamError::ModelInput {
            expected: 45,
            actual: 44
        }
        .is_recoverable());
    }
}
