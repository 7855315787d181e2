// src/engine.rs
use std::sync::mpsc::{self, Receiver};
use std::thread;

use log::{debug, error, info, warn};

use crate::classifier::ClassifierAdapter;
use crate::config::AppConfig;
use crate::recorder::ResultSink;
use crate::stream::{
    FeaturePipeline, FrameSynchronizer, RawSample, SampleSource, StreamError, Window,
    WindowExtractor, WindowScheduler,
};
use crate::types::{ClassificationResult, SessionState, SinkRecord};

/// Counters reported when a session closes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub samples_received: u64,
    pub samples_accepted: u64,
    pub samples_dropped: u64,
    pub windows: u64,
    pub classified: u64,
    pub inference_failures: u64,
    pub final_state: Option<SessionState>,
}

/// Work handed from ingestion to processing, in arrival order.
enum Job {
    Window(Window),
    Dropped { sample_ordinal: u64, reason: String },
    /// A trigger fired but its window could not be extracted.
    ExtractFailed(StreamError),
}

/// Ingestion half: buffers, scheduler and copy-on-extract.
pub struct Ingestor {
    frames: FrameSynchronizer,
    scheduler: WindowScheduler,
    extractor: WindowExtractor,
    received: u64,
    dropped: u64,
}

impl Ingestor {
    pub fn new(app: &AppConfig) -> Result<Self, StreamError> {
        let session = &app.session;
        session.validate()?;
        Ok(Self {
            frames: FrameSynchronizer::new(session.channel_names.clone(), session.buffer_capacity())?,
            scheduler: WindowScheduler::new(session.window_size, session.overlap_fraction)?,
            extractor: WindowExtractor::new(session.window_size),
            received: 0,
            dropped: 0,
        })
    }

    /// Folds one sample in. A schema error means the sample was dropped and nothing moved.
    pub fn ingest(&mut self, raw: &RawSample) -> Result<Option<Window>, StreamError> {
        self.received += 1;
        if let Err(e) = self.frames.accept(raw) {
            self.dropped += 1;
            return Err(e);
        }
        match self.scheduler.on_sample_accepted() {
            Some(trigger) => {
                debug!(
                    "window {} ready at sample {}",
                    trigger.ordinal, trigger.end_index
                );
                self.extractor.extract(&self.frames, &trigger).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Counts a packet that never decoded into a sample.
    pub fn note_undecodable(&mut self) {
        self.received += 1;
        self.dropped += 1;
    }
}

/// Processing half: features, classification and the result log.
struct ProcessingStage<K: ResultSink> {
    session_id: u64,
    pipeline: FeaturePipeline,
    classifier: ClassifierAdapter,
    sink: K,
    state: SessionState,
    windows: u64,
    classified: u64,
    inference_failures: u64,
}

impl<K: ResultSink> ProcessingStage<K> {
    fn advance(&mut self, next: SessionState) -> Result<(), StreamError> {
        if !self.state.can_transition_to(next) {
            return Err(StreamError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("session {}: {:?} -> {:?}", self.session_id, self.state, next);
        self.state = next;
        Ok(())
    }

    fn classify(&self, window: &Window) -> Result<ClassificationResult, StreamError> {
        let features = self.pipeline.process(window)?;
        self.classifier.classify(&features, &window.trigger)
    }

    /// `Err` stops the stage; the session is over.
    fn handle(&mut self, job: Job) -> Result<(), StreamError> {
        match job {
            Job::Dropped {
                sample_ordinal,
                reason,
            } => self.sink.record(&SinkRecord::SampleDropped {
                sample_ordinal,
                reason,
            }),
            Job::ExtractFailed(e) => {
                self.advance(SessionState::WindowReady)?;
                self.advance(SessionState::Processing)?;
                self.fail(e)
            }
            Job::Window(window) => {
                self.windows += 1;
                self.advance(SessionState::WindowReady)?;
                self.advance(SessionState::Processing)?;
                let outcome = self.classify(&window).and_then(|result| {
                    info!(
                        "session {}: window {} [{}..{}) -> {}",
                        self.session_id,
                        result.window_ordinal,
                        window.trigger.start_index,
                        window.trigger.end_index,
                        result.activity
                    );
                    self.sink.record(&SinkRecord::Classified(result))
                });
                match outcome {
                    Ok(()) => {
                        self.classified += 1;
                        self.advance(SessionState::AwaitingSamples)
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(
                            "session {}: window {} not classified: {e}",
                            self.session_id, window.trigger.ordinal
                        );
                        self.inference_failures += 1;
                        let reported = self.sink.record(&SinkRecord::InferenceFailed {
                            window_end_index: window.trigger.end_index,
                            window_ordinal: window.trigger.ordinal,
                            reason: e.to_string(),
                        });
                        match reported {
                            Ok(()) => self.advance(SessionState::AwaitingSamples),
                            Err(e) => self.fail(e),
                        }
                    }
                    Err(e) => self.fail(e),
                }
            }
        }
    }

    fn fail(&mut self, e: StreamError) -> Result<(), StreamError> {
        error!("session {}: {e}", self.session_id);
        self.advance(SessionState::Error)?;
        Err(e)
    }
}

struct StageReport<K> {
    sink: K,
    state: SessionState,
    windows: u64,
    classified: u64,
    inference_failures: u64,
    error: Option<StreamError>,
}

impl<K: ResultSink> ProcessingStage<K> {
    fn into_report(self, error: Option<StreamError>) -> StageReport<K> {
        StageReport {
            sink: self.sink,
            state: self.state,
            windows: self.windows,
            classified: self.classified,
            inference_failures: self.inference_failures,
            error,
        }
    }

    fn drain(mut self, jobs: Receiver<Job>) -> StageReport<K> {
        for job in jobs {
            if let Err(e) = self.handle(job) {
                return self.into_report(Some(e));
            }
        }
        self.into_report(None)
    }
}

/// One stream's state: its own buffers and scheduler, the shared classifier.
pub struct Session {
    id: u64,
    queue_capacity: usize,
    ingestor: Ingestor,
    pipeline: FeaturePipeline,
    classifier: ClassifierAdapter,
}

/// Builds the feature pipeline and checks it yields as many features as the model takes.
fn pipeline_for(app: &AppConfig, classifier: &ClassifierAdapter) -> Result<FeaturePipeline, StreamError> {
    let pipeline = FeaturePipeline::new(
        &app.filter,
        app.session.window_size,
        app.session.sampling_frequency,
    )?;
    let expected = classifier.expected_layout();
    if expected.len() != pipeline.layout().len() {
        return Err(StreamError::ModelInput {
            expected: expected.len(),
            actual: pipeline.layout().len(),
        });
    }
    Ok(pipeline)
}

impl Session {
    /// Rejects settings every session would fail on, before any stream is opened.
    pub fn preflight(app: &AppConfig, classifier: &ClassifierAdapter) -> Result<(), StreamError> {
        app.validate()?;
        pipeline_for(app, classifier)?;
        Ok(())
    }

    pub fn new(id: u64, app: &AppConfig, classifier: ClassifierAdapter) -> Result<Self, StreamError> {
        let ingestor = Ingestor::new(app)?;
        let pipeline = pipeline_for(app, &classifier)?;
        Ok(Self {
            id,
            queue_capacity: app.session.queue_capacity,
            ingestor,
            pipeline,
            classifier,
        })
    }

    fn split<K: ResultSink>(self, sink: K) -> (Ingestor, ProcessingStage<K>) {
        let stage = ProcessingStage {
            session_id: self.id,
            pipeline: self.pipeline,
            classifier: self.classifier,
            sink,
            state: SessionState::AwaitingSamples,
            windows: 0,
            classified: 0,
            inference_failures: 0,
        };
        (self.ingestor, stage)
    }

    /// Runs ingestion on the calling thread and processing on a second thread,
    /// joined by a bounded queue. Returns once the source ends and the queue is drained.
    pub fn run<S, K>(self, source: &mut S, sink: K) -> Result<SessionSummary, StreamError>
    where
        S: SampleSource,
        K: ResultSink + 'static,
    {
        let id = self.id;
        info!("session {id}: started");
        let (tx, rx) = mpsc::sync_channel::<Job>(self.queue_capacity);
        let (mut ingestor, stage) = self.split(sink);
        let worker = thread::Builder::new()
            .name(format!("session-{id}-processing"))
            .spawn(move || stage.drain(rx))?;
        let ingest_error = ingest_loop(id, &mut ingestor, source, |job| {
            tx.send(job).map_err(|_| StreamError::StageClosed)
        })
        .err();
        drop(tx);
        let report = worker.join().map_err(|_| StreamError::StageClosed)?;
        close(id, ingestor, report, ingest_error)
    }

    /// Same contract as `run`, single-threaded: every window is classified before the
    /// next sample is read.
    pub fn run_inline<S, K>(self, source: &mut S, sink: K) -> Result<SessionSummary, StreamError>
    where
        S: SampleSource,
        K: ResultSink,
    {
        let id = self.id;
        info!("session {id}: started (inline)");
        let (mut ingestor, mut stage) = self.split(sink);
        let mut stage_error = None;
        let ingest_error = ingest_loop(id, &mut ingestor, source, |job| {
            stage.handle(job).map_err(|e| {
                stage_error = Some(e);
                StreamError::StageClosed
            })
        })
        .err();
        let report = stage.into_report(stage_error);
        close(id, ingestor, report, ingest_error)
    }
}

fn ingest_loop<S, F>(
    id: u64,
    ingestor: &mut Ingestor,
    source: &mut S,
    mut submit: F,
) -> Result<(), StreamError>
where
    S: SampleSource,
    F: FnMut(Job) -> Result<(), StreamError>,
{
    loop {
        let ordinal = ingestor.received;
        let outcome = match source.next_sample() {
            Ok(None) => {
                info!("session {id}: end of stream after {ordinal} packets");
                return Ok(());
            }
            Ok(Some(raw)) => ingestor.ingest(&raw),
            Err(e) if e.is_recoverable() => {
                ingestor.note_undecodable();
                Err(e)
            }
            Err(e) => {
                warn!("session {id}: stream failed: {e}");
                return Err(e);
            }
        };
        match outcome {
            Ok(None) => {}
            Ok(Some(window)) => submit(Job::Window(window))?,
            Err(e) if e.is_recoverable() => {
                warn!("session {id}: dropped sample {ordinal}: {e}");
                submit(Job::Dropped {
                    sample_ordinal: ordinal,
                    reason: e.to_string(),
                })?;
            }
            Err(e) => {
                submit(Job::ExtractFailed(e))?;
                return Ok(());
            }
        }
    }
}

fn close<K: ResultSink>(
    id: u64,
    ingestor: Ingestor,
    report: StageReport<K>,
    ingest_error: Option<StreamError>,
) -> Result<SessionSummary, StreamError> {
    let StageReport {
        mut sink,
        state,
        windows,
        classified,
        inference_failures,
        error: stage_error,
    } = report;
    // The stage's own error is the root cause when ingestion only saw the queue close.
    let error = match (stage_error, ingest_error) {
        (Some(e), _) => Some(e),
        (None, Some(e)) => Some(e),
        (None, None) => None,
    };
    let final_state = if state.can_transition_to(SessionState::Closed) {
        SessionState::Closed
    } else {
        state
    };
    let summary = SessionSummary {
        samples_received: ingestor.received,
        samples_accepted: ingestor.frames.total_accepted(),
        samples_dropped: ingestor.dropped,
        windows,
        classified,
        inference_failures,
        final_state: Some(final_state),
    };
    sink.record(&SinkRecord::SessionClosed {
        final_state,
        samples_accepted: summary.samples_accepted,
        samples_dropped: summary.samples_dropped,
        windows,
        error: error.as_ref().map(|e| e.to_string()),
    })?;
    sink.flush()?;
    info!(
        "session {id}: closed after {} samples ({} dropped), {} windows, {} classified",
        summary.samples_received, summary.samples_dropped, windows, classified
    );
    match error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
