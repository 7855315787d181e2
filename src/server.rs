// src/server.rs
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::classifier::ClassifierAdapter;
use crate::config::AppConfig;
use crate::engine::Session;
use crate::recorder::JsonlRecorder;
use crate::stream::{JsonLineSource, SampleDecoder, StreamError};

/// Accepts phone connections and runs one session per connection on its own thread.
pub struct Server {
    listener: TcpListener,
    app: Arc<AppConfig>,
    classifier: ClassifierAdapter,
    output_dir: PathBuf,
}

impl Server {
    pub fn bind(
        app: AppConfig,
        classifier: ClassifierAdapter,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, StreamError> {
        // Filter design and model width are checked once here, not per connection.
        Session::preflight(&app, &classifier)?;
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        let listener = TcpListener::bind(&app.server.bind_addr)?;
        info!("waiting for connections on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            app: Arc::new(app),
            classifier,
            output_dir,
        })
    }

    /// Serves until `max_sessions` connections have been accepted (forever when `None`),
    /// then waits for the running sessions to finish.
    pub fn serve(&self, max_sessions: Option<u64>) -> Result<(), StreamError> {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut next_id = 0u64;
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            next_id += 1;
            let id = next_id;
            let app = Arc::clone(&self.app);
            let classifier = self.classifier.clone();
            let output = self.output_dir.join(format!("session-{id}.jsonl"));
            workers.push(
                thread::Builder::new()
                    .name(format!("session-{id}"))
                    .spawn(move || {
                        if let Err(e) = handle_connection(id, stream, &app, classifier, output) {
                            error!("session {id} ended with error: {e}");
                        }
                    })?,
            );
            workers.retain(|w| !w.is_finished());
            if max_sessions.is_some_and(|max| id >= max) {
                break;
            }
        }
        for worker in workers {
            if worker.join().is_err() {
                error!("a session thread panicked");
            }
        }
        Ok(())
    }
}

fn handle_connection(
    id: u64,
    stream: TcpStream,
    app: &AppConfig,
    classifier: ClassifierAdapter,
    output: PathBuf,
) -> Result<(), StreamError> {
    let peer = stream.peer_addr()?;
    info!("session {id}: accepted connection from {peer}");
    let session = Session::new(id, app, classifier)?;
    let sink = JsonlRecorder::open(output)?;
    let decoder = SampleDecoder::new(app.session.channel_names.clone());
    let mut source =
        JsonLineSource::new(BufReader::new(stream), decoder, app.session.max_line_bytes);
    let summary = session.run(&mut source, sink)?;
    info!(
        "session {id}: {peer} disconnected, {} windows classified",
        summary.classified
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::FixedScorer;
    use crate::stream::{FeatureLayout, FeaturePipeline, StatisticalFeatures};
    use crate::types::SinkRecord;
    use std::io::Write;

    fn walking_classifier() -> ClassifierAdapter {
        let layout = FeaturePipeline::layout_for(&StatisticalFeatures::new(128, 50.0));
        ClassifierAdapter::new(Arc::new(FixedScorer::new(layout, "WALKING"))).unwrap()
    }

    fn local_app() -> AppConfig {
        let mut app = AppConfig::default();
        app.server.bind_addr = "127.0.0.1:0".into();
        app
    }

    #[test]
    fn serves_one_connection_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::bind(local_app(), walking_classifier(), dir.path()).unwrap();
        let addr = server.listener.local_addr().unwrap();
        let handle = thread::spawn(move || server.serve(Some(1)));

        let mut client = TcpStream::connect(addr).unwrap();
        for i in 0..200 {
            writeln!(
                client,
                r#"{{"accelerometerAccelerationX":{x},"accelerometerAccelerationY":0.0,"accelerometerAccelerationZ":-1.0,"gyroRotationX":0.1,"gyroRotationY":0.2,"gyroRotationZ":0.3}}"#,
                x = (i as f64 * 0.1).sin()
            )
            .unwrap();
        }
        writeln!(client, r#"{{"accelerometerAccelerationX":1.0}}"#).unwrap();
        drop(client);
        handle.join().unwrap().unwrap();

        let log = std::fs::read_to_string(dir.path().join("session-1.jsonl")).unwrap();
        let records: Vec<SinkRecord> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let classified = records
            .iter()
            .filter(|r| matches!(r, SinkRecord::Classified(_)))
            .count();
        assert_eq!(classified, 2);
        assert!(records
            .iter()
            .any(|r| matches!(r, SinkRecord::SampleDropped { sample_ordinal: 200, .. })));
        assert!(matches!(records.last(), Some(SinkRecord::SessionClosed { .. })));
    }

    #[test]
    fn bad_filter_or_model_is_rejected_before_listening() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = local_app();
        app.filter.motion_cutoff_hz = 40.0;
        assert!(matches!(
            Server::bind(app, walking_classifier(), dir.path()),
            Err(StreamError::Filter(_))
        ));
        let narrow = FixedScorer::new(FeatureLayout::new(vec!["f0".into()]), "WALKING");
        let classifier = ClassifierAdapter::new(Arc::new(narrow)).unwrap();
        assert!(matches!(
            Server::bind(local_app(), classifier, dir.path()),
            Err(StreamError::ModelInput { .. })
        ));
    }
}
