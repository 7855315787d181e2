// src/main.rs
mod classifier;
mod config;
mod engine;
mod recorder;
mod server;
mod stream;
mod types;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::classifier::{ClassifierAdapter, LogisticModel};
use crate::config::AppConfig;
use crate::engine::Session;
use crate::recorder::JsonlRecorder;
use crate::server::Server;
use crate::stream::{JsonLineSource, SampleDecoder, SampleSource, SimulatedSource};

#[derive(Parser, Debug)]
#[command(
    name = "har-stream",
    about = "Streaming human-activity recognition over phone motion sensors"
)]
struct Args {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logistic-regression model (JSON)
    #[arg(long, global = true, default_value = "model/logistic_har.json")]
    model: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for phone connections, one session per connection
    Serve {
        /// Overrides `server.bind_addr`
        #[arg(long)]
        bind: Option<String>,
        /// Directory receiving one result log per session
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Run one session over a recorded JSON-lines file
    Replay {
        input: PathBuf,
        #[arg(long, default_value = "predictions.jsonl")]
        output: PathBuf,
        /// Classify on the reading thread instead of a separate processing stage
        #[arg(long)]
        inline: bool,
    },
    /// Run one session over synthetic walking data
    Simulate {
        #[arg(long, default_value_t = 1_000)]
        samples: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "predictions.jsonl")]
        output: PathBuf,
        /// Leave the gyroscope Z reading out of every Nth packet
        #[arg(long)]
        missing_every: Option<u64>,
        #[arg(long)]
        inline: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn run_single<S: SampleSource>(
    app: &AppConfig,
    classifier: ClassifierAdapter,
    source: &mut S,
    output: PathBuf,
    inline: bool,
) -> Result<()> {
    let session = Session::new(1, app, classifier).context("starting session")?;
    let sink = JsonlRecorder::open(&output)
        .with_context(|| format!("opening result log {}", output.display()))?;
    let summary = if inline {
        session.run_inline(source, sink)?
    } else {
        session.run(source, sink)?
    };
    log::info!(
        "{} packets, {} dropped, {} windows, {} classified, {} inference failures, final state {:?}",
        summary.samples_received,
        summary.samples_dropped,
        summary.windows,
        summary.classified,
        summary.inference_failures,
        summary.final_state
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut app = load_config(args.config.as_ref())?;
    let model = LogisticModel::load(&args.model)?;
    let classifier = ClassifierAdapter::new(Arc::new(model)).context("mapping model classes")?;

    match args.command {
        Command::Serve { bind, output_dir } => {
            if let Some(bind) = bind {
                app.server.bind_addr = bind;
            }
            let server = Server::bind(app, classifier, output_dir).context("starting server")?;
            server.serve(None)?;
        }
        Command::Replay {
            input,
            output,
            inline,
        } => {
            let file = File::open(&input)
                .with_context(|| format!("opening recording {}", input.display()))?;
            let decoder = SampleDecoder::new(app.session.channel_names.clone());
            let mut source =
                JsonLineSource::new(BufReader::new(file), decoder, app.session.max_line_bytes);
            run_single(&app, classifier, &mut source, output, inline)?;
            log::info!("replay of {} finished", input.display());
        }
        Command::Simulate {
            samples,
            seed,
            output,
            missing_every,
            inline,
        } => {
            let mut source = SimulatedSource::new(seed, app.session.sampling_frequency, samples);
            if let Some(n) = missing_every {
                source = source.with_missing_every(n);
            }
            run_single(&app, classifier, &mut source, output, inline)?;
            log::info!("simulation with seed {seed} finished");
        }
    }
    Ok(())
}
