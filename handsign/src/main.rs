//! Handsign - Two-handed gesture recognition
//!
//! Records labeled gesture samples, validates the corpus, trains the
//! model/catalog pair and recognizes gestures from landmark streams.

use anyhow::Context;
use handsign::app::cli::{Cli, Commands, ConfigAction};
use handsign::app::config::Config;
use handsign::capture::{PrecomputedLandmarks, ReplaySource};
use handsign::classifier::{Classifier, GestureClassCatalog, RemoteClassifier, SequenceClassifier};
use handsign::dataset::{distribution_chart, render_scan, DatasetValidator};
use handsign::inference::handle_predict_json;
use handsign::recognition::{
    CommandSpeaker, LogOverlay, LogSpeaker, Pace, Session, SessionEvent, SessionSummary, Speaker, SpeechDispatcher,
};
use handsign::training::TrainingPipeline;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Width of the `validate --chart` bars
const CHART_WIDTH: usize = 40;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Record {
            class,
            input,
            samples,
            length,
            root,
        } => {
            run_record(&class, &input, samples, length, root, config)?;
        }
        Commands::Recognize {
            input,
            threshold,
            length,
            remote,
            no_speech,
            realtime,
        } => {
            run_recognize(&input, threshold, length, remote, no_speech, realtime, config)?;
        }
        Commands::Validate {
            root,
            quarantine,
            chart,
        } => {
            run_validate(root, quarantine, chart, config)?;
        }
        Commands::Train {
            root,
            model_out,
            catalog_out,
            seed,
        } => {
            run_train(root, model_out, catalog_out, seed, config)?;
        }
        Commands::Predict { request } => {
            run_predict(&request, &config)?;
        }
        Commands::Classes => {
            run_classes(&config)?;
        }
        Commands::Init { force } => {
            run_init(force, &config_path, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, &config_path, &config)?;
        }
    }

    Ok(())
}

fn run_record(
    class: &str,
    input: &Path,
    samples: usize,
    length: Option<usize>,
    root: Option<PathBuf>,
    mut config: Config,
) -> anyhow::Result<()> {
    if let Some(length) = length {
        config.pipeline.sequence_length = length;
    }
    if let Some(root) = root {
        config.dataset.root = root;
    }
    config.validate()?;

    let corpus = config.corpus();
    let source = open_source(input)?;
    let mut session = Session::new(
        source,
        PrecomputedLandmarks,
        config.recognition_settings(),
        config.session_options(pace_for(input, false)),
    )
    .with_overlay(Box::new(LogOverlay::default()));

    // Predictions of recorded samples are a courtesy; record without a model
    match load_local(&config) {
        Ok(classifier) => session = session.with_classifier(Arc::new(classifier)),
        Err(e) => info!("No model loaded, recording without predictions: {}", e),
    }

    install_stop_handler(session.stop_handle())?;
    info!(
        "Recording {} sample(s) of '{}' into {:?}. Press Ctrl+C to stop",
        samples,
        class,
        corpus.root()
    );

    let summary = session.run_recording(&corpus, class, samples, |event| match event {
        SessionEvent::SampleSaved {
            class_name,
            path,
            class_count,
            prediction,
        } => {
            println!("Saved {} ({} samples of '{}')", path.display(), class_count, class_name);
            if let Some(prediction) = prediction {
                println!("Prediction: {}", prediction);
            }
        }
        other => report_device_event(other),
    });
    session.finish();
    let summary = summary?;

    println!("\nRecording finished ({:?})", summary.end);
    println!("  Samples saved: {}", summary.samples.len());
    println!("  Frames: {}", summary.frames);
    if summary.buffer.hand_loss_resets > 0 {
        println!("  Windows restarted after hand loss: {}", summary.buffer.hand_loss_resets);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_recognize(
    input: &Path,
    threshold: Option<f32>,
    length: Option<usize>,
    remote: Option<String>,
    no_speech: bool,
    realtime: bool,
    mut config: Config,
) -> anyhow::Result<()> {
    if let Some(threshold) = threshold {
        config.recognition.confidence_threshold = threshold;
    }
    if let Some(length) = length {
        config.pipeline.sequence_length = length;
    }
    if remote.is_some() {
        config.remote.endpoint = remote;
    }
    config.validate()?;

    let classifier: Arc<dyn SequenceClassifier> = match config.remote_settings() {
        Some(settings) => {
            info!("Using remote classifier at {}", settings.endpoint);
            Arc::new(RemoteClassifier::new(settings)?)
        }
        None => match load_local(&config) {
            Ok(classifier) => Arc::new(classifier),
            Err(e) => {
                error!("Failed to load model artifacts: {}", e);
                anyhow::bail!(e.user_message());
            }
        },
    };

    let source = open_source(input)?;
    let mut session = Session::new(
        source,
        PrecomputedLandmarks,
        config.recognition_settings(),
        config.session_options(pace_for(input, realtime)),
    )
    .with_classifier(classifier)
    .with_overlay(Box::new(LogOverlay::default()));

    if config.recognition.speech && !no_speech {
        let speaker: Box<dyn Speaker> = match &config.recognition.speech_command {
            Some(command) => Box::new(CommandSpeaker::from_command_line(command)?),
            None => Box::new(LogSpeaker),
        };
        session = session.with_speech(SpeechDispatcher::spawn(speaker)?);
    }

    install_stop_handler(session.stop_handle())?;
    info!("Recognizing... Press Ctrl+C to stop");

    let summary = session.run_recognition(|event| match event {
        SessionEvent::LabelChanged { result, .. } => println!("Prediction: {}", result),
        SessionEvent::LowConfidence { result } => debug!("Low confidence: {}", result),
        SessionEvent::ClassificationFailed { message } => warn!("Classification failed: {}", message),
        other => report_device_event(other),
    });
    session.finish();
    let summary = summary.map_err(|e| {
        if e.is_fatal() {
            error!("{}", e);
        }
        anyhow::anyhow!(e.user_message())
    })?;

    print_recognition_summary(&summary);
    Ok(())
}

fn run_validate(root: Option<PathBuf>, quarantine: bool, chart: bool, mut config: Config) -> anyhow::Result<()> {
    if let Some(root) = root {
        config.dataset.root = root;
    }
    let validator = DatasetValidator::new(config.corpus(), config.window_shape()).with_policy(config.admission_policy());
    info!("Validating corpus at {:?}", config.dataset.root);

    let scan = validator.scan()?;
    let admission = validator.admission(&scan);
    println!("{}", render_scan(&scan, &admission));

    if chart {
        println!("Distribution:");
        println!("{}", distribution_chart(&scan.counts, CHART_WIDTH));
    }

    if quarantine && !scan.is_clean() {
        let report = validator.quarantine(&scan.corrupt_paths())?;
        println!(
            "Moved {} file(s) to {:?}",
            report.moved.len(),
            validator.corpus().quarantine_path()
        );
        if !report.not_found.is_empty() {
            println!("{} file(s) were already gone", report.not_found.len());
        }
    } else if !scan.is_clean() {
        println!("Re-run with --quarantine to move corrupt files out of the corpus");
    }

    Ok(())
}

fn run_train(
    root: Option<PathBuf>,
    model_out: Option<PathBuf>,
    catalog_out: Option<PathBuf>,
    seed: Option<u64>,
    mut config: Config,
) -> anyhow::Result<()> {
    if let Some(root) = root {
        config.dataset.root = root;
    }
    if let Some(path) = model_out {
        config.artifacts.model_path = path;
    }
    if let Some(path) = catalog_out {
        config.artifacts.catalog_path = path;
    }
    if let Some(seed) = seed {
        config.training.seed = seed;
    }
    config.validate()?;

    info!("Training from {:?}", config.dataset.root);
    let pipeline = TrainingPipeline::new(config.corpus(), config.training_options());
    let report = match pipeline.run(&config.artifacts.model_path, &config.artifacts.catalog_path) {
        Ok(report) => report,
        Err(e) => {
            error!("Training failed: {}", e);
            anyhow::bail!(e.user_message());
        }
    };

    println!("\nTraining Completed!");
    println!("  Classes: {}", report.classes.join(", "));
    for (class, count) in &report.excluded {
        println!("  Excluded: {} ({} samples)", class, count);
    }
    if report.corrupt_skipped > 0 {
        println!("  Corrupt files skipped: {}", report.corrupt_skipped);
    }
    println!(
        "  Split: {} train / {} val / {} test",
        report.train_samples, report.val_samples, report.test_samples
    );
    if let Some(accuracy) = report.validation.accuracy() {
        println!("  Validation accuracy: {:.2}%", accuracy * 100.0);
    }
    if let Some(accuracy) = report.test.accuracy() {
        println!("  Test accuracy: {:.2}%", accuracy * 100.0);
        println!("\n{}", report.test.classification_report());
        println!("Confusion matrix:\n{}", report.test.render());
    }
    println!("  Model: {:?}", report.model_path);
    println!("  Catalog: {:?}", report.catalog_path);

    Ok(())
}

fn run_predict(request: &Path, config: &Config) -> anyhow::Result<()> {
    let classifier = load_local(config).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let mut body = String::new();
    if Cli::is_stdin(request) {
        std::io::stdin().read_to_string(&mut body)?;
    } else {
        body = std::fs::read_to_string(request).with_context(|| format!("reading {:?}", request))?;
    }

    let reply = handle_predict_json(&classifier, &body);
    println!("{}", reply.to_json()?);
    if !reply.is_success() {
        anyhow::bail!("Request rejected with status {}", reply.status);
    }
    Ok(())
}

fn run_classes(config: &Config) -> anyhow::Result<()> {
    let path = &config.artifacts.catalog_path;
    if !path.exists() {
        println!("No catalog found at {}", path.display());
        println!("Train a model with: handsign train");
        return Ok(());
    }

    let catalog = GestureClassCatalog::load(path)?;
    println!("Classes in {:?}:", path);
    for (index, name) in catalog.classes().iter().enumerate() {
        println!("  {:>3}  {}", index, name);
    }
    Ok(())
}

fn run_init(force: bool, config_path: &PathBuf, config: &Config) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    std::fs::create_dir_all(&config.dataset.root)?;
    for artifact in [&config.artifacts.model_path, &config.artifacts.catalog_path] {
        if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("\nCreated directories:");
    println!("  Dataset: {:?}", config.dataset.root);
    if let Some(parent) = config.artifacts.model_path.parent() {
        println!("  Artifacts: {:?}", parent);
    }

    Ok(())
}

fn run_config(action: ConfigAction, config_path: &PathBuf, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => match config.get_value(&key)? {
            Some(value) => println!("{} = {}", key, value),
            None => anyhow::bail!("Configuration key '{}' not found", key),
        },
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'handsign init' first.");
            }
            let updated = Config::load(config_path)?.with_value(&key, &value)?;
            updated.save(config_path)?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save(config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}

fn load_local(config: &Config) -> handsign::Result<Classifier> {
    Classifier::load(&config.artifacts.model_path, &config.artifacts.catalog_path)
}

fn open_source(input: &Path) -> anyhow::Result<ReplaySource> {
    if Cli::is_stdin(input) {
        return Ok(ReplaySource::from_reader(std::io::stdin()));
    }
    ReplaySource::open(input).with_context(|| format!("opening landmark stream {:?}", input))
}

/// Live streams run on the wall clock; replay files advance one tick per frame
fn pace_for(input: &Path, realtime: bool) -> Pace {
    if realtime || Cli::is_stdin(input) {
        Pace::RealTime
    } else {
        Pace::Virtual
    }
}

fn install_stop_handler(stop: Arc<std::sync::atomic::AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })?;
    Ok(())
}

fn report_device_event(event: &SessionEvent) {
    match event {
        SessionEvent::DeviceError {
            consecutive_failures,
            message,
        } => {
            eprintln!("{}", handsign::Error::Device(message.clone()).user_message());
            warn!("{} consecutive capture failures: {}", consecutive_failures, message);
        }
        SessionEvent::DeviceRecovered => info!("Capture device recovered"),
        SessionEvent::ClassificationFailed { message } => warn!("Classification failed: {}", message),
        _ => {}
    }
}

fn print_recognition_summary(summary: &SessionSummary) {
    println!("\nRecognition finished ({:?})", summary.end);
    println!("  Frames: {}", summary.frames);
    println!("  Label changes: {}", summary.label_changes.len());
    println!("  Low-confidence windows: {}", summary.low_confidence);
    println!("  Duplicates suppressed: {}", summary.duplicates_suppressed);
    if summary.device_failures > 0 {
        println!(
            "  Capture failures: {} ({} surfaced)",
            summary.device_failures, summary.device_errors_surfaced
        );
    }
}
