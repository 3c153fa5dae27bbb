//! Emoflux CLI - Command-line interface for the Emoflux pipeline
//!
//! Commands:
//! - classify: Classify text without recording it
//! - analyze: Classify text and record the result
//! - ingest: Record a labelled observation or a facial-expression reading
//! - stats: Show statistics for the recorded log
//! - history: List recent observations
//! - export / import / clear: Manage the persisted log
//! - doctor: Diagnose storage and configuration health

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use emoflux::aggregate::{days_before, ObservationFilter};
use emoflux::display::{hour_label, percentage_bar, scale_series, WEEKDAY_NAMES};
use emoflux::store::STORAGE_KEY;
use emoflux::types::{ClassificationResult, Observation, Statistics};
use emoflux::{
    Emotion, EventStore, FileBackend, FluxConfig, FluxError, HttpSuggestionService,
    IngestionCoordinator, PersistenceBackend, Source, TextClassifier, EMOFLUX_VERSION,
    PRODUCER_NAME,
};

const BAR_WIDTH: usize = 30;

/// Emoflux - emotion event pipeline
#[derive(Parser)]
#[command(name = "emoflux")]
#[command(version = EMOFLUX_VERSION)]
#[command(about = "Classify, record and analyze emotion observations", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the storage directory
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify text without recording it
    Classify {
        /// Text to classify (reads stdin when omitted)
        #[arg(short, long)]
        text: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify text and record the result
    Analyze {
        /// Text to classify (reads stdin when omitted)
        #[arg(short, long)]
        text: Option<String>,

        /// Wait for the suggestion service and print its advice
        #[arg(long)]
        wait_suggestion: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record an observation
    Ingest {
        /// Emotion label
        #[arg(short, long, required_unless_present = "expressions")]
        emotion: Option<Emotion>,

        /// Confidence percentage (0-100)
        #[arg(short, long, default_value = "100")]
        confidence: f64,

        /// Classifier that produced the label
        #[arg(short, long, default_value = "camera")]
        source: Source,

        /// Facial-expression probabilities as a JSON object, e.g. '{"happy":0.8}'
        #[arg(long, conflicts_with = "emotion")]
        expressions: Option<String>,
    },

    /// Show statistics for the recorded log
    Stats {
        /// Only count observations from this source
        #[arg(long)]
        source: Option<Source>,

        /// Only count observations with this label
        #[arg(long)]
        emotion: Option<Emotion>,

        /// Only count observations from the last N days
        #[arg(long)]
        since_days: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent observations, newest first
    History {
        /// Maximum number of observations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Export the log as JSON
    Export {
        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the log with a previously exported JSON file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Delete every recorded observation
    Clear,

    /// Diagnose storage and configuration health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins unless --verbose is given
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn run(cli: Cli) -> Result<(), EmofluxCliError> {
    let mut config = FluxConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }

    match cli.command {
        Commands::Classify { text, json } => cmd_classify(text, json),

        Commands::Analyze {
            text,
            wait_suggestion,
            json,
        } => cmd_analyze(&config, text, wait_suggestion, json),

        Commands::Ingest {
            emotion,
            confidence,
            source,
            expressions,
        } => cmd_ingest(&config, emotion, confidence, source, expressions.as_deref()),

        Commands::Stats {
            source,
            emotion,
            since_days,
            json,
        } => cmd_stats(&config, source, emotion, since_days, json),

        Commands::History { limit } => cmd_history(&config, limit),

        Commands::Export { output } => cmd_export(&config, output.as_deref()),

        Commands::Import { input } => cmd_import(&config, &input),

        Commands::Clear => cmd_clear(&config),

        Commands::Doctor { json } => cmd_doctor(&config, json),
    }
}

fn open_store(config: &FluxConfig) -> Result<EventStore<FileBackend>, EmofluxCliError> {
    let backend = FileBackend::open(&config.storage_dir).map_err(FluxError::from)?;
    Ok(EventStore::with_capacity(backend, config.capacity))
}

fn open_coordinator(
    config: &FluxConfig,
) -> Result<IngestionCoordinator<FileBackend>, EmofluxCliError> {
    let coordinator = IngestionCoordinator::new(open_store(config)?);
    match &config.suggestion_url {
        Some(url) => {
            let service = HttpSuggestionService::new(url, config.suggestion_timeout())?;
            Ok(coordinator.with_suggestions(Arc::new(service)))
        }
        None => Ok(coordinator),
    }
}

/// Text from the flag, or from stdin when it is piped
fn read_text(text: Option<String>) -> Result<String, EmofluxCliError> {
    match text {
        Some(text) => Ok(text),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        None => Err(EmofluxCliError::NoInput),
    }
}

fn cmd_classify(text: Option<String>, json: bool) -> Result<(), EmofluxCliError> {
    let text = read_text(text)?;
    if text.trim().is_empty() {
        return Err(FluxError::EmptyInput.into());
    }

    let result = TextClassifier::classify(&text);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_classification(&result);
    }
    Ok(())
}

fn cmd_analyze(
    config: &FluxConfig,
    text: Option<String>,
    wait_suggestion: bool,
    json: bool,
) -> Result<(), EmofluxCliError> {
    let text = read_text(text)?;
    let mut coordinator = open_coordinator(config)?;
    let (result, observation) = coordinator.analyze_text(&text)?;

    let suggestion = match coordinator.take_suggestion() {
        Some(pending) if wait_suggestion => Some(pending.wait(config.suggestion_timeout())),
        _ => None,
    };

    if json {
        let output = serde_json::json!({
            "classification": result,
            "observation": observation,
            "suggestion": suggestion,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_classification(&result);
        println!("Recorded: {}", observation.id);
        if let Some(suggestion) = suggestion {
            println!("\nSuggestion:\n{}", suggestion);
        }
    }
    Ok(())
}

fn cmd_ingest(
    config: &FluxConfig,
    emotion: Option<Emotion>,
    confidence: f64,
    source: Source,
    expressions: Option<&str>,
) -> Result<(), EmofluxCliError> {
    let mut coordinator = open_coordinator(config)?;

    let observation = match (expressions, emotion) {
        (Some(raw), _) => {
            let probabilities: HashMap<String, f64> = serde_json::from_str(raw)?;
            coordinator
                .ingest_expressions(&probabilities)?
                .ok_or(EmofluxCliError::NoFace)?
        }
        (None, Some(emotion)) => coordinator.ingest(emotion, confidence, source)?,
        (None, None) => return Err(EmofluxCliError::NoInput),
    };

    println!("{}", serde_json::to_string_pretty(&observation)?);
    Ok(())
}

fn cmd_stats(
    config: &FluxConfig,
    source: Option<Source>,
    emotion: Option<Emotion>,
    since_days: Option<i64>,
    json: bool,
) -> Result<(), EmofluxCliError> {
    let coordinator = IngestionCoordinator::new(open_store(config)?);
    let filter = ObservationFilter {
        source,
        emotion,
        since: since_days
            .map(|days| days_before(coordinator.now(), days))
            .transpose()?,
    };

    let stats = if filter.is_empty() {
        coordinator.statistics()
    } else {
        coordinator.filtered_statistics(&filter)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_statistics(&stats);
    }
    Ok(())
}

fn cmd_history(config: &FluxConfig, limit: usize) -> Result<(), EmofluxCliError> {
    let store = open_store(config)?;
    let observations = store.all();

    if observations.is_empty() {
        println!("No observations recorded yet.");
        return Ok(());
    }

    for observation in observations.iter().take(limit) {
        print_observation(observation);
    }
    if observations.len() > limit {
        println!("... {} more", observations.len() - limit);
    }
    Ok(())
}

fn cmd_export(config: &FluxConfig, output: Option<&Path>) -> Result<(), EmofluxCliError> {
    let store = open_store(config)?;
    let json = store.export()?;

    match output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!("Exported {} observations to {}", store.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_import(config: &FluxConfig, input: &Path) -> Result<(), EmofluxCliError> {
    let json = fs::read_to_string(input)?;
    let mut store = open_store(config)?;
    let count = store.import(&json)?;
    println!("Imported {} observations", count);
    Ok(())
}

fn cmd_clear(config: &FluxConfig) -> Result<(), EmofluxCliError> {
    let mut store = open_store(config)?;
    let removed = store.len();
    store.clear()?;
    println!("Removed {} observations", removed);
    Ok(())
}

fn cmd_doctor(config: &FluxConfig, json: bool) -> Result<(), EmofluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "emoflux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Emoflux version {}", EMOFLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "capacity".to_string(),
        status: CheckStatus::Ok,
        message: format!("Log keeps at most {} observations", config.capacity),
    });

    // Check the storage directory and the persisted log
    match FileBackend::open(&config.storage_dir) {
        Ok(backend) => {
            checks.push(DoctorCheck {
                name: "storage_dir".to_string(),
                status: CheckStatus::Ok,
                message: format!("Storage directory {}", backend.dir().display()),
            });

            let log_check = match backend.get(STORAGE_KEY) {
                Ok(None) => DoctorCheck {
                    name: "event_log".to_string(),
                    status: CheckStatus::Ok,
                    message: "No log recorded yet".to_string(),
                },
                Ok(Some(raw)) => match serde_json::from_str::<Vec<Observation>>(&raw) {
                    Ok(observations) => DoctorCheck {
                        name: "event_log".to_string(),
                        status: CheckStatus::Ok,
                        message: format!("Log valid ({} observations)", observations.len()),
                    },
                    Err(e) => DoctorCheck {
                        name: "event_log".to_string(),
                        status: CheckStatus::Warning,
                        message: format!("Log is corrupt and will read as empty: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "event_log".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read log: {}", e),
                },
            };
            checks.push(log_check);
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "storage_dir".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot open {}: {}", config.storage_dir.display(), e),
            });
        }
    }

    let suggestion_check = match &config.suggestion_url {
        Some(url) => match HttpSuggestionService::new(url, config.suggestion_timeout()) {
            Ok(service) => DoctorCheck {
                name: "suggestions".to_string(),
                status: CheckStatus::Ok,
                message: format!("Suggestion endpoint {}", service.endpoint()),
            },
            Err(e) => DoctorCheck {
                name: "suggestions".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot build suggestion client: {}", e),
            },
        },
        None => DoctorCheck {
            name: "suggestions".to_string(),
            status: CheckStatus::Warning,
            message: "No suggestion URL configured; advice is disabled".to_string(),
        },
    };
    checks.push(suggestion_check);

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass text with --text)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (text will be read from it)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: EMOFLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Emoflux Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(EmofluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Rendering

fn print_classification(result: &ClassificationResult) {
    println!("Emotion:    {}", result.emotion);
    println!("Confidence: {}%", result.confidence);
    println!("Tokens:     {}", result.token_count);
    println!("\nBreakdown:");
    for (emotion, value) in result.breakdown.iter() {
        println!(
            "  {:<10} {} {:>3}%",
            emotion,
            percentage_bar(*value as f64, BAR_WIDTH),
            value
        );
    }
}

fn print_observation(observation: &Observation) {
    println!(
        "{}  {:<10} {:>5.1}%  {:<6}  {}",
        observation.timestamp.format("%Y-%m-%d %H:%M:%S %:z"),
        observation.emotion,
        observation.confidence,
        observation.source,
        observation.id
    );
}

fn print_statistics(stats: &Statistics) {
    if stats.total_detections == 0 {
        println!("No observations recorded yet.");
        return;
    }

    println!("Total detections:   {}", stats.total_detections);
    println!("Today:              {}", stats.today_detections);
    println!("Dominant emotion:   {}", stats.dominant_emotion);
    println!("Average confidence: {}%", stats.average_confidence);

    println!("\nDistribution:");
    for (emotion, entry) in stats.emotion_distribution.iter() {
        println!(
            "  {:<10} {} {:>3}% ({})",
            emotion,
            percentage_bar(entry.percentage as f64, BAR_WIDTH),
            entry.percentage,
            entry.count
        );
    }

    println!("\nHourly activity:");
    let hourly = scale_series(&stats.hourly_activity);
    for (hour, (count, scaled)) in stats.hourly_activity.iter().zip(hourly).enumerate() {
        if *count > 0 {
            println!("  {} {} {}", hour_label(hour), percentage_bar(scaled, BAR_WIDTH), count);
        }
    }

    println!("\nLast 7 days:");
    let weekly = scale_series(&stats.weekly_trend);
    for ((name, count), scaled) in WEEKDAY_NAMES.iter().zip(stats.weekly_trend.iter()).zip(weekly) {
        println!("  {:<10} {} {}", name, percentage_bar(scaled, BAR_WIDTH), count);
    }
}

// Error types

#[derive(Debug)]
enum EmofluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    NoInput,
    NoFace,
    DoctorFailed,
}

impl From<io::Error> for EmofluxCliError {
    fn from(e: io::Error) -> Self {
        EmofluxCliError::Io(e)
    }
}

impl From<FluxError> for EmofluxCliError {
    fn from(e: FluxError) -> Self {
        EmofluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for EmofluxCliError {
    fn from(e: serde_json::Error) -> Self {
        EmofluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EmofluxCliError> for CliError {
    fn from(e: EmofluxCliError) -> Self {
        match e {
            EmofluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EmofluxCliError::Flux(e) => {
                let (code, hint) = match &e {
                    FluxError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    FluxError::UnknownEmotion(_) => (
                        "UNKNOWN_EMOTION",
                        "Use one of: happy, sad, angry, surprised, fearful, disgusted, stressed, neutral",
                    ),
                    FluxError::UnknownSource(_) => ("UNKNOWN_SOURCE", "Use camera or text"),
                    FluxError::EmptyInput => ("EMPTY_INPUT", "Provide some text to analyze"),
                    FluxError::Persistence(_) => {
                        ("PERSISTENCE_ERROR", "Run 'emoflux doctor' to check the storage directory")
                    }
                    FluxError::SuggestionRequest(_) | FluxError::SuggestionStatus(_) => {
                        ("SUGGESTION_ERROR", "Check the suggestion service URL")
                    }
                    FluxError::ConfigError(_) => ("CONFIG_ERROR", "Check the config file and EMOFLUX_* variables"),
                    FluxError::InvalidTimestamp(_) => ("INVALID_TIMESTAMP", "Use RFC 3339 timestamps"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            EmofluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EmofluxCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input provided".to_string(),
                hint: Some("Pass --text, pipe text on stdin, or give --emotion/--expressions".to_string()),
            },
            EmofluxCliError::NoFace => CliError {
                code: "NO_FACE".to_string(),
                message: "No recognizable facial expression in reading".to_string(),
                hint: Some("Include at least one known emotion label".to_string()),
            },
            EmofluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
