//! Birdstream Core - online bird-count anomaly detection
//!
//! The main entry point for bs-core, handling:
//! - Streaming observations through the baseline and window detectors
//! - Configuration checks
//! - Version reporting

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use bs_common::{OutputFormat, SCHEMA_VERSION};
use bs_config::{load_config, ConfigError, ConfigOptions, ConfigSource, ResolvedConfig};
use bs_core::alert::{AlertEmitter, FanoutEmitter, JsonlAlertWriter, NullEmitter};
use bs_core::engine::Engine;
use bs_core::exit_codes::ExitCode;
use bs_core::logging::{
    event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use bs_core::runner::{run_stream, RunOptions, RunSummary};
use bs_core::log_event;
use clap::{Args, Parser, Subcommand};

/// Birdstream Core - per-species baselines and unusual-count alerts
#[derive(Parser)]
#[command(name = "bs-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (overrides BIRDSTREAM_CONFIG and discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "jsonl")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream observations and emit alerts
    Run(RunArgs),

    /// Load and validate configuration, print the resolved values
    Check,

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSONL observation file, or - for stdin
    #[arg(long, short = 'i', default_value = "-")]
    input: PathBuf,

    /// Worker threads (default: available parallelism)
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Also print the run summary as JSON on stderr
    #[arg(long)]
    summary: bool,

    /// Append alerts as JSONL to this file, in addition to stdout
    #[arg(long)]
    alerts_file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Run(args) => run(&cli.global, args),
        Commands::Check => check(&cli.global),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn load(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, ExitCode> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
    };
    match load_config(&options) {
        Ok(resolved) => {
            if resolved.source == ConfigSource::BuiltinDefault {
                log_event!(
                    ctx,
                    DEBUG,
                    event_names::CONFIG_DEFAULT_USED,
                    Stage::Init,
                    "no config file found, using built-in defaults"
                );
            } else {
                log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_LOADED,
                    Stage::Init,
                    "config loaded",
                    source = tracing::field::display(&resolved.source),
                    path = tracing::field::debug(&resolved.path)
                );
            }
            Ok(resolved)
        }
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                e.to_string(),
                code = e.code()
            );
            print_config_error(global, &e);
            Err(ExitCode::from(&e))
        }
    }
}

fn run(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let ctx = LogContext::for_current_run();
    let resolved = match load(global, &ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };

    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        match File::open(&args.input) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                let err = bs_common::Error::Io(e);
                log_event!(
                    ctx,
                    ERROR,
                    event_names::INTERNAL_ERROR,
                    Stage::Ingest,
                    format!("cannot open {}: {}", args.input.display(), err),
                    code = err.code()
                );
                eprintln!("{}", err.to_json());
                return ExitCode::from(&err);
            }
        }
    };

    let mut sinks: Vec<Arc<dyn AlertEmitter>> = Vec::new();
    if global.format.streams_alerts() {
        sinks.push(Arc::new(JsonlAlertWriter::new(io::stdout())));
    }
    if let Some(path) = &args.alerts_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => sinks.push(Arc::new(JsonlAlertWriter::new(file))),
            Err(e) => {
                let err = bs_common::Error::Io(e);
                log_event!(
                    ctx,
                    ERROR,
                    event_names::SINK_FAILED,
                    Stage::Init,
                    format!("cannot open {}: {}", path.display(), err),
                    code = err.code()
                );
                eprintln!("{}", err.to_json());
                return ExitCode::from(&err);
            }
        }
    }
    let emitter: Arc<dyn AlertEmitter> = match sinks.len() {
        0 => Arc::new(NullEmitter),
        1 => sinks.remove(0),
        _ => Arc::new(FanoutEmitter::new(sinks)),
    };

    let mut options = RunOptions::default();
    if let Some(workers) = args.workers {
        if workers == 0 {
            eprintln!("--workers must be at least 1");
            return ExitCode::ArgsError;
        }
        options = options.with_workers(workers);
    }

    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "run started",
        workers = options.workers as u64,
        input = tracing::field::display(args.input.display())
    );

    let engine = Engine::new(&resolved.config, emitter, ctx);
    let mut summary = match run_stream(reader, &engine, &options) {
        Ok(summary) => summary,
        Err(e) => {
            log_event!(
                engine.log_context(),
                ERROR,
                event_names::INTERNAL_ERROR,
                Stage::Shutdown,
                e.to_string(),
                code = e.code()
            );
            eprintln!("{}", e.to_json());
            return ExitCode::from(&e);
        }
    };
    summary.config = Some(resolved.snapshot());

    print_summary(global, args, &summary);
    ExitCode::for_alert_count(summary.total_alerts)
}

fn print_summary(global: &GlobalOpts, args: &RunArgs, summary: &RunSummary) {
    match global.format {
        OutputFormat::Json => println!("{}", to_pretty(summary)),
        OutputFormat::Summary => println!("{}", summary.render_line()),
        OutputFormat::Jsonl => eprintln!("{}", summary.render_line()),
        OutputFormat::Exitcode => {}
    }
    if args.summary {
        eprintln!("{}", serde_json::to_string(summary).unwrap_or_default());
    }
}

fn check(global: &GlobalOpts) -> ExitCode {
    let ctx = LogContext::for_current_run();
    let resolved = match load(global, &ctx) {
        Ok(resolved) => resolved,
        Err(code) => return code,
    };

    match global.format {
        OutputFormat::Exitcode => {}
        OutputFormat::Summary => {
            let path = resolved
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("config ok: {} ({})", resolved.source, path);
        }
        OutputFormat::Json | OutputFormat::Jsonl => {
            let output = serde_json::json!({
                "schema_version": resolved.config.schema_version,
                "source": resolved.source,
                "path": resolved.path,
                "config": resolved.config,
            });
            println!("{}", to_pretty(&output));
        }
    }
    ExitCode::Clean
}

fn print_config_error(global: &GlobalOpts, error: &ConfigError) {
    if global.format == OutputFormat::Exitcode {
        return;
    }
    let output = serde_json::json!({
        "code": error.code(),
        "category": "config",
        "message": error.to_string(),
    });
    eprintln!("{}", output);
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "config_schema_version": bs_config::CONFIG_SCHEMA_VERSION,
                "bs_core_version": env!("CARGO_PKG_VERSION"),
            });
            println!("{}", to_pretty(&version_info));
        }
        OutputFormat::Exitcode => {}
        _ => {
            println!("bs-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
