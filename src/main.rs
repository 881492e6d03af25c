// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use futures::stream::{self, Stream, StreamExt};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use rusten::app_config::{Config, LogLevel, TranslationProvider};
use rusten::translation::AbortHandle;
use rusten::{AppError, Controller, RunOutcome};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
    #[value(name = "libretranslate")]
    LibreTranslate,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
            CliTranslationProvider::LibreTranslate => TranslationProvider::LibreTranslate,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for rusten
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input document (.txt, .epub or .fb2)
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output file (default: <input stem>.<target language>.txt next to the input)
    #[arg(short, long, value_name = "OUTPUT_PATH")]
    output: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Provider tried once per chunk after the primary exhausts its retries
    #[arg(long, value_enum)]
    fallback: Option<CliTranslationProvider>,

    /// Verify translations by translating them back
    #[arg(long)]
    back_translation: bool,

    /// Report translations with a low unique-word ratio
    #[arg(long)]
    confidence_check: bool,

    /// Retry translations that loop
    #[arg(long)]
    repetition_check: bool,

    /// Chunk budget in bytes
    #[arg(long, value_name = "BYTES")]
    max_chunk_size: Option<usize>,

    /// Forward attempts per chunk before escalating
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Back-translation similarity needed to accept a chunk (0.0 to 1.0)
    #[arg(long, value_name = "F")]
    similarity_threshold: Option<f32>,

    /// Encoding of text inputs (e.g. 'windows-1251', 'koi8-r'); detected when omitted
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Chunks translated at the same time
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Source language code (e.g., 'ru', 'uk', 'de')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// rusten - translate books with LLMs, checking every chunk
///
/// Reads a plain text, FB2 or EPUB document, translates it chunk by chunk through
/// a local or remote backend, and writes a UTF-8 text file.
#[derive(Parser, Debug)]
#[command(name = "rusten")]
#[command(version)]
#[command(about = "Document translation with LLM backends and quality checks")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "rusten translates long documents with local or remote translation backends.

EXAMPLES:
    rusten book.txt                              # Translate using default config
    rusten -f book.fb2                           # Force overwrite existing output
    rusten -p openai -m gpt-4o book.epub         # Use specific provider and model
    rusten --encoding koi8-r old.txt             # Skip encoding detection
    rusten --back-translation --fallback libretranslate book.txt
    rusten -j 4 -o out/book.en.txt book.txt      # Four chunks at a time
    rusten completions bash > rusten.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. Command line flags override the file.

SUPPORTED PROVIDERS:
    ollama         - Local Ollama server (default)
    openai         - OpenAI API (requires API key)
    anthropic      - Anthropic API (requires API key)
    lmstudio       - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)
    libretranslate - Self-hosted LibreTranslate server")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Marker and ANSI color for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("✗", "1;31"),
            Level::Warn => ("!", "1;33"),
            Level::Info => (" ", "1;32"),
            Level::Debug => ("·", "1;36"),
            Level::Trace => ("…", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (marker, color) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, marker, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "rusten", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.translate).await,
    };

    if let Err(error) = result {
        error!("{:#}", error);
        std::process::exit(AppError::from(error).exit_code());
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(level) = options.log_level {
        log::set_max_level((&LogLevel::from(level)).into());
    }

    let input_path = options
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    let mut config = Config::load_or_create(&options.config_path).map_err(|e| AppError::Config(format!("{:#}", e)))?;
    apply_overrides(&mut config, &options);

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level((&config.log_level).into());
    }

    let controller = Controller::with_config(config).map_err(|e| AppError::Config(format!("{:#}", e)))?;

    let abort = controller.abort_handle();
    let interrupts = stream::unfold((), |()| async { tokio::signal::ctrl_c().await.ok().map(|_| ((), ())) });
    tokio::spawn(async move {
        if handle_interrupts(Box::pin(interrupts), abort).await {
            error!("Interrupted again, exiting without waiting for chunks in flight");
            std::process::exit(130);
        }
    });

    match controller.run(input_path, options.output, options.force_overwrite).await? {
        RunOutcome::Skipped { output } => info!("Nothing to do, {} exists", output.display()),
        RunOutcome::Translated { issues_log: Some(log), .. } => info!("Review notes: {}", log.display()),
        RunOutcome::Translated { .. } => {}
    }

    Ok(())
}

/// Abort on the first interrupt; returns `true` when a second one arrives
async fn handle_interrupts<S>(mut interrupts: S, abort: AbortHandle) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    warn!("Interrupted, finishing chunks in flight (press Ctrl-C again to quit)...");
    abort.abort();

    interrupts.next().await.is_some()
}

/// Apply command line flags on top of the file configuration
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = options.provider {
        config.translation.provider = provider.into();
    }

    if let Some(model) = &options.model {
        let provider = config.translation.provider;
        config.translation.provider_config_mut(provider).model = model.clone();
    }

    if let Some(fallback) = options.fallback {
        config.translation.fallback_provider = Some(fallback.into());
    }

    if let Some(jobs) = options.jobs {
        let provider = config.translation.provider;
        config.translation.provider_config_mut(provider).concurrent_requests = jobs;
    }

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }

    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }

    if options.encoding.is_some() {
        config.input_encoding = options.encoding.clone();
    }

    let quality = &mut config.quality;
    quality.use_back_translation |= options.back_translation;
    quality.use_confidence_check |= options.confidence_check;
    quality.use_repetition_check |= options.repetition_check;
    if let Some(size) = options.max_chunk_size {
        quality.max_chunk_size = size;
    }
    if let Some(retries) = options.max_retries {
        quality.max_retries = retries;
    }
    if let Some(threshold) = options.similarity_threshold {
        quality.similarity_threshold = threshold;
    }

    // Update log level in config if specified via command line
    if let Some(log_level) = options.log_level {
        config.log_level = log_level.into();
    }
}
