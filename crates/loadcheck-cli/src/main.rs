use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use loadcheck_config::LoadcheckConfig;
use loadcheck_core::Message;
use loadcheck_validation::{
    inspect_dictionary, DictionaryConfig, DictionaryReport, DictionaryValidator, Validation,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "loadcheck",
    version,
    about = "Record known-good responses and validate load-test responses against them"
)]
struct Cli {
    /// TOML config file with `[dictionary]` and `[logging]` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a response as the correct answer for an original message
    Record(PairArgs),
    /// Validate a response against the recorded one
    Validate(PairArgs),
    /// Check an existing dictionary for missing or stray response files
    Inspect(InspectArgs),
}

#[derive(Args)]
struct DictionaryArgs {
    /// Dictionary directory (overrides the config file)
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Index file name inside the dictionary directory
    #[arg(long)]
    index: Option<String>,
}

#[derive(Args)]
struct PairArgs {
    #[command(flatten)]
    dictionary: DictionaryArgs,
    /// File holding the original (request) payload
    original: PathBuf,
    /// File holding the response payload
    response: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    #[command(flatten)]
    dictionary: DictionaryArgs,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => LoadcheckConfig::load_from_path(path)?,
        None => LoadcheckConfig::default(),
    };
    loadcheck_config::init_tracing(&config.logging);

    match cli.command {
        Command::Record(args) => {
            let dictionary = resolve_dictionary(&args.dictionary, &config)?.recording(true);
            check_pair(dictionary, &args)
        }
        Command::Validate(args) => {
            let dictionary = resolve_dictionary(&args.dictionary, &config)?.recording(false);
            check_pair(dictionary, &args)
        }
        Command::Inspect(args) => {
            let dictionary = resolve_dictionary(&args.dictionary, &config)?;
            let report = inspect_dictionary(&dictionary)?;
            print_report(&report, args.json)?;
            Ok(if report.is_consistent() { 0 } else { 1 })
        }
    }
}

fn resolve_dictionary(
    args: &DictionaryArgs,
    config: &LoadcheckConfig,
) -> Result<DictionaryConfig> {
    let mut dictionary = match (&args.dir, &config.dictionary) {
        (Some(dir), Some(configured)) => DictionaryConfig {
            directory: dir.clone(),
            ..configured.clone()
        },
        (Some(dir), None) => DictionaryConfig::new(dir),
        (None, Some(configured)) => configured.clone(),
        (None, None) => anyhow::bail!("no dictionary directory given (use --dir or --config)"),
    };
    if let Some(index) = &args.index {
        dictionary.index = index.clone();
    }
    tracing::debug!(
        target = "loadcheck.cli",
        dir = %dictionary.directory.display(),
        index = %dictionary.index,
        "resolved dictionary"
    );
    Ok(dictionary)
}

fn read_payload(path: &Path) -> Result<Message> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload file {}", path.display()))?;
    Ok(Message::new(text))
}

fn check_pair(dictionary: DictionaryConfig, args: &PairArgs) -> Result<i32> {
    let original = read_payload(&args.original)?;
    let response = read_payload(&args.response)?;
    let validator = DictionaryValidator::new(dictionary);

    match validator.check(&original, &response) {
        Ok(outcome) => {
            println!(
                "{}",
                match outcome {
                    Validation::Recorded => "recorded",
                    Validation::Valid => "valid",
                    Validation::Mismatch => "mismatch",
                }
            );
            Ok(if outcome.is_valid() { 0 } else { 1 })
        }
        Err(err) => {
            eprintln!("invalid: {err}");
            Ok(1)
        }
    }
}

fn print_report(report: &DictionaryReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("entries: {}", report.entries);
    println!("response files: {}", report.response_files);
    for entry in &report.missing_responses {
        println!(
            "missing: line {} ({}) -> {}",
            entry.line, entry.message, entry.response_id
        );
    }
    for entry in &report.shadowed {
        println!(
            "shadowed: line {} ({}) -> {}",
            entry.line, entry.message, entry.response_id
        );
    }
    for name in &report.unreferenced_files {
        println!("unreferenced: {name}");
    }
    Ok(())
}
