use clap::Parser;

use chain_signal::model::AnalysisConfig;
use chain_signal::{example, inspect, schema, summary, validate};

mod cli;

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Analyze {
            paths,
            config,
            combine,
            parallel,
            output,
            format,
        } => summary::run(&summary::AnalyzeOptions {
            paths,
            config: build_config(&config)?,
            combine,
            parallel,
            output,
            format,
        }),
        cli::Command::Inspect {
            paths,
            config,
            combine,
            export,
        } => inspect::run(&inspect::InspectOptions {
            paths,
            config: build_config(&config)?,
            combine,
            export,
        }),
        cli::Command::Schema => schema::run(),
        cli::Command::Example => example::run(),
        cli::Command::Validate { file } => validate::run(&file),
    }
}

/// Config file (or defaults) with command-line overrides on top, validated.
fn build_config(args: &cli::ConfigArgs) -> anyhow::Result<AnalysisConfig> {
    let base = match &args.config {
        Some(path) => validate::load_and_validate(path).map_err(|errors| config_failure(&errors))?,
        None => AnalysisConfig::default(),
    };
    let config = base.apply(&args.overrides());
    validate::validate(&config).map_err(|errors| config_failure(&errors))?;
    Ok(config)
}

fn config_failure(errors: &[validate::ConfigError]) -> anyhow::Error {
    let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    anyhow::anyhow!("Config validation failed:\n  {}", msgs.join("\n  "))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init()
}
