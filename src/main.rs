//! Model Package CLI - Validated predictions from the command line

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use model_package::constants;
use model_package::logic::data::load_dataset;
use model_package::logic::schema::LayoutInfo;
use model_package::{Config, Frame, PipelineLoader, Predictor, Variant};

#[derive(Parser)]
#[command(name = "model-package")]
#[command(version)]
#[command(about = "Validated predictions from pre-trained pipelines", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML); overrides the bundled config
    #[arg(short, long, global = true, env = "MODEL_PACKAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Packaged service to use
    #[arg(short, long, global = true, default_value = "house-prices")]
    variant: Variant,

    /// Directory holding trained pipelines
    #[arg(short, long, global = true, env = "MODEL_PACKAGE_TRAINED_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate input and predict
    Predict {
        /// CSV or JSON file, `-` for JSON on stdin (default: the configured test set)
        input: Option<PathBuf>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Print the resolved configuration
    ShowConfig {
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Load the pipeline and print its metadata
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Yaml,
    Toml,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Predict { input, pretty } => {
            let predictor = build_predictor(&cli.model_dir, config)?;
            let input_path = match input {
                Some(path) => path,
                None => default_input(predictor.config())?,
            };
            let frame = read_input(&input_path)?;

            let result = predictor.make_prediction(frame);
            let output = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", output);

            if result.is_ok() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }
        Commands::ShowConfig { format } => {
            let rendered = match format {
                ConfigFormat::Yaml => config.to_yaml()?,
                ConfigFormat::Toml => config.to_toml()?,
            };
            println!("{}", rendered);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let layout = LayoutInfo::from_features(&config.model_config.features);
            let predictor = build_predictor(&cli.model_dir, config)?;
            let status = serde_json::json!({
                "predictor": predictor.status(),
                "pipeline": predictor.pipeline_metadata(),
                "layout": layout,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::for_variant(cli.variant)
            .with_context(|| format!("Bundled config for {} is invalid", cli.variant)),
    }
}

fn build_predictor(model_dir: &Option<PathBuf>, config: Config) -> Result<Predictor> {
    let loader = match model_dir {
        Some(dir) => PipelineLoader::new(dir).require_checksum(constants::is_checksum_required()),
        None => PipelineLoader::from_env(),
    };

    Predictor::from_config(config, &loader)
        .with_context(|| format!("Failed to load pipeline from {}", loader.model_dir().display()))
}

fn default_input(config: &Config) -> Result<PathBuf> {
    let file = config
        .app_config
        .test_data_file
        .as_deref()
        .context("No input given and no test_data_file configured")?;
    Ok(constants::get_dataset_dir().join(file))
}

/// CSV by extension, JSON otherwise
fn read_input(path: &Path) -> Result<Frame> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        return Ok(Frame::from_json(&value)?);
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        return load_dataset(path).with_context(|| format!("Failed to read {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    Ok(Frame::from_json(&value)?)
}
