//! ktile CLI: inspect and validate KTile config documents.
//!
//! # Usage
//!
//! ```text
//! ktile check tiles.yaml
//! ktile show tiles.json
//! KTILE_CONFIG=tiles.yaml ktile layers
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ktile_config_core::data::document;
use ktile_config_core::parse::options::ProviderKind;
use ktile_config_core::{LayeredConfigStore, RuntimeConfig, TileConfigParser};


#[derive(Parser, Debug)]
#[command(name = "ktile", version, about = "Inspect and validate KTile configuration")]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a config document and summarize its layers
    Check {
        /// Config document (.yaml, .yml or .json). Defaults to $KTILE_CONFIG
        file: Option<PathBuf>,
    },
    /// Print the normalized configuration as JSON
    Show {
        file: Option<PathBuf>,
    },
    /// List layer names in document order
    Layers {
        file: Option<PathBuf>,
    },
}


fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("ktile: {}", e);
            process::exit(1);
        }
    }
}


fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


fn resolve_config_path(file: Option<PathBuf>) -> Result<PathBuf, String> {
    resolve_config_path_with(file, |key| std::env::var(key).ok())
}

fn resolve_config_path_with(
    file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, String> {
    if let Some(file) = file {
        return Ok(file);
    }
    match env("KTILE_CONFIG") {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err("no config file given and KTILE_CONFIG is not set".into()),
    }
}


fn load_store(file: Option<PathBuf>) -> Result<LayeredConfigStore, String> {
    let path = resolve_config_path(file)?;
    let doc = document::load(&path).map_err(|e| e.to_string())?;
    tracing::debug!(path = %path.display(), layers = doc.layers.len(), "loaded config document");
    Ok(doc.into_store(TileConfigParser))
}


fn run(command: Command) -> Result<String, String> {
    match command {
        Command::Check { file } => {
            let mut store = load_store(file)?;
            let config = store
                .runtime_config()
                .map_err(|e| format!("invalid config: {}", e))?;
            Ok(summarize(&config))
        }
        Command::Show { file } => {
            let store = load_store(file)?;
            serde_json::to_string_pretty(&store.as_snapshot()).map_err(|e| e.to_string())
        }
        Command::Layers { file } => {
            let store = load_store(file)?;
            Ok(store.names().join("\n"))
        }
    }
}


fn summarize(config: &RuntimeConfig) -> String {
    let mut lines = vec![format!(
        "ok: {} layer(s), cache {:?}",
        config.layers.len(),
        config.cache.backend
    )];
    for (name, layer) in &config.layers {
        let provider = match &layer.provider.kind {
            ProviderKind::Builtin(name) => name.as_str(),
            ProviderKind::Class(path) => path.as_str(),
        };
        lines.push(format!("  {}  provider={}  tile height={}", name, provider, layer.tile_height));
    }
    lines.join("\n")
}
