//! cryptoshred CLI - wrap, unwrap and shred field values from the command line.
//!
//! Keys live in a local key directory. Containers are exchanged as JSON in
//! their persisted form, so they can be stored anywhere.
//!
//! `unwrap` exits with 2 for an empty container, 3 for a shredded one and 4
//! for a corrupt one, printing nothing on stdout in those cases.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cryptoshred_common::SubjectId;
use cryptoshred_crypto::{CryptoAlgorithm, KeySize};
use cryptoshred_mapper::{
    Container, ContainerState, CryptoMapper, MapperConfig, ResolveOutcome, TracingMetrics,
};
use cryptoshred_storage::LocalKeyRepository;

#[derive(Parser)]
#[command(name = "cryptoshred")]
#[command(about = "Per-subject field encryption with erasure by key destruction")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding subject keys.
    #[arg(short, long, global = true, default_value = "keys")]
    keys: PathBuf,

    /// JSON mapper configuration with default algorithm and key size.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a JSON value for a subject and print the container.
    Wrap {
        /// Subject owning the value.
        #[arg(short, long)]
        subject: String,

        /// JSON value to encrypt.
        #[arg(short = 'j', long)]
        value: String,

        /// Algorithm, e.g. "aes-cbc" (default: from config).
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Key size in bits: 128, 192 or 256 (default: from config).
        #[arg(short = 'b', long)]
        key_size: Option<String>,
    },

    /// Decrypt a container and print its JSON value.
    Unwrap {
        /// Container file, or "-" for stdin.
        #[arg(short = 'f', long, default_value = "-")]
        container: PathBuf,
    },

    /// Report the state of a container.
    Inspect {
        /// Container file, or "-" for stdin.
        #[arg(short = 'f', long, default_value = "-")]
        container: PathBuf,
    },

    /// Delete every key of a subject.
    Shred {
        /// Subject to erase.
        #[arg(short, long)]
        subject: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Wrap {
            subject,
            value,
            algorithm,
            key_size,
        } => cmd_wrap(&cli.keys, config, &subject, &value, algorithm, key_size)?,

        Commands::Unwrap { container } => return cmd_unwrap(&cli.keys, config, &container),

        Commands::Inspect { container } => cmd_inspect(&cli.keys, config, &container)?,

        Commands::Shred { subject } => cmd_shred(&cli.keys, &subject)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit status of `unwrap` for a container in `state`.
fn exit_code(state: ContainerState) -> u8 {
    match state {
        ContainerState::Wrapped | ContainerState::Cached => 0,
        ContainerState::Empty => 2,
        ContainerState::Shredded => 3,
        ContainerState::Corrupt => 4,
    }
}

fn load_config(path: Option<&Path>) -> Result<MapperConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            MapperConfig::from_json(&json).context("Invalid mapper configuration")
        }
        None => Ok(MapperConfig::default()),
    }
}

fn open_mapper(keys: &Path, config: MapperConfig) -> Result<CryptoMapper> {
    let repo = LocalKeyRepository::new(keys)
        .with_context(|| format!("Failed to open key directory {}", keys.display()))?;

    Ok(CryptoMapper::builder(Arc::new(repo))
        .metrics(Arc::new(TracingMetrics))
        .config(config)
        .build())
}

fn read_container(path: &Path) -> Result<Container<serde_json::Value>> {
    let json = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read container from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read container {}", path.display()))?
    };

    serde_json::from_str(&json).context("Invalid container")
}

/// Encrypt a value.
fn cmd_wrap(
    keys: &Path,
    config: MapperConfig,
    subject: &str,
    value: &str,
    algorithm: Option<String>,
    key_size: Option<String>,
) -> Result<()> {
    let subject = SubjectId::new(subject).context("Invalid subject")?;
    let value: serde_json::Value = serde_json::from_str(value).context("Value is not valid JSON")?;

    let algorithm = match algorithm {
        Some(name) => name.parse::<CryptoAlgorithm>()?,
        None => config.default_algorithm,
    };
    let key_size = match key_size {
        Some(bits) => bits.parse::<KeySize>()?,
        None => config.default_key_size,
    };

    let mapper = open_mapper(keys, config)?;
    let container = mapper
        .wrap_with(value, &subject, algorithm, key_size)
        .context("Failed to wrap value")?;

    println!("{}", serde_json::to_string_pretty(&container)?);
    Ok(())
}

/// Decrypt a container.
///
/// Only a resolved value reaches stdout, so a stored JSON `null` stays
/// distinguishable from a field that could not be read.
fn cmd_unwrap(keys: &Path, config: MapperConfig, path: &Path) -> Result<ExitCode> {
    let container = read_container(path)?;
    let mapper = open_mapper(keys, config)?;

    let outcome = mapper.resolve_outcome(&container);
    let state = outcome.state();
    match outcome {
        ResolveOutcome::Resolved(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ResolveOutcome::Corrupt(e) => {
            warn!(subject = %container.subject_id(), state = %state, error = %e, "No value to unwrap");
        }
        _ => {
            warn!(subject = %container.subject_id(), state = %state, "No value to unwrap");
        }
    }
    Ok(ExitCode::from(exit_code(state)))
}

/// Show container state.
fn cmd_inspect(keys: &Path, config: MapperConfig, path: &Path) -> Result<()> {
    let container = read_container(path)?;
    let mapper = open_mapper(keys, config)?;

    let outcome = mapper.resolve_outcome(&container);
    println!("Subject:   {}", container.subject_id());
    println!("Algorithm: {}", container.algorithm());
    println!("Key size:  {}", container.key_size());
    println!(
        "Bytes:     {}",
        container.encrypted_bytes().map_or(0, |b| b.len())
    );
    println!("State:     {}", outcome.state());
    if let ResolveOutcome::Corrupt(e) = outcome {
        println!("Error:     {}", e);
    }
    Ok(())
}

/// Erase a subject.
fn cmd_shred(keys: &Path, subject: &str) -> Result<()> {
    let subject = SubjectId::new(subject).context("Invalid subject")?;
    let repo = LocalKeyRepository::new(keys)
        .with_context(|| format!("Failed to open key directory {}", keys.display()))?;

    info!("Shredding subject: {}", subject);
    let removed = repo.shred(&subject).context("Failed to shred subject")?;

    println!("Removed {} key(s) for subject {}", removed, subject);
    Ok(())
}
