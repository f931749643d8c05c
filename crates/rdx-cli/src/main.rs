//! rdx: offline redaction CLI
//!
//! Commands:
//!   scan <file>                                  - detect sensitive fields
//!   redact <file> [--fields f.json] [--out p]    - write redacted artifact + sidecar
//!   restore <artifact> [--out p]                 - put the original values back
//!   config show                                  - display current configuration
//!
//! The passkey comes from `--passkey` / `RDX_PASSKEY`, or an interactive prompt.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rdx_core::config::RdxConfig;
use rdx_core::types::{FieldView, SensitiveField};
use rdx_crypto::{KdfLimits, KdfParams};
use rdx_engine::extract::FieldExtractor;
use rdx_engine::sidecar::{commit_artifact, open_artifact, write_atomic};
use rdx_engine::{
    backend_for_media_type, media_type_for_filename, redact_bytes, restore_bytes, PasskeyPolicy,
    PatternExtractor,
};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rdx",
    version,
    about = "Reversible document redaction",
    long_about = "rdx: replace sensitive values in PDF and text documents with encrypted placeholders, and restore them with a passkey"
)]
struct Cli {
    /// Path to the rdx configuration file
    #[arg(long, short = 'c', env = "RDX_CONFIG", default_value = "/etc/rdx/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect sensitive fields and print them as JSON
    Scan {
        /// Document to scan (.pdf or .txt)
        file: PathBuf,
        /// Include the detected values (needed to hand-edit a --fields file)
        #[arg(long)]
        with_values: bool,
    },

    /// Redact a document; writes the artifact and its metadata sidecar
    Redact {
        /// Document to redact (.pdf or .txt)
        file: PathBuf,
        /// JSON list of fields to redact (default: run the built-in scanner)
        #[arg(long)]
        fields: Option<PathBuf>,
        /// Artifact path (default: redacted_<name> next to the input)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        #[arg(long, env = "RDX_PASSKEY", hide_env_values = true)]
        passkey: Option<String>,
    },

    /// Restore a redacted artifact using its sidecar
    Restore {
        /// Redacted artifact; its sidecar must sit next to it
        artifact: PathBuf,
        /// Output path (default: restored_<name> next to the artifact)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        #[arg(long, env = "RDX_PASSKEY", hide_env_values = true)]
        passkey: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();
    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Scan { file, with_values } => cmd_scan(&config, &file, with_values).await,
        Commands::Redact {
            file,
            fields,
            out,
            passkey,
        } => {
            let passkey = obtain_passkey(passkey, true)?;
            cmd_redact(&config, &file, fields.as_deref(), out.as_deref(), &passkey).await
        }
        Commands::Restore {
            artifact,
            out,
            passkey,
        } => {
            let passkey = obtain_passkey(passkey, false)?;
            cmd_restore(&config, &artifact, out.as_deref(), &passkey).await
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<RdxConfig> {
    if path.exists() {
        debug!(path = %path.display(), "loading config");
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        debug!(path = %path.display(), "no config file; using defaults");
        Ok(RdxConfig::default())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn obtain_passkey(flag: Option<String>, confirm: bool) -> Result<SecretString> {
    if let Some(passkey) = flag {
        return Ok(SecretString::from(passkey));
    }
    let first = rpassword::prompt_password("Passkey: ").context("reading passkey")?;
    if confirm {
        let second = rpassword::prompt_password("Confirm passkey: ").context("reading passkey")?;
        if first != second {
            anyhow::bail!("passkeys do not match");
        }
    }
    Ok(SecretString::from(first))
}

async fn read_document(path: &Path) -> Result<(Vec<u8>, &'static str)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let media_type = media_type_for_filename(&name)
        .with_context(|| format!("unsupported file type: {} (expected .pdf or .txt)", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok((bytes, media_type))
}

fn scan_fields(config: &RdxConfig, bytes: &[u8], media_type: &str) -> Result<Vec<SensitiveField>> {
    let backend = backend_for_media_type(media_type)?;
    let doc = backend.open(bytes)?;
    let extractor = PatternExtractor::new(config.extraction.min_confidence)?;
    Ok(extractor.extract(&doc.segments())?)
}

/// `<dir>/<prefix>_<name>`, dropping a leading `redacted_` from the name.
fn default_output(input: &Path, prefix: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.strip_prefix("redacted_").unwrap_or(&name);
    input.with_file_name(format!("{prefix}_{base}"))
}

// ── `rdx scan` ────────────────────────────────────────────────────────────────

async fn cmd_scan(config: &RdxConfig, file: &Path, with_values: bool) -> Result<()> {
    let (bytes, media_type) = read_document(file).await?;
    let fields = scan_fields(config, &bytes, media_type)?;

    let rendered = if with_values {
        serde_json::to_string_pretty(&fields)?
    } else {
        let views: Vec<FieldView> = fields.iter().map(FieldView::from).collect();
        serde_json::to_string_pretty(&views)?
    };
    println!("{rendered}");
    eprintln!("{} field(s) detected in {}", fields.len(), file.display());
    Ok(())
}

// ── `rdx redact` ──────────────────────────────────────────────────────────────

async fn cmd_redact(
    config: &RdxConfig,
    file: &Path,
    fields_path: Option<&Path>,
    out: Option<&Path>,
    passkey: &SecretString,
) -> Result<()> {
    PasskeyPolicy::new(config.policy.min_passkey_len).check(passkey)?;

    let (source, media_type) = read_document(file).await?;
    let fields: Vec<SensitiveField> = match fields_path {
        Some(path) => {
            let raw = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading fields file {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("parsing fields file {}", path.display()))?
        }
        None => scan_fields(config, &source, media_type)?,
    };
    if fields.is_empty() {
        anyhow::bail!("no sensitive fields in {}; nothing to redact", file.display());
    }

    let backend = backend_for_media_type(media_type)?;
    let output = redact_bytes(
        backend.as_ref(),
        &source,
        &fields,
        passkey,
        &KdfParams::from(&config.kdf),
    )?;

    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(file, "redacted"));
    let report = output.report;
    let sidecar = commit_artifact(&out_path, &output.artifact, output.metadata).await?;

    println!(
        "Redacted {} field(s), {} replacement(s)",
        fields.len(),
        report.total()
    );
    println!("  artifact: {}", out_path.display());
    println!("  sidecar:  {}", sidecar.display());
    for id in &report.unmatched {
        warn!(placeholder = %id, "no occurrence in the document; value left as is");
    }
    Ok(())
}

// ── `rdx restore` ─────────────────────────────────────────────────────────────

async fn cmd_restore(
    config: &RdxConfig,
    artifact_path: &Path,
    out: Option<&Path>,
    passkey: &SecretString,
) -> Result<()> {
    let name = artifact_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let media_type = media_type_for_filename(&name)
        .with_context(|| format!("unsupported file type: {}", artifact_path.display()))?;

    let (artifact, metadata) = open_artifact(artifact_path).await?;
    let backend = backend_for_media_type(media_type)?;
    let (restored, report) = restore_bytes(
        backend.as_ref(),
        &artifact,
        &metadata,
        passkey,
        &KdfLimits::from(&config.kdf),
    )?;

    let out_path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(artifact_path, "restored"));
    write_atomic(&out_path, &restored).await?;

    println!(
        "Restored {} field(s), {} replacement(s) → {}",
        metadata.len(),
        report.total(),
        out_path.display()
    );
    Ok(())
}

// ── `rdx config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &RdxConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
