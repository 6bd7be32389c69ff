use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use trueshot_engine::adapters::record::{embed_record, read_record, write_record};
use trueshot_engine::crypto::signer::{generate_keypair, KeySource, VerifyingKey};
use trueshot_engine::crypto::timestamper::Timestamper;
use trueshot_engine::domain::error::EngineError;
use trueshot_engine::domain::session::{ProgressEvent, ProgressListener};
use trueshot_engine::domain::types::{CaptureConfig, MediaKind, SigAlg, VerifyConfig};
use trueshot_engine::domain::verify::VerdictStatus;
use trueshot_engine::orchestrator::{AssetSource, FileSource};
use trueshot_engine::{CaptureSession, VerifySession};

const EXIT_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "trueshot")]
#[command(about = "Sign media at capture time and verify it later")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a signing keypair (private.pem, public.pem)
    Keygen {
        /// Directory to write the keys into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, value_enum, default_value_t = AlgArg::Ed25519)]
        alg: AlgArg,
    },
    /// Canonicalize, fingerprint and sign a media file
    Sign {
        /// Path to the media file
        media: PathBuf,

        /// Signing key URI: local:/path/to/private.pem or env:VAR
        #[arg(long)]
        key: String,

        /// Where to write the signature record (default: <media>.trueshot.json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also write a copy of the media (PNG or JPEG) with the record embedded
        #[arg(long)]
        embed: Option<PathBuf>,

        /// Media kind; sniffed from the content when omitted
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// Timestamp source: system or fixed:<RFC3339>
        #[arg(long, default_value = "system")]
        timestamp: String,

        #[arg(long, value_enum, default_value_t = AlgArg::Ed25519)]
        alg: AlgArg,
    },
    /// Verify a media file against its signature record
    /// (exit status 0 authentic, 1 tampered, 2 invalid)
    Verify {
        /// Path to the media file
        media: PathBuf,

        /// Path to the signature record JSON. When omitted, the record
        /// embedded in the media is used, then <media>.trueshot.json
        record: Option<PathBuf>,

        /// Signer's public key (PEM)
        #[arg(long)]
        pubkey: PathBuf,

        /// Output result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode and print a signature record without verifying it
    Inspect {
        /// Path to the signature record JSON
        record: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgArg {
    Ed25519,
    Es256,
}

impl From<AlgArg> for SigAlg {
    fn from(v: AlgArg) -> Self {
        match v {
            AlgArg::Ed25519 => SigAlg::Ed25519,
            AlgArg::Es256 => SigAlg::Es256,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Image,
    Video,
}

impl From<KindArg> for MediaKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Image => MediaKind::Image,
            KindArg::Video => MediaKind::Video,
        }
    }
}

/// Prints stage progress to stderr.
struct StderrProgress;

impl ProgressListener for StderrProgress {
    fn on_progress(&self, event: ProgressEvent) {
        eprintln!("[{:?}] {}. {}", event.status, event.stage_index + 1, event.stage_label);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Keygen { out_dir, alg } => keygen_command(&out_dir, alg.into()),
        Commands::Sign {
            media,
            key,
            out,
            embed,
            kind,
            timestamp,
            alg,
        } => sign_command(&media, &key, out, embed, kind.map(Into::into), &timestamp, alg.into()).await,
        Commands::Verify {
            media,
            record,
            pubkey,
            json,
        } => verify_command(&media, record, &pubkey, json).await,
        Commands::Inspect { record } => inspect_command(&record),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[FAILED] {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn keygen_command(out_dir: &Path, alg: SigAlg) -> Result<ExitCode> {
    let (private, public) = generate_keypair(alg).context("Failed to generate keypair")?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let private_path = out_dir.join("private.pem");
    let public_path = out_dir.join("public.pem");
    write_private(&private_path, private.as_bytes())?;
    std::fs::write(&public_path, public)
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

    println!("[OK] {} keypair generated", alg);
    println!("  Private key: {}", private_path.display());
    println!("  Public key:  {}", public_path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(pem)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    std::fs::write(path, pem).with_context(|| format!("Failed to write {}", path.display()))
}

async fn sign_command(
    media: &Path,
    key: &str,
    out: Option<PathBuf>,
    embed: Option<PathBuf>,
    kind: Option<MediaKind>,
    timestamp: &str,
    alg: SigAlg,
) -> Result<ExitCode> {
    let key: KeySource = key.parse().context("Invalid --key")?;
    let timestamper: Timestamper = timestamp.parse().context("Invalid --timestamp")?;

    let mut cfg = CaptureConfig::secure_default(key);
    cfg.signing_alg = alg;
    cfg.timestamper = timestamper;

    let mut source = AssetSource::path(media).with_limits(cfg.limits);
    if let Some(kind) = kind {
        source = source.with_kind(kind);
    }

    let session = CaptureSession::new(cfg).with_listener(Arc::new(StderrProgress));
    cancel_on_ctrl_c(session.cancellation_token());

    let record = match session.run(Arc::new(source)).await {
        Ok(r) => r,
        Err(EngineError::KeyUnavailable(msg)) => {
            return Err(anyhow!("Signing key unavailable: {msg}"));
        }
        Err(EngineError::UnsupportedFormat(msg)) => {
            return Err(anyhow!("Unsupported file {}: {msg}", media.display()));
        }
        Err(e) => return Err(e).context("Signing failed"),
    };

    let out = out.unwrap_or_else(|| default_record_path(media));
    write_record(&out, &record).with_context(|| format!("Failed to write {}", out.display()))?;

    if let Some(embed) = &embed {
        let original = std::fs::read(media).with_context(|| format!("Failed to read {}", media.display()))?;
        let carrier = embed_record(&original, &record).context("Failed to embed signature record")?;
        std::fs::write(embed, carrier).with_context(|| format!("Failed to write {}", embed.display()))?;
    }

    println!("[OK] {} signed", media.display());
    println!("  Digest:    {}", record.digest);
    println!("  Timestamp: {}", record.timestamp_string());
    println!("  Format:    {}", record.metadata.format);
    println!("  Record:    {}", out.display());
    if let Some(embed) = &embed {
        println!("  Embedded:  {}", embed.display());
    }
    Ok(ExitCode::SUCCESS)
}

async fn verify_command(media: &Path, record: Option<PathBuf>, pubkey: &Path, json: bool) -> Result<ExitCode> {
    let key = VerifyingKey::from_path(pubkey)
        .with_context(|| format!("Failed to load public key {}", pubkey.display()))?;
    let cfg = VerifyConfig::secure_default(key);
    let limits = cfg.limits;

    let session = VerifySession::new(cfg).with_listener(Arc::new(StderrProgress));
    cancel_on_ctrl_c(session.cancellation_token());

    let media_source = Arc::new(AssetSource::path(media).with_limits(limits));
    let verdict = match record {
        Some(record) => session.run(media_source, Arc::new(AssetSource::record(record))).await,
        None => {
            let sidecar = default_record_path(media);
            let sidecar = sidecar
                .exists()
                .then(|| Arc::new(AssetSource::record(sidecar)) as Arc<dyn FileSource>);
            session.run_embedded(media_source, sidecar).await
        }
    }
    .context("Verification failed")?;

    if json {
        let out = serde_json::to_string_pretty(&verdict).context("Failed to serialize result")?;
        println!("{}", out);
    } else {
        let tag = if verdict.is_authentic() { "[OK]" } else { "[FAILED]" };
        println!("{tag} {:?}: {}", verdict.status, verdict.details());
        let show = |d: &Option<trueshot_engine::Digest>| d.map(|d| d.to_hex()).unwrap_or_default();
        println!("  Original digest: {}", show(&verdict.original_digest));
        println!("  Current digest:  {}", show(&verdict.current_digest));
        if let Some(ts) = verdict.timestamp {
            println!("  Signed at:       {}", ts);
        }
    }

    Ok(ExitCode::from(match verdict.status {
        VerdictStatus::Authentic => 0,
        VerdictStatus::Tampered => 1,
        VerdictStatus::Invalid => 2,
    }))
}

fn inspect_command(path: &Path) -> Result<ExitCode> {
    let record = read_record(path).with_context(|| format!("Failed to read {}", path.display()))?;
    println!("[OK] Signature record parsed");
    println!("  Version:   {}", record.version);
    println!("  Media:     {}", record.media_kind);
    println!("  Hash:      {}:{}", record.digest_alg.as_str(), record.digest);
    println!("  Algorithm: {}", record.signature_alg);
    println!("  Timestamp: {}", record.timestamp_string());
    println!("  Tool:      {}", record.metadata.tool);
    println!("  Format:    {}", record.metadata.format);
    Ok(ExitCode::SUCCESS)
}

fn default_record_path(media: &Path) -> PathBuf {
    let mut name = media.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".trueshot.json");
    media.with_file_name(name)
}

fn cancel_on_ctrl_c(token: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Ctrl+C, cancelling…");
            token.cancel();
        }
    });
}
