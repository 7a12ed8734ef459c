//! lockbox: LEA file-protection toolkit CLI
//!
//! Commands:
//!   encrypt / decrypt   - single-file container operations
//!   scan                - encrypt or decrypt every file in a directory
//!   hash                - SHA-256 of a file
//!   keygen              - generate a raw key file
//!   watch               - auto-encrypt new files in a directory
//!   serve               - receive verified files over TCP
//!   send                - send a file to a lockbox server
//!
//! Exit codes: 0 success, 1 user error, 2 crypto or I/O failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lockbox_core::config::LockboxConfig;
use lockbox_core::{Algorithm, FileProcessor, SharedSink, TracingSink};
use lockbox_crypto::{generate_key, sha256, OsRandom};
use lockbox_fsw::DirWatcher;
use lockbox_net::{ProgressFn, TransferClient, TransferServer};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "lockbox",
    version,
    about = "LEA file-protection toolkit",
    long_about = "lockbox: encrypt files into self-describing containers, watch \
directories, and transfer files with integrity verification"
)]
struct Cli {
    /// Path to lockbox.toml configuration file
    #[arg(long, short = 'c', env = "LOCKBOX_CONFIG", default_value = "lockbox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into a container
    Encrypt {
        input: PathBuf,
        /// Output path (default: <input>.enc)
        output: Option<PathBuf>,
        /// Algorithm: LEA or LEA-PCBC (default from config)
        #[arg(long, short = 'a')]
        algorithm: Option<String>,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Decrypt a container back into the original file
    Decrypt {
        input: PathBuf,
        /// Output path (default: <input> without .enc)
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Encrypt or decrypt every regular file at the top level of a directory
    Scan {
        dir: PathBuf,
        output_dir: PathBuf,
        /// "encrypt" or "decrypt"
        #[arg(long, default_value = "encrypt")]
        action: String,
        #[arg(long, short = 'a')]
        algorithm: Option<String>,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Print the SHA-256 digest of a file
    Hash { file: PathBuf },

    /// Generate a random key file (written with owner-only permissions)
    Keygen {
        /// Key size in bits: 128, 192, or 256
        #[arg(long, default_value_t = 256)]
        bits: usize,
        /// Where to write the raw key
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Watch a directory and auto-encrypt each new file once
    Watch {
        /// Directory to observe (default from config)
        dir: Option<PathBuf>,
        /// Where .enc outputs go (default from config)
        output_dir: Option<PathBuf>,
        /// Encrypt files already present before watching
        #[arg(long)]
        encrypt_existing: bool,
        #[arg(long, short = 'a')]
        algorithm: Option<String>,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Run the transfer server and receive verified files
    Serve {
        /// Listen address (default from config)
        #[arg(long)]
        listen: Option<String>,
        /// Where received files are written (default from config)
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Send a file to a lockbox server
    Send {
        /// Server address, e.g. 192.168.1.10:9040
        addr: String,
        file: PathBuf,
        #[arg(long, short = 'a')]
        algorithm: Option<String>,
        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Raw key file (16, 24, or 32 bytes)
    #[arg(long, short = 'k', env = "LOCKBOX_KEY_FILE")]
    key_file: Option<PathBuf>,
    /// Key as a hex string (32, 48, or 64 hex digits)
    #[arg(long, conflicts_with = "key_file")]
    key_hex: Option<String>,
}

/// Marker for mistakes the user can fix (exit code 1, not 2).
#[derive(Debug)]
struct UserError(String);

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UserError {}

fn user_error(message: impl Into<String>) -> anyhow::Error {
    anyhow!(UserError(message.into()))
}

// ── Entry point ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match LockboxConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    init_tracing(&config);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if e.is::<UserError>() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn init_tracing(config: &LockboxConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, config: LockboxConfig) -> Result<()> {
    let sink: SharedSink = Arc::new(TracingSink);

    match cli.command {
        Commands::Encrypt { input, output, algorithm, key } => {
            let key = load_key(&key, &config)?;
            let algorithm = pick_algorithm(algorithm.as_deref(), &config)?;
            let output = output.unwrap_or_else(|| with_enc_suffix(&input));
            let processor = FileProcessor::new(sink);
            let metadata = processor.encrypt_file(&input, &output, algorithm, &key)?;
            println!(
                "encrypted {} -> {} ({}, sha256 {})",
                input.display(),
                output.display(),
                algorithm,
                metadata.hash.as_deref().unwrap_or("-"),
            );
        }

        Commands::Decrypt { input, output, key } => {
            let key = load_key(&key, &config)?;
            let output = output.unwrap_or_else(|| without_enc_suffix(&input));
            let processor = FileProcessor::new(sink);
            let metadata = processor.decrypt_file(&input, &output, &key)?;
            println!(
                "decrypted {} -> {} (origin: {})",
                input.display(),
                output.display(),
                metadata.filename,
            );
        }

        Commands::Scan { dir, output_dir, action, algorithm, key } => {
            let key = load_key(&key, &config)?;
            let algorithm = pick_algorithm(algorithm.as_deref(), &config)?;
            let action = match action.as_str() {
                "encrypt" => lockbox_core::DirAction::Encrypt,
                "decrypt" => lockbox_core::DirAction::Decrypt,
                other => return Err(user_error(format!("unknown action: {other}"))),
            };
            let processor = FileProcessor::new(sink);
            let processed = processor
                .process_directory(&dir, &output_dir, algorithm, &key, action)
                .map_err(|e| {
                    anyhow!(e).context(format!("directory scan of {} stopped", dir.display()))
                })?;
            println!("processed {} file(s) from {}", processed.len(), dir.display());
        }

        Commands::Hash { file } => {
            let digest = sha256::hash_file(&file)
                .with_context(|| format!("hashing {}", file.display()))?;
            println!("{}  {}", hex::encode(digest), file.display());
        }

        Commands::Keygen { bits, output } => {
            let key = generate_key(bits, &OsRandom)
                .map_err(|e| user_error(e.to_string()))?;
            write_key_file(&output, &key)?;
            println!("wrote {}-bit key to {}", bits, output.display());
        }

        Commands::Watch { dir, output_dir, encrypt_existing, algorithm, key } => {
            let key = load_key(&key, &config)?;
            let algorithm = pick_algorithm(algorithm.as_deref(), &config)?;
            let mut watcher_config = config.watcher.clone();
            if let Some(dir) = dir {
                watcher_config.watch_dir = dir;
            }
            if let Some(out) = output_dir {
                watcher_config.output_dir = out;
            }

            let (watcher, mut events) =
                DirWatcher::new(&watcher_config, algorithm, key, sink)?;

            if encrypt_existing {
                let processed = watcher
                    .encrypt_existing()
                    .map_err(|e| anyhow!(e).context("encrypting existing files"))?;
                println!("encrypted {} existing file(s)", processed.len());
            }

            watcher.start()?;
            println!(
                "watching {} -> {} (ctrl-c to stop)",
                watcher.watch_dir().display(),
                watcher.output_dir().display(),
            );

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            let marker = if event.success { "ok" } else { "!!" };
                            println!(
                                "[{}] {} {} - {}",
                                event.timestamp.format("%H:%M:%S"),
                                marker,
                                event.path.display(),
                                event.message,
                            );
                        }
                        None => break,
                    }
                }
            }
            watcher.stop().await;
        }

        Commands::Serve { listen, output_dir, key } => {
            let key = load_key(&key, &config)?;
            let listen = listen.unwrap_or_else(|| config.transfer.listen.clone());
            let output_dir =
                output_dir.unwrap_or_else(|| config.transfer.output_dir.clone());

            let server = TransferServer::new(
                output_dir.clone(),
                key,
                Duration::from_millis(config.transfer.shutdown_grace_ms),
                sink,
            );
            let addr = server.start(&listen).await?;
            println!(
                "serving on {} -> {} (ctrl-c to stop)",
                addr,
                output_dir.display(),
            );

            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            server.stop().await;
            info!("server stopped");
        }

        Commands::Send { addr, file, algorithm, key } => {
            let key = load_key(&key, &config)?;
            let algorithm = pick_algorithm(algorithm.as_deref(), &config)?;

            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let bar_for_callback = bar.clone();
            let progress: ProgressFn = Box::new(move |sent, total, message| {
                bar_for_callback.set_length(total);
                bar_for_callback.set_position(sent);
                bar_for_callback.set_message(message.to_string());
            });

            let client = TransferClient::new(
                addr.clone(),
                Duration::from_secs(config.transfer.connect_timeout_secs),
                config.transfer.chunk_size,
                sink,
            );
            let result = client
                .send_file(&file, algorithm, &key, Some(&progress))
                .await;
            bar.finish_and_clear();
            result.with_context(|| format!("sending {} to {addr}", file.display()))?;
            println!("{} sent and verified by {addr}", file.display());
        }
    }

    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────────────────

fn pick_algorithm(flag: Option<&str>, config: &LockboxConfig) -> Result<Algorithm> {
    let name = flag.unwrap_or(&config.crypto.algorithm);
    Algorithm::from_str(name).map_err(|e| user_error(e.to_string()))
}

fn load_key(args: &KeyArgs, config: &LockboxConfig) -> Result<Vec<u8>> {
    let key = if let Some(hex_str) = &args.key_hex {
        hex::decode(hex_str.trim()).map_err(|_| user_error("--key-hex is not valid hex"))?
    } else {
        let path = args
            .key_file
            .clone()
            .or_else(|| config.crypto.key_file.clone())
            .ok_or_else(|| {
                user_error("no key given: pass --key-file/--key-hex or set crypto.key_file")
            })?;
        std::fs::read(&path)
            .with_context(|| format!("reading key file {}", path.display()))?
    };

    if !matches!(key.len(), 16 | 24 | 32) {
        return Err(user_error(format!(
            "key must be 16, 24, or 32 bytes, got {}",
            key.len()
        )));
    }
    Ok(key)
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("creating key file {}", path.display()))?;
    file.write_all(key)
        .with_context(|| format!("writing key file {}", path.display()))?;
    Ok(())
}

fn with_enc_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".enc");
    PathBuf::from(name)
}

fn without_enc_suffix(path: &Path) -> PathBuf {
    match path.to_string_lossy().strip_suffix(".enc") {
        Some(stripped) => PathBuf::from(stripped),
        None => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".dec");
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enc_suffix_roundtrip() {
        assert_eq!(with_enc_suffix(Path::new("a/b.txt")), PathBuf::from("a/b.txt.enc"));
        assert_eq!(without_enc_suffix(Path::new("a/b.txt.enc")), PathBuf::from("a/b.txt"));
        assert_eq!(without_enc_suffix(Path::new("a/raw")), PathBuf::from("a/raw.dec"));
    }

    #[test]
    fn key_loading_validates_length() {
        let dir = tempfile::tempdir().unwrap();
        let config = LockboxConfig::default();

        let good = dir.path().join("good.key");
        std::fs::write(&good, [0u8; 32]).unwrap();
        let args = KeyArgs { key_file: Some(good), key_hex: None };
        assert_eq!(load_key(&args, &config).unwrap().len(), 32);

        let bad = dir.path().join("bad.key");
        std::fs::write(&bad, [0u8; 10]).unwrap();
        let args = KeyArgs { key_file: Some(bad), key_hex: None };
        let err = load_key(&args, &config).unwrap_err();
        assert!(err.is::<UserError>());
    }

    #[test]
    fn key_hex_parsing() {
        let config = LockboxConfig::default();
        let args = KeyArgs {
            key_file: None,
            key_hex: Some("00112233445566778899aabbccddeeff".into()),
        };
        let key = load_key(&args, &config).unwrap();
        assert_eq!(key.len(), 16);
        assert_eq!(key[1], 0x11);

        let args = KeyArgs { key_file: None, key_hex: Some("zz".into()) };
        assert!(load_key(&args, &config).unwrap_err().is::<UserError>());
    }

    #[test]
    fn cli_parses_all_subcommands() {
        for argv in [
            vec!["lockbox", "encrypt", "in.txt", "--key-hex", "00112233445566778899aabbccddeeff"],
            vec!["lockbox", "decrypt", "in.txt.enc", "-k", "key.bin"],
            vec!["lockbox", "scan", "src", "dst", "--action", "decrypt", "-k", "key.bin"],
            vec!["lockbox", "hash", "file.bin"],
            vec!["lockbox", "keygen", "--bits", "128", "-o", "key.bin"],
            vec!["lockbox", "watch", "inbox", "outbox", "--encrypt-existing", "-k", "key.bin"],
            vec!["lockbox", "serve", "--listen", "127.0.0.1:0", "-k", "key.bin"],
            vec!["lockbox", "send", "127.0.0.1:9040", "file.bin", "-k", "key.bin"],
        ] {
            Cli::try_parse_from(argv.iter().copied()).unwrap_or_else(|e| panic!("{argv:?}: {e}"));
        }
    }

    #[test]
    fn keygen_rejects_reuse_of_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.bin");
        std::fs::write(&path, b"existing").unwrap();
        assert!(write_key_file(&path, &[0u8; 16]).is_err());
    }
}
