//! epn: encrypted push notification diagnostics CLI
//!
//! Commands:
//!   key show       - print the device public key (base64 SPKI)
//!   key rotate     - delete + regenerate the key pair
//!   key delete     - delete the key pair
//!   self-test      - RSA round-trip health check
//!   decrypt <file> - run the full pipeline on a notification content JSON
//!   config show    - display the active configuration
//!
//! This is the troubleshooting surface: errors the notification pipeline
//! swallows (fail-open) are surfaced here typed, with context.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use epn_core::config::EpnConfig;
use epn_core::NotificationContent;
use epn_crypto::{self_test, KeyProvider, KeychainKeyProvider};
use epn_pipeline::{process_with_deadline, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "epn",
    version,
    about = "Encrypted push notification diagnostics",
    long_about = "epn: manage the device key pair and troubleshoot envelope decryption"
)]
struct Cli {
    /// Path to epn.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "EPN_CONFIG",
        default_value = "/etc/epn/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EPN_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "EPN_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Device key pair management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Encrypt-then-decrypt a probe message against the stored key pair
    #[command(name = "self-test")]
    SelfTest,

    /// Run the full pipeline on a notification content JSON file ("-" reads stdin)
    ///
    /// The input is the content object the host delivery layer would hand
    /// over: {"title": ..., "body": ..., "user_info": {...}} with the
    /// envelope under user_info.encrypted_data.
    Decrypt {
        /// Input file, or "-" for stdin
        input: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Print the public key for registration with the server-side encryptor
    Show,
    /// Delete and regenerate the key pair, printing the new public key
    ///
    /// Envelopes encrypted against the old key become undecryptable.
    Rotate,
    /// Delete the key pair
    Delete,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "epn starting"
    );

    let config = EpnConfig::load(&cli.config)?;
    let provider = Arc::new(KeychainKeyProvider::new(&config.keystore));

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::Show => {
                println!("{}", provider.public_key()?);
            }
            KeyAction::Rotate => {
                provider.delete_key_pair()?;
                println!("{}", provider.public_key()?);
            }
            KeyAction::Delete => {
                provider.delete_key_pair()?;
                println!("key pair deleted");
            }
        },

        Commands::SelfTest => {
            let ok = self_test(provider.as_ref(), "epn self-test probe")
                .context("self-test could not run")?;
            anyhow::ensure!(ok, "self-test round-trip mismatch");
            println!("self-test ok");
        }

        Commands::Decrypt { input } => {
            let raw = read_input(&input)?;
            let content: NotificationContent =
                serde_json::from_str(&raw).context("parsing notification content JSON")?;

            let pipeline = Arc::new(Pipeline::new(provider, &config.pipeline));
            let budget = Duration::from_millis(config.pipeline.deadline_ms);
            let (content, outcome) = process_with_deadline(pipeline, content, budget, None).await;

            println!("outcome: {outcome:?}");
            println!("{}", serde_json::to_string_pretty(&content)?);
        }

        Commands::Config {
            action: ConfigAction::Show,
        } => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading input {}", path.display()))
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init(),
    }
}
