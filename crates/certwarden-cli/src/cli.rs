use std::path::{Path, PathBuf};

use certwarden::{
    acme::{LocalStore, Store, needs_renewal},
    config::{AcmeConfig, Config, LogLevel, TlsChallenge},
    domain::prune_static_domains,
    tls,
};
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::{error::CliError, format::FormatType};

const DEFAULT_CONFIG_FILE: &str = "certwarden.toml";

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new certwarden configuration file in the target directory
    Init {
        /// The path to the target directory where the configuration file will be created
        #[arg(required = false)]
        target_dir: Option<PathBuf>,
    },

    /// Validate a configuration file and show what the provider would do with it
    Check {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },

    /// List the certificates in the configured store
    Certs {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,
    },

    /// Print the version of the certwarden CLI
    Version,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "info")]
    /// The log level for the application
    log_level: Option<LogLevel>,

    /// The configuration format
    #[arg(short, long, value_enum, default_value_t = FormatType::Toml)]
    format: FormatType,

    #[clap(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn new() -> Self {
        let cli = Cli::parse();

        // NOTE: this will always override the log level set in the configuration file
        let level = cli
            .log_level
            .unwrap_or(LogLevel::Info)
            .to_log_level_filter();
        env_logger::Builder::new().filter_level(level).init();

        cli
    }

    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Commands::Init { target_dir } => self.init(target_dir.as_deref()),
            Commands::Check { config } => self.check(config),
            Commands::Certs { config } => self.certs(config),
            Commands::Version => {
                println!("certwarden {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }

    fn init(&self, target_dir: Option<&Path>) -> Result<(), CliError> {
        let target = match target_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };

        if !target.is_dir() {
            return Err(CliError::Generic(format!(
                "Target `{}` is not a directory",
                target.display()
            )));
        }

        let format = self.format.format("");
        let path = target.join(format!("certwarden.{}", format.extension()));
        if path.exists() {
            return Err(CliError::Generic(format!(
                "A configuration file already exists at `{}`",
                path.display()
            )));
        }

        let config = Config {
            acme: AcmeConfig {
                tls_challenge: Some(TlsChallenge::default()),
                ..AcmeConfig::default()
            },
            ..Config::default()
        };
        config.write_to_file(&path, format)?;
        println!("Created new config file at `{}`", path.display());

        Ok(())
    }

    fn check(&self, config_path: &str) -> Result<(), CliError> {
        let config = self.load_config(config_path)?;
        config.validate()?;

        let acme = &config.acme;
        println!("CA server: {}", acme.ca_server());
        println!("Storage:   {}", acme.storage);
        println!("Key type:  {}", acme.key_type);
        if let Some(challenge) = acme.challenge() {
            println!("Challenge: {challenge}");
        }

        let domains = prune_static_domains(&acme.domains);
        if domains.is_empty() {
            println!("No static domains configured");
        } else {
            println!("Static domains:");
            for domain in &domains {
                println!("  - {domain}");
            }
        }

        Ok(())
    }

    fn certs(&self, config_path: &str) -> Result<(), CliError> {
        let config = self.load_config(config_path)?;
        let store = LocalStore::new(&config.acme.storage);

        let certificates = store
            .get_certificates()
            .map_err(|e| CliError::Generic(format!("Unable to read the certificate store: {e}")))?;

        if certificates.is_empty() {
            println!("No certificates in `{}`", store.path().display());
            return Ok(());
        }

        let now = Utc::now();
        let renew_before = config.acme.renewal.renew_before();

        for certificate in &certificates {
            let expiry = match tls::certificate_expiry(&certificate.certificate) {
                Ok(expiry) => expiry.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                Err(e) => format!("unreadable ({e})"),
            };
            let due = if needs_renewal(certificate, now, renew_before) {
                "renewal due"
            } else {
                "ok"
            };

            println!("{}\t{expiry}\t{due}", certificate.domain);
        }

        Ok(())
    }

    fn load_config(&self, config_path: &str) -> Result<Config, CliError> {
        log::debug!("Reading configuration from `{config_path}`");

        let input = std::fs::read_to_string(config_path)?;
        let config = self.format.format(&input).parse()?;

        Ok(config)
    }
}
