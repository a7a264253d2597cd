//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;

/// Control API used when none is configured
pub const DEFAULT_API_URL: &str = "https://rc-api-self.vercel.app";

/// rc-controller - drive an RC bot from the terminal by key or by voice
#[derive(Debug, Parser)]
#[command(name = "rc-controller", version, about)]
pub struct Cli {
    /// Base URL of the bot control API
    #[arg(long, env = "RC_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Seconds between remote state polls
    #[arg(long, env = "RC_POLL_INTERVAL_SECS", default_value = "5")]
    pub poll_interval_secs: u64,

    /// Seconds before a control request is abandoned
    #[arg(long, env = "RC_REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Command line of a continuous speech recognizer (one utterance per stdout line)
    #[arg(long, env = "RC_SPEECH_COMMAND")]
    pub speech_command: Option<String>,

    /// Recognition language handed to the recognizer
    #[arg(long, env = "RC_SPEECH_LANG", default_value = "en-US")]
    pub speech_language: String,

    /// Ring the terminal bell on every dispatch
    #[arg(long, env = "RC_HAPTICS")]
    pub haptics: bool,

    /// Directory for preferences, the panel socket and the log file
    #[arg(long, env = "RC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Do not open the control panel socket
    #[arg(long, env = "RC_NO_PANEL")]
    pub no_panel: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the control API
    pub api_url: Url,

    pub poll_interval: Duration,

    pub request_timeout: Duration,

    /// Recognizer command line, if speech input is configured
    pub speech_command: Option<String>,

    pub speech_language: String,

    pub haptics: bool,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Whether the control panel socket is served
    pub panel: bool,

    pub verbose: u8,
}

impl Config {
    /// Validate parsed arguments and fill in derived defaults
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let api_url = Url::parse(&cli.api_url)
            .with_context(|| format!("invalid API URL {:?}", cli.api_url))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            bail!("API URL must use http or https, got {:?}", api_url.scheme());
        }

        if cli.poll_interval_secs == 0 {
            bail!("poll interval must be at least one second");
        }
        if cli.request_timeout_secs == 0 {
            bail!("request timeout must be at least one second");
        }

        let data_dir = match cli.data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };

        Ok(Self {
            api_url,
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            speech_command: cli.speech_command.filter(|c| !c.trim().is_empty()),
            speech_language: cli.speech_language,
            haptics: cli.haptics,
            data_dir,
            panel: !cli.no_panel,
            verbose: cli.verbose,
        })
    }

    /// Preference store file
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    /// Unix domain socket for control panels
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join("panel.sock")
    }

    /// Log file used while the status line owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("rc-controller.log")
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set; pass --data-dir")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("rc-controller"))
}
