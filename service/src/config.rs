use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Payload delivered to every subscriber on each broadcast trigger.
pub const DEFAULT_BROADCAST_MESSAGE: &str = "hello :)";

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8000)]
    pub port: u16,

    /// Directory served for every path that is not a streaming endpoint
    #[arg(long, env, default_value = ".")]
    static_dir: PathBuf,

    /// Text fanned out to every subscriber when a broadcast is triggered
    #[arg(long, env, default_value = DEFAULT_BROADCAST_MESSAGE)]
    broadcast_message: String,

    /// Lifetime in seconds of a single `/events` stream
    #[arg(long, env, default_value_t = 10)]
    pub events_timeout_secs: u64,

    /// Seconds each producer sleeps between two messages on an `/events` stream
    #[arg(long, env, default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub events_interval_secs: u64,

    /// Number of producers feeding a single `/events` stream
    #[arg(long, env, default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..))]
    pub events_producers: u16,

    /// Seconds a write or flush to one subscriber may take before it is dropped
    #[arg(long, env, default_value_t = 5)]
    pub write_timeout_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,
}

impl Default for Config {
    /// Built-in defaults only; ignores the process arguments.
    fn default() -> Self {
        Config::parse_from(["sse_push_rs"])
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Address string suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        let interface = self.interface.as_deref().unwrap_or("0.0.0.0");
        format!("{interface}:{}", self.port)
    }

    pub fn static_dir(&self) -> &PathBuf {
        &self.static_dir
    }

    pub fn set_static_dir(mut self, static_dir: PathBuf) -> Self {
        self.static_dir = static_dir;
        self
    }

    pub fn broadcast_message(&self) -> &str {
        &self.broadcast_message
    }

    pub fn events_timeout(&self) -> Duration {
        Duration::from_secs(self.events_timeout_secs)
    }

    pub fn events_interval(&self) -> Duration {
        Duration::from_secs(self.events_interval_secs)
    }

    pub fn events_producers(&self) -> usize {
        usize::from(self.events_producers)
    }

    /// `None` disables the per-subscriber write deadline.
    pub fn write_timeout(&self) -> Option<Duration> {
        match self.write_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }
}
