//! Layered configuration: defaults, then an optional TOML file, then
//! `DDOS_BLACKLIST_*` environment variables, then command line flags.

use anyhow::Context;
use config::{Config, Environment, File};
use ddos_blacklist_common::{
    Error, Result, DEFAULT_MAP_NAME, DEFAULT_PIN_PATH, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_PROGRAM_NAME,
};
use ddos_blacklist_xdp::XdpMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{PinArgs, RunArgs};

/// Prefix of the environment variables overriding file settings.
const ENV_PREFIX: &str = "DDOS_BLACKLIST";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device: Option<String>,
    pub object: Option<PathBuf>,
    pub program: String,
    pub map: String,
    pub pin_path: PathBuf,
    pub interval_secs: u64,
    pub seeds: Vec<String>,
    pub mode: XdpMode,
    pub clear_screen: bool,
}

/// `DDOS_BLACKLIST_*` variables. `SEEDS` is a comma separated list.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("seeds")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            object: None,
            program: DEFAULT_PROGRAM_NAME.to_string(),
            map: DEFAULT_MAP_NAME.to_string(),
            pin_path: PathBuf::from(DEFAULT_PIN_PATH),
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            seeds: Vec::new(),
            mode: XdpMode::default(),
            clear_screen: true,
        }
    }
}

impl Settings {
    /// Read the optional file at `path` and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(env);

        builder
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .with_context(|| match path {
                Some(path) => format!("cannot load config file {}", path.display()),
                None => "cannot load configuration from environment".to_string(),
            })
            .map_err(|e| Error::Config(format!("{:#}", e)))
    }

    /// Overlay the flags of the `run` command.
    pub fn with_run_args(mut self, args: RunArgs) -> Self {
        if args.dev.is_some() {
            self.device = args.dev;
        }
        if args.object.is_some() {
            self.object = args.object;
        }
        if let Some(program) = args.program {
            self.program = program;
        }
        if let Some(map) = args.map {
            self.map = map;
        }
        if let Some(pin_path) = args.pin_path {
            self.pin_path = pin_path;
        }
        if let Some(interval) = args.interval {
            self.interval_secs = interval;
        }
        if !args.seeds.is_empty() {
            self.seeds = args.seeds;
        }
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        if args.no_clear {
            self.clear_screen = false;
        }
        self
    }

    /// Pin path for the table commands, flag first.
    pub fn pin_path(&self, args: PinArgs) -> PathBuf {
        args.pin_path.unwrap_or_else(|| self.pin_path.clone())
    }

    /// Device name, required before anything touches the kernel.
    pub fn require_device(&self) -> Result<&str> {
        self.device
            .as_deref()
            .ok_or_else(|| Error::Config("required option --dev missing".to_string()))
    }

    pub fn interval(&self) -> Result<Duration> {
        if self.interval_secs == 0 {
            return Err(Error::Config("--interval must be at least 1 second".to_string()));
        }
        Ok(Duration::from_secs(self.interval_secs))
    }

    /// The object to load: configured path or `<argv0>_kern.o`.
    pub fn object_path(&self) -> PathBuf {
        self.object.clone().unwrap_or_else(|| {
            let argv0 = std::env::args().next().unwrap_or_else(|| "ddos-blacklist".to_string());
            PathBuf::from(format!("{}_kern.o", argv0))
        })
    }
}
