//! Provides a means to read, parse and hold configuration options for scans.
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default port used by records that do not name one.
pub const DEFAULT_PORT: u16 = 80;
/// Default connect timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 2;
/// Default number of connect attempts allowed in flight.
pub const DEFAULT_CEILING: usize = 5;

/// An inclusive span of ports with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Builds a range, or `None` when the bounds are reversed.
    pub fn new(start: u16, end: u16) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub const fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + Clone {
        self.start..=self.end
    }
}

/// Settings that directives in a target file can change while it is read.
///
/// A directive only affects records that come after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningConfig {
    pub default_port: u16,
    pub timeout_secs: u64,
    /// Upper bound on the size of the endpoint set. `None` means unbounded,
    /// in which case a huge range can exhaust memory.
    pub max_endpoints: Option<usize>,
}

impl Default for RunningConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_endpoints: None,
        }
    }
}

/// Represents the order in which endpoints are handed to the scanner.
///   - Serial dispatches in ascending address then port order.
///   - Random shuffles the endpoints before dispatch.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Serial,
    Random,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "reachscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Batch TCP reachability checker.
/// Reads address and port ranges from a target file and reports which
/// endpoints accept a TCP connection.
pub struct Opts {
    /// Target file to read. Use '-' to read from stdin.
    pub targets: PathBuf,

    /// Port used by records that do not name one, until a 'port:' directive changes it.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds to wait for each connection, until a 'timeout:' directive changes it.
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// How many connections may be attempted at the same time.
    /// Values of 0 are corrected to 1.
    #[arg(short, long, default_value_t = DEFAULT_CEILING)]
    pub batch_size: usize,

    /// The order of scanning to be performed. The "serial" option will
    /// scan endpoints in ascending order while the "random" option will
    /// shuffle them.
    #[arg(long, value_enum, ignore_case = true, default_value = "serial")]
    pub scan_order: ScanOrder,

    /// Refuse target files that expand to more than this many endpoints.
    #[arg(long)]
    pub max_endpoints: Option<usize>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output the result lines.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Self::parse()
    }

    /// Merge values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(port, batch_size, scan_order, greppable, accessible);

        // a zero timeout in the file would be rejected on the command line
        if let Some(timeout) = config.timeout.filter(|t| *t >= 1) {
            self.timeout = timeout;
        }
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(max_endpoints, ulimit);
    }

    /// The configuration a target file starts from.
    pub const fn running_config(&self) -> RunningConfig {
        RunningConfig {
            default_port: self.port,
            timeout_secs: self.timeout,
            max_endpoints: self.max_endpoints,
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            targets: PathBuf::from("-"),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT_SECS,
            batch_size: DEFAULT_CEILING,
            scan_order: ScanOrder::Serial,
            max_endpoints: None,
            ulimit: None,
            no_config: true,
            config_path: None,
            greppable: true,
            accessible: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    port: Option<u16>,
    timeout: Option<u64>,
    batch_size: Option<usize>,
    scan_order: Option<ScanOrder>,
    max_endpoints: Option<usize>,
    ulimit: Option<u64>,
    greppable: Option<bool>,
    accessible: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// port = 443
    /// timeout = 3
    /// batch_size = 20
    /// scan_order = "Random"
    /// max_endpoints = 100000
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".reachscan.toml");
    Some(config_path)
}
