use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use minptp::{
    config::{ClientConfig, ClockIdentity, ClockQuality, DelayMechanism, SdoId},
    time::Interval,
    ClientMode,
};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use timestamped_socket::interface::InterfaceName;
use tokio::{fs::read_to_string, io};

/// Log level of the daemon
#[derive(Debug, Default, Copy, Clone, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::metadata::LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Role of the daemon on its interface
#[derive(Debug, Default, Copy, Clone, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PtpMode {
    /// Neither send nor accept anything
    Disabled,
    /// Take part in master selection, and become master when no better
    /// clock is around
    Master,
    /// Always follow the first master heard
    #[default]
    SlaveOnly,
    /// Only measure the link delay to the peer
    Passive,
}

impl From<PtpMode> for ClientMode {
    fn from(mode: PtpMode) -> Self {
        match mode {
            PtpMode::Disabled => ClientMode::Disabled,
            // udp only, so masters announce over ip multicast
            PtpMode::Master => ClientMode::MasterL3,
            PtpMode::SlaveOnly => ClientMode::SlaveOnly,
            PtpMode::Passive => ClientMode::Passive,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub loglevel: LogLevel,
    #[serde(default)]
    pub mode: PtpMode,
    /// Network device to run on
    pub interface: InterfaceName,
    /// Identity of the local clock, random when not given
    #[serde(default, deserialize_with = "deserialize_clock_identity")]
    pub identity: Option<ClockIdentity>,
    #[serde(default)]
    pub domain: u8,
    #[serde(default)]
    pub sdo_id: u16,
    #[serde(default = "default_priority")]
    pub priority1: u8,
    #[serde(default = "default_priority")]
    pub priority2: u8,
    #[serde(default)]
    pub delay_mechanism: DelayMechanismConfig,
    #[serde(default = "default_announce_interval")]
    pub announce_interval: i8,
    #[serde(default)]
    pub sync_interval: i8,
    #[serde(default)]
    pub pdelay_interval: i8,
    #[serde(default = "default_announce_receipt_timeout")]
    pub announce_receipt_timeout: u8,
    /// Seconds without messages from the master before falling back to
    /// listening
    #[serde(default = "default_slave_timeout")]
    pub slave_timeout: u64,
    #[serde(default)]
    pub force_two_step: bool,
    /// TAI - UTC in seconds, used to convert the system clock to PTP time
    #[serde(default = "default_utc_offset")]
    pub utc_offset: i16,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DelayMechanismConfig {
    #[default]
    #[serde(rename = "e2e")]
    E2E,
    #[serde(rename = "p2p")]
    P2P,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Unix socket serving the status of the client as json
    #[serde(default)]
    pub observation_path: Option<PathBuf>,
    #[serde(default = "default_observation_permissions")]
    pub observation_permissions: u32,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            observation_path: None,
            observation_permissions: default_observation_permissions(),
        }
    }
}

fn default_priority() -> u8 {
    128
}

fn default_announce_interval() -> i8 {
    1
}

fn default_announce_receipt_timeout() -> u8 {
    3
}

fn default_slave_timeout() -> u64 {
    5
}

fn default_utc_offset() -> i16 {
    37
}

fn default_observation_permissions() -> u32 {
    0o666
}

fn deserialize_clock_identity<'de, D>(deserializer: D) -> Result<Option<ClockIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    parse_clock_identity(&raw)
        .map(Some)
        .ok_or_else(|| D::Error::custom("expected 8 hex bytes like 00:11:22:ff:fe:33:44:55, or a mac address"))
}

/// Either a full EUI-64 or a mac address, which gets widened to one
fn parse_clock_identity(raw: &str) -> Option<ClockIdentity> {
    let mut bytes = [0; 8];
    let mut count = 0;

    for part in raw.split(':') {
        *bytes.get_mut(count)? = u8::from_str_radix(part, 16).ok()?;
        count += 1;
    }

    match count {
        8 => Some(ClockIdentity(bytes)),
        6 => {
            let mut mac = [0; 6];
            mac.copy_from_slice(&bytes[..6]);
            Some(ClockIdentity::from_mac_address(mac))
        }
        _ => None,
    }
}

impl Config {
    /// Parse config from file
    pub async fn from_file(file: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let meta = std::fs::metadata(&file)?;
        let perm = meta.permissions();

        if perm.mode() as libc::mode_t & libc::S_IWOTH != 0 {
            log::warn!("Unrestricted config file permissions: Others can write.");
        }

        let contents = read_to_string(file).await?;
        let config: Config = toml::de::from_str(&contents)?;
        config.check()?;
        Ok(config)
    }

    /// Check that the config is reasonable
    pub fn check(&self) -> Result<(), ConfigError> {
        if SdoId::new(self.sdo_id).is_none() {
            return Err(ConfigError::Invalid(format!(
                "sdo-id {} is out of range, it must be below 4096",
                self.sdo_id
            )));
        }

        for (name, value) in [
            ("announce-interval", self.announce_interval),
            ("sync-interval", self.sync_interval),
            ("pdelay-interval", self.pdelay_interval),
        ] {
            if !(-7..=4).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} {value} is out of range, use a log2 value between -7 and 4"
                )));
            }
        }

        if self.announce_receipt_timeout < 2 {
            log::warn!("An announce-receipt-timeout below 2 makes master selection unstable.");
        }

        if self.slave_timeout == 0 {
            return Err(ConfigError::Invalid("slave-timeout must be positive".into()));
        }

        Ok(())
    }

    /// Configuration of the client, using `fallback_identity` when none is
    /// configured
    pub fn client_config(&self, fallback_identity: ClockIdentity) -> ClientConfig {
        ClientConfig {
            clock_identity: self.identity.unwrap_or(fallback_identity),
            domain_number: self.domain,
            sdo_id: SdoId::new(self.sdo_id).unwrap_or_default(),
            priority_1: self.priority1,
            priority_2: self.priority2,
            clock_quality: ClockQuality::default(),
            current_utc_offset: self.utc_offset,
            announce_interval: Interval::from_log_2(self.announce_interval),
            sync_interval: Interval::from_log_2(self.sync_interval),
            pdelay_interval: Interval::from_log_2(self.pdelay_interval),
            announce_receipt_timeout: self.announce_receipt_timeout,
            delay_mechanism: match self.delay_mechanism {
                DelayMechanismConfig::E2E => DelayMechanism::E2E,
                DelayMechanismConfig::P2P => DelayMechanism::P2P,
            },
            slave_timeout: Duration::from_secs(self.slave_timeout),
            force_two_step: self.force_two_step,
            ..Default::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error while reading config: {0}")]
    Io(#[from] io::Error),
    #[error("config toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
