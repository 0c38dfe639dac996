//! Configuration for the lvmnps launcher.
//!
//! YAML or TOML switch lists, credential resolution (env + keyring +
//! plaintext), and translation to `lvmnps_core::FleetConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use lvmnps_core::{DEFAULT_OUTLETS, DeviceConfig, FleetConfig, FleetSettings, Scheme};

const KEYRING_SERVICE: &str = "lvmnps";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for switch '{switch}'")]
    NoCredentials { switch: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config structs ──────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Switches in the order they should be registered. Accepts a list
    /// of entries or a mapping keyed by switch name.
    #[serde(default, deserialize_with = "switch_list")]
    pub switches: Vec<SwitchEntry>,
}

/// Timeouts in seconds.
#[derive(Debug, Deserialize, Serialize)]
pub struct Timeouts {
    /// Per-switch connect timeout during startup.
    #[serde(default = "default_switch_connect")]
    pub switch_connect: f64,

    /// Per-switch grace period during shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: f64,

    /// Bound on each outlet or status request.
    #[serde(default = "default_request")]
    pub request: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            switch_connect: default_switch_connect(),
            shutdown_grace: default_shutdown_grace(),
            request: default_request(),
        }
    }
}

fn default_switch_connect() -> f64 {
    10.0
}
fn default_shutdown_grace() -> f64 {
    5.0
}
fn default_request() -> f64 {
    5.0
}

/// One configured switch.
#[derive(Debug, Deserialize, Serialize)]
pub struct SwitchEntry {
    /// Taken from the key when switches are given as a mapping.
    #[serde(default)]
    pub name: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub scheme: Scheme,

    #[serde(default = "default_username")]
    pub username: String,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    #[serde(default = "default_outlets")]
    pub outlets: u32,

    /// Verify HTTPS certificates (switches usually ship self-signed ones).
    #[serde(default)]
    pub verify_tls: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SwitchList {
    List(Vec<SwitchEntry>),
    Map(IndexMap<String, SwitchEntry>),
}

/// `switches` as a list, or as `{name: {host, port, ...}}`. Figment hands
/// mappings over sorted by key, so mapped switches register in name order.
fn switch_list<'de, D>(deserializer: D) -> Result<Vec<SwitchEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match SwitchList::deserialize(deserializer)? {
        SwitchList::List(entries) => entries,
        SwitchList::Map(entries) => entries
            .into_iter()
            .map(|(name, entry)| SwitchEntry { name, ..entry })
            .collect(),
    })
}

fn default_port() -> u16 {
    80
}
fn default_username() -> String {
    "admin".into()
}
fn default_outlets() -> u32 {
    DEFAULT_OUTLETS
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "sdss", "lvmnps").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("lvmnps");
            p.push("lvmnps.yml");
            p
        },
        |dirs| dirs.config_dir().join("lvmnps.yml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (or the default path) plus `LVMNPS_*`
/// environment overrides.
///
/// `.yml`/`.yaml` files are read as YAML, anything else as TOML.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if !path.is_file() {
        return Err(ConfigError::NotFound { path });
    }
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new().merge(Serialized::defaults(Config::default()));
    let figment = if is_yaml(&path) {
        figment.merge(Yaml::file(&path))
    } else {
        figment.merge(Toml::file(&path))
    };
    let figment = figment.merge(Env::prefixed("LVMNPS_").split("__"));

    Ok(figment.extract()?)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a switch password: `password_env`, then the system keyring
/// (`lvmnps` / `{switch}/password`), then the plaintext `password`.
pub fn resolve_password(entry: &SwitchEntry) -> Result<SecretString, ConfigError> {
    // 1. Env var named by the entry
    if let Some(ref env_name) = entry.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(keyring_entry) =
        keyring::Entry::new(KEYRING_SERVICE, &format!("{}/password", entry.name))
    {
        if let Ok(pw) = keyring_entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = entry.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        switch: entry.name.clone(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the core's `FleetConfig`. Duplicate names pass through; the
/// registry rejects them.
pub fn to_fleet_config(config: &Config) -> Result<FleetConfig, ConfigError> {
    let settings = FleetSettings {
        connect_timeout: seconds("timeouts.switch_connect", config.timeouts.switch_connect)?,
        shutdown_grace: seconds("timeouts.shutdown_grace", config.timeouts.shutdown_grace)?,
        request_timeout: seconds("timeouts.request", config.timeouts.request)?,
    };

    let devices = config
        .switches
        .iter()
        .map(to_device_config)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FleetConfig { devices, settings })
}

fn to_device_config(entry: &SwitchEntry) -> Result<DeviceConfig, ConfigError> {
    if entry.name.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "switches[].name".into(),
            reason: "must not be empty".into(),
        });
    }
    if entry.outlets == 0 {
        return Err(ConfigError::Validation {
            field: format!("switches.{}.outlets", entry.name),
            reason: "must be at least 1".into(),
        });
    }

    let password = resolve_password(entry)?;
    let mut device = DeviceConfig::new(&entry.name, &entry.host)
        .with_outlets(entry.outlets)
        .with_credentials(&entry.username, password);
    device.port = entry.port;
    device.scheme = entry.scheme;
    device.verify_tls = entry.verify_tls;

    device.base_url().map_err(|e| ConfigError::Validation {
        field: format!("switches.{}.host", entry.name),
        reason: e.to_string(),
    })?;
    Ok(device)
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("must be positive, got {value}"),
        });
    }
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const YAML: &str = r"
timeouts:
  switch_connect: 2.5
switches:
  - name: nps1
    host: 10.0.0.10
    password: secret
  - name: nps2
    host: 10.0.0.11
    port: 8080
    scheme: https
    username: operator
    password: other
    outlets: 4
";

    #[test]
    fn loads_yaml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.switches.len(), 2);
        assert_eq!(config.switches[0].port, 80);
        assert_eq!(config.switches[0].username, "admin");
        assert_eq!(config.switches[0].outlets, DEFAULT_OUTLETS);
        assert_eq!(config.switches[1].scheme, Scheme::Https);

        let fleet = to_fleet_config(&config).unwrap();
        assert_eq!(fleet.settings.connect_timeout, Duration::from_millis(2500));
        assert_eq!(fleet.settings.shutdown_grace, Duration::from_secs(5));
        let names: Vec<&str> = fleet.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["nps1", "nps2"]);
        assert_eq!(fleet.devices[1].credentials.username, "operator");
        assert_eq!(
            fleet.devices[1].base_url().unwrap().as_str(),
            "https://10.0.0.11:8080/"
        );
    }

    #[test]
    fn loads_switches_keyed_by_name() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(
            br"
switches:
  nps2:
    host: 10.0.0.11
    port: 8080
    password: other
  nps1:
    host: 10.0.0.10
    password: secret
",
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        let fleet = to_fleet_config(&config).unwrap();
        let names: Vec<&str> = fleet.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["nps1", "nps2"]);
        assert_eq!(fleet.devices[0].port, 80);
        assert_eq!(fleet.devices[1].port, 8080);
        assert_eq!(fleet.devices[1].host, "10.0.0.11");
    }

    #[test]
    fn unnamed_list_entry_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(b"switches:\n  - host: 10.0.0.10\n    password: pw\n")
            .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(matches!(
            to_fleet_config(&config),
            Err(ConfigError::Validation { ref field, .. }) if field == "switches[].name"
        ));
    }

    #[test]
    fn loads_toml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[timeouts]
request = 1

[[switches]]
name = "nps1"
host = "10.0.0.10"
password = "secret"
"#,
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.switches[0].name, "nps1");
        assert!((config.timeouts.request - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/lvmnps.yml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("lvmnps.yml", YAML)?;
            jail.set_env("LVMNPS_TIMEOUTS__REQUEST", "0.5");

            let config = load_config(Some(Path::new("lvmnps.yml"))).map_err(|e| e.to_string())?;
            let fleet = to_fleet_config(&config).map_err(|e| e.to_string())?;
            assert_eq!(fleet.settings.request_timeout, Duration::from_millis(500));
            Ok(())
        });
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("NPS1_PASSWORD", "from-env");
            let entry = SwitchEntry {
                name: "nps1".into(),
                host: "10.0.0.10".into(),
                port: 80,
                scheme: Scheme::Http,
                username: "admin".into(),
                password: Some("plaintext".into()),
                password_env: Some("NPS1_PASSWORD".into()),
                outlets: 8,
                verify_tls: false,
            };
            let password = resolve_password(&entry).map_err(|e| e.to_string())?;
            assert_eq!(password.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn duplicate_names_pass_through() {
        let config = Config {
            timeouts: Timeouts::default(),
            switches: ["nps1", "nps1"]
                .into_iter()
                .map(|name| SwitchEntry {
                    name: name.into(),
                    host: "10.0.0.10".into(),
                    port: 80,
                    scheme: Scheme::Http,
                    username: "admin".into(),
                    password: Some("pw".into()),
                    password_env: None,
                    outlets: 8,
                    verify_tls: false,
                })
                .collect(),
        };
        assert_eq!(to_fleet_config(&config).unwrap().devices.len(), 2);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.timeouts.request = 0.0;
        assert!(matches!(
            to_fleet_config(&config),
            Err(ConfigError::Validation { ref field, .. }) if field == "timeouts.request"
        ));

        let config = Config {
            timeouts: Timeouts::default(),
            switches: vec![SwitchEntry {
                name: "nps1".into(),
                host: "10.0.0.10".into(),
                port: 80,
                scheme: Scheme::Http,
                username: "admin".into(),
                password: Some("pw".into()),
                password_env: None,
                outlets: 0,
                verify_tls: false,
            }],
        };
        assert!(matches!(
            to_fleet_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }
}
