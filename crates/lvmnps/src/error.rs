//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use lvmnps_config::ConfigError;
use lvmnps_core::{CoreError, DriverError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to switch '{device}'")]
    #[diagnostic(
        code(lvmnps::connection_failed),
        help(
            "Check that the switch is powered and reachable, and that host,\n\
             port and scheme in the configuration are correct."
        )
    )]
    ConnectionFailed {
        device: String,
        #[source]
        source: DriverError,
    },

    #[error("Switch '{device}' is not connected ({status})")]
    #[diagnostic(code(lvmnps::not_connected), help("{hint}"))]
    NotConnected {
        device: String,
        status: String,
        hint: String,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed for switch '{device}': {message}")]
    #[diagnostic(
        code(lvmnps::auth_failed),
        help(
            "Verify username and password for '{device}'.\n\
             Passwords are read from password_env, the system keyring\n\
             (service 'lvmnps', entry '{device}/password'), or the config file."
        )
    )]
    AuthFailed { device: String, message: String },

    #[error("No password configured for switch '{switch}'")]
    #[diagnostic(
        code(lvmnps::no_credentials),
        help("Set password, password_env, or store it in the system keyring.")
    )]
    NoCredentials { switch: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Switch '{identifier}' not found")]
    #[diagnostic(
        code(lvmnps::not_found),
        help("Run: lvmnps list to see configured switches")
    )]
    NotFound { identifier: String },

    #[error("{message}")]
    #[diagnostic(code(lvmnps::conflict))]
    Conflict { message: String },

    #[error("Outlet {index} does not exist on '{device}'")]
    #[diagnostic(
        code(lvmnps::invalid_outlet),
        help("'{device}' has outlets 1 to {count}.")
    )]
    InvalidOutlet {
        device: String,
        index: u32,
        count: u32,
    },

    #[error("Switch '{device}' rejected the request")]
    #[diagnostic(code(lvmnps::device_error))]
    DeviceError {
        device: String,
        #[source]
        source: DriverError,
    },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Switch '{device}' timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(lvmnps::timeout),
        help("Raise the matching value under 'timeouts' in the configuration.")
    )]
    Timeout { device: String, timeout_ms: u64 },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(lvmnps::no_config),
        help(
            "Pass one with --config or LVMNPS_CONFIG.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lvmnps::validation))]
    Validation { field: String, reason: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(lvmnps::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {message}")]
    #[diagnostic(code(lvmnps::render))]
    Render { message: String },

    #[error("Unexpected reply from the fleet controller: {reply}")]
    #[diagnostic(code(lvmnps::unexpected_reply))]
    UnexpectedReply { reply: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::InvalidOutlet { .. } | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { name } => CliError::NotFound { identifier: name },

            CoreError::DuplicateName { .. }
            | CoreError::DeviceInUse { .. }
            | CoreError::AlreadyInProgress { .. } => CliError::Conflict {
                message: err.to_string(),
            },

            CoreError::NotConnected { name, status } => CliError::NotConnected {
                device: name,
                status: status.to_string(),
                hint: "Check the switch with: lvmnps status".into(),
            },

            CoreError::InvalidOutlet { name, index, count } => CliError::InvalidOutlet {
                device: name,
                index,
                count,
            },

            CoreError::Connect {
                name,
                source: DriverError::Auth(message),
            } => CliError::AuthFailed {
                device: name,
                message,
            },

            CoreError::Connect { name, source } => CliError::ConnectionFailed {
                device: name,
                source,
            },

            CoreError::Device { name, source } => CliError::DeviceError {
                device: name,
                source,
            },

            CoreError::Timeout { name, timeout_ms } => CliError::Timeout {
                device: name,
                timeout_ms,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "switches".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::NoCredentials { switch } => CliError::NoCredentials { switch },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Figment(e) => CliError::Config {
                message: e.to_string(),
            },
        }
    }
}
