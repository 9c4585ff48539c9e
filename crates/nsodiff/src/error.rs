//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use nsodiff_config::ConfigError;
use nsodiff_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Inventory & settings ─────────────────────────────────────────
    #[error("Cannot read inventory {path}")]
    #[diagnostic(
        code(nsodiff::inventory_missing),
        help("Pass the inventory with --inventory (-i) or set NSODIFF_INVENTORY.")
    )]
    InventoryUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Inventory is invalid")]
    #[diagnostic(code(nsodiff::inventory_invalid), help("{details}"))]
    InvalidInventory { details: String },

    #[error("No staging-nso section in {path}")]
    #[diagnostic(
        code(nsodiff::no_controller),
        help(
            "Reconciliation needs the staging NSO (address, port, token).\n\
             Add a staging-nso section, or run with --netconf for live capture only."
        )
    )]
    NoController { path: String },

    #[error("No controller token for {address}")]
    #[diagnostic(
        code(nsodiff::no_token),
        help(
            "Provide the pre-encoded Basic token in one of:\n\
             - the NSODIFF_TOKEN environment variable\n\
             - a system keyring entry (service 'nsodiff', account '{address}')\n\
             - staging-nso.token in the inventory"
        )
    )]
    NoToken { address: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nsodiff::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(nsodiff::settings), help("Check the settings file and NSODIFF_* variables."))]
    Settings(ConfigError),

    // ── Controller ───────────────────────────────────────────────────
    #[error("Could not reach the staging NSO at {url}")]
    #[diagnostic(
        code(nsodiff::connection_failed),
        help(
            "Check that the controller is running and reachable.\n\
             {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Staging NSO did not answer within {seconds}s")]
    #[diagnostic(
        code(nsodiff::timeout),
        help("Increase the timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Staging NSO rejected the request (HTTP {status})")]
    #[diagnostic(code(nsodiff::controller), help("URL: {url}\n{body}"))]
    Controller { status: u16, body: String, url: String },

    // ── Run ──────────────────────────────────────────────────────────
    #[error("Run cancelled")]
    #[diagnostic(
        code(nsodiff::cancelled),
        help("The staging device group was deleted before exiting.")
    )]
    Cancelled,

    #[error(transparent)]
    #[diagnostic(code(nsodiff::core))]
    Core(CoreError),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InventoryUnreadable { .. }
            | Self::InvalidInventory { .. }
            | Self::NoController { .. }
            | Self::NoToken { .. }
            | Self::Validation { .. }
            | Self::Settings(_) => exit_code::USAGE,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => exit_code::CONNECTION,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Controller { .. } | Self::Core(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { path, source } => CliError::InventoryUnreadable {
                path: path.display().to_string(),
                source,
            },
            ConfigError::Inventory(issues) => CliError::InvalidInventory {
                details: issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            ConfigError::Yaml { path, source } => CliError::InvalidInventory {
                details: format!("{}: {source}", path.display()),
            },
            ConfigError::NoToken { address } => CliError::NoToken { address },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => CliError::Settings(other),
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout { seconds: timeout_secs },
            CoreError::Controller { status, body, url } => CliError::Controller { status, body, url },
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            other => CliError::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_issues_are_usage_errors() {
        let err: CliError = ConfigError::Inventory(Vec::new()).into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn connection_and_cancel_codes() {
        let err: CliError = CoreError::ConnectionFailed {
            url: "http://nso:8080/".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(CliError::from(CoreError::Cancelled).exit_code(), exit_code::CANCELLED);
    }

    #[test]
    fn controller_rejection_is_general() {
        let err: CliError = CoreError::Controller {
            status: 500,
            body: "boom".into(),
            url: "u".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
