// ── Core error types ──
//
// Errors surfaced by the reconciliation workflow. Controller failures are
// fatal to a run; live-protocol failures never reach this type because
// `Device::extract_live_config` turns them into `LiveCapture::Unreachable`.
// The `From<nsodiff_api::Error>` impl translates transport-layer errors
// into domain variants.

use std::path::PathBuf;

use thiserror::Error;

use crate::device::PayloadKind;
use crate::staging::SessionState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Controller errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Controller request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Non-success HTTP answer. `body` is the controller's own explanation.
    #[error("Controller rejected request (HTTP {status}) for {url}\n{body}")]
    Controller {
        status: u16,
        body: String,
        url: String,
    },

    #[error("Unsupported controller operation: {0}")]
    UnsupportedOperation(String),

    #[error("Cannot parse sync result: {message}")]
    ClassificationParse { message: String },

    // ── Workflow errors ──────────────────────────────────────────────
    #[error("{hostname}: {payload} configuration has not been extracted")]
    MissingPayload {
        hostname: String,
        payload: PayloadKind,
    },

    #[error("{hostname}: {payload} configuration was already extracted")]
    AlreadyExtracted {
        hostname: String,
        payload: PayloadKind,
    },

    #[error("Staging group {group} is {state}")]
    SessionInactive { group: String, state: SessionState },

    #[error("Run cancelled")]
    Cancelled,

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Cannot write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status of a controller rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Controller { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the controller could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nsodiff_api::Error> for CoreError {
    fn from(err: nsodiff_api::Error) -> Self {
        use nsodiff_api::Error as Api;

        match err {
            Api::Status { status, body, url } => CoreError::Controller { status, body, url },
            Api::UnsupportedMethod(method) => CoreError::UnsupportedOperation(method),
            Api::InvalidToken(reason) => CoreError::Config {
                message: format!("Invalid controller token: {reason}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            Api::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if let Some(status) = e.status() {
                    CoreError::Controller {
                        status: status.as_u16(),
                        body: e.to_string(),
                        url,
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                }
            }
            // NETCONF failures are soft per device; reaching here means a
            // caller propagated one instead of recording it.
            other @ (Api::Connect { .. }
            | Api::Ssh(_)
            | Api::NetconfAuth { .. }
            | Api::Framing(_)
            | Api::Rpc(_)
            | Api::Reply(_)) => CoreError::Internal(other.to_string()),
        }
    }
}
