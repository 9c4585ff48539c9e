use thiserror::Error;

/// Top-level error type for the `nsodiff-api` crate.
///
/// Covers both wire surfaces: RESTCONF towards the NSO staging server and
/// NETCONF towards the managed devices. `nsodiff-core` maps these into
/// domain errors (controller failures) or soft per-device outcomes
/// (live-protocol failures).
#[derive(Debug, Error)]
pub enum Error {
    // ── RESTCONF ────────────────────────────────────────────────────
    /// Non-success status from the controller. Carries the response body
    /// and the full URL that was requested.
    #[error("RESTCONF request failed (HTTP {status})\n{body}\nURL: {url}")]
    Status {
        status: u16,
        body: String,
        url: String,
    },

    /// Method outside GET/POST/DELETE. Raised before any request is sent.
    #[error("RESTCONF operation not supported: {0}")]
    UnsupportedMethod(String),

    /// The pre-shared token cannot be used as a header value.
    #[error("Invalid auth token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or session step timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── NETCONF ─────────────────────────────────────────────────────
    /// TCP connect to the device failed.
    #[error("Cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// SSH protocol failure underneath the NETCONF session.
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Password authentication was rejected by the device.
    #[error("Authentication failed for {username}@{address}")]
    NetconfAuth { username: String, address: String },

    /// The byte stream does not follow the negotiated NETCONF framing.
    #[error("NETCONF framing error: {0}")]
    Framing(String),

    /// The device answered with `<rpc-error>`.
    #[error("NETCONF rpc-error: {0}")]
    Rpc(String),

    /// The reply is not the XML we expected.
    #[error("Malformed NETCONF reply: {0}")]
    Reply(String),
}

impl Error {
    /// Returns `true` for failures talking to a device over NETCONF.
    ///
    /// These are recovered per device by the live extraction step instead of
    /// aborting the run.
    pub fn is_live_protocol(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Ssh(_)
                | Self::NetconfAuth { .. }
                | Self::Framing(_)
                | Self::Rpc(_)
                | Self::Reply(_)
                | Self::Timeout { .. }
        )
    }

    /// HTTP status carried by a controller rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if this is a "not found" answer from the controller.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
