// ── Runtime configuration ──
//
// These types describe *what* to audit and *how* to reach it. They carry
// credentials and tuning but never touch disk: `nsodiff-config` builds
// them from the inventory and settings files and hands them in.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use strum::{Display, EnumString};
use url::Url;

use nsodiff_api::netconf::{DEFAULT_PORT, Platform};
use nsodiff_api::{TlsMode, TransportConfig};

use crate::diff::DEFAULT_WRAP_COLUMN;

/// TLS verification strategy for the staging NSO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab servers).
    DangerAcceptInvalid,
}

/// Which NSO action drives the bulk sync of the staging group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SyncAction {
    /// Pull device config into the CDB, reporting per-device success.
    #[default]
    SyncFrom,
    /// Compare without touching the CDB.
    CheckSync,
}

/// Connection to the staging NSO server.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller root, e.g. `http://10.0.0.10:8080`. `/restconf/` is
    /// appended by the client.
    pub url: Url,
    /// Pre-encoded Basic token.
    pub token: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    pub sync_action: SyncAction,
}

impl ControllerConfig {
    pub fn new(url: Url, token: SecretString) -> Self {
        Self {
            url,
            token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            sync_action: SyncAction::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}

/// One validated inventory entry.
#[derive(Clone)]
pub struct DeviceRecord {
    pub hostname: String,
    /// Free-form platform tag, also used in report file names.
    pub device_type: String,
    pub version: String,
    pub address: String,
    pub username: String,
    pub password: SecretString,
}

impl DeviceRecord {
    pub fn platform(&self) -> Platform {
        Platform::from_hint(&self.device_type)
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("hostname", &self.hostname)
            .field("device_type", &self.device_type)
            .field("version", &self.version)
            .field("address", &self.address)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// NETCONF session tuning shared by every device.
#[derive(Debug, Clone)]
pub struct NetconfSettings {
    pub port: u16,
    pub timeout: Duration,
}

impl Default for NetconfSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Where and how reports are written.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub dir: PathBuf,
    /// Column at which long lines wrap in the HTML diff.
    pub wrap_column: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports"),
            wrap_column: DEFAULT_WRAP_COLUMN,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sync_action_parses_kebab_case() {
        assert_eq!("check-sync".parse::<SyncAction>().unwrap(), SyncAction::CheckSync);
        assert_eq!(SyncAction::SyncFrom.to_string(), "sync-from");
    }

    #[test]
    fn device_record_debug_hides_password() {
        let record = DeviceRecord {
            hostname: "pe1".into(),
            device_type: "iosxr".into(),
            version: "7.3.2".into(),
            address: "10.0.0.1".into(),
            username: "admin".into(),
            password: SecretString::from("hunter2".to_owned()),
        };
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(record.platform(), Platform::Iosxr);
    }
}
