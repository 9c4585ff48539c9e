// ── Tool settings ──
//
// Optional TOML file at the platform config dir, overridden by
// `NSODIFF_*` environment variables (`__` separates nested keys, e.g.
// `NSODIFF_NETCONF__PORT=2022`). CLI flags are applied on top by the
// binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use nsodiff_core::diff::DEFAULT_WRAP_COLUMN;
use nsodiff_core::{NetconfSettings, ReportSettings, SyncAction};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory receiving captures and diff reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Column at which diff lines wrap (0 disables wrapping).
    #[serde(default = "default_wrap_column")]
    pub wrap_column: usize,

    #[serde(default)]
    pub netconf: NetconfSection,

    #[serde(default)]
    pub controller: ControllerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            wrap_column: default_wrap_column(),
            netconf: NetconfSection::default(),
            controller: ControllerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetconfSection {
    #[serde(default = "default_netconf_port")]
    pub port: u16,

    /// Seconds allowed for connect, auth and each RPC.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for NetconfSection {
    fn default() -> Self {
        Self {
            port: default_netconf_port(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSettings {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept self-signed controller certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Custom CA certificate for the controller.
    pub ca_cert: Option<PathBuf>,

    #[serde(default, with = "sync_action_str")]
    pub sync_action: SyncAction,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            sync_action: SyncAction::default(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_wrap_column() -> usize {
    DEFAULT_WRAP_COLUMN
}
fn default_netconf_port() -> u16 {
    NetconfSettings::default().port
}
fn default_timeout() -> u64 {
    30
}

mod sync_action_str {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use nsodiff_core::SyncAction;

    pub fn serialize<S: Serializer>(action: &SyncAction, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(action)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SyncAction, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| D::Error::custom(format!("expected sync-from or check-sync, got '{raw}'")))
    }
}

impl Settings {
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            dir: self.reports_dir.clone(),
            wrap_column: self.wrap_column,
        }
    }

    pub fn netconf_settings(&self) -> NetconfSettings {
        NetconfSettings {
            port: self.netconf.port,
            timeout: Duration::from_secs(self.netconf.timeout),
        }
    }

    pub fn controller_timeout(&self) -> Duration {
        Duration::from_secs(self.controller.timeout)
    }

    /// Render as TOML, the format of the settings file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Platform location of the settings file.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("com", "nsodiff", "nsodiff").map_or_else(
        || PathBuf::from(".nsodiff.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load settings from `path` plus environment. A missing file is not an
/// error: defaults apply.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NSODIFF_").ignore(&["TOKEN"]).split("__"));

    Ok(figment.extract()?)
}
