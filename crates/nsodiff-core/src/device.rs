// ── Managed device ──
//
// One inventory entry plus the two configuration payloads gathered during
// a run. Each payload is a set-once cell: extraction fills it exactly once,
// and the diff reads both.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use strum::Display;
use tracing::{info, warn};

use nsodiff_api::RestconfClient;

use crate::config::DeviceRecord;
use crate::diff::{DiffReport, HtmlDiff};
use crate::error::CoreError;
use crate::live::LiveConfigSource;
use crate::observe::instrumented;
use crate::report::{ReportTag, ReportWriter};

/// Which of the two payloads an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PayloadKind {
    #[strum(serialize = "live (NETCONF)")]
    Live,
    #[strum(serialize = "controller (CDB)")]
    Controller,
}

/// Outcome of a live extraction.
///
/// Device-side failures are not errors of the run: the device is recorded
/// as unreachable and the batch moves on.
#[derive(Debug)]
pub enum LiveCapture {
    Captured(PathBuf),
    Unreachable(nsodiff_api::Error),
}

impl LiveCapture {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Captured(path) => Some(path),
            Self::Unreachable(_) => None,
        }
    }
}

pub struct Device {
    record: DeviceRecord,
    controller: Option<Arc<RestconfClient>>,
    live_source: Arc<dyn LiveConfigSource>,
    reports: Arc<ReportWriter>,
    live_config: OnceLock<String>,
    controller_config: OnceLock<String>,
}

impl Device {
    /// A device with no controller binding (live-only runs).
    pub fn new(record: DeviceRecord, live_source: Arc<dyn LiveConfigSource>, reports: Arc<ReportWriter>) -> Self {
        Self {
            record,
            controller: None,
            live_source,
            reports,
            live_config: OnceLock::new(),
            controller_config: OnceLock::new(),
        }
    }

    /// Bind the staging controller used for CDB reads.
    #[must_use]
    pub fn with_controller(mut self, client: Arc<RestconfClient>) -> Self {
        self.controller = Some(client);
        self
    }

    pub fn hostname(&self) -> &str {
        &self.record.hostname
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    pub fn live_config(&self) -> Option<&str> {
        self.live_config.get().map(String::as_str)
    }

    pub fn controller_config(&self) -> Option<&str> {
        self.controller_config.get().map(String::as_str)
    }

    /// Relative RESTCONF path of this device's CDB configuration.
    ///
    /// The hostname is a list key, so reserved characters are
    /// percent-encoded.
    pub fn controller_endpoint(&self) -> String {
        format!(
            "data/tailf-ncs:devices/device={}?content=config",
            encode_key(&self.record.hostname)
        )
    }

    /// Pull the running configuration from the device and save a
    /// `NETCONF` capture.
    pub async fn extract_live_config(&self) -> Result<LiveCapture, CoreError> {
        instrumented("extract_netconf", self.hostname(), async {
            if self.live_config.get().is_some() {
                return Err(self.already_extracted(PayloadKind::Live));
            }

            let payload = match self.live_source.running_config(&self.record).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(
                        hostname = self.hostname(),
                        address = %self.record.address,
                        error = %e,
                        "device unreachable over NETCONF"
                    );
                    return Ok(LiveCapture::Unreachable(e));
                }
            };

            let path = self.reports.write(ReportTag::Netconf, &self.record, &payload)?;
            self.live_config
                .set(payload)
                .map_err(|_| self.already_extracted(PayloadKind::Live))?;
            Ok(LiveCapture::Captured(path))
        })
        .await
    }

    /// Read the device's configuration from the controller CDB and save a
    /// `CDB` capture.
    pub async fn extract_controller_config(&self) -> Result<PathBuf, CoreError> {
        instrumented("extract_cdb", self.hostname(), async {
            let client = self.controller.as_ref().ok_or_else(|| CoreError::Config {
                message: format!("{} is not bound to a controller", self.hostname()),
            })?;
            if self.controller_config.get().is_some() {
                return Err(self.already_extracted(PayloadKind::Controller));
            }

            let payload = client.get(&self.controller_endpoint()).await?;

            let path = self.reports.write(ReportTag::Cdb, &self.record, &payload)?;
            self.controller_config
                .set(payload)
                .map_err(|_| self.already_extracted(PayloadKind::Controller))?;
            Ok(path)
        })
        .await
    }

    /// Render live (left) against controller (right) into a `DIFF` report.
    ///
    /// Both payloads must have been extracted.
    pub fn render_diff(&self) -> Result<DiffReport, CoreError> {
        let live = self.live_config().ok_or_else(|| self.missing(PayloadKind::Live))?;
        let controller = self
            .controller_config()
            .ok_or_else(|| self.missing(PayloadKind::Controller))?;

        let rendered = HtmlDiff::new(self.reports.wrap_column())
            .title(format!("{}: NETCONF vs CDB", self.hostname()))
            .labels("NETCONF (device)", "CDB (controller)")
            .render(live, controller);

        let path = self.reports.write(ReportTag::Diff, &self.record, &rendered.html)?;
        info!(
            hostname = self.hostname(),
            added = rendered.stats.added,
            removed = rendered.stats.removed,
            changed = rendered.stats.changed,
            "Report file available -> {}",
            path.display()
        );
        Ok(DiffReport {
            path,
            stats: rendered.stats,
        })
    }

    fn missing(&self, payload: PayloadKind) -> CoreError {
        CoreError::MissingPayload {
            hostname: self.record.hostname.clone(),
            payload,
        }
    }

    fn already_extracted(&self, payload: PayloadKind) -> CoreError {
        CoreError::AlreadyExtracted {
            hostname: self.record.hostname.clone(),
            payload,
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.record.hostname == other.record.hostname
    }
}

impl Eq for Device {}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.record.hostname)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("hostname", &self.record.hostname)
            .field("device_type", &self.record.device_type)
            .field("live", &self.live_config.get().is_some())
            .field("controller", &self.controller_config.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Percent-encode a RESTCONF list key value (RFC 8040 §3.5.3).
///
/// `byte_serialize` writes spaces as `+`; a literal `+` comes out as `%2B`,
/// so every remaining `+` is a space.
pub(crate) fn encode_key(key: &str) -> String {
    url::form_urlencoded::byte_serialize(key.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use futures_util::future::BoxFuture;
    use secrecy::SecretString;

    use super::*;
    use crate::config::ReportSettings;

    struct Canned(Option<&'static str>);

    impl LiveConfigSource for Canned {
        fn running_config<'a>(
            &'a self,
            _device: &'a DeviceRecord,
        ) -> BoxFuture<'a, Result<String, nsodiff_api::Error>> {
            let reply = self.0.map(str::to_owned).ok_or(nsodiff_api::Error::Connect {
                address: "10.0.0.1:830".into(),
                reason: "connection refused".into(),
            });
            Box::pin(async move { reply })
        }
    }

    fn device(live: Option<&'static str>, dir: &std::path::Path) -> Device {
        let record = DeviceRecord {
            hostname: "pe1".into(),
            device_type: "iosxr".into(),
            version: "7.3.2".into(),
            address: "10.0.0.1".into(),
            username: "admin".into(),
            password: SecretString::from("admin".to_owned()),
        };
        let reports = ReportWriter::new(&ReportSettings {
            dir: dir.to_path_buf(),
            wrap_column: 0,
        });
        Device::new(record, Arc::new(Canned(live)), Arc::new(reports))
    }

    #[tokio::test]
    async fn live_capture_is_written_and_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(Some("<data><mtu>1500</mtu></data>"), dir.path());

        let capture = device.extract_live_config().await.unwrap();
        let path = capture.path().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("NETCONF_pe1_"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<data><mtu>1500</mtu></data>");
        assert_eq!(device.live_config(), Some("<data><mtu>1500</mtu></data>"));

        assert!(matches!(
            device.extract_live_config().await,
            Err(CoreError::AlreadyExtracted {
                payload: PayloadKind::Live,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unreachable_device_is_a_soft_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(None, dir.path());

        let capture = device.extract_live_config().await.unwrap();

        assert!(matches!(capture, LiveCapture::Unreachable(nsodiff_api::Error::Connect { .. })));
        assert!(device.live_config().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn diff_requires_both_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(None, dir.path());

        assert!(matches!(
            device.render_diff(),
            Err(CoreError::MissingPayload {
                payload: PayloadKind::Live,
                ..
            })
        ));

        device.live_config.set("<a/>".into()).unwrap();
        assert!(matches!(
            device.render_diff(),
            Err(CoreError::MissingPayload {
                payload: PayloadKind::Controller,
                ..
            })
        ));
    }

    #[test]
    fn diff_report_is_written_when_both_payloads_exist() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(None, dir.path());
        device.live_config.set("<mtu>1500</mtu>\n".into()).unwrap();
        device.controller_config.set("<mtu>9000</mtu>\n".into()).unwrap();

        let report = device.render_diff().unwrap();

        assert_eq!(report.stats.changed, 1);
        assert!(report.path.extension().is_some_and(|ext| ext == "html"));
        let html = fs::read_to_string(&report.path).unwrap();
        assert!(html.contains("1500") && html.contains("9000"));
    }

    #[tokio::test]
    async fn controller_read_needs_a_binding() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(None, dir.path());
        assert!(matches!(
            device.extract_controller_config().await,
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn endpoint_targets_device_config() {
        let dir = tempfile::tempdir().unwrap();
        let device = device(None, dir.path());
        assert_eq!(
            device.controller_endpoint(),
            "data/tailf-ncs:devices/device=pe1?content=config"
        );
        assert_eq!(device.to_string(), "pe1");
    }

    #[test]
    fn list_keys_are_percent_encoded() {
        assert_eq!(encode_key("pe1.lab-2_x"), "pe1.lab-2_x");
        assert_eq!(encode_key("pe#1"), "pe%231");
        assert_eq!(encode_key("core/rtr1"), "core%2Frtr1");
        assert_eq!(encode_key("a b+c,d"), "a%20b%2Bc%2Cd");
        assert_eq!(encode_key("r?x=1&y"), "r%3Fx%3D1%26y");
    }
}
