// ── Orchestrator ──
//
// Drives one run over the whole inventory. Devices are handled one at a
// time in inventory order; the cancellation token is checked between
// devices and raced against the staging scope.

use std::path::PathBuf;
use std::sync::Arc;

use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nsodiff_api::RestconfClient;

use crate::config::{ControllerConfig, DeviceRecord};
use crate::device::{Device, LiveCapture};
use crate::diff::DiffReport;
use crate::error::CoreError;
use crate::live::LiveConfigSource;
use crate::report::ReportWriter;
use crate::staging::StagingSession;

/// What a run does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// NETCONF captures only; the controller is never contacted.
    LiveOnly,
    /// Classify, capture both sides and diff synced devices.
    #[default]
    Reconcile,
    /// Classify and capture the CDB side only.
    ControllerOnly,
}

impl Mode {
    pub fn needs_controller(self) -> bool {
        !matches!(self, Self::LiveOnly)
    }
}

/// Per-device outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceStatus {
    /// Processed end to end.
    Captured,
    /// NETCONF failed; nothing was diffed.
    Unreachable,
    /// Skipped: the controller could not confirm sync.
    Unsynced,
}

#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub hostname: String,
    pub status: DeviceStatus,
    pub live_capture: Option<PathBuf>,
    pub controller_capture: Option<PathBuf>,
    pub diff: Option<DiffReport>,
    /// Soft failure detail for unreachable devices.
    pub error: Option<String>,
}

impl DeviceReport {
    fn new(hostname: &str, status: DeviceStatus) -> Self {
        Self {
            hostname: hostname.to_owned(),
            status,
            live_capture: None,
            controller_capture: None,
            diff: None,
            error: None,
        }
    }

    fn record_live(&mut self, capture: LiveCapture) {
        match capture {
            LiveCapture::Captured(path) => self.live_capture = Some(path),
            LiveCapture::Unreachable(e) => {
                self.status = DeviceStatus::Unreachable;
                self.error = Some(e.to_string());
            }
        }
    }
}

/// Everything a run produced, in inventory order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: Mode,
    /// Staging group used, when the controller was involved.
    pub group: Option<String>,
    pub devices: Vec<DeviceReport>,
    /// Names the controller reported that were not in the inventory.
    pub unknown: Vec<String>,
}

impl RunSummary {
    pub fn count(&self, status: DeviceStatus) -> usize {
        self.devices.iter().filter(|d| d.status == status).count()
    }

    pub fn diffs(&self) -> impl Iterator<Item = &DiffReport> {
        self.devices.iter().filter_map(|d| d.diff.as_ref())
    }
}

pub struct Orchestrator {
    inventory: Vec<DeviceRecord>,
    live_source: Arc<dyn LiveConfigSource>,
    reports: Arc<ReportWriter>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(inventory: Vec<DeviceRecord>, live_source: Arc<dyn LiveConfigSource>, reports: ReportWriter) -> Self {
        Self {
            inventory,
            live_source,
            reports: Arc::new(reports),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (the CLI cancels it on Ctrl-C).
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `mode`. Controller parameters are required unless live-only.
    pub async fn run(&self, mode: Mode, controller: Option<&ControllerConfig>) -> Result<RunSummary, CoreError> {
        match (mode, controller) {
            (Mode::LiveOnly, _) => self.run_live_only().await,
            (_, Some(controller)) => self.run_reconcile(controller, mode == Mode::ControllerOnly).await,
            (_, None) => Err(CoreError::Config {
                message: format!("{mode} mode needs the staging-nso section of the inventory"),
            }),
        }
    }

    /// Capture every device's running configuration over NETCONF.
    pub async fn run_live_only(&self) -> Result<RunSummary, CoreError> {
        let mut devices = Vec::with_capacity(self.inventory.len());

        for record in &self.inventory {
            self.check_cancelled()?;
            let device = self.device(record);
            let mut report = DeviceReport::new(device.hostname(), DeviceStatus::Captured);
            report.record_live(device.extract_live_config().await?);
            devices.push(report);
        }

        Ok(RunSummary {
            mode: Mode::LiveOnly,
            group: None,
            devices,
            unknown: Vec::new(),
        })
    }

    /// Classify through a staging group, then capture and diff synced devices.
    pub async fn run_reconcile(
        &self,
        controller: &ControllerConfig,
        controller_only: bool,
    ) -> Result<RunSummary, CoreError> {
        let client = Arc::new(RestconfClient::new(
            controller.url.as_str(),
            &controller.token,
            &controller.transport(),
        )?);

        let devices: Vec<Arc<Device>> = self
            .inventory
            .iter()
            .map(|record| Arc::new(self.device(record).with_controller(Arc::clone(&client))))
            .collect();

        let mode = if controller_only {
            Mode::ControllerOnly
        } else {
            Mode::Reconcile
        };

        StagingSession::scope(client, devices, controller.sync_action, &self.cancel, |session| async move {
            let classification = session.sync_classify().await?;

            if !classification.unsynced.is_empty() {
                let names: Vec<&str> = classification.unsynced.iter().map(|d| d.hostname()).collect();
                info!(
                    "The following devices are not valid for delta analysis: {}",
                    names.join(", ")
                );
            }
            for name in &classification.unknown {
                warn!(device = %name, "controller reported a device that is not in the inventory");
            }

            let mut reports = Vec::with_capacity(session.devices().len());
            for device in session.devices() {
                if classification.is_synced(device.hostname()) {
                    self.check_cancelled()?;
                    reports.push(Self::process_synced(device, controller_only).await?);
                } else {
                    reports.push(DeviceReport::new(device.hostname(), DeviceStatus::Unsynced));
                }
            }

            Ok(RunSummary {
                mode,
                group: Some(session.name().to_owned()),
                devices: reports,
                unknown: classification.unknown,
            })
        })
        .await
    }

    async fn process_synced(device: &Device, controller_only: bool) -> Result<DeviceReport, CoreError> {
        let mut report = DeviceReport::new(device.hostname(), DeviceStatus::Captured);
        report.controller_capture = Some(device.extract_controller_config().await?);

        if controller_only {
            return Ok(report);
        }

        report.record_live(device.extract_live_config().await?);
        if report.status == DeviceStatus::Captured {
            report.diff = Some(device.render_diff()?);
        } else {
            warn!(hostname = device.hostname(), "diff skipped: live configuration unavailable");
        }
        Ok(report)
    }

    fn device(&self, record: &DeviceRecord) -> Device {
        Device::new(record.clone(), Arc::clone(&self.live_source), Arc::clone(&self.reports))
    }

    fn check_cancelled(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}
