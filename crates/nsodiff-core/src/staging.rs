// ── Staging device group ──
//
// A throwaway `device-group` on the staging NSO holding every device of
// the run. It exists only to drive one bulk sync and sort the members into
// synced and unsynced. Creation and deletion are paired: `scope` deletes
// the group on every exit path, and a session dropped while still active
// logs a leak warning.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nsodiff_api::RestconfClient;

use crate::config::SyncAction;
use crate::device::Device;
use crate::error::CoreError;
use crate::observe::instrumented;

const DEVICES_ENDPOINT: &str = "data/tailf-ncs:devices";

/// Forward-only lifecycle of the controller-side group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    Uncreated,
    Active,
    TornDown,
}

/// One `sync-result` entry of the controller's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub device: String,
    pub in_sync: bool,
    pub info: Option<String>,
}

/// Members split by sync outcome, in member order.
#[derive(Debug, Default)]
pub struct SyncClassification {
    pub synced: Vec<Arc<Device>>,
    pub unsynced: Vec<Arc<Device>>,
    /// Names the controller reported that are not members of the group.
    pub unknown: Vec<String>,
}

impl SyncClassification {
    pub fn is_synced(&self, hostname: &str) -> bool {
        self.synced.iter().any(|d| d.hostname() == hostname)
    }
}

pub struct StagingSession {
    name: String,
    client: Arc<RestconfClient>,
    devices: Vec<Arc<Device>>,
    action: SyncAction,
    state: Mutex<SessionState>,
}

impl StagingSession {
    /// A new, not yet created, session with a random 8-hex-digit name.
    pub fn new(client: Arc<RestconfClient>, devices: Vec<Arc<Device>>, action: SyncAction) -> Self {
        let name = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self {
            name,
            client,
            devices,
            action,
            state: Mutex::new(SessionState::Uncreated),
        }
    }

    /// Controller-side `device-group` name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn group_endpoint(&self) -> String {
        format!("{DEVICES_ENDPOINT}/device-group={}", self.name)
    }

    /// `<device-group>` body listing every member.
    pub fn creation_payload(&self) -> String {
        let mut body = format!("<device-group><name>{}</name>", escape(self.name.as_str()));
        for device in &self.devices {
            let _ = write!(body, "<device-name>{}</device-name>", escape(device.hostname()));
        }
        body.push_str("</device-group>");
        body
    }

    /// Create the group on the controller.
    pub async fn open(&self) -> Result<(), CoreError> {
        let state = self.state();
        if state != SessionState::Uncreated {
            return Err(self.inactive(state));
        }

        instrumented("create_device_group", &self.name, async {
            self.client
                .post(DEVICES_ENDPOINT, Some(&self.creation_payload()))
                .await?;
            Ok::<_, CoreError>(())
        })
        .await?;

        self.set_state(SessionState::Active);
        Ok(())
    }

    /// Run the configured sync action on the group and classify members.
    pub async fn sync_classify(&self) -> Result<SyncClassification, CoreError> {
        let state = self.state();
        if state != SessionState::Active {
            return Err(self.inactive(state));
        }

        let endpoint = format!("{}/{}", self.group_endpoint(), self.action);
        let response = instrumented(
            "sync_device_group",
            &self.name,
            self.client.post(&endpoint, None),
        )
        .await?;

        let results = parse_sync_results(&response)?;
        Ok(self.classify(results))
    }

    fn classify(&self, results: Vec<SyncResult>) -> SyncClassification {
        let mut verdicts: HashMap<String, SyncResult> = HashMap::new();
        let mut unknown = Vec::new();

        for result in results {
            if self.devices.iter().any(|d| d.hostname() == result.device) {
                verdicts.insert(result.device.clone(), result);
            } else {
                warn!(group = %self.name, device = %result.device, "sync result for a device outside the group");
                unknown.push(result.device);
            }
        }

        let mut classification = SyncClassification {
            unknown,
            ..SyncClassification::default()
        };
        for device in &self.devices {
            match verdicts.get(device.hostname()) {
                Some(result) if result.in_sync => classification.synced.push(Arc::clone(device)),
                Some(result) => {
                    info!(
                        hostname = device.hostname(),
                        info = result.info.as_deref().unwrap_or(""),
                        "device is not in sync"
                    );
                    classification.unsynced.push(Arc::clone(device));
                }
                None => {
                    warn!(hostname = device.hostname(), "no sync result returned for device");
                    classification.unsynced.push(Arc::clone(device));
                }
            }
        }
        classification
    }

    /// Delete the group. Only the first call while active sends a request.
    pub async fn teardown(&self) -> Result<(), CoreError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SessionState::Active {
                debug!(group = %self.name, state = %*state, "teardown skipped");
                return Ok(());
            }
            *state = SessionState::TornDown;
        }

        instrumented(
            "delete_device_group",
            &self.name,
            self.client.delete(&self.group_endpoint()),
        )
        .await?;
        Ok(())
    }

    /// Open a session, run `body` with it, and always tear it down.
    ///
    /// `body` races against `cancel`; cancellation counts as a body failure
    /// with [`CoreError::Cancelled`]. When the body fails its error is
    /// returned and a teardown failure is only logged.
    pub async fn scope<T, F, Fut>(
        client: Arc<RestconfClient>,
        devices: Vec<Arc<Device>>,
        action: SyncAction,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Arc<StagingSession>) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let session = Arc::new(Self::new(client, devices, action));
        session.open().await?;

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Cancelled),
            result = body(Arc::clone(&session)) => result,
        };

        let teardown = session.teardown().await;
        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown_err)) => {
                error!(
                    group = %session.name,
                    error = %teardown_err,
                    "device group could not be deleted after a failed run"
                );
                Err(e)
            }
        }
    }

    fn inactive(&self, state: SessionState) -> CoreError {
        CoreError::SessionInactive {
            group: self.name.clone(),
            state,
        }
    }
}

impl Drop for StagingSession {
    fn drop(&mut self) {
        let state = *self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state == SessionState::Active {
            warn!(
                group = %self.name,
                "device group still exists on the controller; delete it manually"
            );
        }
    }
}

// ── Sync result parsing ──────────────────────────────────────────────

fn parse_error(e: &quick_xml::Error) -> CoreError {
    CoreError::ClassificationParse {
        message: e.to_string(),
    }
}

/// Parse `sync-result` entries by element name.
///
/// A `result` of `true` (sync-from) or `in-sync` (check-sync) counts as
/// synced. A body with no entries yields an empty list.
pub fn parse_sync_results(xml: &str) -> Result<Vec<SyncResult>, CoreError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut results = Vec::new();
    let mut entry: Option<(Option<String>, Option<String>, Option<String>)> = None;
    let mut current = Vec::new();

    loop {
        match reader.read_event().map_err(|e| parse_error(&e))? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"sync-result" {
                    entry = Some((None, None, None));
                }
                current = local;
            }
            Event::Text(t) => {
                if let Some((device, result, info)) = entry.as_mut() {
                    let text = t.unescape().map_err(|e| parse_error(&e))?.trim().to_owned();
                    match current.as_slice() {
                        b"device" => *device = Some(text),
                        b"result" => *result = Some(text),
                        b"info" => *info = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"sync-result" {
                    let Some((device, result, info)) = entry.take() else {
                        continue;
                    };
                    let device = device.ok_or_else(|| CoreError::ClassificationParse {
                        message: "sync-result without a device name".into(),
                    })?;
                    let in_sync = result
                        .as_deref()
                        .is_some_and(|r| r == "true" || r == "in-sync");
                    results.push(SyncResult { device, in_sync, info });
                }
                current.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if entry.is_some() {
        return Err(CoreError::ClassificationParse {
            message: "unterminated sync-result".into(),
        });
    }
    Ok(results)
}
