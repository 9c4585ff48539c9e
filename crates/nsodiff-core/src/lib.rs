//! Reconciliation workflow between the NSO CDB and device running config.
//!
//! - **[`Device`]**: one managed network element. Pulls its running
//!   configuration over NETCONF and its CDB configuration over RESTCONF,
//!   then renders an HTML diff between the two.
//!
//! - **[`StagingSession`]**: a throwaway `device-group` on the staging NSO,
//!   used only to drive a bulk sync and classify the members as synced or
//!   unsynced. [`StagingSession::scope`] deletes the group on every exit path.
//!
//! - **[`Orchestrator`]**: the two operating modes, live-only extraction and
//!   full reconciliation (optionally controller-only).
//!
//! Runtime types in [`config`] are built by the CLI; core never reads files
//! other than the reports it writes.

pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod live;
pub mod observe;
pub mod reconcile;
pub mod report;
pub mod staging;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    ControllerConfig, DeviceRecord, NetconfSettings, ReportSettings, SyncAction, TlsVerification,
};
pub use device::{Device, LiveCapture, PayloadKind};
pub use diff::{DiffReport, DiffStats, HtmlDiff};
pub use error::CoreError;
pub use live::{LiveConfigSource, NetconfSource};
pub use reconcile::{DeviceReport, DeviceStatus, Mode, Orchestrator, RunSummary};
pub use report::{ReportTag, ReportWriter};
pub use staging::{SessionState, StagingSession, SyncClassification, SyncResult};
