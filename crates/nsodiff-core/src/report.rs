// ── Report files ──
//
// Every artefact of a run lands in one directory, named
// `{TAG}_{host}_{type}_{version}_{timestamp}.{ext}`. Names keep second
// granularity; a clash within the same second gets `_1`, `_2`, ...
// appended, and files are opened with `create_new` so nothing is ever
// overwritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use strum::Display;
use tracing::{debug, warn};

use crate::config::{DeviceRecord, ReportSettings};
use crate::error::CoreError;

const TIMESTAMP_FORMAT: &str = "%m_%d_%Y__%H_%M_%S";
const MAX_SUFFIX: u32 = 10_000;

/// Kind of artefact, first component of every report name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReportTag {
    Netconf,
    Cdb,
    Diff,
}

impl ReportTag {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Netconf | Self::Cdb => "xml",
            Self::Diff => "html",
        }
    }
}

/// Writes capture and diff files under one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    wrap_column: usize,
}

impl ReportWriter {
    pub fn new(settings: &ReportSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            wrap_column: settings.wrap_column,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn wrap_column(&self) -> usize {
        self.wrap_column
    }

    /// Write `contents` as a new `tag` report for `device`, stamped now.
    pub fn write(&self, tag: ReportTag, device: &DeviceRecord, contents: &str) -> Result<PathBuf, CoreError> {
        self.write_at(tag, device, contents, Local::now())
    }

    pub(crate) fn write_at(
        &self,
        tag: ReportTag,
        device: &DeviceRecord,
        contents: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, CoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| CoreError::Report {
            path: self.dir.clone(),
            source,
        })?;

        let stem = file_stem(tag, device, at);
        let extension = tag.extension();

        for attempt in 0..MAX_SUFFIX {
            let name = if attempt == 0 {
                format!("{stem}.{extension}")
            } else {
                format!("{stem}_{attempt}.{extension}")
            };
            let path = self.dir.join(name);

            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(CoreError::Report { path, source }),
            };
            fill(&path, file, contents.as_bytes())?;
            debug!(path = %path.display(), bytes = contents.len(), "report written");
            return Ok(path);
        }

        Err(CoreError::Internal(format!(
            "no free report name for {stem} in {}",
            self.dir.display()
        )))
    }
}

/// `{TAG}_{host}_{type}_{version}_{timestamp}` without extension.
pub fn file_stem(tag: ReportTag, device: &DeviceRecord, at: DateTime<Local>) -> String {
    format!(
        "{tag}_{}_{}_{}_{}",
        sanitize_host(&device.hostname),
        sanitize_component(&device.device_type),
        sanitize_component(&device.version),
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Like [`sanitize_host`] but keeps dots, so `7.3.2` stays readable.
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write `contents` into the file just created at `path`. A failed write
/// removes the file so no truncated report is left behind.
fn fill<W: Write>(path: &Path, mut file: W, contents: &[u8]) -> Result<(), CoreError> {
    let written = file.write_all(contents).and_then(|()| file.flush());
    drop(file);

    written.map_err(|source| {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove partial report");
        }
        CoreError::Report {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use secrecy::SecretString;

    use super::*;

    fn record(hostname: &str) -> DeviceRecord {
        DeviceRecord {
            hostname: hostname.into(),
            device_type: "iosxr".into(),
            version: "7.3.2".into(),
            address: "10.0.0.1".into(),
            username: "admin".into(),
            password: SecretString::from("admin".to_owned()),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn stem_follows_naming_scheme() {
        let stem = file_stem(ReportTag::Cdb, &record("pe1.lab"), fixed_time());
        assert_eq!(stem, "CDB_pe1_lab_iosxr_7.3.2_03_09_2024__14_05_07");
    }

    #[test]
    fn host_is_sanitized() {
        assert_eq!(sanitize_host("core/rtr 1.lab"), "core_rtr_1_lab");
        assert_eq!(sanitize_host("edge-01_a"), "edge-01_a");
    }

    #[test]
    fn tags_map_to_extensions() {
        assert_eq!(ReportTag::Netconf.to_string(), "NETCONF");
        assert_eq!(ReportTag::Netconf.extension(), "xml");
        assert_eq!(ReportTag::Diff.extension(), "html");
    }

    #[test]
    fn same_second_writes_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(&ReportSettings {
            dir: dir.path().join("reports"),
            wrap_column: 10,
        });
        let device = record("pe1");

        let first = writer
            .write_at(ReportTag::Netconf, &device, "<data>1</data>", fixed_time())
            .unwrap();
        let second = writer
            .write_at(ReportTag::Netconf, &device, "<data>2</data>", fixed_time())
            .unwrap();

        assert_ne!(first, second);
        assert!(
            second
                .file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("14_05_07_1.xml")
        );
        assert_eq!(fs::read_to_string(&first).unwrap(), "<data>1</data>");
        assert_eq!(fs::read_to_string(&second).unwrap(), "<data>2</data>");
    }

    /// Accepts a few bytes, then fails like a full disk.
    struct FullDisk(usize);

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.0 == 0 {
                return Err(std::io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.0);
            self.0 -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NETCONF_pe1.xml");
        fs::write(&path, "").unwrap();

        let err = fill(&path, FullDisk(4), b"<data>truncated</data>").unwrap_err();

        assert!(matches!(err, CoreError::Report { ref path, .. } if path.ends_with("NETCONF_pe1.xml")));
        assert!(!path.exists());
    }
}
