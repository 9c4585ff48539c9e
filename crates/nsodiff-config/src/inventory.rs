// ── Inventory ──
//
// The YAML file naming the staging NSO and the devices to audit. Records
// are validated field by field and every problem is collected, so one run
// of the tool reports the whole file's defects at once. No device record
// is built from a partial entry.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;
use url::Url;

use nsodiff_core::DeviceRecord;

use crate::error::{ConfigError, InventoryIssue};

const DEVICE_FIELDS: [&str; 6] = ["hostname", "device_type", "version", "address", "username", "password"];

/// Where the staging NSO listens and how to authenticate.
#[derive(Clone)]
pub struct ControllerEndpoint {
    pub address: String,
    pub port: u16,
    pub scheme: String,
    /// Plaintext token from the inventory, last resort of the token chain.
    pub token: Option<SecretString>,
}

impl ControllerEndpoint {
    /// `{scheme}://{address}:{port}`.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let raw = format!("{}://{}:{}", self.scheme, self.address, self.port);
        Url::parse(&raw).map_err(|e| ConfigError::Validation {
            field: "staging-nso".into(),
            reason: format!("{raw}: {e}"),
        })
    }
}

impl std::fmt::Debug for ControllerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerEndpoint")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A validated inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Absent when the file only lists devices (live-only runs).
    pub controller: Option<ControllerEndpoint>,
    pub devices: Vec<DeviceRecord>,
}

#[derive(Deserialize)]
struct RawInventory {
    #[serde(rename = "staging-nso")]
    staging_nso: Option<Mapping>,
    #[serde(rename = "staging-devices")]
    staging_devices: Option<Vec<Value>>,
}

/// Read and validate the inventory at `path`.
pub fn load_inventory(path: &Path) -> Result<Inventory, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawInventory = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    let inventory = validate(raw)?;
    debug!(
        path = %path.display(),
        devices = inventory.devices.len(),
        controller = inventory.controller.is_some(),
        "inventory loaded"
    );
    Ok(inventory)
}

/// Validate inventory YAML held in memory.
pub fn parse_inventory(text: &str) -> Result<Inventory, ConfigError> {
    let raw: RawInventory = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
        path: "<inline>".into(),
        source,
    })?;
    validate(raw)
}

fn validate(raw: RawInventory) -> Result<Inventory, ConfigError> {
    let mut issues = Vec::new();

    let controller = raw
        .staging_nso
        .as_ref()
        .and_then(|section| controller_endpoint(section, &mut issues));

    let entries = raw.staging_devices.unwrap_or_default();
    if entries.is_empty() {
        issues.push(InventoryIssue::new("staging-devices", "", "no devices listed"));
    }

    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let location = format!("staging-devices[{index}]");
        let Some(record) = device_record(&location, entry, &mut issues) else {
            continue;
        };
        if !seen.insert(record.hostname.clone()) {
            issues.push(InventoryIssue::new(
                location,
                "hostname",
                format!("duplicate hostname '{}'", record.hostname),
            ));
            continue;
        }
        devices.push(record);
    }

    if issues.is_empty() {
        Ok(Inventory { controller, devices })
    } else {
        Err(ConfigError::Inventory(issues))
    }
}

fn controller_endpoint(section: &Mapping, issues: &mut Vec<InventoryIssue>) -> Option<ControllerEndpoint> {
    const LOCATION: &str = "staging-nso";
    let before = issues.len();

    let address = required_scalar(LOCATION, section, "address", issues);
    let port = required_scalar(LOCATION, section, "port", issues).and_then(|raw| match raw.parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        _ => {
            issues.push(InventoryIssue::new(
                LOCATION,
                "port",
                format!("'{raw}' is not a TCP port"),
            ));
            None
        }
    });
    let scheme = match optional_scalar(LOCATION, section, "scheme", issues) {
        None => Some("http".to_owned()),
        Some(s) if s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https") => Some(s.to_ascii_lowercase()),
        Some(other) => {
            issues.push(InventoryIssue::new(
                LOCATION,
                "scheme",
                format!("expected http or https, got '{other}'"),
            ));
            None
        }
    };
    let token = optional_scalar(LOCATION, section, "token", issues).map(SecretString::from);

    if issues.len() > before {
        return None;
    }
    Some(ControllerEndpoint {
        address: address?,
        port: port?,
        scheme: scheme?,
        token,
    })
}

fn device_record(location: &str, entry: &Value, issues: &mut Vec<InventoryIssue>) -> Option<DeviceRecord> {
    let Some(map) = entry.as_mapping() else {
        issues.push(InventoryIssue::new(location, "", "expected a mapping of device fields"));
        return None;
    };

    let before = issues.len();
    let mut values: Vec<Option<String>> = DEVICE_FIELDS
        .iter()
        .map(|field| required_scalar(location, map, field, issues))
        .collect();
    if issues.len() > before {
        return None;
    }

    let mut take = |i: usize| values.get_mut(i).and_then(Option::take).unwrap_or_default();
    Some(DeviceRecord {
        hostname: take(0),
        device_type: take(1),
        version: take(2),
        address: take(3),
        username: take(4),
        password: SecretString::from(take(5)),
    })
}

/// String form of a YAML scalar; numbers and booleans are accepted so that
/// `port: 8080` and `version: 7.3` work unquoted.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_scalar(location: &str, map: &Mapping, field: &str, issues: &mut Vec<InventoryIssue>) -> Option<String> {
    let value = map.get(field)?;
    if value.is_null() {
        return None;
    }
    match scalar(value) {
        Some(s) if !s.is_empty() => Some(s),
        Some(_) => None,
        None => {
            issues.push(InventoryIssue::new(location, field, "expected a scalar value"));
            None
        }
    }
}

fn required_scalar(location: &str, map: &Mapping, field: &str, issues: &mut Vec<InventoryIssue>) -> Option<String> {
    let before = issues.len();
    let value = optional_scalar(location, map, field, issues);
    if value.is_none() && issues.len() == before {
        issues.push(InventoryIssue::new(location, field, "missing"));
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const GOOD: &str = r"
staging-nso:
  address: 10.0.0.10
  port: 8080
  token: YWRtaW46YWRtaW4=
staging-devices:
  - hostname: pe1.lab
    device_type: iosxr
    version: 7.3
    address: 10.0.0.21
    username: admin
    password: admin
  - hostname: pe2.lab
    device_type: junos
    version: '21.4R1'
    address: 10.0.0.22
    username: admin
    password: 12345
";

    fn issues(err: ConfigError) -> Vec<String> {
        match err {
            ConfigError::Inventory(issues) => issues.iter().map(ToString::to_string).collect(),
            other => panic!("expected inventory issues, got {other:?}"),
        }
    }

    #[test]
    fn valid_inventory_parses_with_numeric_scalars() {
        let inventory = parse_inventory(GOOD).unwrap();

        let controller = inventory.controller.unwrap();
        assert_eq!(controller.url().unwrap().as_str(), "http://10.0.0.10:8080/");
        assert_eq!(controller.token.unwrap().expose_secret(), "YWRtaW46YWRtaW4=");

        assert_eq!(inventory.devices.len(), 2);
        assert_eq!(inventory.devices[0].hostname, "pe1.lab");
        assert_eq!(inventory.devices[0].version, "7.3");
        assert_eq!(inventory.devices[1].password.expose_secret(), "12345");
    }

    #[test]
    fn controller_section_is_optional() {
        let yaml = "staging-devices:\n  - {hostname: a, device_type: x, version: 1, address: 1.1.1.1, username: u, password: p}\n";
        let inventory = parse_inventory(yaml).unwrap();
        assert!(inventory.controller.is_none());
        assert_eq!(inventory.devices.len(), 1);
    }

    #[test]
    fn every_malformed_record_is_reported() {
        let yaml = r"
staging-nso:
  address: nso
  port: seventy
  scheme: ftp
staging-devices:
  - hostname: a
    device_type: x
    version: 1
    address: 1.1.1.1
    username: u
  - just-a-string
  - hostname: c
    device_type: [nested]
    version: 1
    address: 1.1.1.3
    username: u
    password: p
";
        let found = issues(parse_inventory(yaml).unwrap_err());

        assert_eq!(
            found,
            vec![
                "staging-nso.port: 'seventy' is not a TCP port",
                "staging-nso.scheme: expected http or https, got 'ftp'",
                "staging-devices[0].password: missing",
                "staging-devices[1]: expected a mapping of device fields",
                "staging-devices[2].device_type: expected a scalar value",
            ]
        );
    }

    #[test]
    fn duplicate_hostnames_are_rejected() {
        let yaml = r"
staging-devices:
  - {hostname: a, device_type: x, version: 1, address: 1.1.1.1, username: u, password: p}
  - {hostname: a, device_type: x, version: 1, address: 1.1.1.2, username: u, password: p}
";
        let found = issues(parse_inventory(yaml).unwrap_err());
        assert_eq!(found, vec!["staging-devices[1].hostname: duplicate hostname 'a'"]);
    }

    #[test]
    fn empty_device_list_is_an_issue() {
        let found = issues(parse_inventory("staging-devices: []\n").unwrap_err());
        assert_eq!(found, vec!["staging-devices: no devices listed"]);
    }

    #[test]
    fn https_scheme_is_honoured() {
        let yaml = "staging-nso: {address: nso.lab, port: '8888', scheme: HTTPS}\n\
                    staging-devices:\n  - {hostname: a, device_type: x, version: 1, address: 1.1.1.1, username: u, password: p}\n";
        let controller = parse_inventory(yaml).unwrap().controller.unwrap();
        assert_eq!(controller.url().unwrap().as_str(), "https://nso.lab:8888/");
        assert!(controller.token.is_none());
    }

    #[test]
    fn unreadable_yaml_is_a_parse_error() {
        assert!(matches!(
            parse_inventory("staging-devices: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
