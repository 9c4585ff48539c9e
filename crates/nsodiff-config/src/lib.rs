//! Configuration for nsodiff.
//!
//! Two sources feed a run: the YAML inventory (staging NSO plus devices)
//! and optional tool settings (TOML file + `NSODIFF_` env). This crate
//! validates both and translates them into `nsodiff_core` runtime types.

mod credentials;
mod error;
mod inventory;
mod settings;

pub use credentials::{KEYRING_SERVICE, TOKEN_ENV, resolve_token};
pub use error::{ConfigError, InventoryIssue};
pub use inventory::{ControllerEndpoint, Inventory, load_inventory, parse_inventory};
pub use settings::{ControllerSettings, NetconfSection, Settings, load_settings_from, settings_path};

use nsodiff_core::{ControllerConfig, TlsVerification};

/// Build the core controller config for `endpoint`.
///
/// The token is resolved through [`resolve_token`]; TLS and timeout come
/// from `settings`.
pub fn controller_config(endpoint: &ControllerEndpoint, settings: &Settings) -> Result<ControllerConfig, ConfigError> {
    let url = endpoint.url()?;
    let token = resolve_token(endpoint)?;

    let tls = if settings.controller.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca) = settings.controller.ca_cert {
        TlsVerification::CustomCa(ca.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = ControllerConfig::new(url, token);
    config.tls = tls;
    config.timeout = settings.controller_timeout();
    config.sync_action = settings.controller.sync_action;
    Ok(config)
}
