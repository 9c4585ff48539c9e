// ── Controller token resolution ──
//
// 1. `NSODIFF_TOKEN` environment variable
// 2. System keyring entry `nsodiff` / `<address>`
// 3. Plaintext `staging-nso.token` from the inventory

use secrecy::SecretString;
use tracing::debug;

use crate::error::ConfigError;
use crate::inventory::ControllerEndpoint;

pub const TOKEN_ENV: &str = "NSODIFF_TOKEN";
pub const KEYRING_SERVICE: &str = "nsodiff";

/// Resolve the pre-encoded Basic token for `endpoint`.
pub fn resolve_token(endpoint: &ControllerEndpoint) -> Result<SecretString, ConfigError> {
    resolve_with(
        endpoint,
        || std::env::var(TOKEN_ENV).ok(),
        || {
            keyring::Entry::new(KEYRING_SERVICE, &endpoint.address)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_with(
    endpoint: &ControllerEndpoint,
    env: impl FnOnce() -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Result<SecretString, ConfigError> {
    if let Some(token) = env().filter(|t| !t.trim().is_empty()) {
        debug!("controller token taken from {TOKEN_ENV}");
        return Ok(SecretString::from(token.trim().to_owned()));
    }

    if let Some(token) = keyring() {
        debug!(service = KEYRING_SERVICE, account = %endpoint.address, "controller token taken from keyring");
        return Ok(SecretString::from(token));
    }

    if let Some(ref token) = endpoint.token {
        debug!("controller token taken from inventory");
        return Ok(token.clone());
    }

    Err(ConfigError::NoToken {
        address: endpoint.address.clone(),
    })
}
