// Where live running configuration comes from.
//
// Production reads it over NETCONF; tests plug in canned payloads.

use futures_util::future::BoxFuture;

use nsodiff_api::netconf::{self, SessionParams};

use crate::config::{DeviceRecord, NetconfSettings};

/// Source of a device's running configuration.
pub trait LiveConfigSource: Send + Sync {
    /// Read the running configuration of `device`.
    ///
    /// Errors are returned as raw `nsodiff_api::Error` so the caller can
    /// record them as a soft, per-device outcome.
    fn running_config<'a>(
        &'a self,
        device: &'a DeviceRecord,
    ) -> BoxFuture<'a, Result<String, nsodiff_api::Error>>;
}

/// NETCONF `<get-config>` on `<running>`.
#[derive(Debug, Clone, Default)]
pub struct NetconfSource {
    settings: NetconfSettings,
}

impl NetconfSource {
    pub fn new(settings: NetconfSettings) -> Self {
        Self { settings }
    }

    fn session_params(&self, device: &DeviceRecord) -> SessionParams {
        SessionParams {
            address: device.address.clone(),
            port: self.settings.port,
            username: device.username.clone(),
            password: device.password.clone(),
            platform: device.platform(),
            timeout: self.settings.timeout,
        }
    }
}

impl LiveConfigSource for NetconfSource {
    fn running_config<'a>(
        &'a self,
        device: &'a DeviceRecord,
    ) -> BoxFuture<'a, Result<String, nsodiff_api::Error>> {
        let params = self.session_params(device);
        Box::pin(async move { netconf::fetch_running_config(&params).await })
    }
}
