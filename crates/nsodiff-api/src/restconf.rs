// RESTCONF client for the NSO staging server.
//
// Every request carries the yang-data+xml media type and the pre-shared
// Basic token. Only 200/201/204 count as success; anything else becomes
// `Error::Status` with the response body and URL attached.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use strum::{Display, EnumString};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Media type used for every request and response body.
pub const YANG_DATA_XML: &str = "application/yang-data+xml";

const SUCCESS_CODES: [StatusCode; 3] = [StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT];

/// The three verbs the staging workflow needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RestconfMethod {
    Get,
    Post,
    Delete,
}

impl RestconfMethod {
    /// Parse a method name, rejecting anything outside GET/POST/DELETE.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        raw.trim()
            .parse()
            .map_err(|_| Error::UnsupportedMethod(raw.to_owned()))
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Raw RESTCONF client.
///
/// Stateless beyond its base URL and default headers; `reqwest` handles
/// connection reuse.
pub struct RestconfClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl RestconfClient {
    /// Build a client for `{base}/restconf/` authenticated with `token`.
    ///
    /// The token is sent as `Authorization: Basic {token}`; it is expected
    /// to be already base64-encoded, exactly as NSO hands it out.
    pub fn new(base_url: &str, token: &SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(YANG_DATA_XML));
        headers.insert(ACCEPT, HeaderValue::from_static(YANG_DATA_XML));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", token.expose_secret()))
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// The RESTCONF root, always ending in `/restconf/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `/restconf/` to the controller root unless already present.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/restconf") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/restconf/"));
        }

        Ok(url)
    }

    /// Join a relative endpoint (e.g. `"data/tailf-ncs:devices"`) onto the base.
    fn url(&self, endpoint: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Issue a request with a method given by name.
    ///
    /// Unknown methods fail with `Error::UnsupportedMethod` before anything
    /// goes on the wire.
    pub async fn request(&self, endpoint: &str, method: &str, body: Option<&str>) -> Result<String, Error> {
        let method = RestconfMethod::parse(method)?;
        self.send(endpoint, method, body).await
    }

    /// Issue one RESTCONF call and return the response body as text.
    pub async fn send(&self, endpoint: &str, method: RestconfMethod, body: Option<&str>) -> Result<String, Error> {
        let url = self.url(endpoint)?;
        debug!("{method} {url}");

        let mut builder = self.http.request(method.as_reqwest(), url.clone());
        if let Some(payload) = body {
            trace!(bytes = payload.len(), "attaching request body");
            builder = builder.body(payload.to_owned());
        }

        let resp = builder.send().await.map_err(|e| self.map_transport(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_transport(e))?;
        let text = normalize_newlines(&text);

        if !SUCCESS_CODES.contains(&status) {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text,
                url: url.to_string(),
            });
        }

        Ok(text)
    }

    pub async fn get(&self, endpoint: &str) -> Result<String, Error> {
        self.send(endpoint, RestconfMethod::Get, None).await
    }

    pub async fn post(&self, endpoint: &str, body: Option<&str>) -> Result<String, Error> {
        self.send(endpoint, RestconfMethod::Post, body).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<String, Error> {
        self.send(endpoint, RestconfMethod::Delete, None).await
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Replace literal `\n` escape sequences with real newlines.
pub fn normalize_newlines(body: &str) -> String {
    body.replace("\\n", "\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(RestconfMethod::parse("get").unwrap(), RestconfMethod::Get);
        assert_eq!(RestconfMethod::parse("Delete").unwrap(), RestconfMethod::Delete);
        assert_eq!(RestconfMethod::Post.to_string(), "POST");
    }

    #[test]
    fn method_parse_rejects_patch() {
        let err = RestconfMethod::parse("PATCH").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "PATCH"));
    }

    #[test]
    fn base_url_gets_restconf_suffix() {
        let url = RestconfClient::normalize_base_url("http://10.0.0.1:8080").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8080/restconf/");

        let url = RestconfClient::normalize_base_url("http://10.0.0.1:8080/restconf").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8080/restconf/");
    }

    #[test]
    fn endpoint_join_keeps_query() {
        let token = SecretString::from("dG9rZW4=".to_owned());
        let client = RestconfClient::new("http://nso:8080/", &token, &TransportConfig::default()).unwrap();
        let url = client
            .url("data/tailf-ncs:devices/device=pe1?content=config")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://nso:8080/restconf/data/tailf-ncs:devices/device=pe1?content=config"
        );
    }

    #[test]
    fn escaped_newlines_are_expanded() {
        assert_eq!(normalize_newlines("a\\nb\nc"), "a\nb\nc");
    }
}
