// NETCONF over SSH (RFC 6241 / RFC 6242).
//
// One `NetconfClient` is one SSH connection with the `netconf` subsystem
// open on a single channel. The protocol itself lives in `Session`, which
// runs over any async byte stream. Exchanges are strictly request/response:
// every RPC waits for its reply before the next one is sent.

pub mod framing;
pub mod message;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle, Msg};
use russh::keys::ssh_key;
use russh::{Channel, ChannelMsg, ChannelStream, Disconnect};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use secrecy::{ExposeSecret, SecretString};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, trace, warn};

use crate::error::Error;
use framing::Framing;
use message::{CAP_BASE_11, ServerHello};

/// IANA port for NETCONF over SSH.
pub const DEFAULT_PORT: u16 = 830;

// ── Platform hint ────────────────────────────────────────────────────

/// Vendor flavour of the device, taken from the inventory `device_type`.
///
/// Only changes the capabilities we advertise in our `<hello>`; the
/// `<get-config>` exchange itself is identical on every platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    #[default]
    Default,
    Junos,
    Iosxr,
    Iosxe,
    Csr,
    Nexus,
    Huawei,
    Alu,
    Hpcomware,
}

impl Platform {
    /// Map a free-form device type onto a platform. Unknown tags fall back
    /// to [`Platform::Default`].
    pub fn from_hint(hint: &str) -> Self {
        hint.trim().parse().unwrap_or_default()
    }

    /// Vendor capabilities added to the client hello.
    pub fn extra_capabilities(self) -> &'static [&'static str] {
        match self {
            Self::Junos => &[
                "http://xml.juniper.net/netconf/junos/1.0",
                "http://xml.juniper.net/dmi/system/1.0",
            ],
            Self::Huawei => &["http://www.huawei.com/netconf/capability/base/1.0"],
            Self::Nexus => &["urn:ietf:params:xml:ns:netconf:base:1.0"],
            _ => &[],
        }
    }
}

// ── Datastore ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
}

// ── Session parameters ───────────────────────────────────────────────

/// Everything needed to open a session to one device.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub platform: Platform,
    /// Applied to connect, authentication, and each RPC round trip.
    pub timeout: Duration,
}

impl SessionParams {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// ── SSH handler ──────────────────────────────────────────────────────

/// Accepts any host key. Staging devices are lab gear with throwaway keys,
/// so there is no known_hosts to check against.
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        trace!("accepting device host key without verification");
        Ok(true)
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// NETCONF message exchange over an already open byte stream.
///
/// Knows nothing about SSH: [`NetconfClient`] hands it the `netconf`
/// subsystem channel as a stream.
pub struct Session<S> {
    stream: S,
    framing: Framing,
    inbox: Vec<u8>,
    next_message_id: u32,
    timeout: Duration,
    server: ServerHello,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// `timeout` bounds every read of a reply.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            framing: Framing::EndOfMessage,
            inbox: Vec::new(),
            next_message_id: 101,
            timeout,
            server: ServerHello::default(),
        }
    }

    /// Capabilities and session id announced by the device.
    pub fn server_hello(&self) -> &ServerHello {
        &self.server
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Send our `<hello>`, read the device's, and switch to chunked
    /// framing when both sides speak base:1.1.
    pub async fn exchange_hello(&mut self, platform: Platform) -> Result<(), Error> {
        let hello = message::client_hello(platform.extra_capabilities());
        self.write(&Framing::EndOfMessage.encode(&hello)).await?;

        let reply = self.read_message().await?;
        self.server = message::parse_hello(&reply)?;

        if self.server.supports(CAP_BASE_11) {
            self.framing = Framing::Chunked;
        }
        debug!(
            session_id = self.server.session_id.as_deref().unwrap_or("?"),
            framing = ?self.framing,
            "NETCONF hello exchanged"
        );
        Ok(())
    }

    /// Fetch the full configuration of `source`.
    ///
    /// Returns the `<data>` element of the reply as a standalone XML string.
    pub async fn get_config(&mut self, source: Datastore) -> Result<String, Error> {
        let id = self.take_message_id();
        let reply = self.rpc(&message::get_config(id, source)).await?;
        message::parse_data_reply(&reply)
    }

    /// Send `<close-session>` and expect `<ok/>`.
    pub async fn close_session(&mut self) -> Result<(), Error> {
        let id = self.take_message_id();
        let reply = self.rpc(&message::close_session(id)).await?;
        message::expect_ok(&reply)
    }

    fn take_message_id(&mut self) -> u32 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }

    async fn rpc(&mut self, request: &str) -> Result<String, Error> {
        trace!(bytes = request.len(), "sending rpc");
        let framed = self.framing.encode(request);
        self.write(&framed).await?;
        self.read_message().await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let limit = self.timeout;
        let stream = &mut self.stream;
        let sent = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        timed(limit, sent)
            .await?
            .map_err(|e| Error::Framing(format!("channel write failed: {e}")))
    }

    /// Read until the framing layer yields one complete message.
    async fn read_message(&mut self) -> Result<String, Error> {
        let mut buf = [0u8; 8192];
        loop {
            if let Some(message) = self.framing.decode(&mut self.inbox)? {
                return Ok(message);
            }

            let read = timed(self.timeout, self.stream.read(&mut buf))
                .await?
                .map_err(|e| Error::Framing(format!("channel read failed: {e}")))?;
            match buf.get(..read) {
                Some([]) | None => {
                    return Err(Error::Framing("channel closed before end of message".into()));
                }
                Some(data) => self.inbox.extend_from_slice(data),
            }
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

type SubsystemStream = Pin<Box<ChannelStream<Msg>>>;

/// An open NETCONF session over SSH.
pub struct NetconfClient {
    handle: Handle<AcceptAnyHostKey>,
    session: Session<SubsystemStream>,
}

impl NetconfClient {
    /// Connect, authenticate, open the `netconf` subsystem and exchange hellos.
    pub async fn connect(params: &SessionParams) -> Result<Self, Error> {
        let endpoint = params.endpoint();
        debug!(%endpoint, platform = %params.platform, "opening NETCONF session");

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(params.timeout),
            ..Default::default()
        });

        let mut handle = timed(
            params.timeout,
            client::connect(config, (params.address.as_str(), params.port), AcceptAnyHostKey),
        )
        .await?
        .map_err(|e| match e {
            russh::Error::IO(io) => Error::Connect {
                address: endpoint.clone(),
                reason: io.to_string(),
            },
            other => Error::Ssh(other),
        })?;

        let auth = timed(
            params.timeout,
            handle.authenticate_password(
                params.username.clone(),
                params.password.expose_secret().to_owned(),
            ),
        )
        .await??;
        if !auth.success() {
            return Err(Error::NetconfAuth {
                username: params.username.clone(),
                address: endpoint,
            });
        }

        let mut channel = timed(params.timeout, handle.channel_open_session()).await??;
        channel.request_subsystem(true, "netconf").await?;
        let early = timed(params.timeout, await_subsystem(&mut channel)).await??;

        let mut session = Session::new(Box::pin(channel.into_stream()), params.timeout);
        session.inbox = early;
        session.exchange_hello(params.platform).await?;
        Ok(Self { handle, session })
    }

    /// Fetch the full configuration of `source`.
    pub async fn get_config(&mut self, source: Datastore) -> Result<String, Error> {
        self.session.get_config(source).await
    }

    /// Send `<close-session>` and tear the SSH connection down.
    pub async fn close(mut self) -> Result<(), Error> {
        let outcome = self.session.close_session().await;
        if let Err(e) = self.handle.disconnect(Disconnect::ByApplication, "", "en").await {
            debug!(error = %e, "SSH disconnect failed");
        }
        outcome
    }
}

/// Wait for the device to accept the subsystem request.
///
/// Returns any data that arrived ahead of the confirmation so the hello
/// is not lost.
async fn await_subsystem(channel: &mut Channel<Msg>) -> Result<Vec<u8>, Error> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(Vec::new()),
            Some(ChannelMsg::Data { data }) => return Ok(data.to_vec()),
            Some(ChannelMsg::Failure) => {
                return Err(Error::Framing("device refused the netconf subsystem".into()));
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                warn!(ext, "device wrote to stderr: {}", String::from_utf8_lossy(&data));
            }
            Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                return Err(Error::Framing("channel closed before subsystem start".into()));
            }
            Some(other) => trace!(?other, "ignoring channel message"),
        }
    }
}

/// Run `fut` under `limit`, mapping expiry onto `Error::Timeout`.
async fn timed<F: std::future::Future>(limit: Duration, fut: F) -> Result<F::Output, Error> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: limit.as_secs(),
        })
}

/// Open a session, read `<running>`, close the session.
///
/// A failed `<close-session>` does not discard a configuration that was
/// already read.
pub async fn fetch_running_config(params: &SessionParams) -> Result<String, Error> {
    let mut client = NetconfClient::connect(params).await?;
    let config = client.get_config(Datastore::Running).await;
    if let Err(e) = client.close().await {
        debug!(error = %e, "close-session failed");
    }
    config
}
