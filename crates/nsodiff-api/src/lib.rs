// nsodiff-api: RESTCONF client for the NSO staging server and a NETCONF
// client for reading device running configuration.

pub mod error;
pub mod netconf;
pub mod restconf;
pub mod transport;

pub use error::Error;
pub use netconf::{Datastore, NetconfClient, Platform, SessionParams};
pub use restconf::{RestconfClient, RestconfMethod};
pub use transport::{TlsMode, TransportConfig};
